use serde::Serialize;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;

/// Offset/limit pair handed to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub skip: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    /// Lenient parse: anything missing, malformed or non-positive falls back
    /// to the defaults instead of failing the request.
    pub fn from_params(
        page: Option<&serde_json::Value>,
        limit: Option<&serde_json::Value>,
        default_limit: u64,
    ) -> Self {
        Self {
            page: page.and_then(positive_int).unwrap_or(DEFAULT_PAGE),
            limit: limit
                .and_then(positive_int)
                .unwrap_or(default_limit.max(1)),
        }
    }

    pub fn window(&self) -> Window {
        Window {
            skip: self.page.saturating_sub(1).saturating_mul(self.limit),
            limit: self.limit,
        }
    }
}

/// Accepts integers, truncated floats and strings with a leading integer
/// (`"3"`, `" 3 "`, `"3rd"`).
fn positive_int(v: &serde_json::Value) -> Option<u64> {
    let n = match v {
        serde_json::Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u
            } else {
                let f = n.as_f64()?;
                if !f.is_finite() || f < 1.0 {
                    return None;
                }
                f.trunc() as u64
            }
        }
        serde_json::Value::String(s) => {
            let digits: String = s
                .trim_start()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse::<u64>().ok()?
        }
        _ => return None,
    };
    (n >= 1).then_some(n)
}

/// `ceil(total / limit)`, never less than one page.
pub fn total_pages(total: u64, limit: u64) -> u64 {
    if limit == 0 {
        return 1;
    }
    total.div_ceil(limit).max(1)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn assemble(req: PageRequest, data: Vec<T>, total: u64) -> Self {
        Self {
            data,
            page: req.page,
            limit: req.limit,
            total,
            total_pages: total_pages(total, req.limit),
        }
    }
}
