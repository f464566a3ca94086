use serde::ser::{Serialize, SerializeMap, Serializer};

/// Inclusive integer bucket range `[lo, hi]`, never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketRange {
    lo: i64,
    hi: i64,
}

/// Buckets for official results of passed courses.
pub const PASSED_RANGE: BucketRange = match BucketRange::new(5, 10) {
    Some(r) => r,
    None => panic!("empty bucket range"),
};
/// Buckets for every raw attempt.
pub const FULL_RANGE: BucketRange = match BucketRange::new(0, 10) {
    Some(r) => r,
    None => panic!("empty bucket range"),
};

impl BucketRange {
    /// `None` when `hi < lo`.
    pub const fn new(lo: i64, hi: i64) -> Option<Self> {
        if hi < lo {
            None
        } else {
            Some(Self { lo, hi })
        }
    }

    pub fn contains(&self, bucket: i64) -> bool {
        (self.lo..=self.hi).contains(&bucket)
    }

    fn len(&self) -> usize {
        (self.hi - self.lo) as usize + 1
    }
}

/// `floor(score)`; `None` for values that have no integer bucket.
pub fn bucket_of(score: f64) -> Option<i64> {
    if !score.is_finite() {
        return None;
    }
    let floored = score.floor();
    if floored < i64::MIN as f64 || floored >= i64::MAX as f64 {
        return None;
    }
    Some(floored as i64)
}

/// Counts per integer bucket. Every bucket of the range is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    range: BucketRange,
    counts: Vec<u64>,
}

impl Histogram {
    pub fn new(range: BucketRange) -> Self {
        Self {
            range,
            counts: vec![0; range.len()],
        }
    }

    pub fn from_scores<I>(range: BucketRange, scores: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let mut h = Self::new(range);
        for s in scores {
            h.record(s);
        }
        h
    }

    /// Returns false when the score's bucket falls outside the range; such
    /// scores are dropped, not rejected.
    pub fn record(&mut self, score: f64) -> bool {
        match bucket_of(score) {
            Some(b) if self.range.contains(b) => {
                self.counts[(b - self.range.lo) as usize] += 1;
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub fn count(&self, bucket: i64) -> Option<u64> {
        if self.range.contains(bucket) {
            Some(self.counts[(bucket - self.range.lo) as usize])
        } else {
            None
        }
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// `(bucket, count)` in ascending bucket order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, u64)> + '_ {
        (self.range.lo..=self.range.hi).zip(self.counts.iter().copied())
    }
}

impl Serialize for Histogram {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.counts.len()))?;
        for (bucket, count) in self.iter() {
            map.serialize_entry(&bucket.to_string(), &count)?;
        }
        map.end()
    }
}
