//! Read-side access to the record store.
//!
//! The aggregation engine only ever sees data through [`RecordStore`]. Each
//! call is an independent snapshot; nothing here opens a transaction that
//! spans several calls.

use rusqlite::{params_from_iter, types::Value, Connection, OptionalExtension, Row};
use thiserror::Error;

use crate::engine::pager::Window;
use crate::model::{Course, Examination, Grade, GradeRecord, Semester};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database query failed: {0}")]
    Query(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GradeFilter {
    pub user_id: Option<i64>,
    pub course_id: Option<i64>,
    /// Inclusive lower bound on `score`.
    pub min_score: Option<f64>,
}

impl GradeFilter {
    pub fn for_user(user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    pub fn for_user_course(user_id: i64, course_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
            course_id: Some(course_id),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeOrder {
    IdAsc,
    IdDesc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CourseOrder {
    #[default]
    IdAsc,
    NameAsc,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CourseFilter {
    pub name_contains: Option<String>,
    pub order: CourseOrder,
    pub limit: Option<u64>,
}

/// Examinations are always returned by name, then id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExaminationFilter {
    pub name_contains: Option<String>,
    pub limit: Option<u64>,
}

pub trait RecordStore {
    fn list_grades(
        &self,
        filter: &GradeFilter,
        order: GradeOrder,
        window: Option<Window>,
    ) -> Result<Vec<GradeRecord>, StoreError>;

    fn count_grades(&self, filter: &GradeFilter) -> Result<u64, StoreError>;

    fn list_courses(&self, filter: &CourseFilter) -> Result<Vec<Course>, StoreError>;

    fn get_course(&self, id: i64) -> Result<Option<Course>, StoreError>;

    fn get_examination(&self, id: i64) -> Result<Option<Examination>, StoreError>;

    fn list_examinations(
        &self,
        filter: &ExaminationFilter,
    ) -> Result<Vec<Examination>, StoreError>;
}

pub struct SqliteStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

const GRADE_SELECT: &str = "SELECT
       g.id, g.user_id, g.course_id, g.examination_id, g.score, g.created_at, g.updated_at,
       c.id, c.name, c.semester_id,
       s.id, s.name,
       e.id, e.name
     FROM grades g
     LEFT JOIN courses c ON c.id = g.course_id
     LEFT JOIN semesters s ON s.id = c.semester_id
     LEFT JOIN examinations e ON e.id = g.examination_id";

const COURSE_SELECT: &str = "SELECT c.id, c.name, c.semester_id, s.id, s.name
     FROM courses c
     LEFT JOIN semesters s ON s.id = c.semester_id";

fn grade_where(filter: &GradeFilter) -> (String, Vec<Value>) {
    let mut clauses: Vec<&str> = Vec::new();
    let mut bind: Vec<Value> = Vec::new();
    if let Some(user_id) = filter.user_id {
        clauses.push("g.user_id = ?");
        bind.push(Value::Integer(user_id));
    }
    if let Some(course_id) = filter.course_id {
        clauses.push("g.course_id = ?");
        bind.push(Value::Integer(course_id));
    }
    if let Some(min_score) = filter.min_score {
        clauses.push("g.score >= ?");
        bind.push(Value::Real(min_score));
    }
    if clauses.is_empty() {
        (String::new(), bind)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), bind)
    }
}

fn sql_int(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

/// Escapes `%`, `_` and `\` so a user query is matched literally by LIKE.
fn like_pattern(query: &str) -> String {
    let mut out = String::with_capacity(query.len() + 2);
    out.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

fn course_from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<Option<Course>> {
    let Some(id) = row.get::<_, Option<i64>>(at)? else {
        return Ok(None);
    };
    let semester = match row.get::<_, Option<i64>>(at + 3)? {
        Some(sid) => Some(Semester {
            id: sid,
            name: row.get(at + 4)?,
        }),
        None => None,
    };
    Ok(Some(Course {
        id,
        name: row.get(at + 1)?,
        semester_id: row.get(at + 2)?,
        semester,
    }))
}

fn grade_record_from_row(row: &Row<'_>) -> rusqlite::Result<GradeRecord> {
    let grade = Grade {
        id: row.get(0)?,
        user_id: row.get(1)?,
        course_id: row.get(2)?,
        examination_id: row.get(3)?,
        score: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    };
    let course = course_from_row(row, 7)?;
    let examination = match row.get::<_, Option<i64>>(12)? {
        Some(id) => Some(Examination {
            id,
            name: row.get(13)?,
        }),
        None => None,
    };
    Ok(GradeRecord {
        grade,
        course,
        examination,
    })
}

impl RecordStore for SqliteStore<'_> {
    fn list_grades(
        &self,
        filter: &GradeFilter,
        order: GradeOrder,
        window: Option<Window>,
    ) -> Result<Vec<GradeRecord>, StoreError> {
        let (where_sql, mut bind) = grade_where(filter);
        let order_sql = match order {
            GradeOrder::IdAsc => " ORDER BY g.id ASC",
            GradeOrder::IdDesc => " ORDER BY g.id DESC",
        };
        let mut sql = format!("{GRADE_SELECT}{where_sql}{order_sql}");
        if let Some(w) = window {
            sql.push_str(" LIMIT ? OFFSET ?");
            bind.push(Value::Integer(sql_int(w.limit)));
            bind.push(Value::Integer(sql_int(w.skip)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(bind), grade_record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn count_grades(&self, filter: &GradeFilter) -> Result<u64, StoreError> {
        let (where_sql, bind) = grade_where(filter);
        let sql = format!("SELECT COUNT(*) FROM grades g{where_sql}");
        let n: i64 = self
            .conn
            .query_row(&sql, params_from_iter(bind), |r| r.get(0))?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    fn list_courses(&self, filter: &CourseFilter) -> Result<Vec<Course>, StoreError> {
        let mut sql = COURSE_SELECT.to_string();
        let mut bind: Vec<Value> = Vec::new();
        if let Some(q) = filter.name_contains.as_deref() {
            sql.push_str(" WHERE c.name LIKE ? ESCAPE '\\'");
            bind.push(Value::Text(like_pattern(q)));
        }
        sql.push_str(match filter.order {
            CourseOrder::IdAsc => " ORDER BY c.id ASC",
            CourseOrder::NameAsc => " ORDER BY c.name ASC, c.id ASC",
        });
        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            bind.push(Value::Integer(sql_int(limit)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(bind), |row| course_from_row(row, 0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().flatten().collect())
    }

    fn get_course(&self, id: i64) -> Result<Option<Course>, StoreError> {
        let sql = format!("{COURSE_SELECT} WHERE c.id = ?");
        let course = self
            .conn
            .query_row(&sql, [id], |row| course_from_row(row, 0))
            .optional()?;
        Ok(course.flatten())
    }

    fn get_examination(&self, id: i64) -> Result<Option<Examination>, StoreError> {
        let exam = self
            .conn
            .query_row(
                "SELECT id, name FROM examinations WHERE id = ?",
                [id],
                |row| {
                    Ok(Examination {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(exam)
    }

    fn list_examinations(
        &self,
        filter: &ExaminationFilter,
    ) -> Result<Vec<Examination>, StoreError> {
        let mut sql = "SELECT id, name FROM examinations".to_string();
        let mut bind: Vec<Value> = Vec::new();
        if let Some(q) = filter.name_contains.as_deref() {
            sql.push_str(" WHERE name LIKE ? ESCAPE '\\'");
            bind.push(Value::Text(like_pattern(q)));
        }
        sql.push_str(" ORDER BY name ASC, id ASC");
        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            bind.push(Value::Integer(sql_int(limit)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(bind), |row| {
                Ok(Examination {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
