//! Per-course views for one user: the official grade card, the attempt
//! time series and the paginated attempt table.

use serde::Serialize;

use crate::engine::pager::{Page, PageRequest};
use crate::engine::ranking::best_attempt;
use crate::engine::EngineError;
use crate::model::{Course, GradeRecord};
use crate::store::{GradeFilter, GradeOrder, RecordStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub course_name: String,
    pub final_grade: Option<f64>,
    pub examination: Option<String>,
}

/// `attempts` must already be scoped to `course` and one user.
pub fn course_summary(course: &Course, attempts: &[GradeRecord]) -> CourseSummary {
    let best = best_attempt(attempts);
    CourseSummary {
        course_name: course.name.clone(),
        final_grade: best.map(|r| r.grade.score),
        examination: best.and_then(|r| r.examination_name().map(str::to_string)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimelinePoint<'a> {
    pub examination: Option<&'a str>,
    pub score: f64,
}

/// Every attempt in insertion order. Iterating borrows the timeline, so the
/// sequence can be walked any number of times.
#[derive(Debug, Clone)]
pub struct Timeline<'a> {
    attempts: Vec<&'a GradeRecord>,
}

impl<'a> Timeline<'a> {
    pub fn new(attempts: &'a [GradeRecord]) -> Self {
        let mut attempts: Vec<&GradeRecord> = attempts.iter().collect();
        attempts.sort_by_key(|r| r.grade.id);
        Self { attempts }
    }

    pub fn points(&self) -> impl Iterator<Item = TimelinePoint<'a>> + '_ {
        self.attempts.iter().copied().map(|r| TimelinePoint {
            examination: r.examination_name(),
            score: r.grade.score,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineResponse<'a> {
    pub grades: Vec<TimelinePoint<'a>>,
}

impl<'a> From<&Timeline<'a>> for TimelineResponse<'a> {
    fn from(t: &Timeline<'a>) -> Self {
        Self {
            grades: t.points().collect(),
        }
    }
}

fn require_course<S: RecordStore>(store: &S, course_id: i64) -> Result<Course, EngineError> {
    store
        .get_course(course_id)?
        .ok_or_else(|| EngineError::not_found("course", course_id))
}

/// Two separate reads (course, then attempts); a write landing in between is
/// visible in the result.
pub fn load_course_summary<S: RecordStore>(
    store: &S,
    user_id: i64,
    course_id: i64,
) -> Result<CourseSummary, EngineError> {
    let course = require_course(store, course_id)?;
    let attempts = store.list_grades(
        &GradeFilter::for_user_course(user_id, course_id),
        GradeOrder::IdAsc,
        None,
    )?;
    Ok(course_summary(&course, &attempts))
}

pub fn load_course_attempts<S: RecordStore>(
    store: &S,
    user_id: i64,
    course_id: i64,
) -> Result<Vec<GradeRecord>, EngineError> {
    require_course(store, course_id)?;
    Ok(store.list_grades(
        &GradeFilter::for_user_course(user_id, course_id),
        GradeOrder::IdAsc,
        None,
    )?)
}

/// Newest attempt first. Rows and total come from two reads.
pub fn paginate_grades<S: RecordStore>(
    store: &S,
    filter: &GradeFilter,
    req: PageRequest,
) -> Result<Page<GradeRecord>, EngineError> {
    let data = store.list_grades(filter, GradeOrder::IdDesc, Some(req.window()))?;
    let total = store.count_grades(filter)?;
    Ok(Page::assemble(req, data, total))
}

pub fn course_attempt_table<S: RecordStore>(
    store: &S,
    user_id: i64,
    course_id: i64,
    req: PageRequest,
) -> Result<Page<GradeRecord>, EngineError> {
    require_course(store, course_id)?;
    paginate_grades(store, &GradeFilter::for_user_course(user_id, course_id), req)
}
