//! Best-attempt selection.
//!
//! A user's official result for a course is the maximum score over all of
//! their attempts for it. When several attempts share that score the one with
//! the smallest grade id wins, so the chosen row (and e.g. its examination)
//! is reproducible regardless of the order the store returned rows in.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::model::{Grade, GradeRecord};

pub trait Attempt {
    fn grade_id(&self) -> i64;
    fn course_id(&self) -> i64;
    fn score(&self) -> f64;
}

impl Attempt for Grade {
    fn grade_id(&self) -> i64 {
        self.id
    }
    fn course_id(&self) -> i64 {
        self.course_id
    }
    fn score(&self) -> f64 {
        self.score
    }
}

impl Attempt for GradeRecord {
    fn grade_id(&self) -> i64 {
        self.grade.id
    }
    fn course_id(&self) -> i64 {
        self.grade.course_id
    }
    fn score(&self) -> f64 {
        self.grade.score
    }
}

/// Higher score first, then smaller id.
fn outranks<A: Attempt>(candidate: &A, current: &A) -> bool {
    match candidate.score().total_cmp(&current.score()) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => candidate.grade_id() < current.grade_id(),
    }
}

/// One winning attempt per distinct course, keyed by course id.
pub fn best_attempts<A: Attempt>(attempts: &[A]) -> BTreeMap<i64, &A> {
    let mut best: BTreeMap<i64, &A> = BTreeMap::new();
    for a in attempts {
        best.entry(a.course_id())
            .and_modify(|cur| {
                if outranks(a, *cur) {
                    *cur = a;
                }
            })
            .or_insert(a);
    }
    best
}

/// Official score per course when only the value matters.
pub fn best_scores<A: Attempt>(attempts: &[A]) -> BTreeMap<i64, f64> {
    best_attempts(attempts)
        .into_iter()
        .map(|(course_id, a)| (course_id, a.score()))
        .collect()
}

/// The single best attempt across the slice, e.g. one course's attempts.
pub fn best_attempt<A: Attempt>(attempts: &[A]) -> Option<&A> {
    attempts.iter().fold(None, |best, a| match best {
        Some(cur) if !outranks(a, cur) => Some(cur),
        _ => Some(a),
    })
}
