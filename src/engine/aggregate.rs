use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::cmp::Ordering;

use crate::engine::histogram::{Histogram, FULL_RANGE, PASSED_RANGE};
use crate::engine::ranking::{best_attempts, Attempt};
use crate::model::{Course, GradeRecord};

/// Official results at or above this count as passed.
pub const PASS_THRESHOLD: f64 = 5.0;

/// Group label for passed courses without a semester.
pub const PASSED_UNSPECIFIED: &str = "Unspecified";
/// Group label for the all-courses roster. Lower-case on purpose: clients
/// key on both spellings.
pub const ALL_COURSES_UNSPECIFIED: &str = "unspecified";

/// Rounds to 2 decimals, halves away from zero.
pub fn round_2dp(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageStats {
    pub total_courses: u64,
    pub average_score: f64,
    pub grade_distribution: Histogram,
}

/// Stats over official results. `best_scores` holds one value per course;
/// only passing values are counted, averaged and bucketed. Passing values
/// outside the bucket range still count toward the total and the average.
pub fn average_stats<I>(best_scores: I) -> AverageStats
where
    I: IntoIterator<Item = f64>,
{
    let mut grade_distribution = Histogram::new(PASSED_RANGE);
    let mut total_courses: u64 = 0;
    let mut sum = 0.0;
    for score in best_scores {
        if score >= PASS_THRESHOLD {
            grade_distribution.record(score);
            total_courses += 1;
            sum += score;
        }
    }
    let average_score = if total_courses > 0 {
        round_2dp(sum / total_courses as f64)
    } else {
        0.0
    };
    AverageStats {
        total_courses,
        average_score,
        grade_distribution,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullDistribution {
    pub full_grade_distribution: Histogram,
}

/// Histogram over every raw attempt, no deduplication.
pub fn full_distribution<I>(scores: I) -> FullDistribution
where
    I: IntoIterator<Item = f64>,
{
    FullDistribution {
        full_grade_distribution: Histogram::from_scores(FULL_RANGE, scores),
    }
}

/// Items grouped under string keys, keeping first-seen key order.
#[derive(Debug, Clone, PartialEq)]
pub struct Roster<T> {
    groups: Vec<(String, Vec<T>)>,
}

impl<T> Default for Roster<T> {
    fn default() -> Self {
        Self { groups: Vec::new() }
    }
}

impl<T> Roster<T> {
    pub fn push(&mut self, key: &str, item: T) {
        match self.groups.iter_mut().find(|(k, _)| k == key) {
            Some((_, items)) => items.push(item),
            None => self.groups.push((key.to_string(), vec![item])),
        }
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&[T]> {
        self.groups
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, items)| items.as_slice())
    }

    #[cfg(test)]
    pub fn groups(&self) -> &[(String, Vec<T>)] {
        &self.groups
    }
}

impl<T: Serialize> Serialize for Roster<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for (key, items) in &self.groups {
            map.serialize_entry(key, items)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassedCourse {
    pub course_id: i64,
    pub course_name: String,
    pub highest_grade: f64,
}

/// Semester id ascending with semester-less courses last, then course id.
fn roster_order(a: &GradeRecord, b: &GradeRecord) -> Ordering {
    let sa = a.semester_id();
    let sb = b.semester_id();
    let by_semester = match (sa, sb) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_semester.then_with(|| a.course_id().cmp(&b.course_id()))
}

/// Passed courses of one user grouped by semester name.
pub fn passed_roster(records: &[GradeRecord]) -> Roster<PassedCourse> {
    let mut winners: Vec<&GradeRecord> = best_attempts(records)
        .into_values()
        .filter(|r| r.grade.score >= PASS_THRESHOLD)
        .collect();
    winners.sort_by(|a, b| roster_order(a, b));

    let mut roster = Roster::default();
    for rec in winners {
        let key = rec.semester_name().unwrap_or(PASSED_UNSPECIFIED);
        roster.push(
            key,
            PassedCourse {
                course_id: rec.grade.course_id,
                course_name: rec
                    .course
                    .as_ref()
                    .map(|c| c.name.clone())
                    .unwrap_or_default(),
                highest_grade: rec.grade.score,
            },
        );
    }
    roster
}

/// Every course grouped by semester name, in the order given.
pub fn course_roster(courses: Vec<Course>) -> Roster<Course> {
    let mut roster = Roster::default();
    for course in courses {
        let key = course
            .semester
            .as_ref()
            .map(|s| s.name.clone())
            .unwrap_or_else(|| ALL_COURSES_UNSPECIFIED.to_string());
        roster.push(&key, course);
    }
    roster
}
