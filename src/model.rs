use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Semester {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub semester_id: Option<i64>,
    /// Joined semester row; `None` when the course has no semester.
    pub semester: Option<Semester>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Examination {
    pub id: i64,
    pub name: String,
}

/// One recorded attempt. Scores are not range-checked anywhere.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,
    pub examination_id: i64,
    pub score: f64,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// A grade joined with its course (and semester) and examination.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRecord {
    #[serde(flatten)]
    pub grade: Grade,
    pub course: Option<Course>,
    pub examination: Option<Examination>,
}

impl GradeRecord {
    pub fn semester_id(&self) -> Option<i64> {
        self.course.as_ref().and_then(|c| c.semester_id)
    }

    pub fn semester_name(&self) -> Option<&str> {
        self.course
            .as_ref()
            .and_then(|c| c.semester.as_ref())
            .map(|s| s.name.as_str())
    }

    pub fn examination_name(&self) -> Option<&str> {
        self.examination.as_ref().map(|e| e.name.as_str())
    }
}
