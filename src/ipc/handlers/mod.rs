pub mod core;
pub mod courses;
pub mod examinations;
pub mod grades;
pub mod semesters;
pub mod stats;
