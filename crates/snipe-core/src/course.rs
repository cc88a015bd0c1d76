//! Course section targets.

use crate::semester::Semester;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One contended course section the sniper tries to acquire.
///
/// Identity is the full composite key; the server-assigned section id is
/// deliberately not part of it since it may be unknown before discovery.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CourseSection {
    pub semester: Semester,
    pub college: String,
    pub department: String,
    pub course: String,
    pub section: String,
}

impl CourseSection {
    pub fn new(
        semester: Semester,
        college: impl Into<String>,
        department: impl Into<String>,
        course: impl Into<String>,
        section: impl Into<String>,
    ) -> Self {
        Self {
            semester,
            college: college.into(),
            department: department.into(),
            course: course.into(),
            section: section.into(),
        }
    }

    /// The label under which this section appears in the schedule listing's
    /// course-name column, e.g. `CAS CS585 A1`.
    pub fn listing_label(&self) -> String {
        format!(
            "{} {}{} {}",
            self.college.to_uppercase(),
            self.department.to_uppercase(),
            self.course,
            self.section.to_uppercase()
        )
    }
}

impl fmt::Display for CourseSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.listing_label(), self.semester)
    }
}
