//! Addressing for the student-link registration system.
//!
//! Everything here is pure string building; no I/O. The page shapes these
//! URLs resolve to are handled behind the browser boundary.

use crate::course::CourseSection;
use crate::semester::Semester;

/// Entry point for every registration module.
pub const STUDENT_LINK_URL: &str = "https://www.bu.edu/link/bin/uiscgi_studentlink.pl";

/// Module that renders the current schedule (and the login redirect).
pub const SCHEDULE_MODULE: &str = "regsched.pl";

/// Confirmation icons rendered on the add-classes result page.
pub const SUCCESS_ICON: &str = "https://www.bu.edu/link/student/images/checkmark.gif";
pub const FAILURE_ICON: &str = "https://www.bu.edu/link/student/images/xmark.gif";
pub const LOGOFF_ICON: &str = "https://www.bu.edu/link/student/images/header_logoff.gif";

/// Page titles used to classify where the session landed.
pub const LOGIN_PAGE_TITLE: &str = "Boston University | Login";
pub const SECURITY_ERROR_TITLE: &str = "Web Login Service - Message Security Error";
pub const LISTING_TITLE: &str = "Add Classes - Display";
pub const CONFIRMATION_TITLE: &str = "Add Classes - Confirmation";
pub const ERROR_PAGE_TITLE: &str = "Error";

/// Rejection reason that actually means the seat is already ours.
pub const ALREADY_REGISTERED_REASON: &str = "You're already registered for this class";

/// Registration module path for the given mode.
pub fn registration_module(planner: bool) -> &'static str {
    if planner {
        "reg/plan/add_planner.pl"
    } else {
        "reg/add/confirm_classes.pl"
    }
}

/// URL of the schedule module (used for login and logout navigation).
pub fn schedule_url() -> String {
    format!("{STUDENT_LINK_URL}?ModuleName={SCHEDULE_MODULE}")
}

/// URL that opens the plan/register chooser for a semester. The site
/// requires passing through this page before it will accept registrations.
pub fn module_start_url(semester: &Semester) -> String {
    format!(
        "{STUDENT_LINK_URL}?ModuleName=reg/option/_start.pl&ViewSem={}&KeySem={}",
        semester.view_name().replace(' ', "%20"),
        semester.semester_key()
    )
}

/// Query parameters for the schedule-browse listing of one section.
pub fn browse_params(course: &CourseSection, planner: bool) -> Vec<(String, String)> {
    let semester = &course.semester;
    vec![
        ("College".into(), course.college.to_uppercase()),
        ("Dept".into(), course.department.to_uppercase()),
        ("Course".into(), course.course.clone()),
        ("Section".into(), course.section.to_uppercase()),
        ("ModuleName".into(), "reg/add/browse_schedule.pl".into()),
        ("AddPreregInd".into(), String::new()),
        (
            "AddPlannerInd".into(),
            if planner { "Y".into() } else { String::new() },
        ),
        ("ViewSem".into(), semester.view_name()),
        ("KeySem".into(), semester.semester_key()),
        ("PreregViewSem".into(), String::new()),
        ("SearchOptionCd".into(), "S".into()),
        ("SearchOptionDesc".into(), "Class Number".into()),
        ("MainCampusInd".into(), String::new()),
        ("BrowseContinueInd".into(), String::new()),
        ("ShoppingCartInd".into(), String::new()),
        ("ShoppingCartList".into(), String::new()),
    ]
}

/// Full browse URL for driving the interactive session to one listing.
pub fn browse_url(course: &CourseSection, planner: bool) -> String {
    let query = browse_params(course, planner)
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{STUDENT_LINK_URL}?{query}")
}

/// Extract the `KeySem` query parameter from a URL, if present.
pub fn semester_key_from_url(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("KeySem=")?;
    let key = rest.split('&').next().unwrap_or(rest);
    if key.is_empty() { None } else { Some(key) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semester::{Season, Semester};

    fn course() -> CourseSection {
        CourseSection::new(Semester::new(Season::Spring, 2024), "cas", "cs", "440", "a3")
    }

    #[test]
    fn test_browse_params_address_the_listing() {
        let params = browse_params(&course(), true);
        let get = |k: &str| {
            params
                .iter()
                .find(|(name, _)| name == k)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("College"), Some("CAS"));
        assert_eq!(get("Dept"), Some("CS"));
        assert_eq!(get("Course"), Some("440"));
        assert_eq!(get("Section"), Some("A3"));
        assert_eq!(get("KeySem"), Some("20244"));
        assert_eq!(get("ViewSem"), Some("Spring 2024"));
        assert_eq!(get("AddPlannerInd"), Some("Y"));
    }

    #[test]
    fn test_browse_params_real_mode_clears_planner_flag() {
        let params = browse_params(&course(), false);
        let planner = params.iter().find(|(name, _)| name == "AddPlannerInd");
        assert_eq!(planner.map(|(_, v)| v.as_str()), Some(""));
    }

    #[test]
    fn test_module_start_url_encodes_view_sem() {
        let url = module_start_url(&Semester::new(Season::Fall, 2025));
        assert!(url.contains("ViewSem=Fall%202025"));
        assert!(url.contains("KeySem=20263"));
    }

    #[test]
    fn test_semester_key_from_url() {
        assert_eq!(
            semester_key_from_url("https://x/y?a=1&KeySem=20244&b=2"),
            Some("20244")
        );
        assert_eq!(semester_key_from_url("https://x/y?KeySem=20263"), Some("20263"));
        assert_eq!(semester_key_from_url("https://x/y?a=1"), None);
        assert_eq!(semester_key_from_url("https://x/y?KeySem=&a=1"), None);
    }
}
