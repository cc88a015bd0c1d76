use crate::course::CourseSection;

#[derive(thiserror::Error, Debug)]
pub enum RegistrarError {
    #[error("Login rejected: {0}")]
    CredentialsRejected(String),

    #[error("Re-login failed; the session cannot be recovered")]
    ReloginFailed,

    #[error("Unexpected page during login: '{title}' at {url}")]
    UnexpectedLoginPage { title: String, url: String },

    #[error("Unrecognized confirmation state while registering for {0}")]
    UnknownConfirmation(Box<CourseSection>),

    #[error("Consecutive-failure budget exhausted after {count} errors")]
    ErrorBudgetExhausted { count: u32 },

    #[error("Every remaining course exceeded its retry ceiling")]
    AllCoursesExhausted,

    #[error("Browser automation failure: {0}")]
    Browser(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semester::{Season, Semester};

    #[test]
    fn test_display_credentials_rejected() {
        let err = RegistrarError::CredentialsRejected("bad username or password".into());
        assert_eq!(err.to_string(), "Login rejected: bad username or password");
    }

    #[test]
    fn test_display_unknown_confirmation_names_the_course() {
        let course = CourseSection::new(
            Semester::new(Season::Fall, 2025),
            "CAS",
            "CS",
            "585",
            "A1",
        );
        let err = RegistrarError::UnknownConfirmation(Box::new(course));
        assert!(err.to_string().contains("CAS CS585 A1"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RegistrarError>();
    }
}
