//! Config validation, run once at startup before anything touches the site.

use crate::config::AppConfig;
use snipe_core::CourseSection;
use std::collections::HashSet;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no [[targets]] configured; nothing to register for")]
    NoTargets,

    #[error("target {index}: {message}")]
    InvalidTarget { index: usize, message: String },

    #[error("duplicate target: {0}")]
    DuplicateTarget(String),

    #[error("cloud membership must be 'free' or 'full', got '{0}'")]
    InvalidMembership(String),

    #[error("browser.webdriver_url must be an http(s) URL, got '{0}'")]
    InvalidWebDriverUrl(String),
}

/// Validate the config and resolve its targets into course-section keys,
/// preserving file order.
pub fn validate_config(config: &AppConfig) -> Result<Vec<CourseSection>, ConfigError> {
    if config.targets.is_empty() {
        return Err(ConfigError::NoTargets);
    }

    match config.cloud.membership.to_lowercase().as_str() {
        "free" | "full" => {}
        other => return Err(ConfigError::InvalidMembership(other.to_string())),
    }

    if !config.browser.webdriver_url.starts_with("http://")
        && !config.browser.webdriver_url.starts_with("https://")
    {
        return Err(ConfigError::InvalidWebDriverUrl(
            config.browser.webdriver_url.clone(),
        ));
    }

    let mut seen = HashSet::new();
    let mut sections = Vec::with_capacity(config.targets.len());
    for (index, entry) in config.targets.iter().enumerate() {
        let section = entry
            .to_course_section()
            .map_err(|message| ConfigError::InvalidTarget { index, message })?;
        for (field, value) in [
            ("college", &section.college),
            ("department", &section.department),
            ("course", &section.course),
            ("section", &section.section),
        ] {
            if value.is_empty() {
                return Err(ConfigError::InvalidTarget {
                    index,
                    message: format!("{field} must not be empty"),
                });
            }
        }
        if !seen.insert(section.clone()) {
            return Err(ConfigError::DuplicateTarget(section.to_string()));
        }
        sections.push(section);
    }
    Ok(sections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetEntry;

    fn target(course: &str, section: &str) -> TargetEntry {
        TargetEntry {
            semester: "Fall 2025".into(),
            college: "CAS".into(),
            department: "CS".into(),
            course: course.into(),
            section: section.into(),
        }
    }

    fn config_with(targets: Vec<TargetEntry>) -> AppConfig {
        AppConfig {
            targets,
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_empty_targets_rejected() {
        assert_eq!(
            validate_config(&config_with(vec![])),
            Err(ConfigError::NoTargets)
        );
    }

    #[test]
    fn test_valid_targets_resolve_in_order() {
        let sections =
            validate_config(&config_with(vec![target("585", "A1"), target("460", "A2")])).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].listing_label(), "CAS CS585 A1");
        assert_eq!(sections[1].listing_label(), "CAS CS460 A2");
    }

    #[test]
    fn test_bad_semester_is_reported_with_index() {
        let mut bad = target("585", "A1");
        bad.semester = "Autumn 2025".into();
        let err = validate_config(&config_with(vec![target("460", "A2"), bad])).unwrap_err();
        match err {
            ConfigError::InvalidTarget { index, .. } => assert_eq!(index, 1),
            other => panic!("expected InvalidTarget, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_target_rejected() {
        let err =
            validate_config(&config_with(vec![target("585", "A1"), target("585", "A1")]))
                .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTarget(_)));
    }

    #[test]
    fn test_empty_field_rejected() {
        let err = validate_config(&config_with(vec![target("", "A1")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTarget { index: 0, .. }));
    }

    #[test]
    fn test_bad_membership_rejected() {
        let mut config = config_with(vec![target("585", "A1")]);
        config.cloud.membership = "platinum".into();
        assert_eq!(
            validate_config(&config),
            Err(ConfigError::InvalidMembership("platinum".into()))
        );
    }

    #[test]
    fn test_bad_webdriver_url_rejected() {
        let mut config = config_with(vec![target("585", "A1")]);
        config.browser.webdriver_url = "localhost:9515".into();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidWebDriverUrl(_))
        ));
    }
}
