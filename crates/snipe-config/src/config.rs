use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use snipe_core::{CourseSection, Semester};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Top-level snipe.toml.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub registration: RegistrationConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cloud: CloudConfig,
    #[serde(default)]
    pub targets: Vec<TargetEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// `false` only adds sections to the planner; `true` submits real
    /// registrations.
    #[serde(default)]
    pub real_registrations: bool,
    /// Keep polling through error ceilings (with escalating sleep penalties)
    /// instead of giving up.
    #[serde(default)]
    pub keep_trying: bool,
    /// Treat a section that is absent from its listing as merely closed.
    /// When off, a missing section counts as a fault so a typo in the
    /// target list eventually trips the breaker instead of spinning forever.
    #[serde(default)]
    pub ignore_missing_sections: bool,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            real_registrations: false,
            keep_trying: false,
            ignore_missing_sections: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// WebDriver endpoint, e.g. a local chromedriver.
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    #[serde(default = "default_true")]
    pub headless: bool,
    #[serde(default = "default_page_load_timeout")]
    pub page_load_timeout_secs: u64,
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".into()
}

const fn default_true() -> bool {
    true
}

const fn default_page_load_timeout() -> u64 {
    30
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            headless: true,
            page_load_timeout_secs: default_page_load_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Persist the login password in the encrypted local store.
    #[serde(default)]
    pub save_password: bool,
    /// Persist 2FA cookies so later logins skip the push approval.
    #[serde(default)]
    pub save_push_cookies: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Emit lifecycle/registration events to the backend.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_cloud_url")]
    pub base_url: String,
    /// Membership tier, decides the polling rate caps: "free" or "full".
    #[serde(default = "default_membership")]
    pub membership: String,
}

fn default_cloud_url() -> String {
    "https://api.codenotify.net".into()
}

fn default_membership() -> String {
    "free".into()
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_cloud_url(),
            membership: default_membership(),
        }
    }
}

/// One `[[targets]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetEntry {
    /// e.g. "Fall 2025" or "Summer 1 2026".
    pub semester: String,
    pub college: String,
    pub department: String,
    pub course: String,
    pub section: String,
}

impl TargetEntry {
    /// Resolve into a course-section key. Fails on an unparseable semester.
    pub fn to_course_section(&self) -> Result<CourseSection, String> {
        let semester = Semester::from_str(&self.semester)?;
        Ok(CourseSection::new(
            semester,
            self.college.trim(),
            self.department.trim(),
            self.course.trim(),
            self.section.trim(),
        ))
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self =
            toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
        debug!(path = %path.display(), targets = config.targets.len(), "config loaded");
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(self).context("serializing config")?;
        std::fs::write(path, raw).with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }

    /// A starter config with one example target for the user to edit.
    pub fn starter() -> Self {
        Self {
            targets: vec![TargetEntry {
                semester: "Fall 2025".into(),
                college: "CAS".into(),
                department: "CS".into(),
                course: "585".into(),
                section: "A1".into(),
            }],
            ..Self::default()
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
