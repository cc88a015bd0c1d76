//! Browser/HTTP automation boundary.
//!
//! The rest of the workspace talks to the external site through two
//! capabilities defined here: [`BrowserDriver`], the interactive session
//! mutator (exactly one exists per run, driven from the owning task), and
//! [`PageFetcher`], a stateless reader that issues authenticated GETs with
//! the session's captured cookies and is safe to clone into pool workers.

pub mod dom;
pub mod driver;
pub mod reader;
pub mod webdriver;

pub use dom::{Document, ScheduleRow};
pub use driver::{BrowserDriver, BrowserError, Cookie};
pub use reader::{PageFetcher, PageReader};
pub use webdriver::{WebDriverBrowser, WebDriverSettings};
