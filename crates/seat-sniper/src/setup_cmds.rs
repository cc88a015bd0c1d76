use anyhow::{Context, Result, bail};
use snipe_browser::{BrowserDriver, WebDriverBrowser, WebDriverSettings};
use snipe_config::AppConfig;
use snipe_store::SecureStore;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// `snipe init`: write a starter config for the user to edit.
pub fn init(config_path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = snipe_config::config_file_path(config_path);
    if path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        );
    }
    AppConfig::starter().save(&path)?;
    info!(path = %path.display(), "starter config written; edit the [[targets]] entries");
    Ok(())
}

/// `snipe doctor`: boot a throwaway browser session to prove the WebDriver
/// endpoint works before a real run depends on it.
pub async fn doctor(config_path: Option<PathBuf>) -> Result<()> {
    let path = snipe_config::config_file_path(config_path);
    let browser = if path.exists() {
        AppConfig::load(&path)?.browser
    } else {
        info!("no config found; checking the default WebDriver endpoint");
        AppConfig::default().browser
    };

    let settings = WebDriverSettings {
        endpoint: browser.webdriver_url.clone(),
        headless: browser.headless,
        page_load_timeout: Duration::from_secs(browser.page_load_timeout_secs),
    };
    info!(endpoint = %settings.endpoint, "starting a throwaway browser session");
    let mut probe_session = WebDriverBrowser::connect(&settings)
        .await
        .with_context(|| {
            format!(
                "could not start a browser session at {}; is the driver running?",
                settings.endpoint
            )
        })?;
    probe_session.quit().await.ok();
    info!("browser drivers look good");
    Ok(())
}

/// `snipe forget`: wipe stored credentials and 2FA cookies.
pub fn forget() -> Result<()> {
    let store = SecureStore::open(&snipe_config::state_dir().join("secrets"))?;
    store.clear()?;
    info!("stored credentials and 2FA cookies forgotten");
    Ok(())
}
