//! Owner of the single interactive session.
//!
//! Every mutating operation here (login, navigation, logout) runs on the
//! owning task; only the `authenticated` flag and captured cookies are
//! shared with pool workers.

use snipe_browser::{BrowserDriver, BrowserError, Cookie, PageReader};
use snipe_core::semester::Semester;
use snipe_core::{RegistrarError, SharedFlag, site};
use snipe_store::SecureStore;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

const USERNAME_FIELD: &str = "#j_username";
const PASSWORD_FIELD: &str = "#j_password";
const LOGIN_SUBMIT: &str = ".input-submit";
const CREDENTIAL_ERROR_BOX: &str = ".error-box .error";

const PUSH_ERROR_HEADER: &str = "#error-view-header-text";
const PUSH_TIMED_OUT_TEXT: &str = "Duo Push timed out";
const TRUST_BROWSER_BUTTON: &str = "#trust-browser-button";

/// Hosts whose URLs identify where the handshake currently stands.
const AUTHENTICATED_URL_MARKER: &str = "studentlink";
const PUSH_URL_MARKER: &str = "duosecurity";

/// Primary credentials for the identity provider.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"*".repeat(self.password.len()))
            .finish()
    }
}

/// Result of one full login attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginOutcome {
    LoggedIn,
    /// The out-of-band approval expired; retrying the whole login is viable.
    PushTimedOut,
}

pub struct SessionManager<D: BrowserDriver> {
    driver: D,
    credentials: Credentials,
    authenticated: SharedFlag,
    store: Option<SecureStore>,
    save_push_cookies: bool,
}

fn browser_err(err: BrowserError) -> RegistrarError {
    RegistrarError::Browser(err.to_string())
}

impl<D: BrowserDriver> SessionManager<D> {
    pub fn new(
        driver: D,
        credentials: Credentials,
        store: Option<SecureStore>,
        save_push_cookies: bool,
    ) -> Self {
        Self {
            driver,
            credentials,
            authenticated: SharedFlag::new(false),
            store,
            save_push_cookies,
        }
    }

    /// Clone of the flag shared with pool workers.
    pub fn authenticated_flag(&self) -> SharedFlag {
        self.authenticated.clone()
    }

    /// Swap in fresh credentials (after a rejected login).
    pub fn set_credentials(&mut self, credentials: Credentials) {
        self.credentials = credentials;
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Inject 2FA cookies from a previous approved handshake, if any were
    /// saved. Best-effort; returns whether anything was restored.
    pub async fn restore_push_cookies(&mut self) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        let cookies = match store.load() {
            Ok(Some(secrets)) => secrets.push_cookies,
            Ok(None) => None,
            Err(err) => {
                warn!("could not read the secret store: {err:#}");
                None
            }
        };
        let Some(cookies) = cookies else {
            return false;
        };
        // The driver only accepts cookies for the origin it is on.
        if let Err(err) = self.driver.goto(&site::schedule_url()).await {
            warn!("could not reach the login origin to restore cookies: {err}");
            return false;
        }
        match self.driver.add_cookies(&cookies).await {
            Ok(()) => {
                info!(count = cookies.len(), "restored saved 2FA cookies");
                true
            }
            Err(err) => {
                debug!("2FA cookies were not accepted: {err}");
                false
            }
        }
    }

    /// Drive the full login handshake.
    ///
    /// Submits primary credentials unless saved cookies already routed us
    /// past the identity provider, then waits out the push-approval step
    /// until the site returns us to the authenticated origin.
    pub async fn login(&mut self) -> Result<LoginOutcome, RegistrarError> {
        info!(username = %self.credentials.username, "logging in");
        self.driver
            .goto(&site::schedule_url())
            .await
            .map_err(browser_err)?;

        let url = self.driver.current_url().await.map_err(browser_err)?;
        debug!(%url, "landed on the login redirect");

        // With warm cookies the site can jump straight to the authenticated
        // origin or the push screen; only type credentials on the IdP form.
        if !url.contains(AUTHENTICATED_URL_MARKER) && !url.contains(PUSH_URL_MARKER) {
            self.driver
                .type_into(USERNAME_FIELD, &self.credentials.username)
                .await
                .map_err(browser_err)?;
            self.driver
                .type_into(PASSWORD_FIELD, &self.credentials.password)
                .await
                .map_err(browser_err)?;
            self.driver.click(LOGIN_SUBMIT).await.map_err(browser_err)?;
            tokio::time::sleep(Duration::from_secs(1)).await;

            if let Some(reason) = self
                .driver
                .text_of(CREDENTIAL_ERROR_BOX)
                .await
                .map_err(browser_err)?
            {
                // A stored password is useless now; drop it.
                if let Some(store) = &self.store {
                    if let Err(err) = store.update(|secrets| secrets.password = None) {
                        warn!("could not clear the stored password: {err:#}");
                    }
                }
                return Err(RegistrarError::CredentialsRejected(reason));
            }
        }

        let mut push_announced = false;
        loop {
            let url = self.driver.current_url().await.map_err(browser_err)?;
            if url.contains(AUTHENTICATED_URL_MARKER) {
                break;
            }
            if !url.contains(PUSH_URL_MARKER) {
                let title = self.driver.title().await.map_err(browser_err)?;
                return Err(RegistrarError::UnexpectedLoginPage { title, url });
            }

            if !push_announced {
                info!("waiting for you to approve this login on your phone...");
                push_announced = true;
            }
            if let Some(text) = self
                .driver
                .text_of(PUSH_ERROR_HEADER)
                .await
                .map_err(browser_err)?
            {
                if text == PUSH_TIMED_OUT_TEXT {
                    warn!("the push approval timed out");
                    return Ok(LoginOutcome::PushTimedOut);
                }
            }
            // Opt out of future pushes on this browser when the control is
            // offered; absent is the normal case.
            match self.driver.click(TRUST_BROWSER_BUTTON).await {
                Ok(()) | Err(BrowserError::NoSuchElement(_)) => {}
                Err(other) => return Err(browser_err(other)),
            }
            tokio::time::sleep(Duration::from_secs(2)).await;
        }

        self.authenticated.set(true);
        if self.save_push_cookies {
            self.persist_push_cookies().await;
        }
        info!(username = %self.credentials.username, "logged in");
        Ok(LoginOutcome::LoggedIn)
    }

    async fn persist_push_cookies(&mut self) {
        let Some(store) = &self.store else {
            return;
        };
        match self.driver.cookies().await {
            Ok(cookies) => {
                if let Err(err) = store.update(|secrets| secrets.push_cookies = Some(cookies)) {
                    warn!("could not save 2FA cookies: {err:#}");
                } else {
                    info!("saved 2FA cookies to the local secret store");
                }
            }
            Err(err) => warn!("could not capture cookies after login: {err}"),
        }
    }

    /// Best-effort session termination.
    pub async fn logout(&mut self) -> Result<(), RegistrarError> {
        self.driver
            .goto(&site::schedule_url())
            .await
            .map_err(browser_err)?;
        let selector = format!("a img[src='{}']", site::LOGOFF_ICON);
        self.driver.click(&selector).await.map_err(browser_err)?;
        self.authenticated.set(false);
        info!("logged out");
        Ok(())
    }

    /// Whether the session still looks authenticated: not parked on the
    /// login page, and nothing has cleared the flag in the meantime.
    pub async fn is_valid(&self) -> bool {
        match self.driver.title().await {
            Ok(title) => title != site::LOGIN_PAGE_TITLE && self.authenticated.get(),
            Err(_) => false,
        }
    }

    /// Re-login once if the session has gone stale.
    pub async fn ensure_valid(&mut self) -> Result<(), RegistrarError> {
        if self.is_valid().await {
            return Ok(());
        }
        warn!("we got logged out; attempting to log back in");
        match self.login().await? {
            LoginOutcome::LoggedIn => Ok(()),
            LoginOutcome::PushTimedOut => Err(RegistrarError::ReloginFailed),
        }
    }

    /// Pass through the plan/register chooser for a semester. The site
    /// refuses registrations that skip this page.
    pub async fn open_registration_module(
        &mut self,
        semester: &Semester,
        planner: bool,
    ) -> Result<(), RegistrarError> {
        debug!(semester = %semester, planner, "opening the registration module");
        self.driver
            .goto(&site::module_start_url(semester))
            .await
            .map_err(browser_err)?;
        let row_index = if planner { 0 } else { 1 };
        self.driver
            .click_nth("tr[align='center'][valign='top'] a", row_index)
            .await
            .map_err(browser_err)?;
        tokio::time::sleep(Duration::from_millis(250)).await;
        Ok(())
    }

    /// Semester key of the page the session is currently on, if any.
    pub async fn current_semester_key(&self) -> Result<Option<String>, RegistrarError> {
        let url = self.driver.current_url().await.map_err(browser_err)?;
        Ok(site::semester_key_from_url(&url).map(str::to_string))
    }

    /// Snapshot the session cookies for the stateless readers.
    pub async fn cookies(&self) -> Result<Vec<Cookie>, RegistrarError> {
        self.driver.cookies().await.map_err(browser_err)
    }

    /// Build a stateless reader riding on the current cookies.
    pub async fn reader(&self) -> Result<PageReader, RegistrarError> {
        let cookies = self.cookies().await?;
        PageReader::new(site::STUDENT_LINK_URL, &cookies).map_err(browser_err)
    }

    /// Tear the interactive session down. Idempotent.
    pub async fn quit(&mut self) {
        if let Err(err) = self.driver.quit().await {
            debug!("browser teardown failed: {err}");
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod manager_tests;
