use crate::cli::RunArgs;
use anyhow::{Context, Result};
use snipe_browser::{BrowserDriver, WebDriverBrowser, WebDriverSettings};
use snipe_cloud::{CloudClient, MembershipLevel, RunReport, RunStatus};
use snipe_config::AppConfig;
use snipe_core::RegistrarError;
use snipe_scheduler::{
    CycleOptions, ErrorTracker, ListingProbe, PollPolicy, RegistrationCycle, SeatProbe,
    SessionCommitter,
};
use snipe_session::{Credentials, LoginOutcome, SessionManager};
use snipe_store::SecureStore;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub async fn execute(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let path = snipe_config::config_file_path(config_path);
    let config = AppConfig::load(&path)?;
    let targets = snipe_config::validate_config(&config)?;
    let planner = !config.registration.real_registrations;
    info!(
        targets = targets.len(),
        mode = if planner { "planner" } else { "real" },
        "configuration loaded"
    );

    let secrets_dir = snipe_config::state_dir().join("secrets");
    let store = SecureStore::open(&secrets_dir)?;
    let membership: MembershipLevel = config
        .cloud
        .membership
        .parse()
        .map_err(|err: String| anyhow::anyhow!(err))?;
    let caps = membership.rate_caps();

    let credentials = resolve_credentials(&args, &config, &store)?;
    let license_key = store
        .load()?
        .and_then(|secrets| secrets.license_key)
        .unwrap_or_default();
    let cloud = Arc::new(if config.cloud.enabled {
        CloudClient::new(config.cloud.base_url.clone(), license_key, true)
    } else {
        CloudClient::disabled()
    });

    let settings = WebDriverSettings {
        endpoint: config.browser.webdriver_url.clone(),
        headless: config.browser.headless,
        page_load_timeout: Duration::from_secs(config.browser.page_load_timeout_secs),
    };
    let driver = WebDriverBrowser::connect(&settings)
        .await
        .context("could not start the browser session; try `snipe doctor`")?;

    let session_store = SecureStore::open(&secrets_dir)?;
    let mut session = SessionManager::new(
        driver,
        credentials,
        Some(session_store),
        config.storage.save_push_cookies,
    );
    session.restore_push_cookies().await;

    if let Err(err) = login_until_success(&mut session).await {
        session.quit().await;
        return Err(err);
    }

    // Shared state wiring: the tracker and the authenticated flag are the
    // only mutable state the poll workers ever touch.
    let tracker = Arc::new(ErrorTracker::new());
    let policy = PollPolicy {
        planner,
        ignore_missing_sections: config.registration.ignore_missing_sections,
    };
    let reader = session.reader().await?;
    let probe: Arc<dyn SeatProbe> =
        Arc::new(ListingProbe::new(reader, session.authenticated_flag(), policy));
    let committer = SessionCommitter::new(session, Arc::clone(&tracker), planner);
    let options = CycleOptions::new(caps, config.registration.keep_trying, planner);

    let (registered_tx, mut registered_rx) = tokio::sync::mpsc::unbounded_channel();
    let mut cycle = RegistrationCycle::new(committer, probe, tracker, targets.clone(), options)
        .with_registration_notifier(registered_tx);

    cloud.send_run_started(&targets, planner).await;
    let notifier = {
        let cloud = Arc::clone(&cloud);
        tokio::spawn(async move {
            while let Some(course) = registered_rx.recv().await {
                cloud.send_course_registered(&course, planner).await;
            }
        })
    };

    let outcome = tokio::select! {
        result = cycle.run() => Some(result),
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupt received; shutting down");
            None
        }
    };

    let (status, reason) = match &outcome {
        Some(Ok(())) => (RunStatus::Success, "target set drained".to_string()),
        Some(Err(err)) => (RunStatus::Error, err.to_string()),
        None => (RunStatus::Interrupted, "interrupted by the user".to_string()),
    };
    let report = RunReport {
        status,
        reason,
        registered: cycle.registered().len() as u32,
        remaining: cycle.remaining().len() as u32,
        timings: cycle.stats().summary(),
    };

    // Orderly teardown: log off, close the browser, flush events.
    let mut session = cycle.into_committer().into_session();
    if let Err(err) = session.logout().await {
        warn!("logout failed (continuing shutdown): {err}");
    }
    session.quit().await;
    notifier.await.ok();
    cloud.send_run_terminated(&report).await;

    match outcome {
        Some(Ok(())) => {
            info!("successfully registered for all target courses");
            Ok(())
        }
        Some(Err(err)) => {
            error!("run failed: {err}");
            Err(err.into())
        }
        None => Ok(()),
    }
}

/// Retry the handshake through push timeouts; re-prompt on bad credentials.
async fn login_until_success<D: BrowserDriver>(
    session: &mut SessionManager<D>,
) -> Result<()> {
    loop {
        match session.login().await {
            Ok(LoginOutcome::LoggedIn) => return Ok(()),
            Ok(LoginOutcome::PushTimedOut) => {
                warn!("hmm, let's try that again...");
            }
            Err(RegistrarError::CredentialsRejected(reason)) => {
                error!(reason, "login rejected; enter your credentials again");
                session.set_credentials(prompt_credentials(None)?);
            }
            Err(other) => return Err(other.into()),
        }
    }
}

fn resolve_credentials(
    args: &RunArgs,
    config: &AppConfig,
    store: &SecureStore,
) -> Result<Credentials> {
    let stored_password = store
        .load()
        .unwrap_or_default()
        .and_then(|secrets| secrets.password);

    let credentials = match (&args.username, stored_password) {
        (Some(username), Some(password)) => {
            info!("using the stored password from the secret store");
            Credentials {
                username: username.clone(),
                password,
            }
        }
        (username, _) => prompt_credentials(username.as_deref())?,
    };

    if config.storage.save_password {
        // A rejected login clears this again.
        store.update(|secrets| secrets.password = Some(credentials.password.clone()))?;
    }
    Ok(credentials)
}

fn prompt_credentials(username: Option<&str>) -> Result<Credentials> {
    let username = match username {
        Some(username) => username.to_string(),
        None => prompt("Enter your university username: ")?,
    };
    let password = prompt("Enter your university password: ")?;
    Ok(Credentials { username, password })
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("reading from stdin")?;
    Ok(line.trim().to_string())
}
