//! [`BrowserDriver`] implementation over a WebDriver endpoint.

use crate::driver::{BrowserDriver, BrowserError, Cookie};
use async_trait::async_trait;
use std::time::Duration;
use thirtyfour::error::WebDriverError;
use thirtyfour::prelude::*;
use tracing::debug;

/// Connection settings for the WebDriver endpoint.
#[derive(Clone, Debug)]
pub struct WebDriverSettings {
    pub endpoint: String,
    pub headless: bool,
    pub page_load_timeout: Duration,
}

impl Default for WebDriverSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9515".into(),
            headless: true,
            page_load_timeout: Duration::from_secs(30),
        }
    }
}

/// The one interactive session of a run.
pub struct WebDriverBrowser {
    driver: Option<WebDriver>,
}

impl WebDriverBrowser {
    pub async fn connect(settings: &WebDriverSettings) -> Result<Self, BrowserError> {
        let mut caps = DesiredCapabilities::chrome();
        if settings.headless {
            caps.add_arg("--headless=new").map_err(wd_err)?;
        }
        caps.add_arg("--no-sandbox").map_err(wd_err)?;
        caps.add_arg("--disable-dev-shm-usage").map_err(wd_err)?;
        caps.add_arg("--disable-gpu").map_err(wd_err)?;
        // Skip image loading; listings are pure table markup anyway.
        caps.add_arg("--blink-settings=imagesEnabled=false")
            .map_err(wd_err)?;

        debug!(endpoint = %settings.endpoint, "connecting to webdriver endpoint");
        let driver = WebDriver::new(&settings.endpoint, caps)
            .await
            .map_err(wd_err)?;
        driver
            .set_page_load_timeout(settings.page_load_timeout)
            .await
            .map_err(wd_err)?;
        Ok(Self {
            driver: Some(driver),
        })
    }

    fn driver(&self) -> Result<&WebDriver, BrowserError> {
        self.driver
            .as_ref()
            .ok_or_else(|| BrowserError::WebDriver("session already closed".into()))
    }
}

fn wd_err(err: WebDriverError) -> BrowserError {
    BrowserError::WebDriver(err.to_string())
}

fn map_find_err(css: &str, err: WebDriverError) -> BrowserError {
    match err {
        WebDriverError::NoSuchElement(_) => BrowserError::NoSuchElement(css.to_string()),
        other => wd_err(other),
    }
}

#[async_trait]
impl BrowserDriver for WebDriverBrowser {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        self.driver()?.goto(url).await.map_err(wd_err)
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.driver()?.current_url().await.map_err(wd_err)?.to_string())
    }

    async fn title(&self) -> Result<String, BrowserError> {
        self.driver()?.title().await.map_err(wd_err)
    }

    async fn page_source(&self) -> Result<String, BrowserError> {
        self.driver()?.source().await.map_err(wd_err)
    }

    async fn type_into(&mut self, css: &str, text: &str) -> Result<(), BrowserError> {
        let element = self
            .driver()?
            .find(By::Css(css))
            .await
            .map_err(|e| map_find_err(css, e))?;
        element.send_keys(text).await.map_err(wd_err)
    }

    async fn click(&mut self, css: &str) -> Result<(), BrowserError> {
        let element = self
            .driver()?
            .find(By::Css(css))
            .await
            .map_err(|e| map_find_err(css, e))?;
        element.click().await.map_err(wd_err)
    }

    async fn click_nth(&mut self, css: &str, index: usize) -> Result<(), BrowserError> {
        let elements = self
            .driver()?
            .find_all(By::Css(css))
            .await
            .map_err(|e| map_find_err(css, e))?;
        let element = elements
            .get(index)
            .ok_or_else(|| BrowserError::NoSuchElement(format!("{css}[{index}]")))?;
        element.click().await.map_err(wd_err)
    }

    async fn text_of(&self, css: &str) -> Result<Option<String>, BrowserError> {
        match self.driver()?.find(By::Css(css)).await {
            Ok(element) => Ok(Some(element.text().await.map_err(wd_err)?)),
            Err(WebDriverError::NoSuchElement(_)) => Ok(None),
            Err(other) => Err(wd_err(other)),
        }
    }

    async fn accept_alert(&mut self) -> Result<(), BrowserError> {
        match self.driver()?.accept_alert().await {
            Ok(()) => Ok(()),
            Err(WebDriverError::NoSuchAlert(_)) => Err(BrowserError::NoAlert),
            Err(other) => Err(wd_err(other)),
        }
    }

    async fn cookies(&self) -> Result<Vec<Cookie>, BrowserError> {
        let cookies = self.driver()?.get_all_cookies().await.map_err(wd_err)?;
        Ok(cookies
            .into_iter()
            .map(|c| Cookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                secure: c.secure.unwrap_or(false),
            })
            .collect())
    }

    async fn add_cookies(&mut self, cookies: &[Cookie]) -> Result<(), BrowserError> {
        let driver = self.driver()?;
        for cookie in cookies {
            let mut wd_cookie =
                thirtyfour::Cookie::new(cookie.name.clone(), cookie.value.clone());
            if let Some(domain) = &cookie.domain {
                wd_cookie.set_domain(domain.clone());
            }
            if let Some(path) = &cookie.path {
                wd_cookie.set_path(path.clone());
            }
            wd_cookie.set_secure(cookie.secure);
            driver.add_cookie(wd_cookie).await.map_err(wd_err)?;
        }
        Ok(())
    }

    async fn quit(&mut self) -> Result<(), BrowserError> {
        if let Some(driver) = self.driver.take() {
            driver.quit().await.map_err(wd_err)?;
        }
        Ok(())
    }
}
