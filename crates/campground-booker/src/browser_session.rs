use std::path::Path;
use std::time::Duration;

use thirtyfour::prelude::*;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::browser::{Browser, BrowserError, SelectorKind, parse_selector};

const WAIT_POLL: Duration = Duration::from_millis(250);

/// A visible Chrome window driven through a WebDriver server.
///
/// Dropping the session leaves the window open; only [`BrowserSession::close`]
/// ends it.
pub struct BrowserSession {
    driver: Option<WebDriver>,
}

impl BrowserSession {
    /// Connect to the WebDriver server at `webdriver_url` and open a window
    pub async fn launch(webdriver_url: &str) -> Result<Self, BrowserError> {
        check_server(webdriver_url).await?;

        let caps = DesiredCapabilities::chrome();
        let driver = WebDriver::new(webdriver_url, caps)
            .await
            .map_err(|e| BrowserError::Driver(format!("could not start a session: {}", e)))?;
        info!("✓ Browser session started via {}", webdriver_url);

        Ok(Self {
            driver: Some(driver),
        })
    }

    /// End the session and close the window
    pub async fn close(mut self) -> Result<(), BrowserError> {
        if let Some(driver) = self.driver.take() {
            driver.quit().await.map_err(driver_error)?;
            info!("Browser closed");
        }
        Ok(())
    }

    fn driver(&self) -> Result<&WebDriver, BrowserError> {
        self.driver
            .as_ref()
            .ok_or_else(|| BrowserError::Driver("browser session already closed".to_string()))
    }

    async fn find(&self, selector: &str) -> Result<Vec<WebElement>, BrowserError> {
        self.driver()?
            .find_all(by(selector))
            .await
            .map_err(driver_error)
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        // thirtyfour quits the session when the last handle drops
        if let Some(driver) = self.driver.take() {
            if driver.leak().is_ok() {
                debug!("Browser session released without closing the window");
            }
        }
    }
}

/// Fails fast with a readable error when no WebDriver server is listening
async fn check_server(webdriver_url: &str) -> Result<(), BrowserError> {
    let url = format!("{}/status", webdriver_url.trim_end_matches('/'));
    let response = reqwest::get(&url).await.map_err(|e| {
        BrowserError::Driver(format!(
            "no WebDriver server at {} (start chromedriver first): {}",
            webdriver_url, e
        ))
    })?;

    let status: serde_json::Value = response
        .json()
        .await
        .map_err(|e| BrowserError::Driver(format!("unexpected /status response: {}", e)))?;

    match status["value"]["ready"].as_bool() {
        Some(false) => Err(BrowserError::Driver(format!(
            "WebDriver server not ready: {}",
            status["value"]["message"].as_str().unwrap_or("no reason given")
        ))),
        _ => {
            debug!("WebDriver server ready at {}", webdriver_url);
            Ok(())
        }
    }
}

fn by(selector: &str) -> By {
    match parse_selector(selector) {
        SelectorKind::Css(css) => By::Css(css.to_string()),
        SelectorKind::XPath(xpath) => By::XPath(xpath.to_string()),
    }
}

fn driver_error(e: WebDriverError) -> BrowserError {
    BrowserError::Driver(e.to_string())
}

fn element_error(e: WebDriverError) -> BrowserError {
    BrowserError::Element(e.to_string())
}

#[async_trait::async_trait]
impl Browser for BrowserSession {
    type Element = WebElement;

    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        debug!("Navigating to {}", url);
        self.driver()?
            .goto(url)
            .await
            .map_err(|e| BrowserError::Navigation(e.to_string()))
    }

    async fn query(&self, selector: &str) -> Result<Vec<WebElement>, BrowserError> {
        self.find(selector).await
    }

    async fn query_within(
        &self,
        parent: &WebElement,
        selector: &str,
    ) -> Result<Vec<WebElement>, BrowserError> {
        parent.find_all(by(selector)).await.map_err(element_error)
    }

    async fn text(&self, element: &WebElement) -> Result<String, BrowserError> {
        element.text().await.map_err(element_error)
    }

    async fn attribute(
        &self,
        element: &WebElement,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        element.attr(name).await.map_err(element_error)
    }

    async fn click(&self, element: &WebElement) -> Result<(), BrowserError> {
        element.click().await.map_err(element_error)
    }

    async fn fill(&self, element: &WebElement, value: &str) -> Result<(), BrowserError> {
        element.clear().await.map_err(element_error)?;
        element.send_keys(value).await.map_err(element_error)
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        let started = Instant::now();
        loop {
            match self.find(selector).await {
                Ok(found) if !found.is_empty() => return Ok(()),
                Ok(_) => {}
                Err(e) => debug!("Query for '{}' failed while waiting: {}", selector, e),
            }
            if started.elapsed() >= timeout {
                return Err(BrowserError::Timeout {
                    selector: selector.to_string(),
                    waited: started.elapsed(),
                });
            }
            sleep(WAIT_POLL).await;
        }
    }

    async fn screenshot(&self, path: &Path) -> Result<(), BrowserError> {
        self.driver()?.screenshot(path).await.map_err(|e| {
            warn!("Screenshot to {} failed: {}", path.display(), e);
            BrowserError::Screenshot(e.to_string())
        })
    }
}
