use std::time::Duration;

use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::booking_types::BookingError;
use crate::browser::{Browser, any_present};
use crate::notification_service::Notifier;

/// Waits for the user to sign in by hand before automation starts
pub struct LoginWatcher {
    home_url: String,
    indicators: Vec<String>,
    poll_interval: Duration,
    timeout: Duration,
}

impl LoginWatcher {
    /// Create a watcher that opens `home_url` and polls for `indicators`
    pub fn new(
        home_url: impl Into<String>,
        indicators: Vec<String>,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            home_url: home_url.into(),
            indicators,
            poll_interval,
            timeout,
        }
    }

    /// Open the reservation site and block until a signed-in indicator shows
    pub async fn wait_for_login<B: Browser + ?Sized>(
        &self,
        browser: &B,
        notifier: &dyn Notifier,
        cancel: &CancellationToken,
    ) -> Result<(), BookingError> {
        browser
            .navigate(&self.home_url)
            .await
            .map_err(|e| BookingError::NavigationFailure {
                url: self.home_url.clone(),
                detail: e.to_string(),
            })?;
        info!("Please log in manually in the browser window; waiting up to {:?}", self.timeout);

        let started = Instant::now();
        loop {
            if any_present(browser, &self.indicators).await {
                info!("✓ Login detected");
                if let Err(e) = notifier.alert("Auto-Booker", "Login successful").await {
                    warn!("Login alert not delivered: {}", e);
                }
                return Ok(());
            }

            let waited = started.elapsed();
            if waited >= self.timeout {
                error!("✗ Login timed out after {:?}", waited);
                return Err(BookingError::LoginTimeout { waited });
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(BookingError::Aborted),
                _ = sleep(self.poll_interval.min(self.timeout - waited)) => {}
            }
        }
    }
}
