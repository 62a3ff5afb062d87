use std::time::Duration;

use serde::Serialize;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::booking_types::BookingError;
use crate::browser::{Browser, any_present};
use crate::notification_service::Notifier;

/// Where the caller stands relative to the virtual queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    /// The page has not been checked yet
    NotObserved,
    /// Waiting-room indicators are showing
    InQueue,
    /// No indicators, free to search
    Through,
    /// Still queued when the wait ran out
    TimedOut,
}

/// Settings for waiting out the queue
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Delay between page checks (default: 3 seconds)
    pub poll_interval: Duration,
    /// Longest time to stay queued (default: 120 minutes)
    pub timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            timeout: Duration::from_secs(120 * 60),
        }
    }
}

/// Watches the page for waiting-room indicators until they clear
pub struct QueueMonitor {
    indicators: Vec<String>,
    config: QueueConfig,
    state: QueueState,
}

impl QueueMonitor {
    /// Create a monitor for the given indicator selectors
    pub fn new(indicators: Vec<String>, config: QueueConfig) -> Self {
        Self {
            indicators,
            config,
            state: QueueState::NotObserved,
        }
    }

    /// Current state
    pub fn state(&self) -> QueueState {
        self.state
    }

    /// Whether any waiting-room indicator is on the page right now
    pub async fn detect<B: Browser + ?Sized>(&self, browser: &B) -> bool {
        any_present(browser, &self.indicators).await
    }

    /// Block until the page shows no waiting-room indicators.
    ///
    /// Alerts once when leaving the queue. Fails with `QueueTimeout` when
    /// the configured wait elapses and with `Aborted` when cancelled.
    pub async fn wait_through<B: Browser + ?Sized>(
        &mut self,
        browser: &B,
        notifier: &dyn Notifier,
        cancel: &CancellationToken,
    ) -> Result<(), BookingError> {
        match self.state {
            QueueState::Through => return Ok(()),
            QueueState::TimedOut => {
                return Err(BookingError::QueueTimeout {
                    waited: self.config.timeout,
                });
            }
            QueueState::NotObserved | QueueState::InQueue => {}
        }

        let started = Instant::now();

        if !self.detect(browser).await {
            info!("No virtual queue detected");
            self.state = QueueState::Through;
            return Ok(());
        }

        self.state = QueueState::InQueue;
        info!("⏳ Virtual waiting room detected, waiting...");

        loop {
            let elapsed = started.elapsed();
            let remaining = self.config.timeout.saturating_sub(elapsed);
            let pause = self.config.poll_interval.min(remaining);

            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!("Queue wait cancelled after {:?}", started.elapsed());
                    return Err(BookingError::Aborted);
                }
                _ = sleep(pause) => {}
            }

            if !self.detect(browser).await {
                self.state = QueueState::Through;
                info!("✓ Through the queue after {:?}", started.elapsed());
                if let Err(e) = notifier.alert("Auto-Booker", "You are through the queue!").await {
                    warn!("Queue alert not delivered: {}", e);
                }
                return Ok(());
            }

            let waited = started.elapsed();
            if waited >= self.config.timeout {
                self.state = QueueState::TimedOut;
                error!("✗ Queue wait timed out after {:?}", waited);
                return Err(BookingError::QueueTimeout { waited });
            }
            debug!("Still queued after {:?}", waited);
        }
    }
}
