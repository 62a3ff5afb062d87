use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::availability_prober::{AvailabilityProber, ProberConfig};
use crate::booking_types::*;
use crate::browser::{Browser, PageSelectors};
use crate::date_variants::date_variants;
use crate::form_driver::{FormConfig, FormDriver};
use crate::notification_service::Notifier;
use crate::queue_monitor::{QueueConfig, QueueMonitor, QueueState};
use crate::screenshots::ScreenshotRecorder;
use crate::site_selector::select_site;

/// Where the outer booking loop currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    /// Waiting for the virtual queue to let us through
    AwaitingQueue,
    /// Trying campgrounds and date variants
    Searching,
    /// A booking sits at the pre-payment screen
    CheckpointReached,
    /// Every campground and variant failed
    Exhausted,
    /// Cancelled at a poll or probe boundary
    Aborted,
}

/// Tuning for each component the orchestrator drives
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Virtual queue polling
    pub queue: QueueConfig,
    /// Search page probing
    pub prober: ProberConfig,
    /// Reservation form retries
    pub form: FormConfig,
}

enum AttemptResult {
    Booked(BookingAttempt),
    Failed(AttemptFailure),
}

/// Runs one booking session from queue wait to checkpoint or exhaustion.
///
/// Owns the browser for the whole run and never closes it; use
/// [`BookingOrchestrator::into_browser`] to hand it back for manual takeover.
pub struct BookingOrchestrator<B: Browser> {
    browser: B,
    preferences: SearchPreferences,
    notifier: Arc<dyn Notifier>,
    queue_monitor: QueueMonitor,
    prober: AvailabilityProber,
    form_driver: FormDriver,
    recorder: ScreenshotRecorder,
    cancel: CancellationToken,
    state: OrchestratorState,
}

impl<B: Browser> BookingOrchestrator<B> {
    /// Wire the components around an open browser session
    pub fn new(
        browser: B,
        preferences: SearchPreferences,
        selectors: Arc<PageSelectors>,
        notifier: Arc<dyn Notifier>,
        recorder: ScreenshotRecorder,
        config: Option<OrchestratorConfig>,
    ) -> Self {
        let config = config.unwrap_or_default();
        Self {
            queue_monitor: QueueMonitor::new(selectors.queue_indicators.clone(), config.queue),
            prober: AvailabilityProber::new(selectors.clone(), config.prober, recorder.clone()),
            form_driver: FormDriver::new(selectors, config.form, recorder.clone()),
            browser,
            preferences,
            notifier,
            recorder,
            cancel: CancellationToken::new(),
            state: OrchestratorState::AwaitingQueue,
        }
    }

    /// Abort the run when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Current state of the outer loop
    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// Current state of the queue monitor
    pub fn queue_state(&self) -> QueueState {
        self.queue_monitor.state()
    }

    /// The browser session driven by this run
    pub fn browser(&self) -> &B {
        &self.browser
    }

    /// Release the browser session, still open, to the caller
    pub fn into_browser(self) -> B {
        self.browser
    }

    /// Run the booking loop.
    ///
    /// Recoverable failures are recorded and the next date variant or
    /// campground is tried. Only a queue timeout ends the run with an error.
    pub async fn run(&mut self) -> Result<Outcome, BookingError> {
        info!(
            "🏕️ Booking run starting: {} campground(s), {} (±{} days), party of {}",
            self.preferences.campgrounds.len(),
            self.preferences.base_variant(),
            self.preferences.flexible_days,
            self.preferences.party.size
        );

        self.state = OrchestratorState::AwaitingQueue;
        match self
            .queue_monitor
            .wait_through(&self.browser, self.notifier.as_ref(), &self.cancel)
            .await
        {
            Ok(()) => {}
            Err(BookingError::Aborted) => return Ok(self.abort(Vec::new())),
            Err(e) => {
                error!("Run ended while waiting in the queue: {}", e);
                self.recorder.capture(&self.browser, "queue_timeout").await;
                return Err(e);
            }
        }

        self.state = OrchestratorState::Searching;
        let campgrounds = self.preferences.campgrounds.clone();
        let base = self.preferences.base_variant();
        let mut failures = Vec::new();

        for campground in &campgrounds {
            info!("Trying campground {}", campground.name);
            for variant in date_variants(base, self.preferences.flexible_days) {
                if self.cancel.is_cancelled() {
                    return Ok(self.abort(failures));
                }

                match self.attempt(campground, variant).await {
                    Ok(AttemptResult::Booked(attempt)) => {
                        return Ok(self.checkpoint_reached(attempt, failures).await);
                    }
                    Ok(AttemptResult::Failed(failure)) => {
                        warn!("✗ {}", failure);
                        failures.push(failure);
                    }
                    Err(BookingError::Aborted) => return Ok(self.abort(failures)),
                    Err(e) => return Err(e),
                }
            }
        }

        self.state = OrchestratorState::Exhausted;
        error!(
            "No booking possible: all {} campground/date combination(s) failed",
            failures.len()
        );
        self.recorder.capture(&self.browser, "no_availability").await;
        info!("Browser left open for manual booking");
        Ok(Outcome::Exhausted { failures })
    }

    /// Probe, select and fill the form for one (campground, variant) pair.
    ///
    /// `Err` is reserved for conditions that end the run.
    async fn attempt(
        &self,
        campground: &Campground,
        variant: DateVariant,
    ) -> Result<AttemptResult, BookingError> {
        let party = &self.preferences.party;
        let failed = |site: Option<String>, reason: FailureReason| {
            AttemptResult::Failed(AttemptFailure {
                campground: campground.name.clone(),
                variant,
                site,
                reason,
            })
        };

        let candidates = match self
            .prober
            .probe(&self.browser, campground, &variant, party)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => return recoverable(e).map(|reason| failed(None, reason)),
        };

        let available = candidates.iter().filter(|c| c.available).count();
        let Some(site) = select_site(&candidates, campground) else {
            let reason = if available == 0 {
                FailureReason::NoAvailability
            } else {
                FailureReason::NoMatchingSite { available }
            };
            self.recorder
                .capture(&self.browser, &format!("no_sites-{}", campground.name))
                .await;
            return Ok(failed(None, reason));
        };

        if self.cancel.is_cancelled() {
            return Err(BookingError::Aborted);
        }

        info!(
            "🎯 Selected site {} at {} for {}",
            site.site_id, campground.name, variant
        );
        match self.form_driver.complete(&self.browser, &site, party).await {
            Ok(()) => Ok(AttemptResult::Booked(BookingAttempt {
                campground: campground.name.clone(),
                variant,
                site,
            })),
            Err(e) => recoverable(e).map(|reason| failed(Some(site.site_id.clone()), reason)),
        }
    }

    async fn checkpoint_reached(
        &mut self,
        attempt: BookingAttempt,
        failures: Vec<AttemptFailure>,
    ) -> Outcome {
        self.state = OrchestratorState::CheckpointReached;
        info!(
            "🎉 Site {} at {} for {} is ready for payment",
            attempt.site.site_id, attempt.campground, attempt.variant
        );
        if let Err(e) = self
            .notifier
            .alert("Auto-Booker", "Booking ready for payment! Review now.")
            .await
        {
            warn!("Checkpoint alert not delivered: {}", e);
        }
        Outcome::CheckpointReached { attempt, failures }
    }

    fn abort(&mut self, failures: Vec<AttemptFailure>) -> Outcome {
        self.state = OrchestratorState::Aborted;
        warn!(
            "Run aborted after {} failed attempt(s); browser left open",
            failures.len()
        );
        Outcome::Aborted { failures }
    }
}

fn recoverable(e: BookingError) -> Result<FailureReason, BookingError> {
    match e.as_failure_reason() {
        Some(reason) => {
            debug!("Recoverable failure: {}", e);
            Ok(reason)
        }
        None => Err(e),
    }
}
