use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use booker_config::{BookerConfig, RunSettings};
use campground_booker::{
    AlertNotifier, BookingError, BookingOrchestrator, BrowserSession, DesktopService,
    LogOnlyDesktopService, LoginWatcher, Notifier, Outcome, ScreenshotRecorder, SoundService,
    SystemDesktopService, TerminalBellService,
};

const APP_NAME: &str = "Auto-Booker";
const LOGIN_POLL: Duration = Duration::from_secs(2);

/// Runs one booking session end to end and hands the browser to the user
pub struct BookerManager {
    config: BookerConfig,
    skip_login: bool,
    interrupt_handle: Option<JoinHandle<()>>,
}

impl BookerManager {
    /// Create a manager for a loaded configuration
    pub fn new(config: BookerConfig, skip_login: bool) -> Self {
        Self {
            config,
            skip_login,
            interrupt_handle: None,
        }
    }

    /// Launch the browser, run the booking loop and wait for the user to finish
    pub async fn run(mut self) -> anyhow::Result<()> {
        let settings = self.config.settings.clone();
        let notifier = build_notifier(&settings);
        let recorder = ScreenshotRecorder::new(&settings.screenshot_dir);
        log::info!(
            "📸 Screenshots for run {} go to {}",
            recorder.run_id(),
            recorder.dir().display()
        );

        let browser = BrowserSession::launch(&settings.webdriver_url)
            .await
            .with_context(|| {
                format!(
                    "could not open a browser through {} (is chromedriver running?)",
                    settings.webdriver_url
                )
            })?;

        let cancel = CancellationToken::new();
        self.watch_interrupts(cancel.clone(), settings.run_timeout);

        if !self.skip_login {
            let watcher = LoginWatcher::new(
                settings.base_url.clone(),
                settings.selectors.logged_in_indicators.clone(),
                LOGIN_POLL,
                settings.login_timeout,
            );
            if let Err(e) = watcher
                .wait_for_login(&browser, notifier.as_ref(), &cancel)
                .await
            {
                self.stop_interrupt_watch().await;
                report_error(&e);
                return hand_off(browser, tokio::signal::ctrl_c()).await;
            }
        }

        let mut orchestrator = BookingOrchestrator::new(
            browser,
            self.config.preferences.clone(),
            Arc::new(settings.selectors.clone()),
            notifier,
            recorder.clone(),
            Some(settings.orchestrator_config()),
        )
        .with_cancellation(cancel);

        let result = orchestrator.run().await;
        self.stop_interrupt_watch().await;
        let browser = orchestrator.into_browser();

        conclude(browser, result, &recorder, tokio::signal::ctrl_c()).await
    }

    /// Cancel the run on Ctrl-C or when the run deadline passes
    fn watch_interrupts(&mut self, cancel: CancellationToken, run_timeout: Option<Duration>) {
        let handle = tokio::spawn(async move {
            let deadline = async {
                match run_timeout {
                    Some(timeout) => tokio::time::sleep(timeout).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    log::warn!("⏹️ Interrupt received, stopping at the next checkpoint");
                }
                _ = deadline => {
                    log::warn!("⏰ Run deadline reached, stopping at the next checkpoint");
                }
            }
            cancel.cancel();
        });

        self.interrupt_handle = Some(handle);
    }

    async fn stop_interrupt_watch(&mut self) {
        if let Some(handle) = self.interrupt_handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for BookerManager {
    fn drop(&mut self) {
        if let Some(handle) = self.interrupt_handle.take() {
            handle.abort();
        }
    }
}

fn build_notifier(settings: &RunSettings) -> Arc<dyn Notifier> {
    let sound_service: Option<Arc<dyn SoundService>> = if settings.sound_alerts {
        Some(Arc::new(TerminalBellService::default()))
    } else {
        None
    };

    let desktop_service: Option<Arc<dyn DesktopService>> = if !settings.desktop_alerts {
        None
    } else if has_display(|var| std::env::var_os(var)) {
        Some(Arc::new(SystemDesktopService::new(APP_NAME)))
    } else {
        log::info!("🖥️ No display found, desktop alerts will only be logged");
        Some(Arc::new(LogOnlyDesktopService))
    };

    Arc::new(AlertNotifier::new(sound_service, desktop_service))
}

fn has_display(lookup: impl Fn(&str) -> Option<std::ffi::OsString>) -> bool {
    if cfg!(any(target_os = "macos", target_os = "windows")) {
        return true;
    }
    ["DISPLAY", "WAYLAND_DISPLAY"]
        .iter()
        .any(|var| lookup(var).is_some_and(|v| !v.is_empty()))
}

/// Log lines describing how the run ended
fn outcome_summary(outcome: &Outcome) -> Vec<String> {
    let mut lines = Vec::new();
    match outcome {
        Outcome::CheckpointReached { attempt, failures } => {
            lines.push("==================================================".to_string());
            lines.push("🎉 BOOKING READY FOR PAYMENT".to_string());
            lines.push(format!("   Campground: {}", attempt.campground));
            lines.push(format!("   Dates:      {}", attempt.variant));
            lines.push(format!("   Site:       {}", attempt.site.site_id));
            if let Some(section) = &attempt.site.section {
                lines.push(format!("   Section:    {}", section));
            }
            lines.push(format!("   Earlier attempts that failed: {}", failures.len()));
            lines.push("Complete the payment in the browser window.".to_string());
            lines.push("==================================================".to_string());
        }
        Outcome::Exhausted { failures } => {
            lines.push(format!(
                "❌ No booking made. Tried {} campground/date combination(s):",
                failures.len()
            ));
            lines.extend(failures.iter().map(|f| format!("   • {}", f)));
        }
        Outcome::Aborted { failures } => {
            lines.push(format!(
                "⏹️ Run aborted after {} failed attempt(s)",
                failures.len()
            ));
            lines.extend(failures.iter().map(|f| format!("   • {}", f)));
        }
    }
    lines
}

fn report_outcome(outcome: &Outcome) {
    let level = match outcome {
        Outcome::CheckpointReached { .. } => log::Level::Info,
        Outcome::Exhausted { .. } => log::Level::Error,
        Outcome::Aborted { .. } => log::Level::Warn,
    };
    for line in outcome_summary(outcome) {
        log::log!(level, "{}", line);
    }

    match serde_json::to_string_pretty(outcome) {
        Ok(json) => log::debug!("Run outcome:\n{}", json),
        Err(e) => log::debug!("Could not serialise run outcome: {}", e),
    }
}

fn report_error(error: &BookingError) {
    match error {
        BookingError::QueueTimeout { waited } => {
            log::error!("❌ Still in the virtual queue after {:?}; giving up", waited)
        }
        BookingError::LoginTimeout { waited } => {
            log::error!("❌ No login detected after {:?}; giving up", waited)
        }
        other => log::error!("❌ Run failed: {}", other),
    }
}

/// Report how the run ended, then hand the browser over
async fn conclude(
    browser: BrowserSession,
    result: Result<Outcome, BookingError>,
    recorder: &ScreenshotRecorder,
    user_done: impl Future<Output = std::io::Result<()>>,
) -> anyhow::Result<()> {
    match result {
        Ok(outcome) => {
            if outcome.is_checkpoint() {
                recorder.capture(&browser, "pre_payment").await;
            }
            report_outcome(&outcome);
        }
        Err(e) => report_error(&e),
    }

    hand_off(browser, user_done).await
}

/// Leave the browser to the user until `user_done` resolves, then close it.
/// If waiting fails the window stays open.
async fn hand_off(
    browser: BrowserSession,
    user_done: impl Future<Output = std::io::Result<()>>,
) -> anyhow::Result<()> {
    log::info!("🌐 Browser left open for you. Press Ctrl-C to close it and exit.");
    user_done.await.context("failed to listen for Ctrl-C")?;
    log::info!("👋 Closing browser");
    browser.close().await.context("failed to close the browser")?;
    Ok(())
}
