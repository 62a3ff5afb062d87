use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::availability_prober::{find_section_button, find_site_button, find_site_row};
use crate::booking_types::{BookingError, Party, SiteCandidate};
use crate::browser::{Browser, BrowserError, PageSelectors, first_match};
use crate::screenshots::ScreenshotRecorder;

/// Settings for the reservation form
#[derive(Debug, Clone)]
pub struct FormConfig {
    /// Attempts per step before the booking attempt fails (default: 3)
    pub step_attempts: u32,
    /// Pause between attempts of the same step (default: 500 ms)
    pub retry_delay: Duration,
    /// How long a step waits for its element to appear (default: 10 seconds)
    pub step_timeout: Duration,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            step_attempts: 3,
            retry_delay: Duration::from_millis(500),
            step_timeout: Duration::from_secs(10),
        }
    }
}

/// Steps from a selected site to the last screen before payment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormStep {
    /// Open the chosen site's row
    SelectSite,
    /// Enter the party size, when the page asks for it
    FillPartySize,
    /// Enter the equipment, when the page asks for it
    FillEquipment,
    /// Add the site to the cart
    Reserve,
    /// Dismiss the campground notice dialog, when shown
    Acknowledge,
    /// Wait for the acknowledgement screen
    AwaitAcknowledgement,
    /// Tick "All reservation details are correct"
    ConfirmDetails,
    /// Advance to checkout
    Confirm,
    /// Wait for the pre-payment screen
    AwaitCheckpoint,
}

impl FormStep {
    /// Every step, in execution order
    pub const ALL: [FormStep; 9] = [
        FormStep::SelectSite,
        FormStep::FillPartySize,
        FormStep::FillEquipment,
        FormStep::Reserve,
        FormStep::Acknowledge,
        FormStep::AwaitAcknowledgement,
        FormStep::ConfirmDetails,
        FormStep::Confirm,
        FormStep::AwaitCheckpoint,
    ];

    /// Name used in logs and failure reports
    pub fn name(&self) -> &'static str {
        match self {
            FormStep::SelectSite => "select_site",
            FormStep::FillPartySize => "fill_party_size",
            FormStep::FillEquipment => "fill_equipment",
            FormStep::Reserve => "reserve",
            FormStep::Acknowledge => "acknowledge",
            FormStep::AwaitAcknowledgement => "await_acknowledgement",
            FormStep::ConfirmDetails => "confirm_details",
            FormStep::Confirm => "confirm",
            FormStep::AwaitCheckpoint => "await_checkpoint",
        }
    }
}

enum StepOutcome {
    Done,
    Skipped,
}

/// Drives the reservation form up to, never past, the payment screen
pub struct FormDriver {
    selectors: Arc<PageSelectors>,
    config: FormConfig,
    recorder: ScreenshotRecorder,
}

impl FormDriver {
    /// Create a form driver
    pub fn new(
        selectors: Arc<PageSelectors>,
        config: FormConfig,
        recorder: ScreenshotRecorder,
    ) -> Self {
        Self {
            selectors,
            config,
            recorder,
        }
    }

    /// Fill the form for `site` and advance to the pre-payment checkpoint.
    ///
    /// Each step is retried up to the configured attempts. On a terminal
    /// failure a screenshot is captured and `FormFillFailure` names the step.
    pub async fn complete<B: Browser>(
        &self,
        browser: &B,
        site: &SiteCandidate,
        party: &Party,
    ) -> Result<(), BookingError> {
        let attempts = self.config.step_attempts.max(1);

        for step in FormStep::ALL {
            let mut attempt = 1;
            loop {
                match self.run_step(browser, step, site, party).await {
                    Ok(StepOutcome::Done) => {
                        debug!("Form step {} done", step.name());
                        break;
                    }
                    Ok(StepOutcome::Skipped) => {
                        debug!("Form step {} not needed on this page", step.name());
                        break;
                    }
                    Err(e) if attempt >= attempts => {
                        warn!(
                            "Form step {} failed for site {} after {} attempt(s): {}",
                            step.name(),
                            site.site_id,
                            attempt,
                            e
                        );
                        self.recorder
                            .capture(browser, &format!("form-{}", step.name()))
                            .await;
                        return Err(BookingError::FormFillFailure {
                            step: step.name().to_string(),
                            detail: e.to_string(),
                        });
                    }
                    Err(e) => {
                        debug!(
                            "Form step {} attempt {}/{} failed: {}",
                            step.name(),
                            attempt,
                            attempts,
                            e
                        );
                        attempt += 1;
                        sleep(self.config.retry_delay).await;
                    }
                }
            }
        }

        info!("✓ Site {} is at the pre-payment checkpoint", site.site_id);
        Ok(())
    }

    async fn run_step<B: Browser>(
        &self,
        browser: &B,
        step: FormStep,
        site: &SiteCandidate,
        party: &Party,
    ) -> Result<StepOutcome, BrowserError> {
        let s = self.selectors.as_ref();
        match step {
            FormStep::SelectSite => {
                self.open_site(browser, site).await?;
                Ok(StepOutcome::Done)
            }
            FormStep::FillPartySize => {
                self.fill_if_present(browser, &s.party_size_input, &party.size.to_string())
                    .await
            }
            FormStep::FillEquipment => {
                self.fill_if_present(browser, &s.equipment_input, &party.equipment)
                    .await
            }
            FormStep::Reserve => {
                info!("Clicking Reserve for site {}", site.site_id);
                self.click_when_ready(browser, &s.reserve_button).await
            }
            FormStep::Acknowledge => match first_match(browser, &s.acknowledge_button).await? {
                Some(button) => {
                    browser.click(&button).await?;
                    info!("Acknowledged campground notice");
                    Ok(StepOutcome::Done)
                }
                None => Ok(StepOutcome::Skipped),
            },
            FormStep::AwaitAcknowledgement => {
                browser
                    .wait_for(&s.acknowledgement_heading, self.config.step_timeout)
                    .await?;
                Ok(StepOutcome::Done)
            }
            FormStep::ConfirmDetails => self.click_when_ready(browser, &s.confirm_checkbox).await,
            FormStep::Confirm => {
                info!("Confirming reservation details");
                self.click_when_ready(browser, &s.confirm_button).await
            }
            FormStep::AwaitCheckpoint => {
                browser
                    .wait_for(&s.checkpoint_marker, self.config.step_timeout)
                    .await?;
                Ok(StepOutcome::Done)
            }
        }
    }

    async fn open_site<B: Browser>(&self, browser: &B, site: &SiteCandidate) -> Result<(), BrowserError> {
        let s = self.selectors.as_ref();

        let mut row = find_site_row(browser, s, &site.site_id).await?;
        if row.is_none() {
            if let Some(section) = &site.section {
                if let Some(button) = find_section_button(browser, s, section).await? {
                    browser.click(&button).await?;
                    browser.wait_for(&s.site_row, self.config.step_timeout).await?;
                    row = find_site_row(browser, s, &site.site_id).await?;
                }
            }
        }

        if let Some(row) = row {
            let header = browser.query_within(&row, &s.site_row_header).await?;
            match header.first() {
                Some(header) => browser.click(header).await?,
                None => browser.click(&row).await?,
            }
            return Ok(());
        }

        if let Some(button) = find_site_button(browser, s, &site.site_id).await? {
            return browser.click(&button).await;
        }

        Err(BrowserError::Element(format!(
            "site {} is not on the page",
            site.site_id
        )))
    }

    async fn fill_if_present<B: Browser>(
        &self,
        browser: &B,
        selector: &str,
        value: &str,
    ) -> Result<StepOutcome, BrowserError> {
        match first_match(browser, selector).await? {
            Some(input) => {
                browser.fill(&input, value).await?;
                Ok(StepOutcome::Done)
            }
            None => Ok(StepOutcome::Skipped),
        }
    }

    async fn click_when_ready<B: Browser>(
        &self,
        browser: &B,
        selector: &str,
    ) -> Result<StepOutcome, BrowserError> {
        browser.wait_for(selector, self.config.step_timeout).await?;
        let element = first_match(browser, selector)
            .await?
            .ok_or_else(|| BrowserError::Element(format!("'{}' vanished before click", selector)))?;
        browser.click(&element).await?;
        Ok(StepOutcome::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    fn driver() -> FormDriver {
        FormDriver::new(
            Arc::new(test_selectors()),
            FormConfig {
                step_attempts: 3,
                retry_delay: Duration::from_millis(10),
                step_timeout: Duration::from_secs(1),
            },
            ScreenshotRecorder::new(std::env::temp_dir().join("auto-booker-tests")),
        )
    }

    fn party() -> Party {
        Party {
            size: 4,
            equipment: "Medium Tent".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaches_checkpoint() {
        let browser = FakeBrowser::new()
            .with_page(results_page(vec![site_row("22A", true), site_row("22B", true)]));

        driver()
            .complete(&browser, &SiteCandidate::new("22B", None, true), &party())
            .await
            .unwrap();

        assert_eq!(
            browser.clicks(),
            vec!["header:22B", "reserve", "confirm-box", "confirm"]
        );
        assert_eq!(
            browser.fills(),
            vec![
                ("party-size".to_string(), "4".to_string()),
                ("equipment".to_string(), "Medium Tent".to_string()),
            ]
        );
        assert!(browser.screenshots().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_optional_steps_are_skipped() {
        let page = FakePage::new()
            .with(".site-row", site_row("5A", true))
            .with(".ack", FakeElement::new("ack"));
        let browser = FakeBrowser::new().with_page(page);

        driver()
            .complete(&browser, &SiteCandidate::new("5A", None, true), &party())
            .await
            .unwrap();

        assert!(browser.fills().is_empty());
        assert_eq!(
            browser.clicks(),
            vec!["header:5A", "reserve", "ack", "confirm-box", "confirm"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_section_before_site() {
        let page = FakePage::new().with(
            ".section",
            section_button("Loops 22-27", vec![site_row("22B", true)]),
        );
        let browser = FakeBrowser::new().with_page(page);

        driver()
            .complete(
                &browser,
                &SiteCandidate::new("22B", Some("Loops 22-27"), true),
                &party(),
            )
            .await
            .unwrap();

        assert_eq!(browser.clicks()[..2], ["section:Loops 22-27", "header:22B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_retried_until_it_succeeds() {
        let browser = FakeBrowser::new()
            .with_page(results_page(vec![site_row("22B", true)]))
            .failing_element("reserve", 2);

        driver()
            .complete(&browser, &SiteCandidate::new("22B", None, true), &party())
            .await
            .unwrap();

        assert!(browser.clicks().contains(&"confirm".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_failure_after_retries() {
        let browser = FakeBrowser::new()
            .with_page(results_page(vec![site_row("22B", true)]))
            .failing_element("reserve", 3);

        let result = driver()
            .complete(&browser, &SiteCandidate::new("22B", None, true), &party())
            .await;

        match result {
            Err(BookingError::FormFillFailure { step, .. }) => assert_eq!(step, "reserve"),
            other => panic!("expected form failure, got {:?}", other),
        }
        assert_eq!(browser.screenshots().len(), 1);
        assert!(!browser.clicks().contains(&"confirm".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_site_fails_select_step() {
        let browser = FakeBrowser::new().with_page(results_page(vec![site_row("5A", true)]));

        let result = driver()
            .complete(&browser, &SiteCandidate::new("99Z", None, true), &party())
            .await;

        match result {
            Err(BookingError::FormFillFailure { step, detail }) => {
                assert_eq!(step, "select_site");
                assert!(detail.contains("99Z"));
            }
            other => panic!("expected form failure, got {:?}", other),
        }
    }
}
