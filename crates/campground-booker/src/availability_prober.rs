use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::booking_types::{BookingError, Campground, DateVariant, Party, SiteCandidate};
use crate::browser::{Browser, BrowserError, PageSelectors, any_present};
use crate::screenshots::ScreenshotRecorder;

/// "Site A49  Available" style labels; the id must contain a digit
static SITE_BUTTON_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^site\s+(\S*\d\S*)").expect("site label pattern is valid"));

static SITE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^site\s+").expect("site prefix pattern is valid"));

static AVAILABILITY_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(not available|unavailable|available)\b")
        .expect("availability pattern is valid")
});

const SECTION_PREFIXES: [&str; 3] = ["site ", "loops", "loop "];

/// Settings for availability probes
#[derive(Debug, Clone)]
pub struct ProberConfig {
    /// Root of the reservation site
    pub base_url: String,
    /// How long to wait for results to render (default: 15 seconds)
    pub results_timeout: Duration,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            base_url: "https://reservation.pc.gc.ca".to_string(),
            results_timeout: Duration::from_secs(15),
        }
    }
}

/// Reads the bookable sites a campground search page exposes
pub struct AvailabilityProber {
    selectors: Arc<PageSelectors>,
    config: ProberConfig,
    recorder: ScreenshotRecorder,
}

impl AvailabilityProber {
    /// Create a prober
    pub fn new(
        selectors: Arc<PageSelectors>,
        config: ProberConfig,
        recorder: ScreenshotRecorder,
    ) -> Self {
        Self {
            selectors,
            config,
            recorder,
        }
    }

    /// Query one campground for one date variant.
    ///
    /// An empty list means the page reported no availability. Navigation
    /// and page-structure problems are errors, and a screenshot is captured
    /// before they are returned. Re-running against an unchanged page yields
    /// the same list.
    pub async fn probe<B: Browser>(
        &self,
        browser: &B,
        campground: &Campground,
        variant: &DateVariant,
        party: &Party,
    ) -> Result<Vec<SiteCandidate>, BookingError> {
        let url = search_url(&self.config.base_url, campground, variant, party.size);
        info!(
            "→ Searching {} ({}, {} ppl, {})",
            campground.name, variant, party.size, party.equipment
        );

        let result = self.read_results(browser, &url).await;
        match &result {
            Ok(candidates) => debug!(
                "{}: {} site(s) listed, {} available",
                campground.name,
                candidates.len(),
                candidates.iter().filter(|c| c.available).count()
            ),
            Err(e) => {
                warn!("Probe of {} for {} failed: {}", campground.name, variant, e);
                self.recorder
                    .capture(browser, &format!("probe-{}", campground.name))
                    .await;
            }
        }
        result
    }

    async fn read_results<B: Browser>(
        &self,
        browser: &B,
        url: &str,
    ) -> Result<Vec<SiteCandidate>, BookingError> {
        let s = self.selectors.as_ref();

        browser
            .navigate(url)
            .await
            .map_err(|e| BookingError::NavigationFailure {
                url: url.to_string(),
                detail: e.to_string(),
            })?;

        browser
            .wait_for(&s.results_ready, self.config.results_timeout)
            .await
            .map_err(|e| drift(&s.results_ready, e))?;

        if any_present(browser, std::slice::from_ref(&s.no_availability)).await {
            info!("No available sites for this search");
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        let rows = browser
            .query(&s.site_row)
            .await
            .map_err(|e| drift(&s.site_row, e))?;
        collect_rows(browser, s, &rows, None, &mut candidates)
            .await
            .map_err(|e| drift(&s.site_row, e))?;

        let sections = section_labels(browser, s)
            .await
            .map_err(|e| drift(&s.section_button, e))?;
        let open_sections: Vec<&str> = sections
            .iter()
            .filter(|(_, available)| *available)
            .map(|(name, _)| name.as_str())
            .collect();
        debug!(
            "Found {} section(s), {} available",
            sections.len(),
            open_sections.len()
        );

        // rows already on screen keep no section; rows a section reveals get its name
        for section in open_sections {
            let button = find_section_button(browser, s, section)
                .await
                .map_err(|e| drift(&s.section_button, e))?
                .ok_or_else(|| BookingError::SelectorDrift {
                    selector: s.section_button.clone(),
                    detail: format!("section '{}' disappeared before it was opened", section),
                })?;
            browser
                .click(&button)
                .await
                .map_err(|e| drift(&s.section_button, e))?;
            browser
                .wait_for(&s.site_row, self.config.results_timeout)
                .await
                .map_err(|e| drift(&s.site_row, e))?;

            let rows = browser
                .query(&s.site_row)
                .await
                .map_err(|e| drift(&s.site_row, e))?;
            collect_rows(browser, s, &rows, Some(section), &mut candidates)
                .await
                .map_err(|e| drift(&s.site_row, e))?;
        }

        if candidates.is_empty() {
            collect_site_buttons(browser, s, &mut candidates)
                .await
                .map_err(|e| drift(&s.site_button, e))?;
        }

        if candidates.is_empty() && !sections.is_empty() {
            info!("Every section is marked unavailable for this search");
            return Ok(Vec::new());
        }

        if candidates.is_empty() {
            return Err(BookingError::SelectorDrift {
                selector: s.site_row.clone(),
                detail: "results page showed neither sites nor the no-availability marker"
                    .to_string(),
            });
        }

        Ok(candidates)
    }
}

/// Search results URL for one campground and date variant
pub fn search_url(
    base_url: &str,
    campground: &Campground,
    variant: &DateVariant,
    party_size: u32,
) -> String {
    let separator = if campground.url_slug.contains('?') { '&' } else { '?' };
    format!(
        "{}/{}{}searchTabGroupId=0&bookingCategoryId=0&startDate={}&endDate={}&nights={}&partySize={}",
        base_url.trim_end_matches('/'),
        campground.url_slug.trim_start_matches('/'),
        separator,
        urlencoding::encode(&url_date(variant.check_in)),
        urlencoding::encode(&url_date(variant.check_out)),
        variant.nights(),
        party_size
    )
}

fn url_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%dT00:00:00.000Z").to_string()
}

fn drift(selector: &str, e: BrowserError) -> BookingError {
    BookingError::SelectorDrift {
        selector: selector.to_string(),
        detail: e.to_string(),
    }
}

/// True for section (loop) buttons such as "Site A  Available" or
/// "Loops 22-27  Available", false for individual sites like "Site A49".
pub(crate) fn is_section_label(label: &str) -> bool {
    let lower = label.trim().to_lowercase();
    if !SECTION_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return false;
    }
    if lower.starts_with("site ") {
        let identifier = lower[5..].split_whitespace().next().unwrap_or_default();
        if identifier.chars().any(|c| c.is_ascii_digit()) {
            return false;
        }
    }
    true
}

/// Section identifier from a button label: "Site A  Available" gives "A"
pub(crate) fn section_name(label: &str) -> String {
    let name = SITE_PREFIX.replace(label.trim(), "");
    let name = AVAILABILITY_WORDS.replace_all(&name, "");
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn label_is_available(label: &str, available_text: &str) -> bool {
    let lower = label.to_lowercase();
    lower.contains(&available_text.to_lowercase())
        && !lower.contains("not available")
        && !lower.contains("unavailable")
}

/// Accessible label of an element, falling back to its text
pub(crate) async fn element_label<B: Browser + ?Sized>(
    browser: &B,
    element: &B::Element,
) -> Result<String, BrowserError> {
    match browser.attribute(element, "aria-label").await? {
        Some(label) if !label.trim().is_empty() => Ok(label.trim().to_string()),
        _ => Ok(browser.text(element).await?.trim().to_string()),
    }
}

/// Section buttons on the page as (name, available), first label wins
async fn section_labels<B: Browser + ?Sized>(
    browser: &B,
    s: &PageSelectors,
) -> Result<Vec<(String, bool)>, BrowserError> {
    let mut sections: Vec<(String, bool)> = Vec::new();
    for button in browser.query(&s.section_button).await? {
        let label = element_label(browser, &button).await?;
        if !is_section_label(&label) {
            continue;
        }
        let name = section_name(&label);
        if !sections.iter().any(|(seen, _)| *seen == name) {
            sections.push((name, label_is_available(&label, &s.available_text)));
        }
    }
    Ok(sections)
}

/// Section button whose label names `section`
pub(crate) async fn find_section_button<B: Browser + ?Sized>(
    browser: &B,
    s: &PageSelectors,
    section: &str,
) -> Result<Option<B::Element>, BrowserError> {
    for button in browser.query(&s.section_button).await? {
        let label = element_label(browser, &button).await?;
        if is_section_label(&label) && section_name(&label).eq_ignore_ascii_case(section.trim()) {
            return Ok(Some(button));
        }
    }
    Ok(None)
}

/// Site id of a row: the id attribute, else the row's name text
pub(crate) async fn read_site_id<B: Browser + ?Sized>(
    browser: &B,
    s: &PageSelectors,
    row: &B::Element,
) -> Result<Option<String>, BrowserError> {
    if let Some(id) = browser.attribute(row, &s.site_id_attribute).await? {
        let id = id.trim();
        if !id.is_empty() {
            return Ok(Some(id.to_string()));
        }
    }

    if let Some(name) = browser.query_within(row, &s.site_name).await?.first() {
        let text = browser.text(name).await?;
        let text = text.trim();
        let id = text.strip_prefix("Site").unwrap_or(text).trim();
        if !id.is_empty() {
            return Ok(Some(id.to_string()));
        }
    }

    Ok(None)
}

async fn row_available<B: Browser + ?Sized>(
    browser: &B,
    s: &PageSelectors,
    row: &B::Element,
) -> Result<bool, BrowserError> {
    for label in browser.query_within(row, &s.availability_label).await? {
        if browser.text(&label).await?.trim() == s.available_text {
            return Ok(true);
        }
    }
    Ok(false)
}

async fn collect_rows<B: Browser + ?Sized>(
    browser: &B,
    s: &PageSelectors,
    rows: &[B::Element],
    section: Option<&str>,
    candidates: &mut Vec<SiteCandidate>,
) -> Result<(), BrowserError> {
    for row in rows {
        let Some(site_id) = read_site_id(browser, s, row).await? else {
            debug!("Skipping site row without an identifier");
            continue;
        };
        if candidates.iter().any(|c| c.site_id == site_id) {
            continue;
        }
        let available = row_available(browser, s, row).await?;
        candidates.push(SiteCandidate::new(site_id, section, available));
    }
    Ok(())
}

/// Site id from a one-button-per-site label
pub(crate) fn site_button_id(label: &str) -> Option<String> {
    SITE_BUTTON_LABEL
        .captures(label.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

async fn collect_site_buttons<B: Browser + ?Sized>(
    browser: &B,
    s: &PageSelectors,
    candidates: &mut Vec<SiteCandidate>,
) -> Result<(), BrowserError> {
    for button in browser.query(&s.site_button).await? {
        let label = element_label(browser, &button).await?;
        let Some(site_id) = site_button_id(&label) else {
            continue;
        };
        if candidates.iter().any(|c| c.site_id == site_id) {
            continue;
        }
        let available = label_is_available(&label, &s.available_text);
        candidates.push(SiteCandidate::new(site_id, None, available));
    }
    Ok(())
}

/// Row for `site_id` on the current page
pub(crate) async fn find_site_row<B: Browser + ?Sized>(
    browser: &B,
    s: &PageSelectors,
    site_id: &str,
) -> Result<Option<B::Element>, BrowserError> {
    for row in browser.query(&s.site_row).await? {
        if read_site_id(browser, s, &row)
            .await?
            .is_some_and(|id| id.eq_ignore_ascii_case(site_id))
        {
            return Ok(Some(row));
        }
    }
    Ok(None)
}

/// One-button-per-site button for `site_id` on the current page
pub(crate) async fn find_site_button<B: Browser + ?Sized>(
    browser: &B,
    s: &PageSelectors,
    site_id: &str,
) -> Result<Option<B::Element>, BrowserError> {
    for button in browser.query(&s.site_button).await? {
        let label = element_label(browser, &button).await?;
        if site_button_id(&label).is_some_and(|id| id.eq_ignore_ascii_case(site_id)) {
            return Ok(Some(button));
        }
    }
    Ok(None)
}
