//! Scripted in-memory browser for exercising the booking core without a driver.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::NaiveDate;

use crate::browser::{Browser, BrowserError, PageSelectors};
use crate::{Campground, NotificationError, Notifier, Party, SearchPreferences};

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeElement {
    pub name: String,
    pub text: String,
    pub attrs: HashMap<String, String>,
    pub children: HashMap<String, Vec<FakeElement>>,
    pub reveals: Vec<(String, FakeElement)>,
}

impl FakeElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn attr(mut self, key: &str, value: &str) -> Self {
        self.attrs.insert(key.to_string(), value.to_string());
        self
    }

    pub fn child(mut self, selector: &str, element: FakeElement) -> Self {
        self.children
            .entry(selector.to_string())
            .or_default()
            .push(element);
        self
    }

    /// Clicking this element adds `element` to the page under `selector`
    pub fn reveals(mut self, selector: &str, element: FakeElement) -> Self {
        self.reveals.push((selector.to_string(), element));
        self
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakePage {
    elements: HashMap<String, Vec<FakeElement>>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, selector: &str, element: FakeElement) -> Self {
        self.elements
            .entry(selector.to_string())
            .or_default()
            .push(element);
        self
    }
}

#[derive(Default)]
struct FakeState {
    routes: Vec<(String, FakePage)>,
    failing_routes: Vec<String>,
    page: FakePage,
    transient: HashMap<String, usize>,
    failures: HashMap<String, usize>,
    navigations: Vec<String>,
    clicks: Vec<String>,
    fills: Vec<(String, String)>,
    screenshots: Vec<PathBuf>,
    queries: Vec<String>,
}

#[derive(Default)]
pub(crate) struct FakeBrowser {
    state: Mutex<FakeState>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page shown before any navigation
    pub fn with_page(self, page: FakePage) -> Self {
        self.state.lock().unwrap().page = page;
        self
    }

    /// Page loaded when a navigated URL contains `fragment`
    pub fn with_route(self, fragment: &str, page: FakePage) -> Self {
        self.state
            .lock()
            .unwrap()
            .routes
            .push((fragment.to_string(), page));
        self
    }

    /// Navigation to URLs containing `fragment` errors
    pub fn failing_route(self, fragment: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_routes
            .push(fragment.to_string());
        self
    }

    /// `selector` matches one element for the next `queries` queries, then nothing
    pub fn with_transient(self, selector: &str, queries: usize) -> Self {
        self.state
            .lock()
            .unwrap()
            .transient
            .insert(selector.to_string(), queries);
        self
    }

    /// Clicks or fills on the element called `name` fail `times` times
    pub fn failing_element(self, name: &str, times: usize) -> Self {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(name.to_string(), times);
        self
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn fills(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().fills.clone()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().screenshots.clone()
    }

    pub fn query_count(&self, selector: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .queries
            .iter()
            .filter(|q| q.as_str() == selector)
            .count()
    }

    fn take_failure(state: &mut FakeState, name: &str) -> bool {
        match state.failures.get_mut(name) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait::async_trait]
impl Browser for FakeBrowser {
    type Element = FakeElement;

    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        state.navigations.push(url.to_string());

        if state.failing_routes.iter().any(|f| url.contains(f.as_str())) {
            return Err(BrowserError::Navigation(format!("net::ERR_CONNECTION_RESET {}", url)));
        }

        let page = state
            .routes
            .iter()
            .find(|(fragment, _)| url.contains(fragment.as_str()))
            .map(|(_, page)| page.clone())
            .unwrap_or_default();
        state.page = page;
        Ok(())
    }

    async fn query(&self, selector: &str) -> Result<Vec<FakeElement>, BrowserError> {
        let mut state = self.state.lock().unwrap();
        state.queries.push(selector.to_string());

        if let Some(remaining) = state.transient.get_mut(selector) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(vec![FakeElement::new(selector)]);
            }
        }

        Ok(state
            .page
            .elements
            .get(selector)
            .cloned()
            .unwrap_or_default())
    }

    async fn query_within(
        &self,
        parent: &FakeElement,
        selector: &str,
    ) -> Result<Vec<FakeElement>, BrowserError> {
        Ok(parent.children.get(selector).cloned().unwrap_or_default())
    }

    async fn text(&self, element: &FakeElement) -> Result<String, BrowserError> {
        Ok(element.text.clone())
    }

    async fn attribute(
        &self,
        element: &FakeElement,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        Ok(element.attrs.get(name).cloned())
    }

    async fn click(&self, element: &FakeElement) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        if Self::take_failure(&mut state, &element.name) {
            return Err(BrowserError::Element(format!("{} is not clickable", element.name)));
        }

        state.clicks.push(element.name.clone());
        for (selector, revealed) in &element.reveals {
            state
                .page
                .elements
                .entry(selector.clone())
                .or_default()
                .push(revealed.clone());
        }
        Ok(())
    }

    async fn fill(&self, element: &FakeElement, value: &str) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        if Self::take_failure(&mut state, &element.name) {
            return Err(BrowserError::Element(format!("{} is read-only", element.name)));
        }

        state.fills.push((element.name.clone(), value.to_string()));
        Ok(())
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        let state = self.state.lock().unwrap();
        let present = state
            .page
            .elements
            .get(selector)
            .is_some_and(|elements| !elements.is_empty())
            || state.transient.get(selector).is_some_and(|n| *n > 0);

        if present {
            Ok(())
        } else {
            Err(BrowserError::Timeout {
                selector: selector.to_string(),
                waited: timeout,
            })
        }
    }

    async fn screenshot(&self, path: &Path) -> Result<(), BrowserError> {
        self.state
            .lock()
            .unwrap()
            .screenshots
            .push(path.to_path_buf());
        Ok(())
    }
}

pub(crate) fn test_selectors() -> PageSelectors {
    PageSelectors {
        queue_indicators: vec![".queue".to_string(), ".queue-it".to_string()],
        logged_in_indicators: vec![".signed-in".to_string()],
        results_ready: ".results".to_string(),
        no_availability: ".empty".to_string(),
        section_button: ".section".to_string(),
        site_row: ".site-row".to_string(),
        site_id_attribute: "data-resource".to_string(),
        site_name: ".site-name".to_string(),
        availability_label: ".availability".to_string(),
        available_text: "Available".to_string(),
        site_row_header: ".site-header".to_string(),
        site_button: ".site-button".to_string(),
        party_size_input: ".party-size".to_string(),
        equipment_input: ".equipment".to_string(),
        reserve_button: ".reserve".to_string(),
        acknowledge_button: ".ack".to_string(),
        acknowledgement_heading: ".ack-heading".to_string(),
        confirm_checkbox: ".confirm-box".to_string(),
        confirm_button: ".confirm".to_string(),
        checkpoint_marker: ".checkpoint".to_string(),
    }
}

/// Reserve button whose click walks the acknowledgement screen to the checkpoint
pub(crate) fn reserve_button() -> FakeElement {
    FakeElement::new("reserve")
        .reveals(".ack-heading", FakeElement::new("ack-heading"))
        .reveals(".confirm-box", FakeElement::new("confirm-box"))
        .reveals(
            ".confirm",
            FakeElement::new("confirm").reveals(".checkpoint", FakeElement::new("checkpoint")),
        )
}

pub(crate) fn site_row(site_id: &str, available: bool) -> FakeElement {
    FakeElement::new(format!("row:{}", site_id))
        .attr("data-resource", site_id)
        .child(
            ".availability",
            FakeElement::new("availability").text(if available {
                "Available"
            } else {
                "Not Available"
            }),
        )
        .child(
            ".site-header",
            FakeElement::new(format!("header:{}", site_id)).reveals(".reserve", reserve_button()),
        )
}

/// Section button whose click reveals `rows`
pub(crate) fn section_button(label: &str, rows: Vec<FakeElement>) -> FakeElement {
    let mut button = FakeElement::new(format!("section:{}", label))
        .attr("aria-label", &format!("{}  Available", label));
    for row in rows {
        button = button.reveals(".site-row", row);
    }
    button
}

pub(crate) fn empty_results_page() -> FakePage {
    FakePage::new()
        .with(".results", FakeElement::new("results"))
        .with(".empty", FakeElement::new("empty"))
}

/// Results page listing `rows` directly, with party inputs present
pub(crate) fn results_page(rows: Vec<FakeElement>) -> FakePage {
    let mut page = FakePage::new()
        .with(".results", FakeElement::new("results"))
        .with(".party-size", FakeElement::new("party-size"))
        .with(".equipment", FakeElement::new("equipment"));
    for row in rows {
        page = page.with(".site-row", row);
    }
    page
}

pub(crate) fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub(crate) fn preferences(campgrounds: Vec<Campground>, flexible_days: u32) -> SearchPreferences {
    SearchPreferences {
        campgrounds,
        check_in: date("2026-07-12"),
        check_out: date("2026-07-13"),
        flexible_days,
        party: Party {
            size: 4,
            equipment: "Medium Tent".to_string(),
        },
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    alerts: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn alert(&self, _title: &str, message: &str) -> Result<(), NotificationError> {
        self.alerts.lock().unwrap().push(message.to_string());
        Ok(())
    }
}
