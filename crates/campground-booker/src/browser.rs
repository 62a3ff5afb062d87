use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors reported by a browser collaborator
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    /// Page load failed
    #[error("Navigation error: {0}")]
    Navigation(String),

    /// Waited for a selector that never appeared
    #[error("Timed out after {waited:?} waiting for '{selector}'")]
    Timeout {
        /// Selector being waited on
        selector: String,
        /// How long the wait lasted
        waited: Duration,
    },

    /// The element handle went stale or cannot be interacted with
    #[error("Element error: {0}")]
    Element(String),

    /// Screenshot could not be written
    #[error("Screenshot error: {0}")]
    Screenshot(String),

    /// Any other driver failure
    #[error("Driver error: {0}")]
    Driver(String),
}

/// Capability set the booking core needs from a browser.
///
/// Selector strings are CSS unless prefixed with `xpath:`.
#[async_trait::async_trait]
pub trait Browser: Send + Sync {
    /// Handle to an element on the current page
    type Element: Clone + Send + Sync;

    /// Load a URL in the current tab
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    /// All elements on the page matching a selector, in document order
    async fn query(&self, selector: &str) -> Result<Vec<Self::Element>, BrowserError>;

    /// All descendants of `parent` matching a selector, in document order
    async fn query_within(
        &self,
        parent: &Self::Element,
        selector: &str,
    ) -> Result<Vec<Self::Element>, BrowserError>;

    /// Visible text of an element
    async fn text(&self, element: &Self::Element) -> Result<String, BrowserError>;

    /// Attribute value of an element, if set
    async fn attribute(
        &self,
        element: &Self::Element,
        name: &str,
    ) -> Result<Option<String>, BrowserError>;

    /// Click an element
    async fn click(&self, element: &Self::Element) -> Result<(), BrowserError>;

    /// Replace the value of an input element
    async fn fill(&self, element: &Self::Element, value: &str) -> Result<(), BrowserError>;

    /// Block until at least one element matches the selector or the timeout elapses
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Save a PNG of the current viewport
    async fn screenshot(&self, path: &Path) -> Result<(), BrowserError>;
}

/// Whether any selector currently matches; query errors count as no match
pub(crate) async fn any_present<B: Browser + ?Sized>(browser: &B, selectors: &[String]) -> bool {
    for selector in selectors {
        match browser.query(selector).await {
            Ok(found) if !found.is_empty() => return true,
            Ok(_) => {}
            Err(e) => tracing::debug!("Indicator query '{}' failed: {}", selector, e),
        }
    }
    false
}

/// First element matching a selector, if any
pub(crate) async fn first_match<B: Browser + ?Sized>(
    browser: &B,
    selector: &str,
) -> Result<Option<B::Element>, BrowserError> {
    Ok(browser.query(selector).await?.into_iter().next())
}

/// Selector flavour understood by browser implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKind<'a> {
    /// CSS selector
    Css(&'a str),
    /// XPath expression
    XPath(&'a str),
}

/// Split an `xpath:` prefix off a selector string
pub fn parse_selector(selector: &str) -> SelectorKind<'_> {
    match selector.strip_prefix("xpath:") {
        Some(xpath) => SelectorKind::XPath(xpath.trim()),
        None => SelectorKind::Css(selector.trim()),
    }
}

/// Selector strings describing the reservation site's pages.
///
/// Defaults follow the Parks Canada reservation app; adapting to page changes
/// means overriding these in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSelectors {
    /// Any match means the virtual waiting room is showing
    pub queue_indicators: Vec<String>,
    /// Any match means a user is signed in
    pub logged_in_indicators: Vec<String>,
    /// Appears once search results (or the empty state) have rendered
    pub results_ready: String,
    /// Empty-state marker on the results page
    pub no_availability: String,
    /// Section (loop) buttons on the results page
    pub section_button: String,
    /// One row per site
    pub site_row: String,
    /// Attribute on the site row carrying the site id
    pub site_id_attribute: String,
    /// Element inside the site row holding its display name
    pub site_name: String,
    /// Element inside the site row holding its availability text
    pub availability_label: String,
    /// Text of an availability label for a bookable site
    pub available_text: String,
    /// Clickable header inside the site row
    pub site_row_header: String,
    /// Fallback one-button-per-site layout
    pub site_button: String,
    /// Party size input
    pub party_size_input: String,
    /// Equipment input or select
    pub equipment_input: String,
    /// Reserve button shown once a site is expanded
    pub reserve_button: String,
    /// Notice dialog button, only present for some campgrounds
    pub acknowledge_button: String,
    /// Heading of the acknowledgement screen
    pub acknowledgement_heading: String,
    /// "All reservation details are correct" checkbox
    pub confirm_checkbox: String,
    /// Button advancing from acknowledgement to checkout
    pub confirm_button: String,
    /// Appears on the last screen before payment
    pub checkpoint_marker: String,
}

impl Default for PageSelectors {
    fn default() -> Self {
        Self {
            queue_indicators: vec![
                "xpath://*[contains(text(), 'waiting room')]".to_string(),
                "xpath://*[contains(text(), \"salle d'attente\")]".to_string(),
                "xpath://*[contains(text(), 'Your estimated wait time')]".to_string(),
                "xpath://*[contains(text(), 'you are in line')]".to_string(),
                "#MainPart_lbWhichIsIn".to_string(),
            ],
            logged_in_indicators: vec![
                "xpath://*[contains(text(), 'Sign Out')]".to_string(),
                "xpath://*[contains(text(), 'My Account')]".to_string(),
                "xpath://*[contains(text(), 'Déconnexion')]".to_string(),
            ],
            results_ready: "xpath://mat-expansion-panel \
                | //button[starts-with(@aria-label, 'Site ') or starts-with(@aria-label, 'Loop')] \
                | //*[contains(text(), 'No Available Sites')]"
                .to_string(),
            no_availability: "xpath://*[contains(text(), 'No Available Sites')]".to_string(),
            section_button: "button".to_string(),
            site_row: "mat-expansion-panel".to_string(),
            site_id_attribute: "data-resource".to_string(),
            site_name: "h3.resource-name".to_string(),
            availability_label: ".availability-label".to_string(),
            available_text: "Available".to_string(),
            site_row_header: "mat-expansion-panel-header".to_string(),
            site_button: "button[aria-label^='Site ']".to_string(),
            party_size_input: "input[name='partySize']".to_string(),
            equipment_input: "select[name='equipment']".to_string(),
            reserve_button: "xpath://button[contains(., 'Reserve')]".to_string(),
            acknowledge_button: "xpath://button[contains(., 'Acknowledge')]".to_string(),
            acknowledgement_heading:
                "xpath://*[self::h1 or self::h2][contains(., 'Please read and acknowledge')]"
                    .to_string(),
            confirm_checkbox:
                "xpath://mat-checkbox[contains(., 'All reservation details are')]//input"
                    .to_string(),
            confirm_button: "xpath://button[contains(., 'Confirm reservation details')]"
                .to_string(),
            checkpoint_marker: "xpath://*[contains(text(), 'Payment')]".to_string(),
        }
    }
}
