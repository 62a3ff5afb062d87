use std::fmt;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::browser::BrowserError;

/// A campground to search, in the priority position it was listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campground {
    /// Display name of the campground
    pub name: String,
    /// Path segment locating the campground's search page on the reservation site
    pub url_slug: String,
    /// Section (loop) identifiers to prefer, in priority order
    #[serde(default)]
    pub preferred_sections: Vec<String>,
    /// Site identifiers to prefer, in priority order
    #[serde(default)]
    pub preferred_sites: Vec<String>,
    /// When set, a campground with preferences never falls back to an arbitrary site
    #[serde(default)]
    pub strict_preferences: bool,
}

impl Campground {
    /// Create a campground with no site or section preferences
    pub fn new(name: impl Into<String>, url_slug: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url_slug: url_slug.into(),
            preferred_sections: Vec::new(),
            preferred_sites: Vec::new(),
            strict_preferences: false,
        }
    }
}

/// Party details entered on the reservation form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    /// Number of people in the party
    pub size: u32,
    /// Equipment tag as the reservation site labels it (e.g. "Medium Tent")
    pub equipment: String,
}

impl Default for Party {
    fn default() -> Self {
        Self {
            size: 2,
            equipment: "tent".to_string(),
        }
    }
}

/// Everything the orchestrator needs to know about what to book.
///
/// Produced and validated by the configuration layer, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPreferences {
    /// Campgrounds in priority order
    pub campgrounds: Vec<Campground>,
    /// Requested check-in date
    pub check_in: NaiveDate,
    /// Requested check-out date
    pub check_out: NaiveDate,
    /// How many days either side of the requested dates may be tried
    pub flexible_days: u32,
    /// Party size and equipment
    pub party: Party,
}

impl SearchPreferences {
    /// The exact pair the user asked for
    pub fn base_variant(&self) -> DateVariant {
        DateVariant::new(self.check_in, self.check_out)
    }
}

/// One candidate check-in/check-out pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateVariant {
    /// Check-in date
    pub check_in: NaiveDate,
    /// Check-out date
    pub check_out: NaiveDate,
}

impl DateVariant {
    /// Pair a check-in with a check-out date
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        Self {
            check_in,
            check_out,
        }
    }

    /// Length of the stay in nights
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }
}

impl fmt::Display for DateVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.check_in, self.check_out)
    }
}

/// A bookable unit as reported by the remote page for one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteCandidate {
    /// Site identifier, e.g. "22B" or "A49"
    pub site_id: String,
    /// Section (loop) the site belongs to, when the page exposes it
    pub section: Option<String>,
    /// Availability flag exactly as the page reported it
    pub available: bool,
}

impl SiteCandidate {
    /// Build a candidate
    pub fn new(site_id: impl Into<String>, section: Option<&str>, available: bool) -> Self {
        Self {
            site_id: site_id.into(),
            section: section.map(str::to_string),
            available,
        }
    }
}

/// The unit of work the orchestrator advances through
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingAttempt {
    /// Campground name
    pub campground: String,
    /// Dates being booked
    pub variant: DateVariant,
    /// Site chosen by the selector
    pub site: SiteCandidate,
}

/// Why a (campground, date variant) pair did not reach the checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The page reported nothing bookable
    NoAvailability,
    /// Sites were available but none matched the campground's preferences
    NoMatchingSite {
        /// How many available sites were rejected
        available: usize,
    },
    /// The search page could not be loaded
    NavigationFailure {
        /// Driver-reported reason
        detail: String,
    },
    /// The page loaded but its structure was not recognised
    SelectorDrift {
        /// Selector that failed to match
        selector: String,
        /// What went wrong
        detail: String,
    },
    /// A form step kept failing after its retries
    FormFillFailure {
        /// Name of the failing step
        step: String,
        /// Last error seen for that step
        detail: String,
    },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NoAvailability => write!(f, "no availability"),
            FailureReason::NoMatchingSite { available } => {
                write!(f, "{} available site(s), none matching preferences", available)
            }
            FailureReason::NavigationFailure { detail } => {
                write!(f, "navigation failure: {}", detail)
            }
            FailureReason::SelectorDrift { selector, detail } => {
                write!(f, "selector drift on '{}': {}", selector, detail)
            }
            FailureReason::FormFillFailure { step, detail } => {
                write!(f, "form step '{}' failed: {}", step, detail)
            }
        }
    }
}

/// A recorded failure for one (campground, date variant) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptFailure {
    /// Campground name
    pub campground: String,
    /// Dates tried
    pub variant: DateVariant,
    /// Site that was selected before the failure, if any
    pub site: Option<String>,
    /// Failure cause
    pub reason: FailureReason,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.campground, self.variant)?;
        if let Some(site) = &self.site {
            write!(f, " site {}", site)?;
        }
        write!(f, ": {}", self.reason)
    }
}

/// Terminal value of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// A booking reached the last screen before payment
    CheckpointReached {
        /// The attempt that succeeded
        attempt: BookingAttempt,
        /// Failures recorded before the success
        failures: Vec<AttemptFailure>,
    },
    /// Every campground and date variant was tried without success
    Exhausted {
        /// One entry per pair tried
        failures: Vec<AttemptFailure>,
    },
    /// The run was cancelled between probes
    Aborted {
        /// Failures recorded before cancellation
        failures: Vec<AttemptFailure>,
    },
}

impl Outcome {
    /// Failures recorded during the run, whatever its result
    pub fn failures(&self) -> &[AttemptFailure] {
        match self {
            Outcome::CheckpointReached { failures, .. }
            | Outcome::Exhausted { failures }
            | Outcome::Aborted { failures } => failures,
        }
    }

    /// Whether the run reached the pre-payment checkpoint
    pub fn is_checkpoint(&self) -> bool {
        matches!(self, Outcome::CheckpointReached { .. })
    }
}

/// Errors raised by the booking core
#[derive(thiserror::Error, Debug)]
pub enum BookingError {
    /// Still in the virtual queue when the wait ran out; ends the run
    #[error("Still in the virtual queue after {waited:?}")]
    QueueTimeout {
        /// How long the monitor waited
        waited: Duration,
    },

    /// Nobody signed in before the login wait ran out; ends the run
    #[error("No login detected after {waited:?}")]
    LoginTimeout {
        /// How long the watcher waited
        waited: Duration,
    },

    /// The search page could not be reached
    #[error("Navigation to {url} failed: {detail}")]
    NavigationFailure {
        /// Target URL
        url: String,
        /// Driver-reported reason
        detail: String,
    },

    /// The page structure no longer matches the configured selectors
    #[error("Selector '{selector}' did not match: {detail}")]
    SelectorDrift {
        /// Selector that failed
        selector: String,
        /// What went wrong
        detail: String,
    },

    /// A reservation form step failed after its retries
    #[error("Form step '{step}' failed: {detail}")]
    FormFillFailure {
        /// Name of the failing step
        step: String,
        /// Last error seen for that step
        detail: String,
    },

    /// The run was cancelled
    #[error("Run aborted")]
    Aborted,

    /// Browser collaborator error
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),
}

impl BookingError {
    /// Convert a recoverable error into the reason recorded for its attempt.
    ///
    /// Returns `None` for errors that end the run.
    pub fn as_failure_reason(&self) -> Option<FailureReason> {
        match self {
            BookingError::NavigationFailure { detail, .. } => {
                Some(FailureReason::NavigationFailure {
                    detail: detail.clone(),
                })
            }
            BookingError::SelectorDrift { selector, detail } => Some(FailureReason::SelectorDrift {
                selector: selector.clone(),
                detail: detail.clone(),
            }),
            BookingError::FormFillFailure { step, detail } => Some(FailureReason::FormFillFailure {
                step: step.clone(),
                detail: detail.clone(),
            }),
            BookingError::Browser(e) => Some(FailureReason::SelectorDrift {
                selector: String::new(),
                detail: e.to_string(),
            }),
            BookingError::QueueTimeout { .. }
            | BookingError::LoginTimeout { .. }
            | BookingError::Aborted => None,
        }
    }
}
