use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use campground_booker::PageSelectors;

/// Top-level shape of `config.yaml`
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Campgrounds in priority order
    #[validate(length(min = 1, message = "At least one campground is required"), nested)]
    pub campgrounds: Vec<CampgroundEntry>,

    /// Requested stay
    #[validate(nested)]
    pub dates: DatesSection,

    /// Party details
    #[serde(default)]
    #[validate(nested)]
    pub party: PartySection,

    /// Site ids used for campgrounds that list none of their own
    #[serde(default)]
    pub preferred_sites: Vec<String>,

    /// Alert channels
    #[serde(default)]
    pub notifications: NotificationsSection,

    /// Wait limits
    #[serde(default)]
    #[validate(nested)]
    pub timeouts: TimeoutsSection,

    /// Form retry policy
    #[serde(default)]
    #[validate(nested)]
    pub form: FormSection,

    /// Reservation site root
    pub base_url: Option<String>,

    /// WebDriver server address
    pub webdriver_url: Option<String>,

    /// Overrides for the page selector defaults
    #[serde(default)]
    pub selectors: PageSelectors,
}

/// One campground entry
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CampgroundEntry {
    /// Display name
    #[validate(custom(function = "not_blank", message = "Campground name is required"))]
    pub name: String,

    /// Path of the campground's search page
    #[validate(custom(function = "not_blank", message = "Campground url_slug is required"))]
    pub url_slug: String,

    /// Preferred sections in priority order
    #[serde(default)]
    pub preferred_sections: Vec<String>,

    /// Preferred sites in priority order
    #[serde(default)]
    pub preferred_sites: Vec<String>,

    /// Never fall back to an arbitrary site
    #[serde(default)]
    pub strict_preferences: bool,
}

/// Stay dates and flexibility
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_stay"))]
pub struct DatesSection {
    /// Check-in date (YYYY-MM-DD)
    pub check_in: NaiveDate,

    /// Check-out date (YYYY-MM-DD)
    pub check_out: NaiveDate,

    /// Days either side of the stay that may be tried
    #[serde(default)]
    #[validate(range(max = 30, message = "flexible_days must be at most 30"))]
    pub flexible_days: u32,
}

/// Party size and equipment
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct PartySection {
    /// Number of people
    #[validate(range(min = 1, max = 50, message = "Party size must be between 1 and 50"))]
    pub size: u32,

    /// Equipment label as the reservation site shows it
    #[validate(custom(function = "not_blank", message = "Equipment is required"))]
    pub equipment: String,
}

impl Default for PartySection {
    fn default() -> Self {
        Self {
            size: 2,
            equipment: "tent".to_string(),
        }
    }
}

/// Which alert channels are on
#[derive(Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotificationsSection {
    /// Terminal bell
    pub sound: bool,
    /// Desktop notification
    pub desktop: bool,
}

impl Default for NotificationsSection {
    fn default() -> Self {
        Self {
            sound: true,
            desktop: true,
        }
    }
}

/// Wait limits, in the units their names carry
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutsSection {
    /// Time allowed for manual sign-in
    #[validate(range(min = 1))]
    pub login_minutes: u64,

    /// Time allowed in the virtual queue
    #[validate(range(min = 1))]
    pub queue_minutes: u64,

    /// Delay between queue checks
    #[validate(range(min = 1))]
    pub queue_poll_seconds: u64,

    /// Seconds to wait for search results to render
    #[validate(range(min = 1))]
    pub results_seconds: u64,

    /// Whole-run deadline; unset means none
    #[validate(range(min = 1))]
    pub run_minutes: Option<u64>,
}

impl Default for TimeoutsSection {
    fn default() -> Self {
        Self {
            login_minutes: 15,
            queue_minutes: 120,
            queue_poll_seconds: 3,
            results_seconds: 15,
            run_minutes: None,
        }
    }
}

/// Form step retry policy
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct FormSection {
    /// Attempts per step
    #[validate(range(min = 1, max = 10))]
    pub step_attempts: u32,

    /// Pause between attempts
    pub retry_delay_ms: u64,

    /// How long a step waits for its element
    #[validate(range(min = 1))]
    pub step_timeout_seconds: u64,
}

impl Default for FormSection {
    fn default() -> Self {
        Self {
            step_attempts: 3,
            retry_delay_ms: 500,
            step_timeout_seconds: 10,
        }
    }
}

fn validate_stay(dates: &DatesSection) -> Result<(), ValidationError> {
    if dates.check_out <= dates.check_in {
        let mut error = ValidationError::new("invalid_date_range");
        error.message = Some("check_out must be after check_in".into());
        return Err(error);
    }
    Ok(())
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}
