//! # Campground Booker
//!
//! This crate provides the booking core for the campsite auto-booker. It waits
//! out the reservation site's virtual queue, probes campgrounds across date
//! variants, picks a site by preference and drives the reservation form up to
//! the last screen before payment.

/// Booking domain types and errors
mod booking_types;
pub use booking_types::*;

/// Browser capability trait and page selectors
mod browser;
pub use browser::*;

/// WebDriver-backed browser session
mod browser_session;
pub use browser_session::*;

/// Ordered date pairs around the requested stay
mod date_variants;
pub use date_variants::*;

/// Virtual waiting room monitor
mod queue_monitor;
pub use queue_monitor::*;

/// Manual sign-in watcher
mod login_watcher;
pub use login_watcher::*;

/// Search results reader
mod availability_prober;
pub use availability_prober::*;

/// Preference-based site selection
mod site_selector;
pub use site_selector::*;

/// Reservation form steps
mod form_driver;
pub use form_driver::*;

/// Outer booking loop
mod orchestrator;
pub use orchestrator::*;

/// Debug screenshots
mod screenshots;
pub use screenshots::*;

/// Alert traits and the combined notifier
mod notification_service;
pub use notification_service::*;

/// Terminal bell alerts
mod sound_service;
pub use sound_service::*;

/// Desktop notification alerts
mod desktop_service;
pub use desktop_service::*;

#[cfg(test)]
mod test_support;
