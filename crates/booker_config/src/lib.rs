//! # Booker Config
//!
//! Loads the auto-booker's YAML configuration, validates it and applies
//! environment overrides, producing the search preferences for the booking
//! core and the settings for one run.

/// Raw YAML file structure with validation rules
mod config_file;
pub use config_file::*;

/// Conversion into search preferences and run settings
mod settings;
pub use settings::*;

/// Configuration errors
mod error;
pub use error::*;
