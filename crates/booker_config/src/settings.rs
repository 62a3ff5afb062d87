use std::env::VarError;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};
use validator::Validate;

use campground_booker::{
    Campground, FormConfig, OrchestratorConfig, PageSelectors, Party, ProberConfig, QueueConfig,
    SearchPreferences,
};

use crate::ConfigError;
use crate::config_file::ConfigFile;

const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";
const DEFAULT_BASE_URL: &str = "https://reservation.pc.gc.ca";
const HOME_DIR_NAME: &str = ".auto-booker";

/// Runtime settings that are not part of what to book
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// WebDriver server address
    pub webdriver_url: String,
    /// Reservation site root
    pub base_url: String,
    /// Where debugging screenshots are written
    pub screenshot_dir: PathBuf,
    /// Time allowed for manual sign-in
    pub login_timeout: Duration,
    /// Delay between queue checks
    pub queue_poll_interval: Duration,
    /// Time allowed in the virtual queue
    pub queue_timeout: Duration,
    /// How long to wait for search results
    pub results_timeout: Duration,
    /// Whole-run deadline
    pub run_timeout: Option<Duration>,
    /// Form retry policy
    pub form: FormConfig,
    /// Page selectors, defaults merged with overrides
    pub selectors: PageSelectors,
    /// Ring the terminal bell on alerts
    pub sound_alerts: bool,
    /// Show desktop notifications on alerts
    pub desktop_alerts: bool,
}

impl RunSettings {
    /// Component tuning for the booking orchestrator
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            queue: QueueConfig {
                poll_interval: self.queue_poll_interval,
                timeout: self.queue_timeout,
            },
            prober: ProberConfig {
                base_url: self.base_url.clone(),
                results_timeout: self.results_timeout,
            },
            form: self.form.clone(),
        }
    }
}

/// Everything loaded from the config file and environment
#[derive(Debug, Clone)]
pub struct BookerConfig {
    /// What to book
    pub preferences: SearchPreferences,
    /// How to run
    pub settings: RunSettings,
}

/// Load `path`, reading overrides from the process environment.
///
/// `.env` files are not loaded here; the binary does that at startup.
pub fn load_config(path: &Path) -> Result<BookerConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let config = parse_config(&content, |key| std::env::var(key))?;
    info!(
        "📋 Loaded {} campground(s) from {}",
        config.preferences.campgrounds.len(),
        path.display()
    );
    Ok(config)
}

/// Parse and validate YAML, taking overrides from `lookup`
pub fn parse_config<F>(yaml: &str, lookup: F) -> Result<BookerConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let file: ConfigFile = serde_yaml::from_str(yaml)?;
    file.validate()?;

    let non_empty = |var: &str| lookup(var).ok().filter(|v| !v.trim().is_empty());

    let global_sites = file.preferred_sites;
    let campgrounds = file
        .campgrounds
        .into_iter()
        .map(|entry| {
            let preferred_sites = if entry.preferred_sites.is_empty() {
                global_sites.clone()
            } else {
                entry.preferred_sites
            };
            Campground {
                name: entry.name.trim().to_string(),
                url_slug: entry.url_slug.trim().to_string(),
                preferred_sections: entry.preferred_sections,
                preferred_sites,
                strict_preferences: entry.strict_preferences,
            }
        })
        .collect();

    let preferences = SearchPreferences {
        campgrounds,
        check_in: file.dates.check_in,
        check_out: file.dates.check_out,
        flexible_days: file.dates.flexible_days,
        party: Party {
            size: file.party.size,
            equipment: file.party.equipment,
        },
    };

    let webdriver_url = non_empty("WEBDRIVER_URL")
        .or(file.webdriver_url)
        .unwrap_or_else(|| DEFAULT_WEBDRIVER_URL.to_string());
    let base_url = non_empty("RESERVATION_BASE_URL")
        .or(file.base_url)
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let home = non_empty("AUTO_BOOKER_HOME")
        .map(PathBuf::from)
        .or_else(|| {
            non_empty("HOME")
                .or_else(|| non_empty("USERPROFILE"))
                .map(|home| PathBuf::from(home).join(HOME_DIR_NAME))
        })
        .unwrap_or_else(|| PathBuf::from(HOME_DIR_NAME));
    debug!("Using {} for run artifacts", home.display());

    let timeouts = file.timeouts;
    let settings = RunSettings {
        webdriver_url,
        base_url,
        screenshot_dir: home.join("screenshots"),
        login_timeout: minutes(timeouts.login_minutes),
        queue_poll_interval: Duration::from_secs(timeouts.queue_poll_seconds),
        queue_timeout: minutes(timeouts.queue_minutes),
        results_timeout: Duration::from_secs(timeouts.results_seconds),
        run_timeout: timeouts.run_minutes.map(minutes),
        form: FormConfig {
            step_attempts: file.form.step_attempts,
            retry_delay: Duration::from_millis(file.form.retry_delay_ms),
            step_timeout: Duration::from_secs(file.form.step_timeout_seconds),
        },
        selectors: file.selectors,
        sound_alerts: file.notifications.sound,
        desktop_alerts: file.notifications.desktop,
    };

    Ok(BookerConfig {
        preferences,
        settings,
    })
}

fn minutes(m: u64) -> Duration {
    Duration::from_secs(m.saturating_mul(60))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use chrono::NaiveDate;

    use super::*;

    const MINIMAL: &str = r#"
campgrounds:
  - name: Two Jack Main
    url_slug: two-jack-main
dates:
  check_in: 2026-07-12
  check_out: 2026-07-14
"#;

    fn lookup_from_map<'a>(
        map: &'a HashMap<&'a str, &'a str>,
    ) -> impl Fn(&str) -> Result<String, VarError> + 'a {
        move |key| {
            map.get(key)
                .map(|v| (*v).to_string())
                .ok_or(VarError::NotPresent)
        }
    }

    fn no_env(_: &str) -> Result<String, VarError> {
        Err(VarError::NotPresent)
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config(MINIMAL, no_env).unwrap();

        let preferences = &config.preferences;
        assert_eq!(preferences.campgrounds, vec![Campground::new("Two Jack Main", "two-jack-main")]);
        assert_eq!(preferences.check_in, date("2026-07-12"));
        assert_eq!(preferences.check_out, date("2026-07-14"));
        assert_eq!(preferences.flexible_days, 0);
        assert_eq!(preferences.party, Party::default());

        let settings = &config.settings;
        assert_eq!(settings.webdriver_url, "http://localhost:9515");
        assert_eq!(settings.base_url, "https://reservation.pc.gc.ca");
        assert_eq!(settings.login_timeout, Duration::from_secs(15 * 60));
        assert_eq!(settings.queue_timeout, Duration::from_secs(120 * 60));
        assert_eq!(settings.queue_poll_interval, Duration::from_secs(3));
        assert_eq!(settings.run_timeout, None);
        assert_eq!(settings.form.step_attempts, 3);
        assert_eq!(settings.selectors, PageSelectors::default());
        assert!(settings.sound_alerts && settings.desktop_alerts);
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
campgrounds:
  - name: Two Jack Main
    url_slug: two-jack-main
    preferred_sections: ["Loops 22-27"]
  - name: Tunnel Mountain
    url_slug: tunnel-mountain
    preferred_sites: ["5A"]
    strict_preferences: true
dates:
  check_in: 2026-07-12
  check_out: 2026-07-13
  flexible_days: 2
party:
  size: 4
  equipment: Medium Tent
preferred_sites: ["22B", "22C"]
notifications:
  sound: false
timeouts:
  queue_minutes: 30
  run_minutes: 90
form:
  step_attempts: 5
  retry_delay_ms: 250
selectors:
  site_row: ".site-card"
"#;
        let config = parse_config(yaml, no_env).unwrap();

        let campgrounds = &config.preferences.campgrounds;
        assert_eq!(campgrounds[0].preferred_sites, vec!["22B", "22C"]);
        assert_eq!(campgrounds[0].preferred_sections, vec!["Loops 22-27"]);
        assert_eq!(campgrounds[1].preferred_sites, vec!["5A"]);
        assert!(campgrounds[1].strict_preferences);
        assert_eq!(config.preferences.flexible_days, 2);
        assert_eq!(config.preferences.party.size, 4);
        assert_eq!(config.preferences.party.equipment, "Medium Tent");

        let settings = &config.settings;
        assert!(!settings.sound_alerts);
        assert!(settings.desktop_alerts);
        assert_eq!(settings.queue_timeout, Duration::from_secs(30 * 60));
        assert_eq!(settings.run_timeout, Some(Duration::from_secs(90 * 60)));
        assert_eq!(settings.form.step_attempts, 5);
        assert_eq!(settings.form.retry_delay, Duration::from_millis(250));
        assert_eq!(settings.selectors.site_row, ".site-card");
        assert_eq!(
            settings.selectors.reserve_button,
            PageSelectors::default().reserve_button
        );

        let orchestrator = settings.orchestrator_config();
        assert_eq!(orchestrator.queue.timeout, Duration::from_secs(30 * 60));
        assert_eq!(orchestrator.prober.base_url, "https://reservation.pc.gc.ca");
    }

    #[test]
    fn test_environment_overrides() {
        let mut env = HashMap::new();
        env.insert("WEBDRIVER_URL", "http://127.0.0.1:4444");
        env.insert("RESERVATION_BASE_URL", "https://staging.example");
        env.insert("AUTO_BOOKER_HOME", "/var/lib/booker");
        env.insert("HOME", "/home/camper");
        let yaml = format!("{}webdriver_url: http://localhost:9999\n", MINIMAL);

        let config = parse_config(&yaml, lookup_from_map(&env)).unwrap();

        assert_eq!(config.settings.webdriver_url, "http://127.0.0.1:4444");
        assert_eq!(config.settings.base_url, "https://staging.example");
        assert_eq!(
            config.settings.screenshot_dir,
            PathBuf::from("/var/lib/booker/screenshots")
        );
    }

    #[test]
    fn test_screenshots_default_under_home() {
        let mut env = HashMap::new();
        env.insert("HOME", "/home/camper");

        let config = parse_config(MINIMAL, lookup_from_map(&env)).unwrap();

        assert_eq!(
            config.settings.screenshot_dir,
            PathBuf::from("/home/camper/.auto-booker/screenshots")
        );
    }

    #[test]
    fn test_rejects_reversed_dates() {
        let yaml = MINIMAL.replace("2026-07-14", "2026-07-12");

        let result = parse_config(&yaml, no_env);

        match result {
            Err(ConfigError::Validation(message)) => {
                assert!(message.contains("check_out must be after check_in"))
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_empty_campground_list() {
        let yaml = "campgrounds: []\ndates:\n  check_in: 2026-07-12\n  check_out: 2026-07-13\n";
        assert!(matches!(
            parse_config(yaml, no_env),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_rejects_bad_party_size() {
        let yaml = format!("{}party:\n  size: 0\n", MINIMAL);
        assert!(matches!(
            parse_config(&yaml, no_env),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_rejects_blank_campground_name() {
        let yaml = MINIMAL.replace("Two Jack Main", "\"\"");
        assert!(matches!(
            parse_config(&yaml, no_env),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_rejects_whitespace_only_campground_fields() {
        for (from, to) in [("Two Jack Main", "\"   \""), ("two-jack-main", "\"  \"")] {
            let yaml = MINIMAL.replace(from, to);
            match parse_config(&yaml, no_env) {
                Err(ConfigError::Validation(message)) => {
                    assert!(message.contains("campgrounds[0]"), "{}", message)
                }
                other => panic!("expected validation error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_rejects_blank_equipment() {
        let yaml = format!("{}party:\n  size: 2\n  equipment: \" \"\n", MINIMAL);
        assert!(matches!(
            parse_config(&yaml, no_env),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_huge_timeouts_saturate() {
        let yaml = format!(
            "{}timeouts:\n  login_minutes: {}\n  run_minutes: {}\n",
            MINIMAL,
            u64::MAX,
            u64::MAX / 2
        );

        let settings = parse_config(&yaml, no_env).unwrap().settings;

        assert_eq!(settings.login_timeout, Duration::from_secs(u64::MAX));
        assert_eq!(settings.run_timeout, Some(Duration::from_secs(u64::MAX)));
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let yaml = MINIMAL.replace("2026-07-12", "next tuesday");
        assert!(matches!(parse_config(&yaml, no_env), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();

        assert_eq!(config.preferences.campgrounds[0].name, "Two Jack Main");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        match load_config(&path) {
            Err(ConfigError::Io { path: reported, .. }) => {
                assert!(reported.ends_with("config.yaml"))
            }
            other => panic!("expected io error, got {:?}", other),
        }
    }
}
