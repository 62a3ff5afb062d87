//! Command line entry point for the campsite auto-booker.
//! Waits out the reservation queue, books the first matching site up to the
//! payment screen and leaves the browser open for the user.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use booker_config::RunSettings;

mod booker_manager;
use booker_manager::BookerManager;

#[derive(Debug, Parser)]
#[command(name = "auto-booker")]
#[command(about = "Books a campsite up to the payment screen, then hands over to you")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Minutes to wait for a manual login
    #[arg(long, value_name = "MINUTES")]
    login_timeout: Option<u64>,

    /// Minutes to wait in the virtual queue
    #[arg(long, value_name = "MINUTES")]
    queue_timeout: Option<u64>,

    /// Minutes before the whole run is cancelled
    #[arg(long, value_name = "MINUTES")]
    run_timeout: Option<u64>,

    /// WebDriver server address (e.g. http://localhost:9515)
    #[arg(long, value_name = "URL")]
    webdriver_url: Option<String>,

    /// Assume the browser session is already signed in
    #[arg(long)]
    skip_login: bool,
}

impl Cli {
    /// Command line values take precedence over the file and environment
    fn apply(&self, settings: &mut RunSettings) {
        if let Some(m) = self.login_timeout {
            settings.login_timeout = minutes(m);
        }
        if let Some(m) = self.queue_timeout {
            settings.queue_timeout = minutes(m);
        }
        if let Some(m) = self.run_timeout {
            settings.run_timeout = Some(minutes(m));
        }
        if let Some(url) = &self.webdriver_url {
            settings.webdriver_url = url.clone();
        }
    }
}

fn minutes(m: u64) -> Duration {
    Duration::from_secs(m.saturating_mul(60))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = Cli::parse();
    log::info!("🏕️ Starting campsite auto-booker...");

    let mut config = booker_config::load_config(&cli.config)
        .with_context(|| format!("could not load {}", cli.config.display()))?;
    cli.apply(&mut config.settings);

    let preferences = &config.preferences;
    for (rank, campground) in preferences.campgrounds.iter().enumerate() {
        log::info!("   {}. {}", rank + 1, campground.name);
    }
    log::info!(
        "📅 {} to {} (±{} days), party of {} with {}",
        preferences.check_in,
        preferences.check_out,
        preferences.flexible_days,
        preferences.party.size,
        preferences.party.equipment
    );

    BookerManager::new(config, cli.skip_login).run().await
}
