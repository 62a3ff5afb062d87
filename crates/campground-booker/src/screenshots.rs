use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{info, warn};
use uuid::Uuid;

use crate::browser::Browser;

/// Saves debugging screenshots for selector maintenance.
///
/// Failures are logged and swallowed so a broken disk never masks the
/// error that prompted the capture.
#[derive(Debug, Clone)]
pub struct ScreenshotRecorder {
    dir: PathBuf,
    run_id: String,
}

impl ScreenshotRecorder {
    /// Record into `dir`, tagging files with a fresh run id
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let run_id = Uuid::new_v4().simple().to_string();
        Self {
            dir: dir.into(),
            run_id: run_id[..8].to_string(),
        }
    }

    /// Directory screenshots are written to
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Short id shared by every screenshot of this run
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// File path a capture with `label` would be written to now
    pub fn path_for(&self, label: &str) -> PathBuf {
        let label: String = label
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!(
            "{}-{}-{}.png",
            label,
            self.run_id,
            Local::now().format("%H%M%S%3f")
        ))
    }

    /// Capture the current page; returns the saved path on success
    pub async fn capture<B: Browser + ?Sized>(&self, browser: &B, label: &str) -> Option<PathBuf> {
        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            warn!("Could not create screenshot directory {}: {}", self.dir.display(), e);
            return None;
        }

        let path = self.path_for(label);
        match browser.screenshot(&path).await {
            Ok(()) => {
                info!("📸 Screenshot saved: {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Screenshot '{}' failed: {}", label, e);
                None
            }
        }
    }
}
