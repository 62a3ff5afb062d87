use std::sync::Arc;

use tracing::{error, info};

/// Errors raised while delivering an alert
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// Sound could not be played
    #[error("Sound error: {0}")]
    Sound(String),
    /// Desktop notification could not be shown
    #[error("Desktop notification error: {0}")]
    Desktop(String),
}

/// Alerting collaborator used by the booking core
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Get the user's attention with a short title and message
    async fn alert(&self, title: &str, message: &str) -> Result<(), NotificationError>;
}

/// Trait for sound alert implementations
#[async_trait::async_trait]
pub trait SoundService: Send + Sync {
    /// Play an attention sound
    async fn play(&self) -> Result<(), NotificationError>;
}

/// Trait for desktop notification implementations
#[async_trait::async_trait]
pub trait DesktopService: Send + Sync {
    /// Show a desktop notification
    async fn show(&self, title: &str, message: &str) -> Result<(), NotificationError>;
}

/// Notifier delivering through whichever channels are enabled
pub struct AlertNotifier {
    sound_service: Option<Arc<dyn SoundService>>,
    desktop_service: Option<Arc<dyn DesktopService>>,
}

impl AlertNotifier {
    /// Create a notifier; `None` disables that channel
    pub fn new(
        sound_service: Option<Arc<dyn SoundService>>,
        desktop_service: Option<Arc<dyn DesktopService>>,
    ) -> Self {
        Self {
            sound_service,
            desktop_service,
        }
    }
}

#[async_trait::async_trait]
impl Notifier for AlertNotifier {
    async fn alert(&self, title: &str, message: &str) -> Result<(), NotificationError> {
        info!("🔔 {}: {}", title, message);

        let mut first_error = None;

        if let Some(ref sound_service) = self.sound_service {
            if let Err(e) = sound_service.play().await {
                error!("Failed to play alert sound: {}", e);
                first_error.get_or_insert(e);
            }
        }

        if let Some(ref desktop_service) = self.desktop_service {
            if let Err(e) = desktop_service.show(title, message).await {
                error!("Failed to show desktop notification: {}", e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
