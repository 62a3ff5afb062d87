use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::{NotificationError, SoundService};

/// Rings the terminal bell a few times
pub struct TerminalBellService {
    rings: usize,
}

impl TerminalBellService {
    /// Create a bell service ringing `rings` times per alert
    pub fn new(rings: usize) -> Self {
        Self { rings }
    }
}

impl Default for TerminalBellService {
    fn default() -> Self {
        Self::new(3)
    }
}

#[async_trait]
impl SoundService for TerminalBellService {
    async fn play(&self) -> Result<(), NotificationError> {
        debug!("Ringing terminal bell {} time(s)", self.rings);

        let mut stdout = tokio::io::stdout();
        let bells = vec![0x07u8; self.rings];
        stdout
            .write_all(&bells)
            .await
            .map_err(|e| NotificationError::Sound(e.to_string()))?;
        stdout
            .flush()
            .await
            .map_err(|e| NotificationError::Sound(e.to_string()))?;

        Ok(())
    }
}
