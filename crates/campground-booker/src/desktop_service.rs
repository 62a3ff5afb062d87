use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::{DesktopService, NotificationError};

/// Shows notifications through the platform's own notifier command
pub struct SystemDesktopService {
    app_name: String,
    timeout: Duration,
}

impl SystemDesktopService {
    /// Create a desktop service that labels notifications with `app_name`
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            timeout: Duration::from_secs(5),
        }
    }

    fn command(&self, title: &str, message: &str) -> Command {
        if cfg!(target_os = "macos") {
            let mut cmd = Command::new("osascript");
            cmd.arg("-e").arg(format!(
                "display notification \"{}\" with title \"{}\"",
                escape_quotes(message),
                escape_quotes(title)
            ));
            cmd
        } else if cfg!(target_os = "windows") {
            let script = format!(
                "[Windows.UI.Notifications.ToastNotificationManager, Windows.UI.Notifications, ContentType = WindowsRuntime] > $null; \
                 $xml = [Windows.UI.Notifications.ToastNotificationManager]::GetTemplateContent([Windows.UI.Notifications.ToastTemplateType]::ToastText02); \
                 $text = $xml.GetElementsByTagName('text'); \
                 $text[0].AppendChild($xml.CreateTextNode('{}')) > $null; \
                 $text[1].AppendChild($xml.CreateTextNode('{}')) > $null; \
                 [Windows.UI.Notifications.ToastNotificationManager]::CreateToastNotifier('{}').Show([Windows.UI.Notifications.ToastNotification]::new($xml))",
                title.replace('\'', "''"),
                message.replace('\'', "''"),
                self.app_name.replace('\'', "''")
            );
            let mut cmd = Command::new("powershell");
            cmd.arg("-NoProfile").arg("-Command").arg(script);
            cmd
        } else {
            let mut cmd = Command::new("notify-send");
            cmd.arg("--app-name")
                .arg(&self.app_name)
                .arg(title)
                .arg(message);
            cmd
        }
    }
}

#[async_trait]
impl DesktopService for SystemDesktopService {
    async fn show(&self, title: &str, message: &str) -> Result<(), NotificationError> {
        debug!("Showing desktop notification '{}'", title);

        let output = tokio::time::timeout(self.timeout, self.command(title, message).output())
            .await
            .map_err(|_| NotificationError::Desktop("notifier command timed out".to_string()))?
            .map_err(|e| NotificationError::Desktop(e.to_string()))?;

        if !output.status.success() {
            return Err(NotificationError::Desktop(format!(
                "notifier exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(())
    }
}

/// Desktop service that only logs, for headless machines
pub struct LogOnlyDesktopService;

#[async_trait]
impl DesktopService for LogOnlyDesktopService {
    async fn show(&self, title: &str, message: &str) -> Result<(), NotificationError> {
        info!("🖥️ [DESKTOP] {}: {}", title, message);
        Ok(())
    }
}

fn escape_quotes(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_quotes() {
        assert_eq!(escape_quotes(r#"Site "22B" ready"#), r#"Site \"22B\" ready"#);
    }

    #[tokio::test]
    async fn test_log_only_service_never_fails() {
        assert!(LogOnlyDesktopService.show("Auto-Booker", "hi").await.is_ok());
    }
}
