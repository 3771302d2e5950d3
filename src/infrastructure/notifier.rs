use crate::domain::ports::{NotificationError, NotificationSink};
use async_trait::async_trait;
use tracing::info;

/// Delivers notifications by logging them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn send(&self, text: &str) -> Result<(), NotificationError> {
        info!(message = text, "Notification sent");
        Ok(())
    }
}
