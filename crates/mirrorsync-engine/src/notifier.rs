//! Completion notifications

use mirrorsync_sync::SyncSummary;
use mirrorsync_types::Result;
use tracing::{info, warn};

/// Default notification title
pub const DEFAULT_TITLE: &str = "Media Sync Completed";

/// Message surfaced to the user once changes were applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Short title
    pub title: String,
    /// Body built from the summary counts
    pub message: String,
}

impl Notification {
    /// Notification for a finished run
    pub fn from_summary<S: Into<String>>(title: S, summary: &SyncSummary) -> Self {
        Self {
            title: title.into(),
            message: summary.notification_message(),
        }
    }
}

/// Sink for completion notifications
pub trait Notifier: Send + Sync {
    /// Deliver `notification`
    fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Notifier that writes to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) -> Result<()> {
        info!("{}: {}", notification.title, notification.message);
        Ok(())
    }
}

/// Deliver a notification without letting a failure escape
pub fn notify_best_effort(notifier: &dyn Notifier, notification: &Notification) {
    if let Err(e) = notifier.notify(notification) {
        warn!("Failed to send notification '{}': {}", notification.title, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirrorsync_types::Error;

    struct FailingNotifier;

    impl Notifier for FailingNotifier {
        fn notify(&self, _notification: &Notification) -> Result<()> {
            Err(Error::other("no notification daemon"))
        }
    }

    #[test]
    fn test_notification_from_summary() {
        let summary = SyncSummary {
            new_files: 2,
            modified_files: 1,
            deleted_files: 0,
            total_size_bytes: 10,
        };

        let notification = Notification::from_summary(DEFAULT_TITLE, &summary);

        assert_eq!(notification.title, "Media Sync Completed");
        assert_eq!(notification.message, "Added: 2, Modified: 1, Deleted: 0");
        assert!(LogNotifier.notify(&notification).is_ok());
    }

    #[test]
    fn test_failed_notification_is_swallowed() {
        let notification = Notification::from_summary("t", &SyncSummary::default());
        notify_best_effort(&FailingNotifier, &notification);
    }
}
