use catalog_core::{DownloadRequest, DownloadTrigger, Notification, NotificationKind, NotificationSink};
use tokio::sync::mpsc;
use tracing::warn;

/// Prints notifications to stderr so stdout stays machine-readable.
pub struct ConsoleNotifier;

impl NotificationSink for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Success => {
                eprintln!("{}: {}", notification.title, notification.message)
            }
            NotificationKind::Error => {
                eprintln!("error: {}: {}", notification.title, notification.message)
            }
        }
    }
}

/// Hands accepted downloads to the main task, which performs the transfer.
pub struct ChannelDownloads {
    tx: mpsc::UnboundedSender<DownloadRequest>,
}

impl ChannelDownloads {
    pub fn new(tx: mpsc::UnboundedSender<DownloadRequest>) -> Self {
        Self { tx }
    }
}

impl DownloadTrigger for ChannelDownloads {
    fn begin_download(&self, request: DownloadRequest) {
        if let Err(err) = self.tx.send(request) {
            warn!(item_id = %err.0.item_id, "download: receiver closed, transfer dropped");
        }
    }
}
