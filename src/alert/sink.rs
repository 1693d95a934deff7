use std::time::Duration;
use tokio::sync::oneshot;

/// Resolves when the alert sound finishes. A dropped sender also counts as
/// finished.
pub type PlaybackDone = oneshot::Receiver<()>;

/// Platform audio and notification primitives. All calls are non-blocking.
pub trait NotificationSink: Send + Sync {
    /// Minimum spacing between two shown notifications.
    fn configure(&self, cooldown: Duration);
    /// Best effort; may silently do nothing.
    fn notify(&self, title: &str, body: &str);
    fn play_alert(&self) -> PlaybackDone;
}
