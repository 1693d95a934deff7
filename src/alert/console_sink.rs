use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::alert::sink::{NotificationSink, PlaybackDone};
use crate::config::NotificationSettings;

/// Terminal stand-in for the platform sound and notification APIs: rings the
/// bell, prints the notification and reports playback finished after a fixed
/// alert duration.
pub struct ConsoleSink {
    alert_duration: Duration,
    cooldown: Mutex<Duration>,
    last_shown: Mutex<Option<Instant>>,
    shown: AtomicU64,
    played: AtomicU64,
}

impl ConsoleSink {
    pub fn new(settings: &NotificationSettings) -> Self {
        Self {
            alert_duration: settings.alert_duration(),
            cooldown: Mutex::new(settings.cooldown()),
            last_shown: Mutex::new(None),
            shown: AtomicU64::new(0),
            played: AtomicU64::new(0),
        }
    }

    pub fn notifications_shown(&self) -> u64 {
        self.shown.load(Ordering::Relaxed)
    }

    pub fn alerts_played(&self) -> u64 {
        self.played.load(Ordering::Relaxed)
    }

    fn within_cooldown(&self, now: Instant) -> bool {
        let cooldown = *self.cooldown.lock().unwrap_or_else(|e| e.into_inner());
        let mut last = self.last_shown.lock().unwrap_or_else(|e| e.into_inner());
        match *last {
            Some(at) if now.duration_since(at) < cooldown => true,
            _ => {
                *last = Some(now);
                false
            }
        }
    }
}

impl NotificationSink for ConsoleSink {
    fn configure(&self, cooldown: Duration) {
        *self.cooldown.lock().unwrap_or_else(|e| e.into_inner()) = cooldown;
        debug!("Notification cooldown set to {:?}", cooldown);
    }

    fn notify(&self, title: &str, body: &str) {
        if self.within_cooldown(Instant::now()) {
            debug!("Notification '{}' dropped inside cooldown", title);
            return;
        }
        self.shown.fetch_add(1, Ordering::Relaxed);
        warn!("{} - {}", title, body);
    }

    fn play_alert(&self) -> PlaybackDone {
        let (done_tx, done_rx) = oneshot::channel();
        self.played.fetch_add(1, Ordering::Relaxed);

        let mut stderr = std::io::stderr();
        let _ = stderr.write_all(b"\x07");
        let _ = stderr.flush();

        // Without a runtime the sender is dropped here, which the receiver
        // also reads as finished.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let duration = self.alert_duration;
            handle.spawn(async move {
                tokio::time::sleep(duration).await;
                let _ = done_tx.send(());
            });
        }
        done_rx
    }
}
