use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::alert::sink::NotificationSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GateState {
    Armed,
    Cooling,
}

#[derive(Debug, Clone)]
pub struct AlertMessage {
    pub title: String,
    pub body: String,
}

/// Low bit of the packed gate state; set while an alert is playing.
const COOLING: u64 = 1;

/// Debounces alerts: at most one sound and notification per cooldown window.
///
/// `trigger` moves `Armed -> Cooling` and fires the sink. Each window gets a
/// fresh epoch, packed above the cooling bit, and the playback completion of
/// that window only rearms the gate if no newer window has started since.
pub struct AlertGate {
    state: AtomicU64,
    sink: Arc<dyn NotificationSink>,
    message: AlertMessage,
    raised: AtomicU64,
    suppressed: AtomicU64,
}

impl AlertGate {
    pub fn new(sink: Arc<dyn NotificationSink>, message: AlertMessage) -> Self {
        Self {
            state: AtomicU64::new(0),
            sink,
            message,
            raised: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> GateState {
        if self.state.load(Ordering::Acquire) & COOLING == 0 {
            GateState::Armed
        } else {
            GateState::Cooling
        }
    }

    /// Returns whether a new alert was raised. While cooling this is a no-op.
    pub fn trigger(self: &Arc<Self>) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        let cooling = loop {
            if current & COOLING != 0 {
                self.suppressed.fetch_add(1, Ordering::Relaxed);
                debug!("Alert suppressed, previous alert still playing");
                return false;
            }
            let next = ((current >> 1).wrapping_add(1) << 1) | COOLING;
            match self.state.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break next,
                Err(actual) => current = actual,
            }
        };

        self.raised.fetch_add(1, Ordering::Relaxed);
        info!("Raising alert: {}", self.message.title);
        let done = self.sink.play_alert();
        self.sink.notify(&self.message.title, &self.message.body);

        let gate = Arc::clone(self);
        tokio::spawn(async move {
            if done.await.is_err() {
                debug!("Alert playback ended without a completion signal");
            }
            gate.finish_window(cooling);
        });
        true
    }

    /// Rearms the gate. Calling it while armed changes nothing.
    pub fn on_alert_finished(&self) {
        if self.state.fetch_and(!COOLING, Ordering::AcqRel) & COOLING != 0 {
            debug!("Alert finished, gate rearmed");
        }
    }

    // Rearms only if `cooling` is still the current window.
    fn finish_window(&self, cooling: u64) {
        match self.state.compare_exchange(
            cooling,
            cooling & !COOLING,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => debug!("Alert finished, gate rearmed"),
            Err(_) => debug!("Stale alert completion ignored"),
        }
    }

    pub fn alerts_raised(&self) -> u64 {
        self.raised.load(Ordering::Relaxed)
    }

    pub fn alerts_suppressed(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSink;

    fn gate() -> (Arc<AlertGate>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::held());
        let gate = Arc::new(AlertGate::new(
            sink.clone(),
            AlertMessage {
                title: "Hands off!".into(),
                body: "You just touched your face".into(),
            },
        ));
        (gate, sink)
    }

    #[tokio::test]
    async fn starts_armed() {
        let (gate, _) = gate();
        assert_eq!(gate.state(), GateState::Armed);
    }

    #[tokio::test]
    async fn second_trigger_while_cooling_is_suppressed() {
        let (gate, sink) = gate();
        assert!(gate.trigger());
        assert!(!gate.trigger());

        assert_eq!(gate.state(), GateState::Cooling);
        assert_eq!(sink.plays(), 1);
        assert_eq!(sink.notifications().len(), 1);
        assert_eq!(gate.alerts_suppressed(), 1);
    }

    #[tokio::test]
    async fn finished_playback_rearms_for_a_second_alert() {
        let (gate, sink) = gate();
        assert!(gate.trigger());

        sink.finish_all();
        sink.wait_until(|| gate.state() == GateState::Armed).await;

        assert!(gate.trigger());
        assert_eq!(sink.plays(), 2);
        assert_eq!(gate.alerts_raised(), 2);
    }

    #[tokio::test]
    async fn explicit_finish_rearms_and_is_idempotent() {
        let (gate, sink) = gate();
        gate.on_alert_finished();
        assert_eq!(gate.state(), GateState::Armed);

        gate.trigger();
        gate.on_alert_finished();
        gate.on_alert_finished();
        assert_eq!(gate.state(), GateState::Armed);
        assert_eq!(sink.plays(), 1);
    }

    #[tokio::test]
    async fn late_completion_of_an_earlier_alert_keeps_gate_cooling() {
        let (gate, sink) = gate();
        assert!(gate.trigger());
        gate.on_alert_finished();
        assert!(gate.trigger());

        // The first playback completes while the second is still going.
        sink.finish_oldest();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(gate.state(), GateState::Cooling);
        assert!(!gate.trigger());
        assert_eq!(sink.plays(), 2);

        sink.finish_oldest();
        sink.wait_until(|| gate.state() == GateState::Armed).await;
        assert!(gate.trigger());
        assert_eq!(sink.plays(), 3);
    }

    #[tokio::test]
    async fn dropped_playback_still_rearms() {
        let (gate, sink) = gate();
        gate.trigger();
        sink.drop_all();
        sink.wait_until(|| gate.state() == GateState::Armed).await;
        assert_eq!(gate.state(), GateState::Armed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_triggers_raise_one_alert() {
        let (gate, sink) = gate();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let gate = gate.clone();
                tokio::spawn(async move { gate.trigger() })
            })
            .collect();

        let mut raised = 0;
        for handle in handles {
            if handle.await.unwrap() {
                raised += 1;
            }
        }
        assert_eq!(raised, 1);
        assert_eq!(sink.plays(), 1);
    }
}
