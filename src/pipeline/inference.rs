use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::alert::AlertGate;
use crate::common::Label;
use crate::config::{FailurePolicy, InferenceSettings};
use crate::error::AppError;
use crate::pipeline::metrics::LoopStats;
use crate::pipeline::resources::Resources;
use crate::pipeline::types::{evaluate, ClassificationResult, Decision};

#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub result: ClassificationResult,
    pub decision: Decision,
    /// False when the cycle was violating but the gate was still cooling.
    pub alert_raised: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopExit {
    pub cycles: u64,
}

/// Continuous capture -> classify -> decide -> alert cycle.
pub struct InferenceLoop {
    resources: Arc<Resources>,
    gate: Arc<AlertGate>,
    settings: InferenceSettings,
    touched_tx: watch::Sender<bool>,
    stats: Arc<Mutex<LoopStats>>,
}

impl InferenceLoop {
    pub fn new(resources: Arc<Resources>, gate: Arc<AlertGate>, settings: InferenceSettings) -> Self {
        let (touched_tx, _) = watch::channel(false);
        Self {
            resources,
            gate,
            settings,
            touched_tx,
            stats: Arc::new(Mutex::new(LoopStats::default())),
        }
    }

    /// The observable "currently violating" flag.
    pub fn touched(&self) -> watch::Receiver<bool> {
        self.touched_tx.subscribe()
    }

    pub fn stats(&self) -> LoopStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// One cycle without the trailing delay.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, AppError> {
        let start = Instant::now();
        let embedding = self.resources.capture_embedding().await?;
        let result = self.resources.classify(embedding).await?;
        debug!("Label: {} Confidences: {:?}", result.label, result.confidences);

        let decision = evaluate(&result, self.settings.confidence_threshold);
        let alert_raised = match decision {
            Decision::Violating => {
                debug!("Touched");
                let raised = self.gate.trigger();
                self.set_touched(true);
                raised
            }
            Decision::Clear => {
                debug!("Not touched");
                self.set_touched(false);
                false
            }
        };

        self.stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record_cycle(
                decision,
                result.confidence(Label::ALERT),
                alert_raised,
                start.elapsed(),
            );

        Ok(CycleOutcome {
            result,
            decision,
            alert_raised,
        })
    }

    /// Runs cycles until `cancel` fires or a failure ends the loop. The token
    /// is checked before every capture and raced against the delay.
    pub async fn run(&self, cancel: CancellationToken) -> Result<LoopExit, AppError> {
        self.resources.ensure_ready().await?;
        if let Some(missing) = self.resources.missing_label().await {
            return Err(AppError::NotTrained { missing });
        }

        info!(
            "Inference started: threshold {}, every {:?}",
            self.settings.confidence_threshold,
            self.settings.interval()
        );
        let mut cycles = 0u64;
        let exit = loop {
            if cancel.is_cancelled() {
                break Ok(LoopExit { cycles });
            }

            match self.run_cycle().await {
                Ok(_) => cycles += 1,
                Err(e) if e.is_transient() => {
                    if let Some(fatal) = self.on_cycle_failure(e) {
                        break Err(fatal);
                    }
                }
                Err(e) => break Err(e),
            }

            tokio::select! {
                _ = cancel.cancelled() => break Ok(LoopExit { cycles }),
                _ = tokio::time::sleep(self.settings.interval()) => {}
            }
        };

        self.set_touched(false);
        match &exit {
            Ok(exit) => info!("Inference stopped after {} cycles", exit.cycles),
            Err(e) => error!("Inference loop ended: {}", e),
        }
        exit
    }

    /// Returns the error back when the failure should end the loop.
    fn on_cycle_failure(&self, err: AppError) -> Option<AppError> {
        let streak = self
            .stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record_failure();

        match self.settings.failure_policy {
            FailurePolicy::Stop => Some(err),
            FailurePolicy::Continue => {
                let limit = self.settings.max_consecutive_failures;
                if limit > 0 && streak >= limit {
                    error!("{} consecutive cycle failures, giving up", streak);
                    Some(err)
                } else {
                    warn!("Cycle failed ({} in a row): {}", streak, err);
                    None
                }
            }
        }
    }

    fn set_touched(&self, touched: bool) {
        self.touched_tx.send_if_modified(|current| {
            let changed = *current != touched;
            *current = touched;
            changed
        });
    }
}
