use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::common::Label;
use crate::config::TrainingSettings;
use crate::error::AppError;
use crate::pipeline::resources::Resources;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TrainingProgress {
    pub label: Option<Label>,
    pub completed: usize,
    pub total: usize,
}

impl TrainingProgress {
    /// Whole percent, truncated.
    pub fn percent(&self) -> usize {
        if self.total == 0 {
            return 0;
        }
        self.completed * 100 / self.total
    }
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub label: Label,
    pub examples_added: usize,
    pub elapsed: Duration,
}

/// Captures a fixed number of labelled examples, one at a time.
pub struct TrainingController {
    resources: Arc<Resources>,
    settings: TrainingSettings,
    progress_tx: watch::Sender<TrainingProgress>,
}

impl TrainingController {
    pub fn new(resources: Arc<Resources>, settings: TrainingSettings) -> Self {
        let (progress_tx, _) = watch::channel(TrainingProgress::default());
        Self {
            resources,
            settings,
            progress_tx,
        }
    }

    pub fn progress(&self) -> watch::Receiver<TrainingProgress> {
        self.progress_tx.subscribe()
    }

    /// Adds exactly `iterations` examples of `label`. On failure the examples
    /// already added stay in the store.
    pub async fn train(&self, label: Label) -> Result<TrainingReport, AppError> {
        self.resources.ensure_ready().await?;

        let total = self.settings.iterations;
        let interval = self.settings.interval();
        let start = Instant::now();
        info!("[{}] Training {} examples", label, total);
        self.progress_tx.send_replace(TrainingProgress {
            label: Some(label),
            completed: 0,
            total,
        });

        for i in 0..total {
            if let Err(e) = self.sample(label).await {
                warn!("[{}] Training aborted after {} of {} examples: {}", label, i, total, e);
                return Err(e);
            }

            let progress = TrainingProgress {
                label: Some(label),
                completed: i + 1,
                total,
            };
            info!("Progress {}%", progress.percent());
            self.progress_tx.send_replace(progress);

            tokio::time::sleep(interval).await;
        }

        let report = TrainingReport {
            label,
            examples_added: total,
            elapsed: start.elapsed(),
        };
        info!(
            "[{}] Training done: {} examples in {:?}",
            label, report.examples_added, report.elapsed
        );
        Ok(report)
    }

    async fn sample(&self, label: Label) -> Result<(), AppError> {
        let embedding = self.resources.capture_embedding().await?;
        self.resources.add_example(embedding, label).await
    }
}
