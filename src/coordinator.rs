use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::alert::{AlertGate, AlertMessage, ConsoleSink, GateState, NotificationSink};
use crate::common::Label;
use crate::config::Settings;
use crate::error::AppError;
use crate::intake::{FrameSource, SnapshotSource};
use crate::pipeline::services::{EmbeddingProvider, ExampleStore, KnnClassifier, ThumbnailEncoder};
use crate::pipeline::{
    InferenceLoop, LoopExit, LoopStats, Mode, ModeLock, Resources, TrainingController,
    TrainingProgress, TrainingReport,
};

struct InferenceTask {
    cancel_token: CancellationToken,
    handle: JoinHandle<Result<LoopExit, AppError>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub initialized: bool,
    pub mode: Mode,
    pub gate: GateState,
    pub touched: bool,
    pub examples: Vec<(Label, usize)>,
    pub inference: LoopStats,
    pub alerts_suppressed: u64,
}

/// One monitoring session: the shared camera/encoder/store plus the training
/// and inference drivers built on top of them.
pub struct Session {
    settings: Settings,
    resources: Arc<Resources>,
    sink: Arc<dyn NotificationSink>,
    gate: Arc<AlertGate>,
    training: TrainingController,
    inference: Arc<InferenceLoop>,
    mode: ModeLock,
    initialized: AtomicBool,
    inference_task: Mutex<Option<InferenceTask>>,
}

impl Session {
    pub fn builder(settings: Settings) -> SessionBuilder {
        SessionBuilder::new(settings)
    }

    /// Opens the camera, loads the encoder and configures notifications.
    /// Nothing else works until this succeeds.
    pub async fn init(&self) -> Result<(), AppError> {
        info!("init...");
        self.resources.open().await?;
        self.sink.configure(self.settings.notification.cooldown());
        self.initialized.store(true, Ordering::Release);
        info!("Setup done. Keep your hands off your face and train 'off' first");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn ensure_initialized(&self) -> Result<(), AppError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(AppError::NotReady("session has not been initialized".into()))
        }
    }

    pub async fn train(&self, label: Label) -> Result<TrainingReport, AppError> {
        self.ensure_initialized()?;
        let _guard = self.mode.try_enter(Mode::Training(label))?;
        self.training.train(label).await
    }

    /// Spawns the inference loop. Fails fast when either label is untrained
    /// or another operation holds the session.
    pub async fn start_inference(&self) -> Result<(), AppError> {
        self.ensure_initialized()?;
        if let Some(missing) = self.resources.missing_label().await {
            return Err(AppError::NotTrained { missing });
        }
        let guard = self.mode.try_enter(Mode::Inferring)?;

        let cancel_token = CancellationToken::new();
        let inference = self.inference.clone();
        let token = cancel_token.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            inference.run(token).await
        });

        let previous = self
            .inference_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(InferenceTask {
                cancel_token,
                handle,
            });
        if let Some(previous) = previous {
            // Only a loop that already ended can be replaced; the mode lock
            // rejects a second live one.
            previous.cancel_token.cancel();
        }
        Ok(())
    }

    /// Cancels the running loop and waits for it. `None` when nothing was
    /// running.
    pub async fn stop_inference(&self) -> Result<Option<LoopExit>, AppError> {
        let task = self
            .inference_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        match task {
            Some(task) => {
                task.cancel_token.cancel();
                let exit = task
                    .handle
                    .await
                    .map_err(|e| AppError::Task(e.to_string()))??;
                Ok(Some(exit))
            }
            None => Ok(None),
        }
    }

    pub fn is_inferring(&self) -> bool {
        self.mode.current() == Mode::Inferring
    }

    pub async fn reset_label(&self, label: Label) -> Result<(), AppError> {
        self.ensure_initialized()?;
        let _guard = self.mode.try_enter(Mode::Resetting)?;
        self.resources.clear_label(label).await;
        info!("[{}] Examples cleared", label);
        Ok(())
    }

    pub async fn reset(&self) -> Result<(), AppError> {
        self.ensure_initialized()?;
        let _guard = self.mode.try_enter(Mode::Resetting)?;
        self.resources.clear_all().await;
        info!("All examples cleared");
        Ok(())
    }

    pub fn touched(&self) -> watch::Receiver<bool> {
        self.inference.touched()
    }

    pub fn progress(&self) -> watch::Receiver<TrainingProgress> {
        self.training.progress()
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    pub fn mode(&self) -> Mode {
        self.mode.current()
    }

    pub async fn status(&self) -> SessionStatus {
        let mut examples = Vec::with_capacity(Label::ALL.len());
        for label in Label::ALL {
            examples.push((label, self.resources.example_count(label).await));
        }
        SessionStatus {
            initialized: self.is_initialized(),
            mode: self.mode.current(),
            gate: self.gate.state(),
            touched: *self.inference.touched().borrow(),
            examples,
            inference: self.inference.stats(),
            alerts_suppressed: self.gate.alerts_suppressed(),
        }
    }

    pub fn stop(&self) {
        if let Some(task) = self
            .inference_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            task.cancel_token.cancel();
            task.handle.abort();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct SessionBuilder {
    settings: Settings,
    frame_source: Option<Box<dyn FrameSource>>,
    embedder: Option<Box<dyn EmbeddingProvider>>,
    store: Option<Box<dyn ExampleStore>>,
    sink: Option<Arc<dyn NotificationSink>>,
}

impl SessionBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            frame_source: None,
            embedder: None,
            store: None,
            sink: None,
        }
    }

    // Replaces the snapshot camera built from the settings.
    pub fn frame_source(mut self, frame_source: Box<dyn FrameSource>) -> Self {
        self.frame_source = Some(frame_source);
        self
    }

    // Replaces the thumbnail encoder built from the settings.
    pub fn embedder(mut self, embedder: Box<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    // Replaces the kNN store built from the settings.
    pub fn store(mut self, store: Box<dyn ExampleStore>) -> Self {
        self.store = Some(store);
        self
    }

    // Replaces the console sink built from the settings.
    pub fn sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<Session, AppError> {
        self.settings.validate()?;
        let settings = self.settings;

        let frame_source = self
            .frame_source
            .unwrap_or_else(|| Box::new(SnapshotSource::new(&settings.camera)));
        let embedder = self
            .embedder
            .unwrap_or_else(|| Box::new(ThumbnailEncoder::new(&settings.encoder)));
        let store = self
            .store
            .unwrap_or_else(|| Box::new(KnnClassifier::new(settings.classifier.k)));
        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(ConsoleSink::new(&settings.notification)));

        let resources = Arc::new(Resources::new(frame_source, embedder, store));
        let gate = Arc::new(AlertGate::new(
            sink.clone(),
            AlertMessage {
                title: settings.notification.title.clone(),
                body: settings.notification.body.clone(),
            },
        ));
        let training = TrainingController::new(resources.clone(), settings.training.clone());
        let inference = Arc::new(InferenceLoop::new(
            resources.clone(),
            gate.clone(),
            settings.inference.clone(),
        ));

        Ok(Session {
            settings,
            resources,
            sink,
            gate,
            training,
            inference,
            mode: ModeLock::new(),
            initialized: AtomicBool::new(false),
            inference_task: Mutex::new(None),
        })
    }
}
