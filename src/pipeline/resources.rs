use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::common::Label;
use crate::error::AppError;
use crate::intake::FrameSource;
use crate::pipeline::services::{EmbeddingProvider, ExampleStore};
use crate::pipeline::types::{ClassificationResult, Embedding};

/// The camera, encoder and example store shared by training and inference.
pub struct Resources {
    source: Mutex<Box<dyn FrameSource>>,
    embedder: RwLock<Box<dyn EmbeddingProvider>>,
    store: Mutex<Box<dyn ExampleStore>>,
}

impl Resources {
    pub fn new(
        source: Box<dyn FrameSource>,
        embedder: Box<dyn EmbeddingProvider>,
        store: Box<dyn ExampleStore>,
    ) -> Self {
        Self {
            source: Mutex::new(source),
            embedder: RwLock::new(embedder),
            store: Mutex::new(store),
        }
    }

    /// Opens the camera, then loads the encoder.
    pub async fn open(&self) -> Result<(), AppError> {
        {
            let mut source = self.source.lock().await;
            if !source.is_open() {
                source.open().await?;
                info!("{} opened", source.name());
            }
        }
        let mut embedder = self.embedder.write().await;
        if !embedder.is_loaded() {
            embedder.load().await?;
            info!("{} loaded", embedder.name());
        }
        Ok(())
    }

    pub async fn ensure_ready(&self) -> Result<(), AppError> {
        if !self.source.lock().await.is_open() {
            return Err(AppError::NotReady("camera feed is not open".into()));
        }
        if !self.embedder.read().await.is_loaded() {
            return Err(AppError::NotReady("embedding model is not loaded".into()));
        }
        Ok(())
    }

    /// Grabs the current frame and encodes it.
    pub async fn capture_embedding(&self) -> Result<Embedding, AppError> {
        let frame = self.source.lock().await.acquire().await?;
        self.embedder.read().await.infer(&frame).await
    }

    pub async fn add_example(&self, embedding: Embedding, label: Label) -> Result<(), AppError> {
        self.store.lock().await.add_example(embedding, label)
    }

    pub async fn classify(&self, embedding: Embedding) -> Result<ClassificationResult, AppError> {
        self.store.lock().await.predict_class(embedding)
    }

    pub async fn example_count(&self, label: Label) -> usize {
        self.store.lock().await.example_count(label)
    }

    /// First label with no examples, if any.
    pub async fn missing_label(&self) -> Option<Label> {
        let store = self.store.lock().await;
        Label::ALL
            .into_iter()
            .find(|label| store.example_count(*label) == 0)
    }

    pub async fn clear_label(&self, label: Label) {
        self.store.lock().await.clear_label(label);
    }

    pub async fn clear_all(&self) {
        self.store.lock().await.clear_all();
    }
}
