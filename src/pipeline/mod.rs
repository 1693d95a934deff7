pub mod inference;
pub mod metrics;
pub mod mode;
pub mod resources;
pub mod services;
pub mod training;
pub mod types;

pub use inference::{CycleOutcome, InferenceLoop, LoopExit};
pub use metrics::LoopStats;
pub use mode::{Mode, ModeGuard, ModeLock};
pub use resources::Resources;
pub use training::{TrainingController, TrainingProgress, TrainingReport};
pub use types::{evaluate, ClassificationResult, Decision, Embedding};
