use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AppError;

/// Environment variables with this prefix override file settings, with `__`
/// separating sections, e.g. `HANDSOFF__INFERENCE__CONFIDENCE_THRESHOLD=0.9`.
pub const ENV_PREFIX: &str = "HANDSOFF";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub training: TrainingSettings,
    pub inference: InferenceSettings,
    pub classifier: ClassifierSettings,
    pub encoder: EncoderSettings,
    pub notification: NotificationSettings,
    pub camera: CameraSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    /// Examples captured per training run.
    pub iterations: usize,
    pub interval_ms: u64,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            iterations: 50,
            interval_ms: 100,
        }
    }
}

impl TrainingSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log the failed cycle and keep going.
    Continue,
    /// Exit the loop on the first failed cycle.
    Stop,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    /// A touched prediction must be strictly above this to count as violating.
    pub confidence_threshold: f32,
    pub interval_ms: u64,
    pub failure_policy: FailurePolicy,
    /// 0 disables the limit.
    pub max_consecutive_failures: u32,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.8,
            interval_ms: 200,
            failure_policy: FailurePolicy::Continue,
            max_consecutive_failures: 10,
        }
    }
}

impl InferenceSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub k: usize,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self { k: 3 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EncoderSettings {
    pub thumbnail_size: u32,
    pub grayscale: bool,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            thumbnail_size: 16,
            grayscale: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub title: String,
    pub body: String,
    pub cooldown_ms: u64,
    pub alert_duration_ms: u64,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            title: "Hands off!".to_string(),
            body: "You just touched your face".to_string(),
            cooldown_ms: 3000,
            alert_duration_ms: 1500,
        }
    }
}

impl NotificationSettings {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn alert_duration(&self) -> Duration {
        Duration::from_millis(self.alert_duration_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// File continuously overwritten by an external frame grabber.
    pub snapshot_path: PathBuf,
    pub poll_interval_ms: u64,
    pub open_timeout_ms: u64,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("snapshot.jpg"),
            poll_interval_ms: 50,
            open_timeout_ms: 5000,
        }
    }
}

impl CameraSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }
}

impl Settings {
    /// Layers the optional file and the environment over the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings: Settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.training.iterations == 0 {
            return Err(AppError::Config(
                "training.iterations must be greater than 0".into(),
            ));
        }

        let threshold = self.inference.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(AppError::Config(format!(
                "inference.confidence_threshold must be within [0, 1], got {}",
                threshold
            )));
        }

        if self.classifier.k == 0 {
            return Err(AppError::Config("classifier.k must be greater than 0".into()));
        }

        if self.encoder.thumbnail_size == 0 {
            return Err(AppError::Config(
                "encoder.thumbnail_size must be greater than 0".into(),
            ));
        }

        if self.camera.poll_interval_ms == 0 {
            return Err(AppError::Config(
                "camera.poll_interval_ms must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}
