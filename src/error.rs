use thiserror::Error;

use crate::common::Label;
use crate::pipeline::mode::Mode;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("Failed to load model: {0}")]
    ModelLoad(String),
    #[error("Not ready: {0}")]
    NotReady(String),
    #[error("No examples recorded for label '{missing}', train it before running inference")]
    NotTrained { missing: Label },
    #[error("Failed to acquire frame: {0}")]
    FrameAcquisition(String),
    #[error("Failed to compute embedding: {0}")]
    Embedding(String),
    #[error("Session is busy ({active})")]
    Busy { active: Mode },
    #[error("Background task failed: {0}")]
    Task(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Image Error: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Failures scoped to a single capture cycle; the long-running loop may
    /// carry on after one of these.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::FrameAcquisition(_)
                | AppError::Embedding(_)
                | AppError::Image(_)
                | AppError::Io(_)
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_cycle_failures_are_transient() {
        assert!(AppError::FrameAcquisition("gone".into()).is_transient());
        assert!(AppError::Embedding("nan".into()).is_transient());
        assert!(!AppError::DeviceUnavailable("no camera".into()).is_transient());
        assert!(!AppError::NotTrained {
            missing: Label::Touched
        }
        .is_transient());
        assert!(!AppError::Busy { active: Mode::Inferring }.is_transient());
    }

    #[test]
    fn not_trained_names_the_label() {
        let err = AppError::NotTrained {
            missing: Label::NotTouched,
        };
        assert!(err.to_string().contains("not_touch"));
    }
}
