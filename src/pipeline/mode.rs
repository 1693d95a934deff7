use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::common::Label;
use crate::error::AppError;

/// What currently owns the camera and the example store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Idle,
    Training(Label),
    Inferring,
    Resetting,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Idle => f.write_str("idle"),
            Mode::Training(label) => write!(f, "training {}", label),
            Mode::Inferring => f.write_str("inferring"),
            Mode::Resetting => f.write_str("resetting"),
        }
    }
}

/// Serialises training, inference and resets. Entering any mode other than
/// `Idle` succeeds only from `Idle`.
#[derive(Clone)]
pub struct ModeLock {
    current: Arc<Mutex<Mode>>,
}

impl ModeLock {
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(Mode::Idle)),
        }
    }

    pub fn current(&self) -> Mode {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn try_enter(&self, mode: Mode) -> Result<ModeGuard, AppError> {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if *current != Mode::Idle {
            return Err(AppError::Busy { active: *current });
        }
        *current = mode;
        Ok(ModeGuard {
            current: Arc::clone(&self.current),
            mode,
        })
    }
}

impl Default for ModeLock {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the lock to `Idle` when dropped.
pub struct ModeGuard {
    current: Arc<Mutex<Mode>>,
    mode: Mode,
}

impl ModeGuard {
    pub fn mode(&self) -> Mode {
        self.mode
    }
}

impl Drop for ModeGuard {
    fn drop(&mut self) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Mode::Idle;
    }
}
