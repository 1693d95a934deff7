pub mod alert;
pub mod app;
pub mod common;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod intake;
pub mod pipeline;

#[cfg(test)]
mod testing;

pub use common::{Frame, Label};
pub use config::Settings;
pub use coordinator::{Session, SessionBuilder, SessionStatus};
pub use error::AppError;
