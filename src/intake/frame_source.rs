use async_trait::async_trait;

use crate::common::Frame;
use crate::error::AppError;

/// A live camera feed. `acquire` always yields the most recent sample; no
/// history is queued.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Fails with `DeviceUnavailable` when there is no usable device.
    async fn open(&mut self) -> Result<(), AppError>;
    async fn acquire(&mut self) -> Result<Frame, AppError>;
    fn is_open(&self) -> bool;
    fn name(&self) -> &'static str;
}
