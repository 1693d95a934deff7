use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::common::Frame;
use crate::config::CameraSettings;
use crate::error::AppError;
use crate::intake::frame_source::FrameSource;

/// Reads the latest frame from an image file that an external grabber keeps
/// overwriting, e.g.
/// `ffmpeg -f v4l2 -i /dev/video0 -update 1 -r 10 snapshot.jpg`.
pub struct SnapshotSource {
    path: PathBuf,
    poll_interval: Duration,
    open_timeout: Duration,
    opened: bool,
}

impl SnapshotSource {
    pub fn new(settings: &CameraSettings) -> Self {
        Self {
            path: settings.snapshot_path.clone(),
            poll_interval: settings.poll_interval(),
            open_timeout: settings.open_timeout(),
            opened: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_frame(&self) -> Result<Frame, AppError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            AppError::FrameAcquisition(format!("{}: {}", self.path.display(), e))
        })?;
        // The grabber may be halfway through a write; that shows up as a
        // decode error and only costs this one sample.
        let image = image::load_from_memory(&bytes).map_err(|e| {
            AppError::FrameAcquisition(format!("{}: {}", self.path.display(), e))
        })?;
        Ok(Frame::capture(image))
    }
}

#[async_trait]
impl FrameSource for SnapshotSource {
    async fn open(&mut self) -> Result<(), AppError> {
        let deadline = Instant::now() + self.open_timeout;
        loop {
            match self.read_frame().await {
                Ok(frame) => {
                    info!(
                        "Camera feed open at {} ({}x{})",
                        self.path.display(),
                        frame.image().width(),
                        frame.image().height()
                    );
                    self.opened = true;
                    return Ok(());
                }
                Err(e) if Instant::now() >= deadline => {
                    warn!("Camera feed never produced a frame: {}", e);
                    return Err(AppError::DeviceUnavailable(format!(
                        "no frame at {} after {:?}",
                        self.path.display(),
                        self.open_timeout
                    )));
                }
                Err(e) => {
                    debug!("Waiting for first frame: {}", e);
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    async fn acquire(&mut self) -> Result<Frame, AppError> {
        if !self.opened {
            return Err(AppError::NotReady("camera feed is not open".into()));
        }
        self.read_frame().await
    }

    fn is_open(&self) -> bool {
        self.opened
    }

    fn name(&self) -> &'static str {
        "SnapshotSource"
    }
}
