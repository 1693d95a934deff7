//! Scripted collaborators and synthetic frames for unit tests.

use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

use crate::alert::{NotificationSink, PlaybackDone};
use crate::common::Frame;
use crate::error::AppError;
use crate::intake::FrameSource;
use crate::pipeline::services::EmbeddingProvider;
use crate::pipeline::types::Embedding;

const BACKGROUND: Rgb<u8> = Rgb([70, 80, 90]);
const SKIN: Rgb<u8> = Rgb([225, 172, 140]);

/// Plain background, nothing near the face.
pub fn hand_off_frame() -> Frame {
    Frame::capture(DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, BACKGROUND)))
}

/// Same background with a skin-coloured block over the centre.
pub fn hand_on_frame() -> Frame {
    let mut image = RgbImage::from_pixel(64, 64, BACKGROUND);
    for y in 16..48 {
        for x in 16..48 {
            image.put_pixel(x, y, SKIN);
        }
    }
    Frame::capture(DynamicImage::ImageRgb8(image))
}

#[derive(Default)]
struct FeedState {
    current: Option<Frame>,
    fail_next: usize,
    fail_after: Option<usize>,
    acquired: usize,
}

/// Handle for changing what a [`ScriptedFrameSource`] shows while it is owned
/// by the code under test.
#[derive(Clone)]
pub struct FeedControl {
    state: Arc<Mutex<FeedState>>,
}

impl FeedControl {
    pub fn show(&self, frame: Frame) {
        self.state.lock().unwrap().current = Some(frame);
    }

    /// The next `n` acquisitions fail.
    pub fn fail_next(&self, n: usize) {
        self.state.lock().unwrap().fail_next = n;
    }

    /// Every acquisition after the next `n` successful ones fails.
    pub fn fail_after(&self, n: usize) {
        let mut state = self.state.lock().unwrap();
        let acquired = state.acquired;
        state.fail_after = Some(acquired + n);
    }

    /// Number of acquire calls, failed ones included.
    pub fn acquired(&self) -> usize {
        self.state.lock().unwrap().acquired
    }
}

pub struct ScriptedFrameSource {
    state: Arc<Mutex<FeedState>>,
    available: bool,
    opened: bool,
}

impl ScriptedFrameSource {
    pub fn repeating(frame: Frame) -> Self {
        Self {
            state: Arc::new(Mutex::new(FeedState {
                current: Some(frame),
                ..FeedState::default()
            })),
            available: true,
            opened: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            state: Arc::new(Mutex::new(FeedState::default())),
            available: false,
            opened: false,
        }
    }

    pub fn control(&self) -> FeedControl {
        FeedControl {
            state: self.state.clone(),
        }
    }
}

#[async_trait]
impl FrameSource for ScriptedFrameSource {
    async fn open(&mut self) -> Result<(), AppError> {
        if !self.available {
            return Err(AppError::DeviceUnavailable("scripted: no camera".into()));
        }
        self.opened = true;
        Ok(())
    }

    async fn acquire(&mut self) -> Result<Frame, AppError> {
        if !self.opened {
            return Err(AppError::NotReady("scripted feed not open".into()));
        }
        let mut state = self.state.lock().unwrap();
        let index = state.acquired;
        state.acquired += 1;
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(AppError::FrameAcquisition("scripted failure".into()));
        }
        if matches!(state.fail_after, Some(limit) if index >= limit) {
            return Err(AppError::FrameAcquisition("scripted failure".into()));
        }
        state
            .current
            .clone()
            .ok_or_else(|| AppError::FrameAcquisition("scripted feed is dark".into()))
    }

    fn is_open(&self) -> bool {
        self.opened
    }

    fn name(&self) -> &'static str {
        "ScriptedFrameSource"
    }
}

/// 4x4 RGB thumbnail, no normalisation.
pub struct FixedEmbedder {
    loaded: bool,
    fail_load: bool,
}

impl FixedEmbedder {
    pub fn new() -> Self {
        Self {
            loaded: false,
            fail_load: false,
        }
    }

    pub fn broken() -> Self {
        Self {
            loaded: false,
            fail_load: true,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FixedEmbedder {
    async fn load(&mut self) -> Result<(), AppError> {
        if self.fail_load {
            return Err(AppError::ModelLoad("scripted: weights missing".into()));
        }
        self.loaded = true;
        Ok(())
    }

    async fn infer(&self, frame: &Frame) -> Result<Embedding, AppError> {
        if !self.loaded {
            return Err(AppError::NotReady("scripted embedder not loaded".into()));
        }
        let values = frame
            .image()
            .resize_exact(4, 4, FilterType::Nearest)
            .to_rgb8()
            .into_raw()
            .into_iter()
            .map(|p| p as f32 / 255.0)
            .collect();
        Ok(Embedding::new(values))
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn name(&self) -> &'static str {
        "FixedEmbedder"
    }
}

/// Records every call. Playback never finishes until the test says so.
pub struct RecordingSink {
    plays: AtomicUsize,
    notifications: Mutex<Vec<(String, String)>>,
    pending: Mutex<Vec<oneshot::Sender<()>>>,
    cooldown: Mutex<Option<Duration>>,
}

impl RecordingSink {
    pub fn held() -> Self {
        Self {
            plays: AtomicUsize::new(0),
            notifications: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            cooldown: Mutex::new(None),
        }
    }

    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    pub fn notifications(&self) -> Vec<(String, String)> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn cooldown(&self) -> Option<Duration> {
        *self.cooldown.lock().unwrap()
    }

    /// Completes every playback still in flight.
    pub fn finish_all(&self) {
        for done in self.pending.lock().unwrap().drain(..) {
            let _ = done.send(());
        }
    }

    /// Completes the earliest playback still in flight.
    pub fn finish_oldest(&self) {
        let mut pending = self.pending.lock().unwrap();
        if !pending.is_empty() {
            let _ = pending.remove(0).send(());
        }
    }

    /// Drops every in-flight playback without completing it.
    pub fn drop_all(&self) {
        self.pending.lock().unwrap().clear();
    }

    /// Yields to the runtime until `condition` holds.
    pub async fn wait_until(&self, condition: impl Fn() -> bool) {
        for _ in 0..1000 {
            if condition() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition not reached");
    }
}

impl NotificationSink for RecordingSink {
    fn configure(&self, cooldown: Duration) {
        *self.cooldown.lock().unwrap() = Some(cooldown);
    }

    fn notify(&self, title: &str, body: &str) {
        self.notifications
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
    }

    fn play_alert(&self) -> PlaybackDone {
        self.plays.fetch_add(1, Ordering::SeqCst);
        let (done_tx, done_rx) = oneshot::channel();
        self.pending.lock().unwrap().push(done_tx);
        done_rx
    }
}
