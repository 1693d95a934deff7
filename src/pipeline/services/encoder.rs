use async_trait::async_trait;
use image::imageops::FilterType;
use tracing::{debug, info};

use crate::common::Frame;
use crate::config::EncoderSettings;
use crate::error::AppError;
use crate::pipeline::types::Embedding;

/// Largest thumbnail edge the encoder accepts.
const MAX_THUMBNAIL_SIZE: u32 = 128;

/// Maps a frame to a fixed-length embedding.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn load(&mut self) -> Result<(), AppError>;
    async fn infer(&self, frame: &Frame) -> Result<Embedding, AppError>;
    fn is_loaded(&self) -> bool;
    fn name(&self) -> &'static str;
}

/// Down-samples the frame to a small thumbnail and uses the normalised pixel
/// intensities as the feature vector.
pub struct ThumbnailEncoder {
    size: u32,
    grayscale: bool,
    loaded: bool,
}

impl ThumbnailEncoder {
    pub fn new(settings: &EncoderSettings) -> Self {
        Self {
            size: settings.thumbnail_size,
            grayscale: settings.grayscale,
            loaded: false,
        }
    }

    pub fn dim(&self) -> usize {
        let channels = if self.grayscale { 1 } else { 3 };
        (self.size * self.size) as usize * channels
    }

    // Resizing a full camera frame is CPU-bound; runs on the blocking pool.
    fn pixels(frame: &Frame, size: u32, grayscale: bool) -> Vec<f32> {
        let thumbnail = frame
            .image()
            .resize_exact(size, size, FilterType::Triangle);
        let raw = if grayscale {
            thumbnail.to_luma8().into_raw()
        } else {
            thumbnail.to_rgb8().into_raw()
        };
        raw.into_iter().map(|p| p as f32 / 255.0).collect()
    }
}

#[async_trait]
impl EmbeddingProvider for ThumbnailEncoder {
    async fn load(&mut self) -> Result<(), AppError> {
        if self.size == 0 || self.size > MAX_THUMBNAIL_SIZE {
            return Err(AppError::ModelLoad(format!(
                "thumbnail size {} is outside 1..={}",
                self.size, MAX_THUMBNAIL_SIZE
            )));
        }
        self.loaded = true;
        info!(
            "Thumbnail encoder ready: {}x{} {}, {} dimensions",
            self.size,
            self.size,
            if self.grayscale { "luma" } else { "rgb" },
            self.dim()
        );
        Ok(())
    }

    async fn infer(&self, frame: &Frame) -> Result<Embedding, AppError> {
        if !self.loaded {
            return Err(AppError::NotReady("encoder has not been loaded".into()));
        }

        let (size, grayscale) = (self.size, self.grayscale);
        let shared = frame.clone();
        let mut values =
            tokio::task::spawn_blocking(move || Self::pixels(&shared, size, grayscale))
                .await
                .map_err(|e| AppError::Task(e.to_string()))?;
        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm <= f32::EPSILON || !norm.is_finite() {
            return Err(AppError::Embedding(format!(
                "frame {} has no usable signal",
                frame.id()
            )));
        }
        for v in &mut values {
            *v /= norm;
        }
        debug!("Encoded frame {} into {} values", frame.id(), values.len());
        Ok(Embedding::new(values))
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn name(&self) -> &'static str {
        "ThumbnailEncoder"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{hand_off_frame, hand_on_frame};

    fn settings(size: u32, grayscale: bool) -> EncoderSettings {
        EncoderSettings {
            thumbnail_size: size,
            grayscale,
        }
    }

    #[tokio::test]
    async fn infer_before_load_is_not_ready() {
        let encoder = ThumbnailEncoder::new(&settings(8, false));
        let err = encoder.infer(&hand_off_frame()).await.unwrap_err();
        assert!(matches!(err, AppError::NotReady(_)));
    }

    #[tokio::test]
    async fn rejects_invalid_size_on_load() {
        let mut encoder = ThumbnailEncoder::new(&settings(0, false));
        assert!(matches!(encoder.load().await, Err(AppError::ModelLoad(_))));
        assert!(!encoder.is_loaded());
    }

    #[tokio::test]
    async fn produces_unit_vectors_of_fixed_dimension() {
        let mut encoder = ThumbnailEncoder::new(&settings(8, false));
        encoder.load().await.unwrap();

        let embedding = encoder.infer(&hand_on_frame()).await.unwrap();
        assert_eq!(embedding.dim(), 8 * 8 * 3);
        assert!((embedding.norm() - 1.0).abs() < 1e-4);

        let mut luma = ThumbnailEncoder::new(&settings(8, true));
        luma.load().await.unwrap();
        assert_eq!(luma.infer(&hand_on_frame()).await.unwrap().dim(), 64);
    }

    #[tokio::test]
    async fn separates_hand_on_from_hand_off() {
        let mut encoder = ThumbnailEncoder::new(&settings(16, false));
        encoder.load().await.unwrap();

        let off = encoder.infer(&hand_off_frame()).await.unwrap();
        let off_again = encoder.infer(&hand_off_frame()).await.unwrap();
        let on = encoder.infer(&hand_on_frame()).await.unwrap();

        assert!(off.cosine(&off_again) > off.cosine(&on));
    }

    #[tokio::test]
    async fn encodes_full_size_frames_off_the_runtime_thread() {
        let mut encoder = ThumbnailEncoder::new(&settings(16, true));
        encoder.load().await.unwrap();

        let mut image = image::RgbImage::from_pixel(1280, 720, image::Rgb([40, 40, 40]));
        for x in 0..640 {
            image.put_pixel(x, 360, image::Rgb([250, 250, 250]));
        }
        let frame = Frame::capture(image::DynamicImage::ImageRgb8(image));

        let (a, b) = tokio::join!(encoder.infer(&frame), encoder.infer(&frame));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.dim(), 256);
        assert_eq!(a, b);
        assert!((a.norm() - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn black_frame_has_no_signal() {
        let mut encoder = ThumbnailEncoder::new(&settings(4, false));
        encoder.load().await.unwrap();
        let black = Frame::capture(image::DynamicImage::new_rgb8(32, 32));
        assert!(matches!(
            encoder.infer(&black).await,
            Err(AppError::Embedding(_))
        ));
    }
}
