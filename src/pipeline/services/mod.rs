pub mod encoder;
pub mod knn_classifier;

pub use encoder::{EmbeddingProvider, ThumbnailEncoder};
pub use knn_classifier::{ExampleStore, KnnClassifier};
