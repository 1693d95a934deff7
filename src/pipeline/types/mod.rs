mod classification;
mod embedding;

pub use classification::{evaluate, ClassificationResult, Decision};
pub use embedding::Embedding;
