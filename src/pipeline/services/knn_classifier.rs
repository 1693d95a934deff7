use indexmap::IndexMap;
use tracing::debug;

use crate::common::Label;
use crate::error::AppError;
use crate::pipeline::types::{ClassificationResult, Embedding};

/// Accumulates labelled embeddings and predicts the label of new ones.
pub trait ExampleStore: Send + Sync {
    fn add_example(&mut self, embedding: Embedding, label: Label) -> Result<(), AppError>;
    fn predict_class(&self, embedding: Embedding) -> Result<ClassificationResult, AppError>;
    fn example_count(&self, label: Label) -> usize;
    fn clear_label(&mut self, label: Label);
    fn clear_all(&mut self);

    fn total_examples(&self) -> usize {
        Label::ALL.iter().map(|l| self.example_count(*l)).sum()
    }
}

/// Cosine-similarity k-nearest-neighbour store.
pub struct KnnClassifier {
    k: usize,
    examples: IndexMap<Label, Vec<Embedding>>,
    dim: Option<usize>,
}

impl KnnClassifier {
    pub fn new(k: usize) -> Self {
        Self {
            k: k.max(1),
            examples: IndexMap::new(),
            dim: None,
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    fn check_dim(&self, embedding: &Embedding) -> Result<(), AppError> {
        match self.dim {
            Some(dim) if dim != embedding.dim() => Err(AppError::Embedding(format!(
                "embedding has {} dimensions, store holds {}",
                embedding.dim(),
                dim
            ))),
            _ => Ok(()),
        }
    }
}

impl ExampleStore for KnnClassifier {
    fn add_example(&mut self, embedding: Embedding, label: Label) -> Result<(), AppError> {
        self.check_dim(&embedding)?;
        self.dim = Some(embedding.dim());
        self.examples.entry(label).or_default().push(embedding);
        Ok(())
    }

    fn predict_class(&self, embedding: Embedding) -> Result<ClassificationResult, AppError> {
        if self.total_examples() == 0 {
            return Err(AppError::NotTrained {
                missing: Label::ALL[0],
            });
        }
        self.check_dim(&embedding)?;

        let mut neighbours: Vec<(f32, Label)> = self
            .examples
            .iter()
            .flat_map(|(label, stored)| stored.iter().map(|e| (embedding.cosine(e), *label)))
            .collect();
        neighbours.sort_by(|a, b| b.0.total_cmp(&a.0));

        let k = self.k.min(neighbours.len());
        let mut votes: IndexMap<Label, usize> = Label::ALL
            .iter()
            .filter(|l| self.example_count(**l) > 0)
            .map(|l| (*l, 0))
            .collect();
        for (_, label) in neighbours.iter().take(k) {
            *votes.entry(*label).or_default() += 1;
        }

        let best = votes.values().copied().max().unwrap_or(0);
        let nearest = neighbours[0].1;
        // Ties go to the label of the single closest example.
        let label = if votes.get(&nearest).copied() == Some(best) {
            nearest
        } else {
            votes
                .iter()
                .find(|(_, v)| **v == best)
                .map(|(l, _)| *l)
                .unwrap_or(nearest)
        };

        let confidences = votes
            .into_iter()
            .map(|(l, v)| (l, v as f32 / k as f32))
            .collect();
        debug!("kNN vote over {} neighbours: {}", k, label);
        Ok(ClassificationResult::new(label, confidences))
    }

    fn example_count(&self, label: Label) -> usize {
        self.examples.get(&label).map(Vec::len).unwrap_or(0)
    }

    fn clear_label(&mut self, label: Label) {
        self.examples.shift_remove(&label);
        if self.examples.values().all(Vec::is_empty) {
            self.dim = None;
        }
    }

    fn clear_all(&mut self) {
        self.examples.clear();
        self.dim = None;
    }
}
