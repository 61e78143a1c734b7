//! Core traits for the helios search pipeline.
//!
//! - [`SentenceEncoder`]: text → one embedding per sentence (hash, transformer, ...).
//! - [`SimilarityMeasure`]: pairwise vector similarity used when scoring states.
//!
//! Both are synchronous; the search engine is strictly sequential.

use std::sync::Arc;

use crate::error::HeliosResult;
use crate::types::Embedding;

// ─── Sentence Encoder ───────────────────────────────────────────────────────

/// Maps natural-language text to an ordered sequence of fixed-dimension
/// vectors, one per sentence.
///
/// # Contract
///
/// - `encode()` is deterministic: identical input yields identical output.
/// - Every returned vector has exactly `dimension()` elements.
/// - `encode()` returns at least one vector, even for empty text.
pub trait SentenceEncoder: Send + Sync {
    /// Encode `text` into one embedding per sentence.
    ///
    /// # Errors
    ///
    /// Returns [`crate::HeliosError::EncoderFailed`] if inference fails.
    fn encode(&self, text: &str) -> HeliosResult<Vec<Embedding>>;

    /// Output dimensionality, constant for the lifetime of the encoder.
    fn dimension(&self) -> usize;

    /// A stable identifier for this encoder.
    fn id(&self) -> &str;
}

impl<T: SentenceEncoder + ?Sized> SentenceEncoder for Arc<T> {
    fn encode(&self, text: &str) -> HeliosResult<Vec<Embedding>> {
        (**self).encode(text)
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn id(&self) -> &str {
        (**self).id()
    }
}

impl<T: SentenceEncoder + ?Sized> SentenceEncoder for &T {
    fn encode(&self, text: &str) -> HeliosResult<Vec<Embedding>> {
        (**self).encode(text)
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn id(&self) -> &str {
        (**self).id()
    }
}

// ─── Similarity Measure ─────────────────────────────────────────────────────

/// Pairwise similarity between a (feedback-shifted) state sentence and an
/// instruction sentence.
pub trait SimilarityMeasure: Send + Sync {
    /// Similarity of `state` to `instruction`.
    fn similarity(&self, state: &[f32], instruction: &[f32]) -> f32;

    /// Human-readable measure name for logs.
    fn name(&self) -> &str;
}

/// Cosine similarity, the default measure.
#[derive(Debug, Clone, Copy, Default)]
pub struct CosineSimilarity;

impl SimilarityMeasure for CosineSimilarity {
    fn similarity(&self, state: &[f32], instruction: &[f32]) -> f32 {
        cosine_similarity(state, instruction)
    }

    fn name(&self) -> &str {
        "cosine"
    }
}

// ─── Embedding Utilities ────────────────────────────────────────────────────

/// L2-normalizes a vector to unit length.
///
/// Returns a zero vector if the input has zero norm.
#[must_use]
pub fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm_sq: f32 = vec.iter().map(|x| x * x).sum();
    if !norm_sq.is_finite() || norm_sq < f32::EPSILON {
        return vec![0.0; vec.len()];
    }
    let inv_norm = 1.0 / norm_sq.sqrt();
    vec.iter().map(|x| x * inv_norm).collect()
}

/// Computes cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero norm or the lengths differ.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    // zip would silently truncate mismatched vectors
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    let denom = norm_a * norm_b;
    if !denom.is_finite() || denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}
