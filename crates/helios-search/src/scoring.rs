//! Scoring observed states against an instruction and selecting sub-goal
//! candidates.

use serde::{Deserialize, Serialize};

use helios_core::error::HeliosResult;
use helios_core::traits::SimilarityMeasure;
use helios_core::types::{Embedding, Observation};
use helios_experience::ObservedStateRegistry;

use crate::feedback::FeedbackLayer;

/// Slack allowed outside `[-1, 1]` before a score counts as divergent.
pub const COSINE_RANGE_TOLERANCE: f32 = 1e-4;

/// Similarity of one observed state to the instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateScore {
    /// The observed state.
    pub observation: Observation,
    /// Mean pairwise similarity, feedback layer applied.
    pub similarity: f32,
}

/// How the candidate list was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionKind {
    /// At least one state reached the threshold; candidates are those that did.
    Accept,
    /// No state reached the threshold; candidates are those within
    /// `threshold * max` of the best.
    Fallback,
}

/// Candidate sub-goals from one scoring pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Which rule produced the candidates.
    pub kind: SelectionKind,
    /// Candidates in registry order.
    pub candidates: Vec<StateScore>,
}

/// Mean of `measure(state_sentence + layer, instruction_sentence)` over every
/// sentence pair. `0.0` when either side has no sentences.
///
/// # Errors
///
/// Returns [`HeliosError::DimensionMismatch`](helios_core::HeliosError::DimensionMismatch)
/// if a state sentence does not match the layer's dimension.
#[allow(clippy::cast_precision_loss)]
pub fn mean_similarity(
    instruction: &[Embedding],
    state: &[Embedding],
    layer: &FeedbackLayer,
    measure: &dyn SimilarityMeasure,
) -> HeliosResult<f32> {
    let pairs = instruction.len() * state.len();
    if pairs == 0 {
        return Ok(0.0);
    }
    let mut total = 0.0_f32;
    for sentence in state {
        let shifted = layer.shift(sentence)?;
        for target in instruction {
            total += measure.similarity(&shifted, target);
        }
    }
    Ok(total / pairs as f32)
}

/// Whether `value` is a usable cosine score.
#[must_use]
pub fn within_cosine_range(value: f32) -> bool {
    value.is_finite()
        && (-1.0 - COSINE_RANGE_TOLERANCE..=1.0 + COSINE_RANGE_TOLERANCE).contains(&value)
}

// ─── Score Board ─────────────────────────────────────────────────────────────

/// Scores of every registered state from one scoring pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBoard {
    scores: Vec<StateScore>,
    best: Option<usize>,
}

impl ScoreBoard {
    /// Score every state in `registry`, in registry order.
    ///
    /// # Errors
    ///
    /// Propagates dimension mismatches from [`mean_similarity`].
    pub fn score(
        registry: &ObservedStateRegistry,
        instruction: &[Embedding],
        layer: &FeedbackLayer,
        measure: &dyn SimilarityMeasure,
    ) -> HeliosResult<Self> {
        let mut scores = Vec::with_capacity(registry.len());
        for (observation, state) in registry.iter() {
            let similarity = mean_similarity(instruction, state, layer, measure)?;
            scores.push(StateScore {
                observation,
                similarity,
            });
        }
        Ok(Self::from_scores(scores))
    }

    /// Build a board from precomputed scores.
    #[must_use]
    pub fn from_scores(scores: Vec<StateScore>) -> Self {
        let mut best: Option<usize> = None;
        for (idx, score) in scores.iter().enumerate() {
            // Strict comparison: the earliest state wins ties.
            if best.is_none_or(|b| score.similarity > scores[b].similarity) {
                best = Some(idx);
            }
        }
        Self { scores, best }
    }

    /// All scores in registry order.
    #[must_use]
    pub fn scores(&self) -> &[StateScore] {
        &self.scores
    }

    /// Highest-scoring state.
    #[must_use]
    pub fn best(&self) -> Option<&StateScore> {
        self.best.map(|idx| &self.scores[idx])
    }

    /// Highest similarity, `None` for an empty board.
    #[must_use]
    pub fn max_similarity(&self) -> Option<f32> {
        self.best().map(|score| score.similarity)
    }

    /// Whether any score is non-finite or the maximum leaves the cosine range.
    #[must_use]
    pub fn diverged(&self) -> bool {
        self.scores.iter().any(|s| !s.similarity.is_finite())
            || self.max_similarity().is_some_and(|max| !within_cosine_range(max))
    }

    /// Median similarity over all states (mean of the middle pair for even
    /// counts).
    #[must_use]
    pub fn median_similarity(&self) -> Option<f32> {
        let mut values: Vec<f32> = self.scores.iter().map(|s| s.similarity).collect();
        if values.is_empty() {
            return None;
        }
        values.sort_by(f32::total_cmp);
        let mid = values.len() / 2;
        if values.len() % 2 == 0 {
            Some(f32::midpoint(values[mid - 1], values[mid]))
        } else {
            Some(values[mid])
        }
    }

    /// Candidate sub-goals for `threshold`.
    ///
    /// `None` for an empty board.
    #[must_use]
    pub fn select(&self, threshold: f32) -> Option<Selection> {
        let max = self.max_similarity()?;
        let (kind, cutoff) = if max >= threshold {
            (SelectionKind::Accept, threshold)
        } else {
            (SelectionKind::Fallback, threshold * max)
        };
        let candidates = self
            .scores
            .iter()
            .filter(|score| score.similarity >= cutoff)
            .cloned()
            .collect();
        Some(Selection { kind, candidates })
    }
}
