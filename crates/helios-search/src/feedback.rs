//! Feedback layer: an additive bias on state embeddings learned from
//! accept/reject verdicts.
//!
//! Before scoring, every state sentence embedding is shifted by the layer. An
//! accepted match pulls the layer towards `instruction - state` for every
//! (state sentence, instruction sentence) pair; a rejected match pushes it
//! away by the same amount, so a reject exactly undoes an accept made with
//! the same embeddings and increment.

use serde::{Deserialize, Serialize};

use helios_core::error::{HeliosError, HeliosResult};
use helios_core::types::Embedding;

/// Direction of a feedback update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarity {
    /// Move state embeddings towards the instruction.
    Reinforce,
    /// Move state embeddings away from the instruction.
    Penalize,
}

impl Polarity {
    const fn sign(self) -> f32 {
        match self {
            Self::Reinforce => 1.0,
            Self::Penalize => -1.0,
        }
    }
}

// ─── Feedback Layer ──────────────────────────────────────────────────────────

/// Bias vector in embedding space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedbackLayer {
    values: Vec<f32>,
}

impl FeedbackLayer {
    /// Zero layer of the given dimension.
    #[must_use]
    pub fn zeros(dimension: usize) -> Self {
        Self {
            values: vec![0.0; dimension],
        }
    }

    /// Wrap existing values.
    #[must_use]
    pub const fn from_values(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Layer values.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Layer dimension.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// `state + layer`, element-wise.
    ///
    /// # Errors
    ///
    /// Returns [`HeliosError::DimensionMismatch`] if `state` has a different
    /// dimension than the layer.
    pub fn shift(&self, state: &[f32]) -> HeliosResult<Embedding> {
        self.check_dimension(state.len())?;
        Ok(state.iter().zip(&self.values).map(|(s, l)| s + l).collect())
    }

    /// Apply one feedback update.
    ///
    /// For every state sentence `s` and instruction sentence `i`:
    /// `layer += sign * increment * (i - s)`.
    ///
    /// # Errors
    ///
    /// Returns [`HeliosError::DimensionMismatch`] if any embedding has a
    /// different dimension than the layer. The layer is left unchanged.
    pub fn apply(
        &mut self,
        instruction: &[Embedding],
        state: &[Embedding],
        increment: f32,
        polarity: Polarity,
    ) -> HeliosResult<()> {
        for embedding in instruction.iter().chain(state) {
            self.check_dimension(embedding.len())?;
        }
        let step = polarity.sign() * increment;
        for s in state {
            for i in instruction {
                for ((value, i), s) in self.values.iter_mut().zip(i).zip(s) {
                    *value += step * (i - s);
                }
            }
        }
        Ok(())
    }

    /// Whether every value is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }

    fn check_dimension(&self, found: usize) -> HeliosResult<()> {
        if found == self.values.len() {
            Ok(())
        } else {
            Err(HeliosError::DimensionMismatch {
                expected: self.values.len(),
                found,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &[f32], b: &[f32]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-5)
    }

    #[test]
    fn reinforce_then_penalize_restores_layer() {
        let start = FeedbackLayer::from_values(vec![0.1, -0.4, 0.25]);
        let instruction = vec![vec![0.6, 0.8, 0.0], vec![0.0, 0.0, 1.0]];
        let state = vec![vec![1.0, 0.0, 0.0], vec![0.3, 0.3, 0.3]];

        let mut layer = start.clone();
        layer.apply(&instruction, &state, 0.5, Polarity::Reinforce).unwrap();
        assert!(!close(layer.values(), start.values()));
        layer.apply(&instruction, &state, 0.5, Polarity::Penalize).unwrap();
        assert!(close(layer.values(), start.values()));
    }

    #[test]
    fn reinforce_sums_over_every_sentence_pair() {
        let mut layer = FeedbackLayer::zeros(2);
        let instruction = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let state = vec![vec![0.0, 0.0]];
        layer.apply(&instruction, &state, 0.5, Polarity::Reinforce).unwrap();
        assert!(close(layer.values(), &[0.5, 0.5]));
    }

    #[test]
    fn reinforce_moves_shifted_state_towards_instruction() {
        let mut layer = FeedbackLayer::zeros(2);
        let instruction = vec![vec![1.0, 0.0]];
        let state = vec![vec![0.0, 1.0]];
        layer.apply(&instruction, &state, 0.5, Polarity::Reinforce).unwrap();
        let shifted = layer.shift(&state[0]).unwrap();
        assert!(close(&shifted, &[0.5, 0.5]));
    }

    #[test]
    fn dimension_mismatch_leaves_layer_untouched() {
        let mut layer = FeedbackLayer::zeros(3);
        let err = layer
            .apply(&[vec![1.0, 0.0, 0.0]], &[vec![1.0, 0.0]], 0.5, Polarity::Reinforce)
            .unwrap_err();
        assert!(matches!(err, HeliosError::DimensionMismatch { expected: 3, found: 2 }));
        assert_eq!(layer, FeedbackLayer::zeros(3));
        assert!(layer.shift(&[1.0]).is_err());
    }

    #[test]
    fn serializes_as_plain_array() {
        let layer = FeedbackLayer::from_values(vec![0.5, -1.0]);
        assert_eq!(serde_json::to_string(&layer).unwrap(), "[0.5,-1.0]");
    }
}
