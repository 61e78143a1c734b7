use crate::types::ObservationKind;

/// Unified error type for the helios sub-goal search pipeline.
///
/// Only conditions the caller must act on are errors. Divergence of the
/// similarity score, sampling an unknown transition and failing to find a
/// threshold-quality match are handled inside the engine as ordinary branches
/// and never reach this type.
#[derive(Debug, thiserror::Error)]
pub enum HeliosError {
    // === Configuration errors ===
    /// The automated ground-truth sub-goals are of a different observation kind
    /// than the states observed in the environment. Not retried.
    #[error(
        "Ground-truth sub-goal kind {expected} does not match observed state kind {found}. Supply ground truth in the environment's observation form."
    )]
    GroundTruthTypeMismatch {
        /// Kind of the supplied ground-truth sub-goal.
        expected: ObservationKind,
        /// Kind of the best-matching observed state.
        found: ObservationKind,
    },

    /// A configuration value is invalid.
    #[error("Invalid config: {field} = \"{value}\": {reason}")]
    InvalidConfig {
        /// Which config field.
        field: String,
        /// The invalid value.
        value: String,
        /// Why it is invalid.
        reason: String,
    },

    // === Data errors ===
    /// An observation could not be constructed or reconstructed.
    #[error("Invalid observation: {reason}")]
    InvalidObservation {
        /// What is wrong with it.
        reason: String,
    },

    /// Embedding dimension differs from the dimension the session was built with.
    #[error(
        "Dimension mismatch: expected {expected}-dim embeddings, found {found}-dim. Use the same encoder for states and instructions."
    )]
    DimensionMismatch {
        /// Dimension of the feedback layer / encoder.
        expected: usize,
        /// Dimension of the offending vector.
        found: usize,
    },

    // === Collaborator errors ===
    /// The sentence encoder failed.
    #[error("Encoder {encoder} failed: {source}")]
    EncoderFailed {
        /// Encoder identifier.
        encoder: String,
        /// The underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The exploration environment failed while running episodes.
    #[error("Environment failed during exploration: {source}")]
    EnvironmentFailed {
        /// The underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The feedback oracle could not produce a verdict.
    #[error("Feedback oracle failed: {reason}")]
    OracleFailed {
        /// Why no verdict was produced.
        reason: String,
    },

    // === I/O errors ===
    /// Wraps `std::io::Error` for snapshot and store persistence.
    #[error("I/O error: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    /// Snapshot or store (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias used throughout the helios crates.
pub type HeliosResult<T> = Result<T, HeliosError>;
