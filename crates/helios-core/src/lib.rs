//! Core types, traits, and error types for the helios sub-goal search framework.
//!
//! This crate defines the observation model (`Observation`, its canonical
//! hashable form and `ObservationKind`), the collaborator interfaces
//! (`SentenceEncoder`, `SimilarityMeasure`), the error type (`HeliosError`),
//! and the search configuration shared by every other helios crate.

pub mod config;
pub mod error;
pub mod tracing_config;
pub mod traits;
pub mod types;

pub use config::SearchConfig;
pub use error::{HeliosError, HeliosResult};
pub use traits::{
    CosineSimilarity, SentenceEncoder, SimilarityMeasure, cosine_similarity, l2_normalize,
};
pub use types::{
    Action, AgentKey, CanonicalObservation, DiscreteKey, Embedding, Observation, ObservationKind,
};
