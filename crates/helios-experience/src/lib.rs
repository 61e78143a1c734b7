//! Experience gathering for helios.
//!
//! - [`TransitionModel`]: empirical `(observation, action) -> next` dynamics
//!   with the sampling rule used for model-based rollouts.
//! - [`ObservedStateRegistry`]: visited observations and the sentence
//!   embeddings of their descriptions.
//! - [`ExperienceSnapshot`]: both of the above, exchanged with the
//!   exploration collaborator and persisted as JSON.
//! - [`EpisodeRunner`]: reference [`ExplorationEnvironment`] driving any
//!   [`StepEnvironment`] with any [`ExplorationPolicy`].

pub mod environment;
pub mod interner;
pub mod registry;
pub mod runner;
pub mod snapshot;
pub mod transition;

pub use environment::{
    EpisodeSummary, ExplorationEnvironment, ExplorationPolicy, ExplorationReport,
    ExplorationSetup, SessionRng, Step, StepEnvironment,
};
pub use interner::{ObservationInterner, ObservationKey, VectorId};
pub use registry::ObservedStateRegistry;
pub use runner::{EpisodeRunner, UniformRandomPolicy};
pub use snapshot::ExperienceSnapshot;
pub use transition::{SampledTransition, TransitionModel, TransitionOutcome};
