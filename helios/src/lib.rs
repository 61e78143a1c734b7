//! # helios
//!
//! Map natural-language instructions to sub-goal states discovered through
//! live interaction with an environment.
//!
//! An agent explores the environment for a bounded number of episodes. Every
//! visited state is described in text and embedded sentence by sentence;
//! every transition is folded into an empirical transition model. The search
//! engine then compares the instruction's sentence embeddings against each
//! state's, shifted by a feedback layer that accept/reject verdicts refine
//! over repeated rounds.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use helios::prelude::*;
//!
//! let encoder: Arc<dyn SentenceEncoder> = Arc::new(HashSentenceEncoder::default_384());
//! let runner = EpisodeRunner::new(my_env, UniformRandomPolicy, Arc::clone(&encoder), 42);
//! let mut engine = SubgoalSearchEngine::new(
//!     SearchConfig::default().with_env_overrides(),
//!     Box::new(runner),
//!     encoder,
//!     Box::new(PromptOracle::stdio()),
//! )?;
//!
//! let mut store = InstructionStore::new();
//! let outcome = engine.search(
//!     SearchRequest::new("fetch the key", AgentKey::new("random", "language"))
//!         .with_description("The agent holds the key."),
//!     &mut store,
//! )?;
//! store.save_json("instructions.json")?;
//! ```
//!
//! # Architecture
//!
//! ```text
//!  Instruction ─► Encoder ─────────────────────────┐
//!                                                  ▼
//!  Environment ─► EpisodeRunner ─► Registry ─► ScoreBoard ─► Oracle ─► Feedback layer
//!                      │                           ▲                        │
//!                      └──► Transition model       └────────────────────────┘
//! ```
//!
//! ## Crate Layout
//!
//! | Crate | Purpose |
//! |-------|---------|
//! | [`helios-core`](core) | Observations, errors, encoder/similarity traits, config |
//! | [`helios-experience`](experience) | Transition model, registry, snapshots, episode runner |
//! | [`helios-embed`](embed) | Deterministic hash sentence encoder |
//! | [`helios-search`](search) | Scoring, feedback, oracles, instruction store, engine |

pub mod tracing_setup;

// ─── Sub-crate module aliases ───────────────────────────────────────────────

/// Core types, traits, errors and configuration.
pub use helios_core as core;
/// Sentence encoder implementations.
pub use helios_embed as embed;
/// Transition model, registry and exploration.
pub use helios_experience as experience;
/// Sub-goal search engine.
pub use helios_search as search;

// ─── Flat re-exports ────────────────────────────────────────────────────────

pub use helios_core::{
    Action, AgentKey, CosineSimilarity, DiscreteKey, Embedding, HeliosError, HeliosResult,
    Observation, ObservationKind, SearchConfig, SentenceEncoder, SimilarityMeasure,
    cosine_similarity,
};
pub use helios_embed::HashSentenceEncoder;
pub use helios_experience::{
    EpisodeRunner, EpisodeSummary, ExperienceSnapshot, ExplorationEnvironment, ExplorationPolicy,
    ExplorationReport, ExplorationSetup, ObservedStateRegistry, SessionRng, Step,
    StepEnvironment, TransitionModel, UniformRandomPolicy,
};
pub use helios_search::{
    CheckpointSink, FeedbackLayer, FeedbackOracle, FeedbackQuery, FileCheckpoints, FnOracle,
    GroundTruthOracle, InstructionStore, MemoryCheckpoints, PromptOracle, RoundReport,
    ScriptedOracle, SearchOutcome, SearchRequest, SessionCheckpoint, SubgoalSearchEngine,
    VariantRecord, Verdict,
};
pub use tracing_setup::{LogView, init_subscriber};

// ─── Prelude ────────────────────────────────────────────────────────────────

/// Convenience re-exports for common usage.
///
/// ```rust,ignore
/// use helios::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Action, AgentKey, EpisodeRunner, ExperienceSnapshot, FeedbackOracle, HashSentenceEncoder,
        HeliosError, HeliosResult, InstructionStore, Observation, PromptOracle, ScriptedOracle,
        SearchConfig, SearchOutcome, SearchRequest, SentenceEncoder, Step, StepEnvironment,
        SubgoalSearchEngine, UniformRandomPolicy, Verdict,
    };
}
