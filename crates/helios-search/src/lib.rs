//! Instruction-to-sub-goal search for helios.
//!
//! [`SubgoalSearchEngine`] explores an environment through an
//! [`ExplorationEnvironment`](helios_experience::ExplorationEnvironment),
//! scores observed states against an instruction description, and refines a
//! [`FeedbackLayer`] from [`FeedbackOracle`] verdicts. Results land in an
//! [`InstructionStore`] the caller owns.

pub mod checkpoint;
pub mod engine;
pub mod feedback;
pub mod instruction;
pub mod oracle;
pub mod scoring;

pub use checkpoint::{
    Checkpoint, CheckpointSink, FileCheckpoints, MemoryCheckpoints, NoCheckpoints,
    SessionCheckpoint, SessionStage,
};
pub use engine::{SearchOutcome, SearchRequest, SubgoalSearchEngine};
pub use feedback::{FeedbackLayer, Polarity};
pub use instruction::{InstructionRecord, InstructionStore, RoundReport, VariantRecord};
pub use oracle::{
    FeedbackOracle, FeedbackQuery, FnOracle, GroundTruthOracle, PromptOracle, ScriptedOracle,
    Verdict,
};
pub use scoring::{
    COSINE_RANGE_TOLERANCE, ScoreBoard, Selection, SelectionKind, StateScore, mean_similarity,
    within_cosine_range,
};
