//! Exploration collaborator interfaces.
//!
//! The search engine never steps an environment itself. It hands the current
//! [`ExperienceSnapshot`] to an [`ExplorationEnvironment`], which runs a
//! bounded number of episodes and returns the updated snapshot. The
//! lower-level [`StepEnvironment`] and [`ExplorationPolicy`] traits are what
//! the reference [`EpisodeRunner`](crate::runner::EpisodeRunner) drives.

use rand_chacha::ChaCha8Rng;

use helios_core::error::HeliosResult;
use helios_core::types::{Action, AgentKey, Observation};

use crate::snapshot::ExperienceSnapshot;

/// The pseudo-random source every exploration draw comes from.
pub type SessionRng = ChaCha8Rng;

// ─── Exploration Pass ───────────────────────────────────────────────────────

/// Everything an exploration pass needs.
#[derive(Debug, Clone)]
pub struct ExplorationSetup {
    /// Agent type and state adapter the episodes run under.
    pub agent: AgentKey,
    /// Episode cap for this pass.
    pub episodes: usize,
    /// Per-episode action cap.
    pub action_cap: usize,
    /// Step the live environment (`true`) or roll out through the
    /// transition model (`false`).
    pub live_env: bool,
    /// Whether the policy learns from the episodes.
    pub train: bool,
    /// Experience gathered so far; extended in place by the pass.
    pub snapshot: ExperienceSnapshot,
}

/// Outcome of one exploration episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    /// Zero-based episode index within the pass.
    pub episode: usize,
    /// Actions taken.
    pub steps: usize,
    /// Sum of rewards received.
    pub total_reward: f64,
    /// Whether the episode reached a terminal observation before the cap.
    pub terminated: bool,
}

/// Result of an exploration pass.
#[derive(Debug, Clone)]
pub struct ExplorationReport {
    /// Per-episode results, in run order.
    pub episodes: Vec<EpisodeSummary>,
    /// The updated experience.
    pub snapshot: ExperienceSnapshot,
}

impl ExplorationReport {
    /// Mean total reward over all episodes, `0.0` when none ran.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_reward(&self) -> f64 {
        if self.episodes.is_empty() {
            return 0.0;
        }
        self.episodes.iter().map(|e| e.total_reward).sum::<f64>() / self.episodes.len() as f64
    }
}

/// Runs bounded exploration on behalf of the search engine.
pub trait ExplorationEnvironment {
    /// Run `setup.episodes` episodes and return the updated snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`HeliosError::EnvironmentFailed`](helios_core::HeliosError::EnvironmentFailed)
    /// or [`HeliosError::EncoderFailed`](helios_core::HeliosError::EncoderFailed)
    /// when a collaborator fails mid-pass.
    fn explore(&mut self, setup: ExplorationSetup) -> HeliosResult<ExplorationReport>;
}

impl<T: ExplorationEnvironment + ?Sized> ExplorationEnvironment for Box<T> {
    fn explore(&mut self, setup: ExplorationSetup) -> HeliosResult<ExplorationReport> {
        (**self).explore(setup)
    }
}

// ─── Stepping ───────────────────────────────────────────────────────────────

/// One environment transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Observation after the action.
    pub observation: Observation,
    /// Reward for the action.
    pub reward: f64,
    /// Whether `observation` ends the episode.
    pub terminated: bool,
}

/// A live environment plus the state adapter that describes its observations.
pub trait StepEnvironment {
    /// Start a new episode.
    ///
    /// # Errors
    ///
    /// Implementations wrap their failures in
    /// [`HeliosError::EnvironmentFailed`](helios_core::HeliosError::EnvironmentFailed).
    fn reset(&mut self) -> HeliosResult<Observation>;

    /// Apply `action` to the current episode.
    ///
    /// # Errors
    ///
    /// Implementations wrap their failures in
    /// [`HeliosError::EnvironmentFailed`](helios_core::HeliosError::EnvironmentFailed).
    fn step(&mut self, action: &Action) -> HeliosResult<Step>;

    /// Actions available from `observation`.
    fn legal_actions(&self, observation: &Observation) -> Vec<Action>;

    /// Natural-language description of `observation`, one or more sentences.
    fn describe(&self, observation: &Observation) -> String;
}

/// Chooses actions during exploration.
pub trait ExplorationPolicy {
    /// Pick an action from `legal`; `None` ends the episode.
    fn choose(
        &mut self,
        observation: &Observation,
        legal: &[Action],
        rng: &mut SessionRng,
    ) -> Option<Action>;

    /// Learn from one transition. Called only in training mode.
    fn update(&mut self, _observation: &Observation, _action: &Action, _step: &Step) {}
}
