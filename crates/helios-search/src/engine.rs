//! The sub-goal search engine.
//!
//! One [`SubgoalSearchEngine::search`] call runs a session:
//!
//! ```text
//! INIT ──► EXPLORE* ──► SCORE ──┬─► ACCEPT ───┐
//!              ▲                ├─► FALLBACK ─┼─► FEEDBACK ──► SCORE … ──► DONE
//!              └──── restart ◄──┴─► ABORT     │
//!                                             └─ (fatal ground-truth mismatch)
//! ```
//!
//! EXPLORE runs only while the registry is empty. ABORT clears the registry,
//! so the next pass explores again. Every feedback round shifts the layer and
//! is recorded in a [`RoundReport`]; the last completed round is written to
//! the [`InstructionStore`] when the session ends.

use std::sync::Arc;

use tracing::{debug, debug_span, info, info_span, warn};

use helios_core::config::SearchConfig;
use helios_core::error::{HeliosError, HeliosResult};
use helios_core::tracing_config::span_names;
use helios_core::traits::{CosineSimilarity, SentenceEncoder, SimilarityMeasure};
use helios_core::types::{AgentKey, Embedding, Observation};
use helios_experience::{ExperienceSnapshot, ExplorationEnvironment, ExplorationSetup};

use crate::checkpoint::{Checkpoint, CheckpointSink, NoCheckpoints, SessionCheckpoint, SessionStage};
use crate::feedback::{FeedbackLayer, Polarity};
use crate::instruction::{InstructionStore, RoundReport, VariantRecord};
use crate::oracle::{FeedbackOracle, FeedbackQuery, GroundTruthOracle, Verdict};
use crate::scoring::{ScoreBoard, SelectionKind, mean_similarity};

// ─── Request / Outcome ───────────────────────────────────────────────────────

/// One search request.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Instruction text; the store key.
    pub instruction: String,
    /// Natural-language description of the sub-goal, encoded and compared
    /// against state descriptions. `None` means the environment's own
    /// terminal state is the goal and no search runs.
    pub description: Option<String>,
    /// Agent type and state adapter.
    pub agent: AgentKey,
    /// Per-episode action cap for exploration; the configured default when
    /// `None`.
    pub action_cap: Option<usize>,
    /// Clear the registry and ignore a stored result.
    pub re_search: bool,
    /// Known sub-goals for automated runs; replaces the engine's oracle.
    pub ground_truth: Option<Vec<Observation>>,
}

impl SearchRequest {
    /// Request for `instruction` under `agent` with no description.
    pub fn new(instruction: impl Into<String>, agent: AgentKey) -> Self {
        Self {
            instruction: instruction.into(),
            description: None,
            agent,
            action_cap: None,
            re_search: false,
            ground_truth: None,
        }
    }

    /// Set the sub-goal description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the exploration action cap.
    #[must_use]
    pub fn with_action_cap(mut self, action_cap: usize) -> Self {
        self.action_cap = Some(action_cap);
        self
    }

    /// Force a fresh search.
    #[must_use]
    pub fn re_search(mut self) -> Self {
        self.re_search = true;
        self
    }

    /// Judge candidates against a known sub-goal set.
    #[must_use]
    pub fn with_ground_truth(mut self, sub_goals: Vec<Observation>) -> Self {
        self.ground_truth = Some(sub_goals);
        self
    }
}

/// Result of a search session.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    /// Candidate sub-goals; empty when none was found or accepted.
    pub sub_goals: Vec<Observation>,
    /// Best similarity of the last completed round.
    pub similarity: Option<f32>,
    /// Whether the last completed round was accepted.
    pub accepted: bool,
    /// Whether the result came from the store without searching.
    pub reused: bool,
    /// Feedback rounds of this session.
    pub rounds: Vec<RoundReport>,
    /// Registry resets caused by divergence.
    pub restarts: usize,
    /// Exploration passes run.
    pub explorations: usize,
}

impl SearchOutcome {
    fn empty() -> Self {
        Self {
            sub_goals: Vec::new(),
            similarity: None,
            accepted: false,
            reused: false,
            rounds: Vec::new(),
            restarts: 0,
            explorations: 0,
        }
    }

    fn reused(record: &VariantRecord) -> Self {
        Self {
            sub_goals: record.sub_goals.clone(),
            similarity: Some(record.similarity),
            accepted: record.accepted,
            reused: true,
            ..Self::empty()
        }
    }
}

/// Last completed feedback round.
struct RoundResult {
    sub_goals: Vec<Observation>,
    similarity: f32,
    accepted: bool,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Maps instructions to sub-goal states.
///
/// The engine owns the session's experience (registry and transition model)
/// and exchanges it with the exploration collaborator. The instruction store
/// is owned by the caller and passed into each search.
pub struct SubgoalSearchEngine {
    config: SearchConfig,
    environment: Box<dyn ExplorationEnvironment>,
    encoder: Arc<dyn SentenceEncoder>,
    oracle: Box<dyn FeedbackOracle>,
    similarity: Box<dyn SimilarityMeasure>,
    checkpoints: Box<dyn CheckpointSink>,
    experience: ExperienceSnapshot,
    resumed_layer: Option<(String, FeedbackLayer)>,
}

impl std::fmt::Debug for SubgoalSearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubgoalSearchEngine")
            .field("config", &self.config)
            .field("encoder", &self.encoder.id())
            .field("similarity", &self.similarity.name())
            .field("observed_states", &self.experience.registry.len())
            .finish_non_exhaustive()
    }
}

impl SubgoalSearchEngine {
    /// Create an engine with cosine similarity and no checkpointing.
    ///
    /// # Errors
    ///
    /// Returns [`HeliosError::InvalidConfig`] if `config` does not validate.
    pub fn new(
        config: SearchConfig,
        environment: Box<dyn ExplorationEnvironment>,
        encoder: Arc<dyn SentenceEncoder>,
        oracle: Box<dyn FeedbackOracle>,
    ) -> HeliosResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            environment,
            encoder,
            oracle,
            similarity: Box::new(CosineSimilarity),
            checkpoints: Box::new(NoCheckpoints),
            experience: ExperienceSnapshot::new(),
            resumed_layer: None,
        })
    }

    /// Replace the similarity measure.
    #[must_use]
    pub fn with_similarity(mut self, similarity: Box<dyn SimilarityMeasure>) -> Self {
        self.similarity = similarity;
        self
    }

    /// Send checkpoints to `sink`.
    #[must_use]
    pub fn with_checkpoints(mut self, sink: Box<dyn CheckpointSink>) -> Self {
        self.checkpoints = sink;
        self
    }

    /// Start from previously gathered experience.
    #[must_use]
    pub fn with_experience(mut self, experience: ExperienceSnapshot) -> Self {
        self.experience = experience;
        self
    }

    /// Continue from a checkpoint. The checkpoint's feedback layer is used by
    /// the next search for the same instruction unless that search is reused
    /// from the store.
    #[must_use]
    pub fn resume(mut self, checkpoint: SessionCheckpoint) -> Self {
        self.experience = checkpoint.experience;
        self.resumed_layer = Some((checkpoint.instruction, checkpoint.feedback_layer));
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Experience gathered so far.
    #[must_use]
    pub const fn experience(&self) -> &ExperienceSnapshot {
        &self.experience
    }

    /// Give up the engine, keeping its experience.
    #[must_use]
    pub fn into_experience(self) -> ExperienceSnapshot {
        self.experience
    }

    /// Run one search session for `request`, reading and updating `store`.
    ///
    /// # Errors
    ///
    /// - [`HeliosError::GroundTruthTypeMismatch`] when ground truth is
    ///   supplied in a different observation form than the environment's.
    /// - [`HeliosError::DimensionMismatch`] when a stored feedback layer or
    ///   an embedding does not match the encoder's dimension.
    /// - Collaborator errors from the environment, encoder, oracle or
    ///   checkpoint sink.
    #[allow(clippy::too_many_lines)]
    pub fn search(
        &mut self,
        mut request: SearchRequest,
        store: &mut InstructionStore,
    ) -> HeliosResult<SearchOutcome> {
        let span = info_span!(
            span_names::SEARCH,
            instruction = %request.instruction,
            agent = %request.agent,
        );
        let _enter = span.enter();

        if request.re_search {
            debug!(states = self.experience.registry.len(), "re-search requested; clearing registry");
            self.experience.registry.clear();
        }

        // INIT
        let dimension = self.encoder.dimension();
        let previous = store.get(&request.instruction, &request.agent);
        if let Some(record) = previous
            && !request.re_search
            && record.accepted
            && !record.sub_goals.is_empty()
            && record.similarity >= self.config.sim_threshold
        {
            info!(
                similarity = record.similarity,
                sub_goals = record.sub_goals.len(),
                "reusing stored sub-goals"
            );
            return Ok(SearchOutcome::reused(record));
        }
        let resumed = self
            .resumed_layer
            .take_if(|(instruction, _)| *instruction == request.instruction);
        let mut layer = match (resumed, previous) {
            (Some((_, layer)), _) => layer,
            (None, Some(record)) => record.feedback_layer.clone(),
            (None, None) => FeedbackLayer::zeros(dimension),
        };
        if layer.dimension() != dimension {
            return Err(HeliosError::DimensionMismatch {
                expected: dimension,
                found: layer.dimension(),
            });
        }

        let Some(description) = request
            .description
            .as_deref()
            .filter(|description| !description.trim().is_empty())
        else {
            info!("no sub-goal description; the environment's terminal state is the goal");
            return Ok(SearchOutcome::empty());
        };
        let instruction_embeddings = self.encoder.encode(description)?;
        if let Some(bad) = instruction_embeddings.iter().find(|e| e.len() != dimension) {
            return Err(HeliosError::DimensionMismatch {
                expected: dimension,
                found: bad.len(),
            });
        }

        let action_cap = request.action_cap.unwrap_or(self.config.default_action_cap);
        let mut ground_truth = request
            .ground_truth
            .take()
            .filter(|sub_goals| !sub_goals.is_empty())
            .map(GroundTruthOracle::new);

        let mut outcome = SearchOutcome::empty();
        let mut last_round: Option<RoundResult> = None;
        let mut sim_delta = 1.0_f32;

        'repeats: for repeat in 0..self.config.num_repeats {
            let mut search_count = 0;
            let mut rounds_in_repeat = 0;

            while rounds_in_repeat < self.config.feedback_rounds_per_repeat {
                search_count += 1;

                // EXPLORE
                if self.experience.registry.is_empty() {
                    self.explore(&request, action_cap, repeat, &layer)?;
                    outcome.explorations += 1;
                    if self.experience.registry.is_empty() {
                        warn!(repeat, "exploration observed no states; ending search");
                        break 'repeats;
                    }
                }

                // SCORE
                let board = {
                    let _score = debug_span!(span_names::SCORE, repeat, search_count).entered();
                    ScoreBoard::score(
                        &self.experience.registry,
                        &instruction_embeddings,
                        &layer,
                        self.similarity.as_ref(),
                    )?
                };
                let (Some(best), Some(selection)) =
                    (board.best().cloned(), board.select(self.config.sim_threshold))
                else {
                    break 'repeats;
                };
                let max = best.similarity;

                // ABORT
                let diverged = board.diverged();
                if diverged || (sim_delta <= 0.0 && max < 0.0) {
                    outcome.restarts += 1;
                    self.experience.registry.clear();
                    sim_delta = 1.0;
                    let reason = if diverged {
                        "similarity outside cosine range"
                    } else {
                        "negative similarity stopped improving"
                    };
                    warn!(
                        repeat,
                        search_count,
                        max_similarity = max,
                        reason,
                        "restarting search from exploration"
                    );
                    if outcome.restarts > self.config.max_divergence_restarts {
                        warn!(
                            restarts = outcome.restarts,
                            "divergence restart budget exhausted; ending repeat without a sub-goal"
                        );
                        continue 'repeats;
                    }
                    continue;
                }

                if selection.kind == SelectionKind::Fallback {
                    info!(
                        max_similarity = max,
                        candidates = selection.candidates.len(),
                        "no threshold-quality match; using near-miss candidates"
                    );
                }

                if let Some(oracle) = &ground_truth
                    && let Some(expected) = oracle.sub_goals().first()
                    && expected.kind() != best.observation.kind()
                {
                    return Err(HeliosError::GroundTruthTypeMismatch {
                        expected: expected.kind(),
                        found: best.observation.kind(),
                    });
                }

                // FEEDBACK
                let _feedback = info_span!(span_names::FEEDBACK, repeat, search_count).entered();
                let query = FeedbackQuery {
                    instruction: &request.instruction,
                    candidate: &best.observation,
                    similarity: max,
                    candidates: &selection.candidates,
                    above_threshold: selection.kind == SelectionKind::Accept,
                };
                let verdict = match ground_truth.as_mut() {
                    Some(oracle) => oracle.judge(&query)?,
                    None => self.oracle.judge(&query)?,
                };

                let state_embeddings: Vec<Embedding> = self
                    .experience
                    .registry
                    .embeddings(&best.observation)
                    .map(<[Embedding]>::to_vec)
                    .unwrap_or_default();
                let polarity = if verdict.is_accept() {
                    Polarity::Reinforce
                } else {
                    Polarity::Penalize
                };
                layer.apply(
                    &instruction_embeddings,
                    &state_embeddings,
                    self.config.feedback_increment,
                    polarity,
                )?;
                let updated = mean_similarity(
                    &instruction_embeddings,
                    &state_embeddings,
                    &layer,
                    self.similarity.as_ref(),
                )?;
                sim_delta = updated - max;

                let report = RoundReport {
                    repeat,
                    search_count,
                    max_similarity: max,
                    median_similarity: board.median_similarity().unwrap_or(max),
                    selection: selection.kind,
                    verdict,
                    similarity_delta: sim_delta,
                };
                info!(
                    repeat,
                    search_count,
                    max_similarity = max,
                    median_similarity = report.median_similarity,
                    verdict = ?verdict,
                    similarity_delta = sim_delta,
                    "feedback round complete"
                );
                outcome.rounds.push(report);
                last_round = Some(RoundResult {
                    sub_goals: if verdict.is_accept() {
                        selection.candidates.into_iter().map(|c| c.observation).collect()
                    } else {
                        Vec::new()
                    },
                    similarity: max,
                    accepted: verdict.is_accept(),
                });

                self.checkpoints.checkpoint(Checkpoint {
                    stage: SessionStage::Feedback,
                    repeat,
                    instruction: &request.instruction,
                    experience: &self.experience,
                    feedback_layer: &layer,
                })?;

                rounds_in_repeat += 1;
                if verdict == Verdict::Accept {
                    break;
                }
            }
        }

        if last_round.is_some() && !layer.is_finite() {
            warn!("feedback layer holds non-finite values; not storing this session");
            last_round = None;
        }
        if let Some(result) = last_round {
            store.upsert(
                &request.instruction,
                &request.agent,
                VariantRecord {
                    sub_goals: result.sub_goals.clone(),
                    similarity: result.similarity,
                    feedback_layer: layer,
                    action_cap,
                    accepted: result.accepted,
                    rounds: outcome.rounds.clone(),
                },
            );
            outcome.sub_goals = result.sub_goals;
            outcome.similarity = Some(result.similarity);
            outcome.accepted = result.accepted;
        }
        Ok(outcome)
    }

    fn explore(
        &mut self,
        request: &SearchRequest,
        action_cap: usize,
        repeat: usize,
        layer: &FeedbackLayer,
    ) -> HeliosResult<()> {
        let setup = ExplorationSetup {
            agent: request.agent.clone(),
            episodes: self.config.exploration_episodes,
            action_cap,
            live_env: true,
            train: true,
            snapshot: self.experience.clone(),
        };
        let report = self.environment.explore(setup)?;
        info!(
            episodes = report.episodes.len(),
            mean_reward = report.mean_reward(),
            states = report.snapshot.registry.len(),
            "exploration pass complete"
        );
        self.experience = report.snapshot;
        self.checkpoints.checkpoint(Checkpoint {
            stage: SessionStage::Explore,
            repeat,
            instruction: &request.instruction,
            experience: &self.experience,
            feedback_layer: layer,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use helios_experience::ExplorationReport;

    use super::*;
    use crate::checkpoint::MemoryCheckpoints;
    use crate::oracle::ScriptedOracle;

    // ─── Test doubles ────────────────────────────────────────────────────

    /// Every text encodes to the unit x-axis.
    struct AxisEncoder;

    impl SentenceEncoder for AxisEncoder {
        fn encode(&self, _text: &str) -> HeliosResult<Vec<Embedding>> {
            Ok(vec![vec![1.0, 0.0]])
        }

        fn dimension(&self) -> usize {
            2
        }

        fn id(&self) -> &str {
            "axis"
        }
    }

    /// Unit vector whose cosine with the x-axis is `cos`.
    fn at_cosine(cos: f32) -> Embedding {
        vec![cos, (1.0 - cos * cos).max(0.0).sqrt()]
    }

    fn experience_with(states: &[(i64, f32)]) -> ExperienceSnapshot {
        let mut experience = ExperienceSnapshot::new();
        for (key, cos) in states {
            experience
                .registry
                .track(&Observation::int(*key), vec![at_cosine(*cos)]);
        }
        experience
    }

    /// Returns the same registry on every pass and counts passes.
    struct FixedWorld {
        states: Vec<(i64, f32)>,
        passes: Arc<AtomicUsize>,
    }

    impl ExplorationEnvironment for FixedWorld {
        fn explore(&mut self, setup: ExplorationSetup) -> HeliosResult<ExplorationReport> {
            self.passes.fetch_add(1, Ordering::SeqCst);
            let mut snapshot = setup.snapshot;
            for (key, cos) in &self.states {
                snapshot
                    .registry
                    .track(&Observation::int(*key), vec![at_cosine(*cos)]);
            }
            Ok(ExplorationReport {
                episodes: Vec::new(),
                snapshot,
            })
        }
    }

    /// Cosine, except the first `forced` calls return 1.5.
    struct ForcedSimilarity {
        forced: usize,
        calls: AtomicUsize,
    }

    impl SimilarityMeasure for ForcedSimilarity {
        fn similarity(&self, state: &[f32], instruction: &[f32]) -> f32 {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.forced {
                1.5
            } else {
                helios_core::cosine_similarity(state, instruction)
            }
        }

        fn name(&self) -> &str {
            "forced"
        }
    }

    const SCORES: [(i64, f32); 3] = [(1, 0.95), (2, 0.80), (3, 0.40)];

    fn agent() -> AgentKey {
        AgentKey::new("Qlearntab", "language_default")
    }

    fn engine(oracle: ScriptedOracle, passes: &Arc<AtomicUsize>) -> SubgoalSearchEngine {
        SubgoalSearchEngine::new(
            SearchConfig::default(),
            Box::new(FixedWorld {
                states: SCORES.to_vec(),
                passes: Arc::clone(passes),
            }),
            Arc::new(AxisEncoder),
            Box::new(oracle),
        )
        .unwrap()
    }

    fn request() -> SearchRequest {
        SearchRequest::new("go to the key", agent()).with_description("The key is here.")
    }

    // ─── Selection ───────────────────────────────────────────────────────

    #[test]
    fn only_the_state_above_threshold_is_selected() {
        let passes = Arc::new(AtomicUsize::new(0));
        let mut engine = engine(ScriptedOracle::always(Verdict::Accept), &passes)
            .with_experience(experience_with(&SCORES));
        let mut store = InstructionStore::new();

        let outcome = engine.search(request(), &mut store).unwrap();
        assert_eq!(outcome.sub_goals, vec![Observation::int(1)]);
        assert!(outcome.accepted);
        assert!((outcome.similarity.unwrap() - 0.95).abs() < 1e-5);
        assert_eq!(passes.load(Ordering::SeqCst), 0);

        let stored = store.get("go to the key", &agent()).unwrap();
        assert_eq!(stored.sub_goals, vec![Observation::int(1)]);
        assert_eq!(stored.action_cap, 5);
        assert_eq!(stored.rounds.len(), 1);
        assert_eq!(stored.rounds[0].selection, SelectionKind::Accept);
    }

    #[test]
    fn empty_registry_triggers_exploration() {
        let passes = Arc::new(AtomicUsize::new(0));
        let mut engine = engine(ScriptedOracle::always(Verdict::Accept), &passes);
        let outcome = engine
            .search(request().with_action_cap(12), &mut InstructionStore::new())
            .unwrap();
        assert_eq!(passes.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.explorations, 1);
        assert_eq!(outcome.sub_goals, vec![Observation::int(1)]);
        assert_eq!(engine.experience().registry.len(), 3);
    }

    #[test]
    fn fallback_returns_near_misses_when_nothing_reaches_threshold() {
        let passes = Arc::new(AtomicUsize::new(0));
        let mut engine = engine(ScriptedOracle::always(Verdict::Accept), &passes)
            .with_experience(experience_with(&[(1, 0.70), (2, 0.80), (3, 0.75)]));
        let outcome = engine.search(request(), &mut InstructionStore::new()).unwrap();
        assert_eq!(outcome.sub_goals, vec![Observation::int(2), Observation::int(3)]);
        assert_eq!(outcome.rounds[0].selection, SelectionKind::Fallback);
    }

    // ─── Feedback ────────────────────────────────────────────────────────

    #[test]
    fn reject_clears_sub_goal_and_moves_layer_away() {
        let passes = Arc::new(AtomicUsize::new(0));
        let mut engine = engine(ScriptedOracle::always(Verdict::Reject), &passes)
            .with_experience(experience_with(&SCORES));
        let mut store = InstructionStore::new();
        let outcome = engine.search(request(), &mut store).unwrap();

        assert!(outcome.sub_goals.is_empty());
        assert!(!outcome.accepted);
        assert!(outcome.rounds[0].similarity_delta < 0.0);
        let layer = &store.get("go to the key", &agent()).unwrap().feedback_layer;
        assert_ne!(layer, &FeedbackLayer::zeros(2));
    }

    #[test]
    fn repeats_stop_each_at_first_accept() {
        let passes = Arc::new(AtomicUsize::new(0));
        let config = SearchConfig {
            num_repeats: 2,
            feedback_rounds_per_repeat: 3,
            ..SearchConfig::default()
        };
        let mut engine = SubgoalSearchEngine::new(
            config,
            Box::new(FixedWorld {
                states: SCORES.to_vec(),
                passes: Arc::clone(&passes),
            }),
            Arc::new(AxisEncoder),
            Box::new(
                ScriptedOracle::new([Verdict::Reject, Verdict::Accept]).then(Verdict::Accept),
            ),
        )
        .unwrap()
        .with_experience(experience_with(&SCORES));

        let outcome = engine.search(request(), &mut InstructionStore::new()).unwrap();
        let per_repeat: Vec<(usize, usize)> =
            outcome.rounds.iter().map(|r| (r.repeat, r.search_count)).collect();
        assert_eq!(per_repeat, vec![(0, 1), (0, 2), (1, 1)]);
        assert!(outcome.accepted);
    }

    // ─── Divergence ──────────────────────────────────────────────────────

    #[test]
    fn forced_out_of_range_similarity_restarts_exploration() {
        let passes = Arc::new(AtomicUsize::new(0));
        let mut engine = engine(ScriptedOracle::always(Verdict::Accept), &passes)
            .with_experience(experience_with(&SCORES))
            .with_similarity(Box::new(ForcedSimilarity {
                forced: 1,
                calls: AtomicUsize::new(0),
            }));

        let outcome = engine.search(request(), &mut InstructionStore::new()).unwrap();
        assert_eq!(outcome.restarts, 1);
        assert_eq!(passes.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.rounds.len(), 1);
        assert!(outcome.rounds[0].max_similarity <= 1.0);
        assert_eq!(outcome.rounds[0].search_count, 2);
        assert_eq!(outcome.sub_goals, vec![Observation::int(1)]);
    }

    #[test]
    fn restart_budget_bounds_divergence_loops() {
        let passes = Arc::new(AtomicUsize::new(0));
        let config = SearchConfig {
            max_divergence_restarts: 2,
            ..SearchConfig::default()
        };
        let mut engine = SubgoalSearchEngine::new(
            config,
            Box::new(FixedWorld {
                states: SCORES.to_vec(),
                passes: Arc::clone(&passes),
            }),
            Arc::new(AxisEncoder),
            Box::new(ScriptedOracle::always(Verdict::Accept)),
        )
        .unwrap()
        .with_similarity(Box::new(ForcedSimilarity {
            forced: usize::MAX,
            calls: AtomicUsize::new(0),
        }));

        let mut store = InstructionStore::new();
        let outcome = engine.search(request(), &mut store).unwrap();
        assert_eq!(outcome.restarts, 3);
        assert!(outcome.rounds.is_empty());
        assert!(outcome.sub_goals.is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn negative_non_improving_similarity_restarts() {
        // A rejected round with max < 0 and a negative delta resets the registry.
        let passes = Arc::new(AtomicUsize::new(0));
        let config = SearchConfig {
            feedback_rounds_per_repeat: 2,
            ..SearchConfig::default()
        };
        let mut engine = SubgoalSearchEngine::new(
            config,
            Box::new(FixedWorld {
                states: vec![(1, -0.5)],
                passes: Arc::clone(&passes),
            }),
            Arc::new(AxisEncoder),
            Box::new(ScriptedOracle::new([Verdict::Reject]).then(Verdict::Accept)),
        )
        .unwrap()
        .with_experience(experience_with(&[(1, -0.5)]));

        let outcome = engine.search(request(), &mut InstructionStore::new()).unwrap();
        assert!(outcome.rounds[0].similarity_delta < 0.0);
        assert_eq!(outcome.restarts, 1);
        assert_eq!(passes.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.rounds.len(), 2);
    }

    // ─── Session boundaries ──────────────────────────────────────────────

    #[test]
    fn missing_description_returns_without_search() {
        let passes = Arc::new(AtomicUsize::new(0));
        let mut engine = engine(ScriptedOracle::default(), &passes);
        let mut store = InstructionStore::new();
        for request in [
            SearchRequest::new("reach the exit", agent()),
            SearchRequest::new("reach the exit", agent()).with_description("  "),
        ] {
            let outcome = engine.search(request, &mut store).unwrap();
            assert!(outcome.sub_goals.is_empty());
            assert!(outcome.rounds.is_empty());
        }
        assert_eq!(passes.load(Ordering::SeqCst), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn stored_match_is_reused_without_exploration() {
        let passes = Arc::new(AtomicUsize::new(0));
        let mut store = InstructionStore::new();
        engine(ScriptedOracle::always(Verdict::Accept), &passes)
            .search(request(), &mut store)
            .unwrap();
        assert_eq!(passes.load(Ordering::SeqCst), 1);

        // The oracle would fail if asked.
        let mut second = engine(ScriptedOracle::default(), &passes);
        let outcome = second.search(request(), &mut store).unwrap();
        assert!(outcome.reused);
        assert_eq!(outcome.sub_goals, vec![Observation::int(1)]);
        assert_eq!(passes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rejected_match_is_searched_again_with_its_layer() {
        let passes = Arc::new(AtomicUsize::new(0));
        let mut store = InstructionStore::new();
        engine(ScriptedOracle::always(Verdict::Reject), &passes)
            .search(request(), &mut store)
            .unwrap();
        let rejected = store.get("go to the key", &agent()).unwrap();
        assert!(rejected.similarity >= 0.9);
        assert!(rejected.sub_goals.is_empty());

        let outcome = engine(ScriptedOracle::always(Verdict::Accept), &passes)
            .search(request(), &mut store)
            .unwrap();
        assert!(!outcome.reused);
        assert_eq!(outcome.explorations, 1);
        assert_eq!(passes.load(Ordering::SeqCst), 2);
        // The penalized layer pulls the best score below its raw 0.95.
        assert!(outcome.rounds[0].max_similarity < 0.95);
        assert_eq!(outcome.sub_goals, vec![Observation::int(1)]);
        assert!(store.get("go to the key", &agent()).unwrap().accepted);
    }

    #[test]
    fn re_search_ignores_stored_match_and_clears_registry() {
        let passes = Arc::new(AtomicUsize::new(0));
        let mut store = InstructionStore::new();
        let mut engine = engine(ScriptedOracle::always(Verdict::Accept), &passes);
        engine.search(request(), &mut store).unwrap();
        let outcome = engine.search(request().re_search(), &mut store).unwrap();
        assert!(!outcome.reused);
        assert_eq!(outcome.explorations, 1);
        assert_eq!(passes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn ground_truth_kind_mismatch_is_fatal() {
        let passes = Arc::new(AtomicUsize::new(0));
        let mut engine = engine(ScriptedOracle::always(Verdict::Accept), &passes)
            .with_experience(experience_with(&SCORES));
        let mut store = InstructionStore::new();
        let err = engine
            .search(
                request().with_ground_truth(vec![Observation::text("1")]),
                &mut store,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            HeliosError::GroundTruthTypeMismatch {
                expected: helios_core::ObservationKind::Text,
                found: helios_core::ObservationKind::Integer,
            }
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn ground_truth_replaces_the_oracle() {
        let passes = Arc::new(AtomicUsize::new(0));
        // The scripted oracle would fail if consulted.
        let mut engine = engine(ScriptedOracle::default(), &passes)
            .with_experience(experience_with(&SCORES));
        let outcome = engine
            .search(
                request().with_ground_truth(vec![Observation::int(1)]),
                &mut InstructionStore::new(),
            )
            .unwrap();
        assert!(outcome.accepted);
        assert_eq!(outcome.rounds[0].verdict, Verdict::Accept);
    }

    #[test]
    fn stored_layer_with_wrong_dimension_is_rejected() {
        let passes = Arc::new(AtomicUsize::new(0));
        let mut store = InstructionStore::new();
        store.upsert(
            "go to the key",
            &agent(),
            VariantRecord {
                sub_goals: Vec::new(),
                similarity: 0.1,
                feedback_layer: FeedbackLayer::zeros(5),
                action_cap: 5,
                accepted: false,
                rounds: Vec::new(),
            },
        );
        let err = engine(ScriptedOracle::always(Verdict::Accept), &passes)
            .search(request(), &mut store)
            .unwrap_err();
        assert!(matches!(err, HeliosError::DimensionMismatch { expected: 2, found: 5 }));
    }

    #[test]
    fn checkpoints_follow_explore_and_feedback() {
        let passes = Arc::new(AtomicUsize::new(0));
        let sink = MemoryCheckpoints::new();
        let mut engine = engine(ScriptedOracle::always(Verdict::Accept), &passes)
            .with_checkpoints(Box::new(sink.clone()));
        engine.search(request(), &mut InstructionStore::new()).unwrap();

        let stages: Vec<SessionStage> = sink.taken().iter().map(|c| c.stage).collect();
        assert_eq!(stages, vec![SessionStage::Explore, SessionStage::Feedback]);

        // Resuming restores experience; no new exploration is needed.
        let latest = sink.latest().unwrap();
        let mut resumed = self::engine(ScriptedOracle::always(Verdict::Accept), &passes).resume(latest);
        resumed.search(request(), &mut InstructionStore::new()).unwrap();
        assert_eq!(passes.load(Ordering::SeqCst), 1);
    }
}
