//! Reference exploration collaborator: drives a [`StepEnvironment`] with an
//! [`ExplorationPolicy`] and folds every step into the experience snapshot.

use std::sync::Arc;

use rand::SeedableRng;
use rand::seq::SliceRandom;
use tracing::{debug, info_span};

use helios_core::config::SearchConfig;
use helios_core::error::HeliosResult;
use helios_core::tracing_config::span_names;
use helios_core::traits::SentenceEncoder;
use helios_core::types::{Action, Observation};

use crate::environment::{
    EpisodeSummary, ExplorationEnvironment, ExplorationPolicy, ExplorationReport,
    ExplorationSetup, SessionRng, Step, StepEnvironment,
};
use crate::snapshot::ExperienceSnapshot;

/// Picks uniformly among the legal actions.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformRandomPolicy;

impl ExplorationPolicy for UniformRandomPolicy {
    fn choose(
        &mut self,
        _observation: &Observation,
        legal: &[Action],
        rng: &mut SessionRng,
    ) -> Option<Action> {
        legal.choose(rng).cloned()
    }
}

/// Episode loop over a step environment.
///
/// In live mode every step is taken in the environment and recorded in the
/// transition model. Otherwise only `reset` touches the environment; steps are
/// sampled from the transition model, falling back to the environment's legal
/// actions for observations the model has no data for. Every observation
/// visited in either mode is described, encoded and tracked in the registry
/// the first time it is seen.
pub struct EpisodeRunner<E, P> {
    env: E,
    policy: P,
    encoder: Arc<dyn SentenceEncoder>,
    rng: SessionRng,
}

impl<E, P> std::fmt::Debug for EpisodeRunner<E, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpisodeRunner")
            .field("encoder", &self.encoder.id())
            .finish_non_exhaustive()
    }
}

impl<E: StepEnvironment, P: ExplorationPolicy> EpisodeRunner<E, P> {
    /// Create a runner whose random draws are seeded with `seed`.
    #[must_use]
    pub fn new(env: E, policy: P, encoder: Arc<dyn SentenceEncoder>, seed: u64) -> Self {
        Self {
            env,
            policy,
            encoder,
            rng: SessionRng::seed_from_u64(seed),
        }
    }

    /// Create a runner seeded from `config.seed`.
    #[must_use]
    pub fn from_config(
        env: E,
        policy: P,
        encoder: Arc<dyn SentenceEncoder>,
        config: &SearchConfig,
    ) -> Self {
        Self::new(env, policy, encoder, config.seed)
    }

    /// The wrapped environment.
    #[must_use]
    pub const fn env(&self) -> &E {
        &self.env
    }

    /// The wrapped policy.
    #[must_use]
    pub const fn policy(&self) -> &P {
        &self.policy
    }

    fn observe(&self, snapshot: &mut ExperienceSnapshot, observation: &Observation) -> HeliosResult<()> {
        if snapshot.registry.contains(observation) {
            return Ok(());
        }
        let description = self.env.describe(observation);
        let embeddings = self.encoder.encode(&description)?;
        snapshot.registry.track(observation, embeddings);
        Ok(())
    }

    fn run_episode(
        &mut self,
        episode: usize,
        setup: &ExplorationSetup,
        snapshot: &mut ExperienceSnapshot,
    ) -> HeliosResult<EpisodeSummary> {
        let mut observation = self.env.reset()?;
        self.observe(snapshot, &observation)?;

        let mut summary = EpisodeSummary {
            episode,
            steps: 0,
            total_reward: 0.0,
            terminated: false,
        };

        while summary.steps < setup.action_cap {
            let legal = if setup.live_env {
                self.env.legal_actions(&observation)
            } else {
                snapshot
                    .transitions
                    .legal_actions(&observation)
                    .unwrap_or_else(|| self.env.legal_actions(&observation))
            };
            let Some(action) = self.policy.choose(&observation, &legal, &mut self.rng) else {
                break;
            };

            let step = if setup.live_env {
                let step = self.env.step(&action)?;
                snapshot.transitions.record(
                    &observation,
                    &action,
                    &step.observation,
                    step.reward,
                    step.terminated,
                );
                step
            } else {
                let sampled = snapshot
                    .transitions
                    .sample(&observation, &action, &mut self.rng);
                Step {
                    observation: sampled.observation,
                    reward: sampled.reward,
                    terminated: sampled.terminated,
                }
            };

            self.observe(snapshot, &step.observation)?;
            if setup.train {
                self.policy.update(&observation, &action, &step);
            }

            summary.steps += 1;
            summary.total_reward += step.reward;
            observation = step.observation;
            if step.terminated {
                summary.terminated = true;
                break;
            }
        }

        Ok(summary)
    }
}

impl<E: StepEnvironment, P: ExplorationPolicy> ExplorationEnvironment for EpisodeRunner<E, P> {
    fn explore(&mut self, mut setup: ExplorationSetup) -> HeliosResult<ExplorationReport> {
        let span = info_span!(
            span_names::EXPLORE,
            agent = %setup.agent,
            episodes = setup.episodes,
            action_cap = setup.action_cap,
            live = setup.live_env,
        );
        let _enter = span.enter();

        let mut snapshot = std::mem::take(&mut setup.snapshot);
        let mut episodes = Vec::with_capacity(setup.episodes);
        for episode in 0..setup.episodes {
            let summary = self.run_episode(episode, &setup, &mut snapshot)?;
            debug!(
                episode,
                steps = summary.steps,
                reward = summary.total_reward,
                terminated = summary.terminated,
                "episode finished"
            );
            episodes.push(summary);
        }

        debug!(
            states = snapshot.registry.len(),
            transitions = snapshot.transitions.len(),
            "exploration pass finished"
        );
        Ok(ExplorationReport { episodes, snapshot })
    }
}
