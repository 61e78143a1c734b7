//! Empirical transition model built from live interaction ("experience sampling").
//!
//! Every `(observation, action, next_observation, reward, terminated)` event
//! seen in the live environment is folded into a table keyed by
//! `(observation, action)`. The table can then stand in for the environment:
//! [`TransitionModel::sample`] draws a next observation from the recorded
//! outcomes.
//!
//! # Probability bookkeeping
//!
//! Each outcome stores `count / visits` as of the last time *that outcome*
//! was recorded. Siblings are not renormalized when a new event arrives, so
//! stored probabilities under one pair need not sum to one.
//! [`TransitionModel::empirical_probability`] gives the live ratio instead.
//!
//! Reward and terminal flag are fixed by the first occurrence of an outcome
//! and never revised, even for stochastic rewards.
//!
//! # Sampling rule
//!
//! Sampling draws `u ~ U[0, 1)` and walks the outcomes in insertion order,
//! stopping at the first whose stored probability is `<= u`; when none
//! qualifies the walk ends on the last outcome. This is not cumulative
//! sampling and is kept as-is; tests pin it.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use helios_core::types::{Action, Observation};

use crate::interner::{ObservationInterner, ObservationKey};

/// One recorded next observation under an `(observation, action)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct OutcomeRecord {
    next: ObservationKey,
    count: u64,
    probability: f64,
    reward: f64,
    terminated: bool,
}

/// All outcomes recorded for one action taken from one observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ActionRecord {
    action: Action,
    visits: u64,
    outcomes: Vec<OutcomeRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StateRecord {
    observation: ObservationKey,
    actions: Vec<ActionRecord>,
}

/// Public view of one recorded outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    /// The next observation.
    pub next: Observation,
    /// How often this next observation followed the pair.
    pub count: u64,
    /// Stored conditional probability (see module docs).
    pub probability: f64,
    /// Reward stored at first occurrence.
    pub reward: f64,
    /// Terminal flag stored at first occurrence.
    pub terminated: bool,
}

/// Result of sampling the model.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledTransition {
    /// Sampled next observation (the input observation for unknown pairs).
    pub observation: Observation,
    /// Stored reward, `0.0` for unknown pairs.
    pub reward: f64,
    /// Stored terminal flag, `false` for unknown pairs.
    pub terminated: bool,
}

/// Empirical `(observation, action) -> next observation` distribution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "TransitionModelRepr", into = "TransitionModelRepr")]
pub struct TransitionModel {
    interner: ObservationInterner,
    states: Vec<StateRecord>,
    positions: HashMap<ObservationKey, usize>,
}

#[derive(Serialize, Deserialize)]
struct TransitionModelRepr {
    interner: ObservationInterner,
    states: Vec<StateRecord>,
}

impl TryFrom<TransitionModelRepr> for TransitionModel {
    type Error = String;

    fn try_from(repr: TransitionModelRepr) -> Result<Self, Self::Error> {
        let mut positions = HashMap::with_capacity(repr.states.len());
        for (pos, state) in repr.states.iter().enumerate() {
            let keys = std::iter::once(&state.observation).chain(
                state
                    .actions
                    .iter()
                    .flat_map(|a| a.outcomes.iter().map(|o| &o.next)),
            );
            for key in keys {
                if !repr.interner.contains_key(key) {
                    return Err(format!("transition table references unknown observation {key:?}"));
                }
            }
            if positions.insert(state.observation.clone(), pos).is_some() {
                return Err(format!("observation {:?} recorded twice", state.observation));
            }
        }
        Ok(Self {
            interner: repr.interner,
            states: repr.states,
            positions,
        })
    }
}

impl From<TransitionModel> for TransitionModelRepr {
    fn from(model: TransitionModel) -> Self {
        Self {
            interner: model.interner,
            states: model.states,
        }
    }
}

impl TransitionModel {
    /// An empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one live interaction event into the model.
    #[allow(clippy::cast_precision_loss)] // counts stay far below 2^52
    pub fn record(
        &mut self,
        observation: &Observation,
        action: &Action,
        next_observation: &Observation,
        reward: f64,
        terminated: bool,
    ) {
        let key = self.interner.intern(observation);
        let next = self.interner.intern(next_observation);

        let pos = match self.positions.get(&key) {
            Some(pos) => *pos,
            None => {
                self.states.push(StateRecord {
                    observation: key.clone(),
                    actions: Vec::new(),
                });
                self.positions.insert(key, self.states.len() - 1);
                self.states.len() - 1
            }
        };

        let actions = &mut self.states[pos].actions;
        let idx = match actions.iter().position(|record| &record.action == action) {
            Some(idx) => idx,
            None => {
                actions.push(ActionRecord {
                    action: action.clone(),
                    visits: 0,
                    outcomes: Vec::new(),
                });
                actions.len() - 1
            }
        };
        let record = &mut actions[idx];
        record.visits += 1;
        let visits = record.visits as f64;

        match record.outcomes.iter_mut().find(|outcome| outcome.next == next) {
            Some(outcome) => {
                outcome.count += 1;
                outcome.probability = outcome.count as f64 / visits;
            }
            None => record.outcomes.push(OutcomeRecord {
                next,
                count: 1,
                probability: 1.0 / visits,
                reward,
                terminated,
            }),
        }
    }

    /// Actions tried from `observation`, in first-tried order.
    ///
    /// `None` means no data was recorded for the observation.
    #[must_use]
    pub fn legal_actions(&self, observation: &Observation) -> Option<Vec<Action>> {
        self.state(observation)
            .map(|state| state.actions.iter().map(|a| a.action.clone()).collect())
    }

    /// Sample a next observation using `rng` for the uniform draw.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        observation: &Observation,
        action: &Action,
        rng: &mut R,
    ) -> SampledTransition {
        let draw: f64 = rng.r#gen();
        self.sample_with_draw(observation, action, draw)
    }

    /// Sample with a caller-supplied draw in `[0, 1)`.
    ///
    /// Unknown pairs return a self-loop with zero reward, non-terminal.
    #[must_use]
    pub fn sample_with_draw(
        &self,
        observation: &Observation,
        action: &Action,
        draw: f64,
    ) -> SampledTransition {
        let chosen = self.action_record(observation, action).and_then(|record| {
            record
                .outcomes
                .iter()
                .find(|outcome| outcome.probability <= draw)
                .or_else(|| record.outcomes.last())
        });

        match chosen {
            Some(outcome) => SampledTransition {
                observation: self.interner.resolve(&outcome.next),
                reward: outcome.reward,
                terminated: outcome.terminated,
            },
            None => SampledTransition {
                observation: observation.clone(),
                reward: 0.0,
                terminated: false,
            },
        }
    }

    /// Stored probability of `next` under `(observation, action)`.
    #[must_use]
    pub fn probability(
        &self,
        observation: &Observation,
        action: &Action,
        next: &Observation,
    ) -> Option<f64> {
        self.outcome(observation, action, next)
            .map(|outcome| outcome.probability)
    }

    /// Current `count / visits` ratio of `next` under `(observation, action)`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn empirical_probability(
        &self,
        observation: &Observation,
        action: &Action,
        next: &Observation,
    ) -> Option<f64> {
        let visits = self.visits(observation, action);
        self.outcome(observation, action, next)
            .map(|outcome| outcome.count as f64 / visits as f64)
    }

    /// How often `action` was taken from `observation`.
    #[must_use]
    pub fn visits(&self, observation: &Observation, action: &Action) -> u64 {
        self.action_record(observation, action)
            .map_or(0, |record| record.visits)
    }

    /// All outcomes recorded under `(observation, action)`, in insertion order.
    #[must_use]
    pub fn outcomes(&self, observation: &Observation, action: &Action) -> Vec<TransitionOutcome> {
        self.action_record(observation, action)
            .map(|record| {
                record
                    .outcomes
                    .iter()
                    .map(|outcome| TransitionOutcome {
                        next: self.interner.resolve(&outcome.next),
                        count: outcome.count,
                        probability: outcome.probability,
                        reward: outcome.reward,
                        terminated: outcome.terminated,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of observations with at least one recorded action.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn state(&self, observation: &Observation) -> Option<&StateRecord> {
        let key = self.interner.key_of(observation)?;
        self.positions.get(&key).map(|pos| &self.states[*pos])
    }

    fn action_record(&self, observation: &Observation, action: &Action) -> Option<&ActionRecord> {
        self.state(observation)?
            .actions
            .iter()
            .find(|record| &record.action == action)
    }

    fn outcome(
        &self,
        observation: &Observation,
        action: &Action,
        next: &Observation,
    ) -> Option<&OutcomeRecord> {
        let next = self.interner.key_of(next)?;
        self.action_record(observation, action)?
            .outcomes
            .iter()
            .find(|outcome| outcome.next == next)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn a1() -> Action {
        Action::from("a1")
    }

    // ── Recording ──────────────────────────────────────────────────────

    #[test]
    fn two_outcomes_from_one_pair() {
        let mut model = TransitionModel::new();
        let (a, b, c) = (Observation::text("A"), Observation::text("B"), Observation::text("C"));
        model.record(&a, &a1(), &b, 5.0, false);
        model.record(&a, &a1(), &c, -1.0, true);

        assert_eq!(model.legal_actions(&a), Some(vec![a1()]));
        assert_eq!(model.visits(&a, &a1()), 2);
        // Live ratio is 1/2 for both.
        assert_eq!(model.empirical_probability(&a, &a1(), &b), Some(0.5));
        assert_eq!(model.empirical_probability(&a, &a1(), &c), Some(0.5));
        // Stored values follow the incremental rule: B was last touched at 1 visit.
        assert_eq!(model.probability(&a, &a1(), &b), Some(1.0));
        assert_eq!(model.probability(&a, &a1(), &c), Some(0.5));
    }

    #[test]
    fn repeated_outcome_recomputes_only_its_own_probability() {
        let mut model = TransitionModel::new();
        let (a, b, c) = (Observation::int(0), Observation::int(1), Observation::int(2));
        model.record(&a, &a1(), &b, 1.0, false);
        model.record(&a, &a1(), &c, 0.0, false);
        model.record(&a, &a1(), &b, 1.0, false);

        assert_eq!(model.probability(&a, &a1(), &b), Some(2.0 / 3.0));
        assert_eq!(model.probability(&a, &a1(), &c), Some(0.5));
    }

    #[test]
    fn reward_and_terminal_fixed_at_first_occurrence() {
        let mut model = TransitionModel::new();
        let (a, b) = (Observation::int(0), Observation::int(1));
        model.record(&a, &a1(), &b, 5.0, false);
        model.record(&a, &a1(), &b, -100.0, true);

        let outcomes = model.outcomes(&a, &a1());
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].reward, 5.0);
        assert!(!outcomes[0].terminated);
        assert_eq!(outcomes[0].count, 2);
    }

    #[test]
    fn legal_actions_keep_first_tried_order() {
        let mut model = TransitionModel::new();
        let a = Observation::int(0);
        for name in ["up", "left", "up", "down"] {
            model.record(&a, &Action::from(name), &Observation::int(1), 0.0, false);
        }
        assert_eq!(
            model.legal_actions(&a),
            Some(vec![Action::from("up"), Action::from("left"), Action::from("down")])
        );
        assert_eq!(model.legal_actions(&Observation::int(9)), None);
    }

    // ── Sampling ───────────────────────────────────────────────────────

    #[test]
    fn unknown_pair_is_a_self_loop() {
        let mut model = TransitionModel::new();
        let a = Observation::int(0);
        model.record(&a, &a1(), &Observation::int(1), 3.0, true);

        let sampled = model.sample_with_draw(&a, &Action::from("never"), 0.3);
        assert_eq!(sampled.observation, a);
        assert_eq!(sampled.reward, 0.0);
        assert!(!sampled.terminated);

        let unseen = Observation::int(42);
        let sampled = model.sample_with_draw(&unseen, &a1(), 0.3);
        assert_eq!(sampled.observation, unseen);
    }

    #[test]
    fn single_outcome_is_returned_for_every_draw() {
        let mut model = TransitionModel::new();
        let (a, b) = (Observation::int(0), Observation::int(1));
        model.record(&a, &a1(), &b, 2.5, true);
        assert_eq!(model.probability(&a, &a1(), &b), Some(1.0));

        for draw in [0.0, 0.25, 0.5, 0.999_999] {
            let sampled = model.sample_with_draw(&a, &a1(), draw);
            assert_eq!(sampled.observation, b);
            assert_eq!(sampled.reward, 2.5);
            assert!(sampled.terminated);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..32 {
            assert_eq!(model.sample(&a, &a1(), &mut rng).observation, b);
        }
    }

    #[test]
    fn sampling_stops_at_first_probability_not_above_draw() {
        // Stored: B = 1.0, C = 0.5, D = 1/3.
        let mut model = TransitionModel::new();
        let (a, b, c, d) = (
            Observation::int(0),
            Observation::int(1),
            Observation::int(2),
            Observation::int(3),
        );
        model.record(&a, &a1(), &b, 1.0, false);
        model.record(&a, &a1(), &c, 2.0, false);
        model.record(&a, &a1(), &d, 3.0, false);

        // 0.6: B (1.0) > 0.6, C (0.5) <= 0.6 -> C.
        assert_eq!(model.sample_with_draw(&a, &a1(), 0.6).observation, c);
        // 0.4: B and C above, D (0.333) <= 0.4 -> D.
        assert_eq!(model.sample_with_draw(&a, &a1(), 0.4).observation, d);
        // 0.1: nothing qualifies, walk ends on the last outcome.
        assert_eq!(model.sample_with_draw(&a, &a1(), 0.1).observation, d);
        // B is never reachable while its stored probability is 1.0.
        assert_ne!(model.sample_with_draw(&a, &a1(), 0.99).observation, b);
    }

    #[test]
    fn vector_observations_sample_with_their_shape() {
        let mut model = TransitionModel::new();
        let a = Observation::vector(vec![0.0, 0.0, 0.0, 1.0], vec![2, 2]).unwrap();
        let b = Observation::vector(vec![0.0, 0.0, 1.0, 0.0], vec![2, 2]).unwrap();
        model.record(&a, &a1(), &b, 1.0, false);

        let query = Observation::vector(vec![-0.0, 0.0, 0.0, 1.0], vec![2, 2]).unwrap();
        let sampled = model.sample_with_draw(&query, &a1(), 0.5);
        assert_eq!(sampled.observation, b);
        assert_eq!(sampled.observation.shape(), Some(&[2, 2][..]));
    }

    // ── Persistence ────────────────────────────────────────────────────

    #[test]
    fn json_round_trip_preserves_sampling() {
        let mut model = TransitionModel::new();
        let a = Observation::flat(vec![0.5, 0.5]);
        let b = Observation::flat(vec![1.0, 0.0]);
        let c = Observation::text("goal");
        model.record(&a, &a1(), &b, 0.0, false);
        model.record(&a, &a1(), &c, 10.0, true);

        let json = serde_json::to_string(&model).unwrap();
        let restored: TransitionModel = serde_json::from_str(&json).unwrap();
        for draw in [0.0, 0.3, 0.7, 0.99] {
            assert_eq!(
                restored.sample_with_draw(&a, &a1(), draw),
                model.sample_with_draw(&a, &a1(), draw)
            );
        }
        assert_eq!(restored.probability(&a, &a1(), &c), Some(0.5));
    }

    #[test]
    fn dangling_vector_reference_is_rejected_on_load() {
        let json = r#"{"interner":{"vectors":[]},"states":[{"observation":{"Vector":0},"actions":[]}]}"#;
        assert!(serde_json::from_str::<TransitionModel>(json).is_err());
    }

    // ── Invariants ─────────────────────────────────────────────────────

    proptest! {
        #[test]
        fn stored_probability_matches_count_over_visits_at_last_update(
            events in prop::collection::vec((0_i64..3, 0_usize..2, 0_i64..4), 1..64),
        ) {
            let mut model = TransitionModel::new();
            // (obs, action, next) -> visits of (obs, action) when last recorded
            let mut last_visits: HashMap<(i64, usize, i64), u64> = HashMap::new();
            for (obs, action, next) in &events {
                let (o, act, n) = (Observation::int(*obs), Action::from(*action), Observation::int(*next));
                model.record(&o, &act, &n, 0.0, false);
                last_visits.insert((*obs, *action, *next), model.visits(&o, &act));
            }
            for ((obs, action, next), visits) in last_visits {
                let (o, act, n) = (Observation::int(obs), Action::from(action), Observation::int(next));
                let count = model
                    .outcomes(&o, &act)
                    .into_iter()
                    .find(|outcome| outcome.next == n)
                    .map(|outcome| outcome.count)
                    .unwrap();
                #[allow(clippy::cast_precision_loss)]
                let expected = count as f64 / visits as f64;
                let stored = model.probability(&o, &act, &n).unwrap();
                prop_assert!((stored - expected).abs() < 1e-12);
            }
        }
    }
}
