//! Observed-state registry: every visited observation with the sentence
//! embeddings of its text description.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use helios_core::types::{Embedding, Observation};

use crate::interner::{ObservationInterner, ObservationKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ObservedState {
    key: ObservationKey,
    embeddings: Vec<Embedding>,
}

/// Visited observations and their description embeddings, in first-visit
/// order.
///
/// The first description tracked for an observation wins; later calls to
/// [`track`](Self::track) for the same observation are ignored. The registry
/// only grows until [`clear`](Self::clear) is called.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "RegistryRepr", into = "RegistryRepr")]
pub struct ObservedStateRegistry {
    interner: ObservationInterner,
    states: Vec<ObservedState>,
    positions: HashMap<ObservationKey, usize>,
}

#[derive(Serialize, Deserialize)]
struct RegistryRepr {
    interner: ObservationInterner,
    states: Vec<ObservedState>,
}

impl TryFrom<RegistryRepr> for ObservedStateRegistry {
    type Error = String;

    fn try_from(repr: RegistryRepr) -> Result<Self, Self::Error> {
        let mut positions = HashMap::with_capacity(repr.states.len());
        for (pos, state) in repr.states.iter().enumerate() {
            if !repr.interner.contains_key(&state.key) {
                return Err(format!("registry references unknown observation {:?}", state.key));
            }
            if positions.insert(state.key.clone(), pos).is_some() {
                return Err(format!("observation {:?} registered twice", state.key));
            }
        }
        Ok(Self {
            interner: repr.interner,
            states: repr.states,
            positions,
        })
    }
}

impl From<ObservedStateRegistry> for RegistryRepr {
    fn from(registry: ObservedStateRegistry) -> Self {
        Self {
            interner: registry.interner,
            states: registry.states,
        }
    }
}

impl ObservedStateRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `observation` with its description embeddings.
    ///
    /// Returns `false` (and keeps the existing entry) if the observation was
    /// already registered.
    pub fn track(&mut self, observation: &Observation, embeddings: Vec<Embedding>) -> bool {
        if self.contains(observation) {
            return false;
        }
        let key = self.interner.intern(observation);
        self.positions.insert(key.clone(), self.states.len());
        self.states.push(ObservedState { key, embeddings });
        true
    }

    /// Whether `observation` has been registered.
    #[must_use]
    pub fn contains(&self, observation: &Observation) -> bool {
        self.interner
            .key_of(observation)
            .is_some_and(|key| self.positions.contains_key(&key))
    }

    /// Description embeddings of `observation`.
    #[must_use]
    pub fn embeddings(&self, observation: &Observation) -> Option<&[Embedding]> {
        let key = self.interner.key_of(observation)?;
        self.positions
            .get(&key)
            .map(|pos| self.states[*pos].embeddings.as_slice())
    }

    /// Registered observations with their embeddings, in first-visit order.
    pub fn iter(&self) -> impl Iterator<Item = (Observation, &[Embedding])> + '_ {
        self.states
            .iter()
            .map(|state| (self.interner.resolve(&state.key), state.embeddings.as_slice()))
    }

    /// Number of registered observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Forget every registered observation.
    pub fn clear(&mut self) {
        self.states.clear();
        self.positions.clear();
        self.interner.clear();
    }
}
