//! Arena interning of vector observations.
//!
//! Vector observations are canonicalized once and stored in an arena; the
//! transition table and the registry then key them by a small index instead
//! of hashing the full value vector on every lookup. Discrete observations
//! are already compact and key themselves.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use helios_core::types::{CanonicalObservation, DiscreteKey, Observation};

/// Index of an interned vector observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VectorId(usize);

/// Compact, hashable key for an observation inside one interner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObservationKey {
    /// Discrete observations key themselves.
    Discrete(DiscreteKey),
    /// Vector observations key by arena index.
    Vector(VectorId),
}

/// Arena of canonicalized vector observations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "InternerRepr", into = "InternerRepr")]
pub struct ObservationInterner {
    arena: Vec<Observation>,
    index: HashMap<CanonicalObservation, VectorId>,
}

#[derive(Serialize, Deserialize)]
struct InternerRepr {
    vectors: Vec<Observation>,
}

impl TryFrom<InternerRepr> for ObservationInterner {
    type Error = String;

    fn try_from(repr: InternerRepr) -> Result<Self, Self::Error> {
        let mut interner = Self::default();
        for (slot, observation) in repr.vectors.iter().enumerate() {
            if !matches!(observation, Observation::Vector { .. }) {
                return Err(format!("interned slot {slot} holds a discrete observation"));
            }
            if interner.intern(observation) != ObservationKey::Vector(VectorId(slot)) {
                return Err(format!("interned slot {slot} duplicates an earlier vector"));
            }
        }
        Ok(interner)
    }
}

impl From<ObservationInterner> for InternerRepr {
    fn from(interner: ObservationInterner) -> Self {
        Self {
            vectors: interner.arena,
        }
    }
}

impl ObservationInterner {
    /// Key for `observation`, interning it if it is a vector not seen before.
    pub fn intern(&mut self, observation: &Observation) -> ObservationKey {
        match observation {
            Observation::Discrete(key) => ObservationKey::Discrete(key.clone()),
            Observation::Vector { .. } => {
                let canonical = observation.canonical();
                if let Some(id) = self.index.get(&canonical) {
                    return ObservationKey::Vector(*id);
                }
                let id = VectorId(self.arena.len());
                self.arena.push(canonical.to_observation());
                self.index.insert(canonical, id);
                ObservationKey::Vector(id)
            }
        }
    }

    /// Key for `observation` without interning; `None` for unseen vectors.
    #[must_use]
    pub fn key_of(&self, observation: &Observation) -> Option<ObservationKey> {
        match observation {
            Observation::Discrete(key) => Some(ObservationKey::Discrete(key.clone())),
            Observation::Vector { .. } => self
                .index
                .get(&observation.canonical())
                .map(|id| ObservationKey::Vector(*id)),
        }
    }

    /// Rebuild the observation behind `key`, shape included.
    ///
    /// # Panics
    ///
    /// Panics if `key` was produced by a different interner.
    #[must_use]
    pub fn resolve(&self, key: &ObservationKey) -> Observation {
        match key {
            ObservationKey::Discrete(key) => Observation::Discrete(key.clone()),
            ObservationKey::Vector(id) => self.arena[id.0].clone(),
        }
    }

    /// Whether `key` can be resolved by this interner.
    #[must_use]
    pub fn contains_key(&self, key: &ObservationKey) -> bool {
        match key {
            ObservationKey::Discrete(_) => true,
            ObservationKey::Vector(id) => id.0 < self.arena.len(),
        }
    }

    /// Number of interned vector observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Whether no vector observation has been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Drop every interned vector.
    pub fn clear(&mut self) {
        self.arena.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_vectors_share_one_slot() {
        let mut interner = ObservationInterner::default();
        let a = interner.intern(&Observation::flat(vec![1.0, 0.0]));
        let b = interner.intern(&Observation::flat(vec![1.0, -0.0]));
        assert_eq!(a, b);
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn discrete_keys_are_not_stored() {
        let mut interner = ObservationInterner::default();
        let key = interner.intern(&Observation::int(7));
        assert_eq!(key, ObservationKey::Discrete(DiscreteKey::Int(7)));
        assert!(interner.is_empty());
    }

    #[test]
    fn resolve_restores_shape() {
        let mut interner = ObservationInterner::default();
        let obs = Observation::vector(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]).unwrap();
        let key = interner.intern(&obs);
        let restored = interner.resolve(&key);
        assert_eq!(restored, obs);
        assert_eq!(restored.shape(), Some(&[2, 2][..]));
    }

    #[test]
    fn key_of_does_not_intern() {
        let interner = ObservationInterner::default();
        assert!(interner.key_of(&Observation::flat(vec![0.5])).is_none());
        assert!(interner.is_empty());
    }

    #[test]
    fn duplicate_slots_are_rejected_on_load() {
        let json = r#"{"vectors":[{"Vector":{"values":[1.0],"shape":[1]}},{"Vector":{"values":[1.0],"shape":[1]}}]}"#;
        assert!(serde_json::from_str::<ObservationInterner>(json).is_err());
    }

    #[test]
    fn serde_round_trip_rebuilds_index() {
        let mut interner = ObservationInterner::default();
        let key = interner.intern(&Observation::flat(vec![0.25, 0.75]));
        let json = serde_json::to_string(&interner).unwrap();
        let restored: ObservationInterner = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.key_of(&Observation::flat(vec![0.25, 0.75])), Some(key));
    }
}
