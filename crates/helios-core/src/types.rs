use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{HeliosError, HeliosResult};

/// A single sentence embedding.
pub type Embedding = Vec<f32>;

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

/// Opaque discrete observation key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiscreteKey {
    /// Integer state id (grid cell, table index, ...).
    Int(i64),
    /// Textual state id (board encoding, symbolic state, ...).
    Text(String),
}

/// An environment observation.
///
/// Equality and hashing go through the canonical form (see
/// [`Observation::canonical`]), so two vector observations with the same
/// values and shape compare equal even when they differ only in the sign of
/// zero or in NaN payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Observation {
    /// A discrete key.
    Discrete(DiscreteKey),
    /// A fixed-shape numeric observation stored flat in row-major order.
    Vector {
        /// Flattened values.
        values: Vec<f32>,
        /// Original shape; the product equals `values.len()`.
        shape: Vec<usize>,
    },
}

/// The kind of an observation, used to check that externally supplied
/// observations have the same form as those produced by the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObservationKind {
    /// [`DiscreteKey::Int`].
    Integer,
    /// [`DiscreteKey::Text`].
    Text,
    /// [`Observation::Vector`].
    Vector,
}

impl fmt::Display for ObservationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "integer"),
            Self::Text => write!(f, "text"),
            Self::Vector => write!(f, "vector"),
        }
    }
}

/// Hashable canonical form of an [`Observation`].
///
/// Vector values are stored as IEEE-754 bit patterns with `-0.0` folded into
/// `0.0` and every NaN mapped to the same quiet NaN.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CanonicalObservation {
    /// Discrete keys are already canonical.
    Discrete(DiscreteKey),
    /// Canonical bit patterns plus the shape needed for reconstruction.
    Vector {
        /// Canonical value bits.
        bits: Vec<u32>,
        /// Original shape.
        shape: Vec<usize>,
    },
}

impl CanonicalObservation {
    /// Rebuild the observation this canonical form was taken from.
    #[must_use]
    pub fn to_observation(&self) -> Observation {
        match self {
            Self::Discrete(key) => Observation::Discrete(key.clone()),
            Self::Vector { bits, shape } => Observation::Vector {
                values: bits.iter().map(|b| f32::from_bits(*b)).collect(),
                shape: shape.clone(),
            },
        }
    }
}

#[inline]
fn canonical_bits(value: f32) -> u32 {
    if value == 0.0 {
        0
    } else if value.is_nan() {
        f32::NAN.to_bits()
    } else {
        value.to_bits()
    }
}

impl Observation {
    /// Integer-keyed observation.
    #[must_use]
    pub const fn int(key: i64) -> Self {
        Self::Discrete(DiscreteKey::Int(key))
    }

    /// Text-keyed observation.
    #[must_use]
    pub fn text(key: impl Into<String>) -> Self {
        Self::Discrete(DiscreteKey::Text(key.into()))
    }

    /// Vector observation with an explicit shape.
    ///
    /// # Errors
    ///
    /// Returns [`HeliosError::InvalidObservation`] when the shape is empty or
    /// its product does not equal `values.len()`.
    pub fn vector(values: Vec<f32>, shape: Vec<usize>) -> HeliosResult<Self> {
        let expected: usize = shape.iter().product();
        if shape.is_empty() || expected != values.len() {
            return Err(HeliosError::InvalidObservation {
                reason: format!(
                    "shape {shape:?} describes {expected} values but {} were given",
                    values.len()
                ),
            });
        }
        Ok(Self::Vector { values, shape })
    }

    /// One-dimensional vector observation.
    #[must_use]
    pub fn flat(values: Vec<f32>) -> Self {
        let shape = vec![values.len()];
        Self::Vector { values, shape }
    }

    /// The kind of this observation.
    #[must_use]
    pub const fn kind(&self) -> ObservationKind {
        match self {
            Self::Discrete(DiscreteKey::Int(_)) => ObservationKind::Integer,
            Self::Discrete(DiscreteKey::Text(_)) => ObservationKind::Text,
            Self::Vector { .. } => ObservationKind::Vector,
        }
    }

    /// Shape of a vector observation, `None` for discrete keys.
    #[must_use]
    pub fn shape(&self) -> Option<&[usize]> {
        match self {
            Self::Discrete(_) => None,
            Self::Vector { shape, .. } => Some(shape),
        }
    }

    /// Canonical, hashable form shared by the transition model and registry.
    #[must_use]
    pub fn canonical(&self) -> CanonicalObservation {
        match self {
            Self::Discrete(key) => CanonicalObservation::Discrete(key.clone()),
            Self::Vector { values, shape } => CanonicalObservation::Vector {
                bits: values.iter().map(|v| canonical_bits(*v)).collect(),
                shape: shape.clone(),
            },
        }
    }
}

impl PartialEq for Observation {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Discrete(a), Self::Discrete(b)) => a == b,
            (
                Self::Vector {
                    values: va,
                    shape: sa,
                },
                Self::Vector {
                    values: vb,
                    shape: sb,
                },
            ) => {
                sa == sb
                    && va.len() == vb.len()
                    && va
                        .iter()
                        .zip(vb)
                        .all(|(a, b)| canonical_bits(*a) == canonical_bits(*b))
            }
            _ => false,
        }
    }
}

impl Eq for Observation {}

impl Hash for Observation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Discrete(key) => {
                0_u8.hash(state);
                key.hash(state);
            }
            Self::Vector { values, shape } => {
                1_u8.hash(state);
                shape.hash(state);
                for value in values {
                    canonical_bits(*value).hash(state);
                }
            }
        }
    }
}

impl From<i64> for Observation {
    fn from(key: i64) -> Self {
        Self::int(key)
    }
}

impl From<&str> for Observation {
    fn from(key: &str) -> Self {
        Self::text(key)
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discrete(DiscreteKey::Int(key)) => write!(f, "{key}"),
            Self::Discrete(DiscreteKey::Text(key)) => write!(f, "{key}"),
            Self::Vector { values, shape } => write!(f, "{values:?} (shape {shape:?})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Actions and agents
// ---------------------------------------------------------------------------

/// An environment action, kept opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(String);

impl Action {
    /// Creates an action from its identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The action identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Action {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Action {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<usize> for Action {
    fn from(index: usize) -> Self {
        Self(index.to_string())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies the agent type and state adapter a search was run with.
///
/// Sub-goals found for one combination are not reused for another, since a
/// different adapter describes states differently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentKey {
    /// Agent type (e.g. `"Qlearntab"`).
    pub agent_type: String,
    /// State adapter name.
    pub adapter: String,
}

impl AgentKey {
    /// Creates a key from an agent type and adapter.
    #[must_use]
    pub fn new(agent_type: impl Into<String>, adapter: impl Into<String>) -> Self {
        Self {
            agent_type: agent_type.into(),
            adapter: adapter.into(),
        }
    }

    /// Key used in the instruction store, `"<agent_type>_<adapter>"`.
    #[must_use]
    pub fn storage_key(&self) -> String {
        format!("{}_{}", self.agent_type, self.adapter)
    }
}

impl fmt::Display for AgentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.agent_type, self.adapter)
    }
}
