//! Experience snapshots: the registry and transition model exchanged with the
//! exploration collaborator, persisted as JSON.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use helios_core::error::HeliosResult;

use crate::registry::ObservedStateRegistry;
use crate::transition::TransitionModel;

/// Everything learned about the environment so far.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperienceSnapshot {
    /// Visited observations and their description embeddings.
    pub registry: ObservedStateRegistry,
    /// Empirical dynamics.
    pub transitions: TransitionModel,
}

impl ExperienceSnapshot {
    /// A snapshot with nothing recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether neither the registry nor the transition model holds data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty() && self.transitions.is_empty()
    }

    /// Write the snapshot to `path` as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`HeliosError::Io`](helios_core::HeliosError::Io) if the file
    /// cannot be written, or
    /// [`HeliosError::Serialization`](helios_core::HeliosError::Serialization)
    /// if encoding fails.
    pub fn save_json(&self, path: impl AsRef<Path>) -> HeliosResult<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        tracing::debug!(
            path = %path.display(),
            states = self.registry.len(),
            "saved experience snapshot"
        );
        Ok(())
    }

    /// Read a snapshot previously written by [`save_json`](Self::save_json).
    ///
    /// # Errors
    ///
    /// Returns [`HeliosError::Io`](helios_core::HeliosError::Io) if the file
    /// cannot be read, or
    /// [`HeliosError::Serialization`](helios_core::HeliosError::Serialization)
    /// if it is not a valid snapshot.
    pub fn load_json(path: impl AsRef<Path>) -> HeliosResult<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let snapshot: Self = serde_json::from_reader(reader)?;
        tracing::debug!(
            path = %path.display(),
            states = snapshot.registry.len(),
            "loaded experience snapshot"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use helios_core::HeliosError;
    use helios_core::types::{Action, Observation};

    use super::*;

    #[test]
    fn file_round_trip_preserves_registry_and_sampling() {
        let mut snapshot = ExperienceSnapshot::new();
        let start = Observation::flat(vec![0.0, 0.0]);
        let goal = Observation::flat(vec![1.0, 1.0]);
        snapshot.registry.track(&start, vec![vec![1.0, 0.0]]);
        snapshot.registry.track(&goal, vec![vec![0.0, 1.0]]);
        snapshot
            .transitions
            .record(&start, &Action::from("right"), &goal, 1.0, true);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("experience.json");
        snapshot.save_json(&path).unwrap();
        let restored = ExperienceSnapshot::load_json(&path).unwrap();

        assert_eq!(restored.registry.len(), 2);
        let sampled = restored
            .transitions
            .sample_with_draw(&start, &Action::from("right"), 0.5);
        assert_eq!(sampled.observation, goal);
        assert!(sampled.terminated);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ExperienceSnapshot::load_json(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, HeliosError::Io(_)));
    }

    #[test]
    fn garbage_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"registry\": 3}").unwrap();
        let err = ExperienceSnapshot::load_json(&path).unwrap_err();
        assert!(matches!(err, HeliosError::Serialization(_)));
    }

    #[test]
    fn new_snapshot_is_empty() {
        assert!(ExperienceSnapshot::new().is_empty());
    }
}
