//! Session checkpoints.
//!
//! The engine emits a checkpoint after every exploration pass and every
//! feedback round. A [`SessionCheckpoint`] holds everything needed to resume
//! the session with [`SubgoalSearchEngine::resume`](crate::SubgoalSearchEngine::resume).

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use helios_core::error::HeliosResult;
use helios_experience::ExperienceSnapshot;

use crate::feedback::FeedbackLayer;

/// Where in the session a checkpoint was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStage {
    /// After an exploration pass replaced the experience.
    Explore,
    /// After a feedback round updated the layer.
    Feedback,
}

/// Borrowed view of the session handed to a [`CheckpointSink`].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Checkpoint<'a> {
    /// Stage just completed.
    pub stage: SessionStage,
    /// Zero-based repeat index.
    pub repeat: usize,
    /// Instruction being searched.
    pub instruction: &'a str,
    /// Current experience.
    pub experience: &'a ExperienceSnapshot,
    /// Current feedback layer.
    pub feedback_layer: &'a FeedbackLayer,
}

impl Checkpoint<'_> {
    /// Copy the view into an owned checkpoint.
    #[must_use]
    pub fn owned(&self) -> SessionCheckpoint {
        SessionCheckpoint {
            stage: self.stage,
            repeat: self.repeat,
            instruction: self.instruction.to_owned(),
            experience: self.experience.clone(),
            feedback_layer: self.feedback_layer.clone(),
        }
    }
}

/// Owned checkpoint, serializable to and from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCheckpoint {
    /// Stage just completed.
    pub stage: SessionStage,
    /// Zero-based repeat index.
    pub repeat: usize,
    /// Instruction being searched.
    pub instruction: String,
    /// Experience at the checkpoint.
    pub experience: ExperienceSnapshot,
    /// Feedback layer at the checkpoint.
    pub feedback_layer: FeedbackLayer,
}

impl SessionCheckpoint {
    /// Read a checkpoint written by [`FileCheckpoints`].
    ///
    /// # Errors
    ///
    /// Returns an I/O or serialization error.
    pub fn load_json(path: impl AsRef<Path>) -> HeliosResult<Self> {
        Ok(serde_json::from_reader(BufReader::new(File::open(path)?))?)
    }
}

/// Receives session checkpoints.
pub trait CheckpointSink {
    /// Persist or inspect `checkpoint`.
    ///
    /// # Errors
    ///
    /// A failing sink aborts the search with its error.
    fn checkpoint(&mut self, checkpoint: Checkpoint<'_>) -> HeliosResult<()>;
}

/// Discards every checkpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCheckpoints;

impl CheckpointSink for NoCheckpoints {
    fn checkpoint(&mut self, _checkpoint: Checkpoint<'_>) -> HeliosResult<()> {
        Ok(())
    }
}

/// Keeps every checkpoint in memory. Clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpoints {
    taken: Arc<Mutex<Vec<SessionCheckpoint>>>,
}

impl MemoryCheckpoints {
    /// An empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of all checkpoints taken so far.
    #[must_use]
    pub fn taken(&self) -> Vec<SessionCheckpoint> {
        self.taken
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent checkpoint.
    #[must_use]
    pub fn latest(&self) -> Option<SessionCheckpoint> {
        self.taken
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl CheckpointSink for MemoryCheckpoints {
    fn checkpoint(&mut self, checkpoint: Checkpoint<'_>) -> HeliosResult<()> {
        self.taken
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(checkpoint.owned());
        Ok(())
    }
}

/// Overwrites one JSON file with the latest checkpoint.
#[derive(Debug, Clone)]
pub struct FileCheckpoints {
    path: PathBuf,
}

impl FileCheckpoints {
    /// Write checkpoints to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Checkpoint file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CheckpointSink for FileCheckpoints {
    fn checkpoint(&mut self, checkpoint: Checkpoint<'_>) -> HeliosResult<()> {
        let mut writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer(&mut writer, &checkpoint)?;
        writer.flush()?;
        tracing::trace!(path = %self.path.display(), stage = ?checkpoint.stage, "checkpoint written");
        Ok(())
    }
}
