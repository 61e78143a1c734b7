//! Durable instruction-to-sub-goal mappings.
//!
//! The store is keyed by instruction text, then by agent key
//! (`"<agent_type>_<adapter>"`). External consumers read it to reuse sub-goals
//! without rerunning a search; the engine reads it to resume the feedback
//! layer of an earlier session.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use helios_core::error::HeliosResult;
use helios_core::types::{AgentKey, Observation};

use crate::feedback::FeedbackLayer;
use crate::oracle::Verdict;
use crate::scoring::SelectionKind;

/// Outcome of one feedback round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundReport {
    /// Zero-based repeat index.
    pub repeat: usize,
    /// Scoring passes in this repeat so far, divergent passes included.
    pub search_count: usize,
    /// Best similarity before the feedback update.
    pub max_similarity: f32,
    /// Median similarity over all scored states.
    pub median_similarity: f32,
    /// Candidate selection rule that applied.
    pub selection: SelectionKind,
    /// Oracle verdict.
    pub verdict: Verdict,
    /// Best state's similarity after the update minus `max_similarity`.
    pub similarity_delta: f32,
}

/// Search result for one instruction under one agent key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRecord {
    /// Candidate sub-goals of the last completed round; empty if it was
    /// rejected.
    pub sub_goals: Vec<Observation>,
    /// Best similarity of the last completed round.
    pub similarity: f32,
    /// Feedback layer after the session.
    pub feedback_layer: FeedbackLayer,
    /// Per-episode action cap exploration ran with.
    pub action_cap: usize,
    /// Whether the last completed round was accepted.
    pub accepted: bool,
    /// Every feedback round of the session, in order.
    #[serde(default)]
    pub rounds: Vec<RoundReport>,
}

/// Every agent-key variant recorded for one instruction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstructionRecord {
    /// Variants keyed by [`AgentKey::storage_key`].
    pub variants: BTreeMap<String, VariantRecord>,
}

/// Instruction records keyed by instruction text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstructionStore {
    records: BTreeMap<String, InstructionRecord>,
}

impl InstructionStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for `instruction` under `agent`.
    #[must_use]
    pub fn get(&self, instruction: &str, agent: &AgentKey) -> Option<&VariantRecord> {
        self.records
            .get(instruction)?
            .variants
            .get(&agent.storage_key())
    }

    /// All variants recorded for `instruction`.
    #[must_use]
    pub fn record(&self, instruction: &str) -> Option<&InstructionRecord> {
        self.records.get(instruction)
    }

    /// Insert or replace the record for `instruction` under `agent`.
    pub fn upsert(&mut self, instruction: &str, agent: &AgentKey, variant: VariantRecord) {
        self.records
            .entry(instruction.to_owned())
            .or_default()
            .variants
            .insert(agent.storage_key(), variant);
    }

    /// Remove the record for `instruction` under `agent`.
    pub fn remove(&mut self, instruction: &str, agent: &AgentKey) -> Option<VariantRecord> {
        let record = self.records.get_mut(instruction)?;
        let removed = record.variants.remove(&agent.storage_key());
        if record.variants.is_empty() {
            self.records.remove(instruction);
        }
        removed
    }

    /// Instruction texts in sorted order.
    pub fn instructions(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// Number of instructions with at least one variant.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the store to `path` as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an I/O or serialization error.
    pub fn save_json(&self, path: impl AsRef<Path>) -> HeliosResult<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        tracing::debug!(path = %path.display(), instructions = self.len(), "saved instruction store");
        Ok(())
    }

    /// Read a store written by [`save_json`](Self::save_json).
    ///
    /// # Errors
    ///
    /// Returns an I/O or serialization error.
    pub fn load_json(path: impl AsRef<Path>) -> HeliosResult<Self> {
        let path = path.as_ref();
        let store: Self = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        tracing::debug!(path = %path.display(), instructions = store.len(), "loaded instruction store");
        Ok(store)
    }
}
