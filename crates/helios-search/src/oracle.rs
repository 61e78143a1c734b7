//! Feedback oracles: who decides whether the best-matching state satisfies
//! the instruction.
//!
//! The engine blocks on [`FeedbackOracle::judge`] once per feedback round.
//! Implementations:
//! - [`PromptOracle`]: asks an operator over any `BufRead`/`Write` pair
//!   (stdin/stdout via [`PromptOracle::stdio`]).
//! - [`ScriptedOracle`]: replays a fixed verdict sequence.
//! - [`GroundTruthOracle`]: accepts exactly the states of a known sub-goal set.
//! - [`FnOracle`]: adapts a closure.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use serde::{Deserialize, Serialize};

use helios_core::error::{HeliosError, HeliosResult};
use helios_core::types::Observation;

use crate::scoring::StateScore;

/// Accept/reject signal for one feedback round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// The state satisfies the instruction.
    Accept,
    /// The state does not satisfy the instruction.
    Reject,
}

impl Verdict {
    /// `Accept` for `true`, `Reject` for `false`.
    #[must_use]
    pub const fn from_bool(accepted: bool) -> Self {
        if accepted { Self::Accept } else { Self::Reject }
    }

    /// Whether this is [`Verdict::Accept`].
    #[must_use]
    pub const fn is_accept(self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// What the oracle is asked about.
#[derive(Debug, Clone, Copy)]
pub struct FeedbackQuery<'a> {
    /// Instruction text.
    pub instruction: &'a str,
    /// Best-matching observed state.
    pub candidate: &'a Observation,
    /// Its similarity to the instruction.
    pub similarity: f32,
    /// All candidates selected in this round.
    pub candidates: &'a [StateScore],
    /// Whether the best match reached the acceptance threshold.
    pub above_threshold: bool,
}

/// Decides whether a candidate state satisfies an instruction.
pub trait FeedbackOracle {
    /// Judge `query.candidate`.
    ///
    /// # Errors
    ///
    /// Returns [`HeliosError::OracleFailed`] when no verdict can be produced.
    fn judge(&mut self, query: &FeedbackQuery<'_>) -> HeliosResult<Verdict>;
}

impl<T: FeedbackOracle + ?Sized> FeedbackOracle for Box<T> {
    fn judge(&mut self, query: &FeedbackQuery<'_>) -> HeliosResult<Verdict> {
        (**self).judge(query)
    }
}

// ─── Prompt ──────────────────────────────────────────────────────────────────

/// Asks an operator, reading `y`/`yes` (any case) as accept and anything
/// else as reject.
#[derive(Debug)]
pub struct PromptOracle<R, W> {
    input: R,
    output: W,
}

impl PromptOracle<io::StdinLock<'static>, io::Stdout> {
    /// Prompt on stdout, read answers from stdin.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptOracle<R, W> {
    /// Prompt on `output`, read answers from `input`.
    pub const fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Release the underlying reader and writer.
    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }
}

impl<R: BufRead, W: Write> FeedbackOracle for PromptOracle<R, W> {
    fn judge(&mut self, query: &FeedbackQuery<'_>) -> HeliosResult<Verdict> {
        writeln!(self.output, "Instruction: {}", query.instruction)?;
        if !query.above_threshold {
            writeln!(
                self.output,
                "No state reached the similarity threshold; showing the closest match."
            )?;
        }
        writeln!(
            self.output,
            "Best match: {} (similarity {:.4})",
            query.candidate, query.similarity
        )?;
        write!(self.output, "Does this state satisfy the instruction? [y/N] ")?;
        self.output.flush()?;

        let mut answer = String::new();
        if self.input.read_line(&mut answer)? == 0 {
            return Err(HeliosError::OracleFailed {
                reason: "input closed before an answer was given".to_owned(),
            });
        }
        let answer = answer.trim().to_lowercase();
        Ok(Verdict::from_bool(answer == "y" || answer == "yes"))
    }
}

// ─── Scripted ────────────────────────────────────────────────────────────────

/// Replays verdicts in order, then an optional default.
#[derive(Debug, Clone, Default)]
pub struct ScriptedOracle {
    script: VecDeque<Verdict>,
    default: Option<Verdict>,
    judged: Vec<Observation>,
}

impl ScriptedOracle {
    /// Replay `verdicts`; fail once they run out.
    pub fn new(verdicts: impl IntoIterator<Item = Verdict>) -> Self {
        Self {
            script: verdicts.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Always answer `verdict`.
    #[must_use]
    pub fn always(verdict: Verdict) -> Self {
        Self {
            default: Some(verdict),
            ..Self::default()
        }
    }

    /// Answer `verdict` once the script runs out.
    #[must_use]
    pub fn then(mut self, verdict: Verdict) -> Self {
        self.default = Some(verdict);
        self
    }

    /// Candidates judged so far, in order.
    #[must_use]
    pub fn judged(&self) -> &[Observation] {
        &self.judged
    }
}

impl FeedbackOracle for ScriptedOracle {
    fn judge(&mut self, query: &FeedbackQuery<'_>) -> HeliosResult<Verdict> {
        let verdict = self
            .script
            .pop_front()
            .or(self.default)
            .ok_or_else(|| HeliosError::OracleFailed {
                reason: format!("verdict script exhausted after {} rounds", self.judged.len()),
            })?;
        self.judged.push(query.candidate.clone());
        Ok(verdict)
    }
}

// ─── Ground Truth ────────────────────────────────────────────────────────────

/// Accepts a candidate iff it belongs to a known sub-goal set.
#[derive(Debug, Clone)]
pub struct GroundTruthOracle {
    sub_goals: Vec<Observation>,
}

impl GroundTruthOracle {
    /// Oracle for the given sub-goal set.
    #[must_use]
    pub const fn new(sub_goals: Vec<Observation>) -> Self {
        Self { sub_goals }
    }

    /// The known sub-goals.
    #[must_use]
    pub fn sub_goals(&self) -> &[Observation] {
        &self.sub_goals
    }
}

impl FeedbackOracle for GroundTruthOracle {
    fn judge(&mut self, query: &FeedbackQuery<'_>) -> HeliosResult<Verdict> {
        let found = self.sub_goals.contains(query.candidate);
        tracing::debug!(
            candidate = %query.candidate,
            found,
            "ground-truth check"
        );
        Ok(Verdict::from_bool(found))
    }
}

// ─── Closure ─────────────────────────────────────────────────────────────────

/// Wraps a closure as an oracle.
pub struct FnOracle<F>(pub F);

impl<F> std::fmt::Debug for FnOracle<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnOracle")
    }
}

impl<F> FeedbackOracle for FnOracle<F>
where
    F: FnMut(&FeedbackQuery<'_>) -> Verdict,
{
    fn judge(&mut self, query: &FeedbackQuery<'_>) -> HeliosResult<Verdict> {
        Ok((self.0)(query))
    }
}
