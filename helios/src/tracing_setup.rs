//! Log subscriber for programs built on helios.
//!
//! A [`LogView`] picks which part of a search session reaches stderr:
//! nothing but errors, the feedback rounds, the rounds plus every
//! exploration episode, or everything. Environment variables still win:
//!
//! 1. `HELIOS_LOG` (full directive list, e.g. `helios_search=debug,warn`)
//! 2. `RUST_LOG`
//! 3. the view's directives, with `HELIOS_LOG_LEVEL` as the base level

use std::fmt;
use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;

use helios_core::error::HeliosError;
use helios_core::tracing_config::{self, TARGET_PREFIX, span_names};

const SEARCH_TARGET: &str = "helios_search";
const EXPERIENCE_TARGET: &str = "helios_experience";

/// Which part of a search session the log shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogView {
    /// Errors only.
    Quiet,
    /// Reuse decisions, fallbacks, restarts and one line per feedback round.
    #[default]
    Rounds,
    /// Rounds plus every exploration episode, with pass timings.
    Exploration,
    /// Every helios span and event.
    Trace,
}

impl LogView {
    /// Base level for targets outside helios.
    #[must_use]
    pub const fn base_level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Rounds | Self::Exploration | Self::Trace => Level::WARN,
        }
    }

    /// Filter directives for this view over `base`.
    #[must_use]
    pub fn directives(self, base: Level) -> String {
        let base = base.as_str().to_lowercase();
        match self {
            Self::Quiet => base,
            Self::Rounds => format!(
                "{base},{SEARCH_TARGET}=info,[{score}]=debug",
                score = span_names::SCORE,
            ),
            Self::Exploration => format!(
                "{base},{SEARCH_TARGET}=info,{EXPERIENCE_TARGET}=debug,[{explore}]=debug",
                explore = span_names::EXPLORE,
            ),
            Self::Trace => format!("{base},{TARGET_PREFIX}=trace"),
        }
    }

    const fn span_events(self) -> FmtSpan {
        match self {
            Self::Quiet | Self::Rounds => FmtSpan::NONE,
            Self::Exploration => FmtSpan::CLOSE,
            Self::Trace => FmtSpan::FULL,
        }
    }
}

impl fmt::Display for LogView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Quiet => "quiet",
            Self::Rounds => "rounds",
            Self::Exploration => "exploration",
            Self::Trace => "trace",
        })
    }
}

impl FromStr for LogView {
    type Err = HeliosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "quiet" => Ok(Self::Quiet),
            "rounds" => Ok(Self::Rounds),
            "exploration" | "explore" => Ok(Self::Exploration),
            "trace" => Ok(Self::Trace),
            _ => Err(HeliosError::InvalidConfig {
                field: "log_view".to_owned(),
                value: s.to_owned(),
                reason: "expected quiet, rounds, exploration or trace".to_owned(),
            }),
        }
    }
}

/// Install the global subscriber for `view`.
///
/// Returns `false` if a global subscriber was already installed; the existing
/// one is kept.
pub fn init_subscriber(view: LogView, no_color: bool) -> bool {
    let use_ansi = !no_color && std::io::IsTerminal::is_terminal(&std::io::stderr());
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(use_ansi)
        .with_span_events(view.span_events())
        .without_time()
        .compact();
    tracing_subscriber::registry()
        .with(env_filter(view))
        .with(layer)
        .try_init()
        .is_ok()
}

fn env_filter(view: LogView) -> EnvFilter {
    let from_env = std::env::var("HELIOS_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok());
    if let Some(filter) = from_env {
        return filter;
    }
    let base = tracing_config::level_from_env(view.base_level());
    EnvFilter::try_new(view.directives(base)).unwrap_or_else(|_| EnvFilter::new(base.as_str()))
}
