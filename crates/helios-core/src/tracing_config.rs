//! Tracing conventions shared by the helios crates.
//!
//! Consumers bring their own subscriber (the `helios` facade crate offers
//! one); this module only fixes the names used in spans and events.

use tracing::Level;

/// Target prefix used by all helios tracing spans and events.
///
/// ```text
/// RUST_LOG=helios=debug
/// ```
pub const TARGET_PREFIX: &str = "helios";

/// Standard span names used across the search pipeline.
pub mod span_names {
    /// Root span for one search session.
    pub const SEARCH: &str = "helios::search";
    /// Exploration pass through the environment collaborator.
    pub const EXPLORE: &str = "helios::explore";
    /// Scoring of the observed-state registry.
    pub const SCORE: &str = "helios::score";
    /// Feedback round.
    pub const FEEDBACK: &str = "helios::feedback";
}

/// Parse a log level string (case-insensitive).
///
/// Recognized values: `trace`, `debug`, `info`, `warn`, `error`.
#[must_use]
pub fn parse_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Checks `HELIOS_LOG_LEVEL`, falling back to `default`.
#[must_use]
pub fn level_from_env(default: Level) -> Level {
    std::env::var("HELIOS_LOG_LEVEL")
        .ok()
        .and_then(|s| parse_level(&s))
        .unwrap_or(default)
}
