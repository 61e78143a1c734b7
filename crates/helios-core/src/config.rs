//! Configuration for sub-goal search sessions.
//!
//! [`SearchConfig`] holds every budget and threshold the search engine uses.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HeliosError, HeliosResult};

/// Configuration for the sub-goal search engine.
///
/// All fields have defaults. Override selectively via a TOML file or
/// environment variables.
///
/// # Environment Variable Overrides
///
/// | Variable                        | Field                        | Default |
/// |---------------------------------|------------------------------|---------|
/// | `HELIOS_EXPLORATION_EPISODES`   | `exploration_episodes`       | `100`   |
/// | `HELIOS_SIM_THRESHOLD`          | `sim_threshold`              | `0.9`   |
/// | `HELIOS_FEEDBACK_INCREMENT`     | `feedback_increment`         | `0.5`   |
/// | `HELIOS_NUM_REPEATS`            | `num_repeats`                | `1`     |
/// | `HELIOS_FEEDBACK_ROUNDS`        | `feedback_rounds_per_repeat` | `1`     |
/// | `HELIOS_MAX_RESTARTS`           | `max_divergence_restarts`    | `8`     |
/// | `HELIOS_ACTION_CAP`             | `default_action_cap`         | `5`     |
/// | `HELIOS_SEED`                   | `seed`                       | `42`    |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Episode cap for a single exploration pass.
    /// Default: 100.
    pub exploration_episodes: usize,

    /// Similarity a state must reach to be accepted outright.
    /// Default: 0.9.
    pub sim_threshold: f32,

    /// Step size applied to the feedback layer per accepted/rejected match.
    /// Default: 0.5.
    pub feedback_increment: f32,

    /// Number of search repeats per session.
    /// Default: 1.
    pub num_repeats: usize,

    /// Feedback rounds allowed within one repeat. A repeat ends early on the
    /// first accepted match.
    /// Default: 1.
    pub feedback_rounds_per_repeat: usize,

    /// Registry resets allowed per session after divergence is detected.
    /// Default: 8.
    pub max_divergence_restarts: usize,

    /// Per-episode action cap used when a request does not set one.
    /// Default: 5.
    pub default_action_cap: usize,

    /// Seed for the session's pseudo-random source.
    /// Default: 42.
    pub seed: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            exploration_episodes: 100,
            sim_threshold: 0.9,
            feedback_increment: 0.5,
            num_repeats: 1,
            feedback_rounds_per_repeat: 1,
            max_divergence_restarts: 8,
            default_action_cap: 5,
            seed: 42,
        }
    }
}

impl SearchConfig {
    /// Parse a config from TOML. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`HeliosError::InvalidConfig`] if the TOML is malformed or a
    /// value fails [`validate`](Self::validate).
    pub fn from_toml_str(contents: &str) -> HeliosResult<Self> {
        let config: Self = toml::from_str(contents).map_err(|e| HeliosError::InvalidConfig {
            field: "<toml>".to_owned(),
            value: String::new(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`HeliosError::Io`] if the file cannot be read, or
    /// [`HeliosError::InvalidConfig`] if it does not parse or validate.
    pub fn load(path: impl AsRef<Path>) -> HeliosResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading search config");
        Self::from_toml_str(&contents)
    }

    /// Load overrides from environment variables.
    ///
    /// Only overrides fields for which environment variables are set.
    /// Invalid values are ignored with a warning (defaults are kept).
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(val) = lookup("HELIOS_EXPLORATION_EPISODES") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => self.exploration_episodes = n,
                _ => warn_ignored("HELIOS_EXPLORATION_EPISODES", &val),
            }
        }
        if let Some(val) = lookup("HELIOS_SIM_THRESHOLD") {
            match val.parse::<f32>() {
                Ok(t) if (-1.0..=1.0).contains(&t) => self.sim_threshold = t,
                _ => warn_ignored("HELIOS_SIM_THRESHOLD", &val),
            }
        }
        if let Some(val) = lookup("HELIOS_FEEDBACK_INCREMENT") {
            match val.parse::<f32>() {
                Ok(k) if k.is_finite() && k >= 0.0 => self.feedback_increment = k,
                _ => warn_ignored("HELIOS_FEEDBACK_INCREMENT", &val),
            }
        }
        if let Some(val) = lookup("HELIOS_NUM_REPEATS") {
            match val.parse::<usize>() {
                Ok(n) => self.num_repeats = n,
                Err(_) => warn_ignored("HELIOS_NUM_REPEATS", &val),
            }
        }
        if let Some(val) = lookup("HELIOS_FEEDBACK_ROUNDS") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => self.feedback_rounds_per_repeat = n,
                _ => warn_ignored("HELIOS_FEEDBACK_ROUNDS", &val),
            }
        }
        if let Some(val) = lookup("HELIOS_MAX_RESTARTS") {
            match val.parse::<usize>() {
                Ok(n) => self.max_divergence_restarts = n,
                Err(_) => warn_ignored("HELIOS_MAX_RESTARTS", &val),
            }
        }
        if let Some(val) = lookup("HELIOS_ACTION_CAP") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => self.default_action_cap = n,
                _ => warn_ignored("HELIOS_ACTION_CAP", &val),
            }
        }
        if let Some(val) = lookup("HELIOS_SEED") {
            match val.parse::<u64>() {
                Ok(seed) => self.seed = seed,
                Err(_) => warn_ignored("HELIOS_SEED", &val),
            }
        }
        self
    }

    /// Check that every field is within its valid range.
    ///
    /// # Errors
    ///
    /// Returns [`HeliosError::InvalidConfig`] naming the first invalid field.
    pub fn validate(&self) -> HeliosResult<()> {
        if !(-1.0..=1.0).contains(&self.sim_threshold) {
            return Err(invalid(
                "sim_threshold",
                self.sim_threshold,
                "must lie in the cosine range [-1, 1]",
            ));
        }
        if !self.feedback_increment.is_finite() || self.feedback_increment < 0.0 {
            return Err(invalid(
                "feedback_increment",
                self.feedback_increment,
                "must be a finite, non-negative step size",
            ));
        }
        if self.exploration_episodes == 0 {
            return Err(invalid(
                "exploration_episodes",
                0,
                "at least one exploration episode is needed to observe states",
            ));
        }
        if self.feedback_rounds_per_repeat == 0 {
            return Err(invalid(
                "feedback_rounds_per_repeat",
                0,
                "each repeat needs at least one feedback round",
            ));
        }
        if self.default_action_cap == 0 {
            return Err(invalid(
                "default_action_cap",
                0,
                "episodes need at least one action",
            ));
        }
        Ok(())
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> HeliosError {
    HeliosError::InvalidConfig {
        field: field.to_owned(),
        value: value.to_string(),
        reason: reason.to_owned(),
    }
}

fn warn_ignored(var: &str, value: &str) {
    tracing::warn!(var, value, "ignoring invalid environment override");
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_validate() {
        SearchConfig::default().validate().unwrap();
    }

    #[test]
    fn toml_overrides_selected_fields() {
        let config = SearchConfig::from_toml_str(
            "sim_threshold = 0.75\nnum_repeats = 3\nexploration_episodes = 20\n",
        )
        .unwrap();
        assert!((config.sim_threshold - 0.75).abs() < f32::EPSILON);
        assert_eq!(config.num_repeats, 3);
        assert_eq!(config.exploration_episodes, 20);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn toml_with_out_of_range_threshold_is_rejected() {
        let err = SearchConfig::from_toml_str("sim_threshold = 1.5").unwrap_err();
        match err {
            HeliosError::InvalidConfig { field, .. } => assert_eq!(field, "sim_threshold"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_toml_is_invalid_config() {
        let err = SearchConfig::from_toml_str("sim_threshold = [").unwrap_err();
        assert!(matches!(err, HeliosError::InvalidConfig { .. }));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search.toml");
        std::fs::write(&path, toml::to_string(&SearchConfig::default()).unwrap()).unwrap();
        assert_eq!(SearchConfig::load(&path).unwrap(), SearchConfig::default());
    }

    #[test]
    fn overrides_apply_valid_values_and_skip_invalid_ones() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("HELIOS_SIM_THRESHOLD", "0.8"),
            ("HELIOS_NUM_REPEATS", "4"),
            ("HELIOS_FEEDBACK_INCREMENT", "-1"),
            ("HELIOS_EXPLORATION_EPISODES", "lots"),
        ]);
        let config = SearchConfig::default()
            .with_overrides_from(|key| vars.get(key).map(|v| (*v).to_owned()));
        assert!((config.sim_threshold - 0.8).abs() < f32::EPSILON);
        assert_eq!(config.num_repeats, 4);
        assert!((config.feedback_increment - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.exploration_episodes, 100);
    }

    #[test]
    fn round_restart_and_cap_budgets_are_overridable() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("HELIOS_FEEDBACK_ROUNDS", "3"),
            ("HELIOS_MAX_RESTARTS", "0"),
            ("HELIOS_ACTION_CAP", "0"),
            ("HELIOS_SEED", "7"),
        ]);
        let config = SearchConfig::default()
            .with_overrides_from(|key| vars.get(key).map(|v| (*v).to_owned()));
        assert_eq!(config.feedback_rounds_per_repeat, 3);
        assert_eq!(config.max_divergence_restarts, 0);
        assert_eq!(config.default_action_cap, 5);
        assert_eq!(config.seed, 7);
        config.validate().unwrap();
    }

    #[test]
    fn zero_feedback_rounds_is_rejected() {
        let config = SearchConfig {
            feedback_rounds_per_repeat: 0,
            ..SearchConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
