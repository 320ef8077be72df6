//! Configuration validation
//!
//! Runs on a deserialized [`EngineConfig`] and collects every issue instead
//! of stopping at the first, so one `riposte validate` run reports them all.

use std::collections::HashSet;

use crate::config::schema::EngineConfig;
use crate::error::{Severity, ValidationIssue};

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a configuration and returns every error and warning found.
    pub fn validate(&mut self, config: &EngineConfig) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_tick(config);
        self.validate_thresholds(config);
        self.validate_ranks(config);
        self.validate_coverage(config);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    fn validate_tick(&mut self, config: &EngineConfig) {
        if config.tick_interval.is_zero() {
            self.add_error("tick_interval", "must be greater than zero");
        }
    }

    fn validate_thresholds(&mut self, config: &EngineConfig) {
        for (i, threshold) in config.reminder_thresholds.iter().enumerate() {
            if threshold.is_zero() {
                self.add_error(
                    &format!("reminder_thresholds[{i}]"),
                    "must be greater than zero",
                );
            }
        }
        for (i, pair) in config.reminder_thresholds.windows(2).enumerate() {
            if pair[1] >= pair[0] {
                self.add_error(
                    &format!("reminder_thresholds[{}]", i + 1),
                    "thresholds must be unique and listed longest first",
                );
            }
        }
    }

    fn validate_ranks(&mut self, config: &EngineConfig) {
        if config.ranks.is_empty() {
            self.add_error("ranks", "must not be empty");
            return;
        }

        let mut seen = HashSet::new();
        for (i, entry) in config.ranks.iter().enumerate() {
            let name = entry.rank.as_str();
            if name.is_empty() {
                self.add_error(&format!("ranks[{i}].rank"), "rank name must not be blank");
            } else if !seen.insert(name.to_string()) {
                self.add_error(
                    &format!("ranks[{i}].rank"),
                    &format!("duplicate rank '{name}'"),
                );
            }
            if entry.window.is_zero() {
                self.add_error(&format!("ranks[{i}].window"), "must be greater than zero");
            }
        }

        for (i, pair) in config.ranks.windows(2).enumerate() {
            if pair[1].window >= pair[0].window {
                self.add_error(
                    &format!("ranks[{}].window", i + 1),
                    &format!(
                        "rank '{}' must have a shorter window than '{}'",
                        pair[1].rank, pair[0].rank
                    ),
                );
            }
        }
    }

    /// Warnings for settings that load but behave in surprising ways.
    fn validate_coverage(&mut self, config: &EngineConfig) {
        let Some(longest) = config.ranks.iter().map(|e| e.window).max() else {
            return;
        };
        for (i, threshold) in config.reminder_thresholds.iter().enumerate() {
            if *threshold >= longest {
                self.add_warning(
                    &format!("reminder_thresholds[{i}]"),
                    "threshold is not shorter than any rank window and will never fire",
                );
            }
        }

        if let Some(shortest) = config.ranks.iter().map(|e| e.window).min() {
            if !config.tick_interval.is_zero() && config.tick_interval > shortest {
                self.add_warning(
                    "tick_interval",
                    "tick is longer than the shortest rank window; expiry will lag",
                );
            }
        }
    }

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}
