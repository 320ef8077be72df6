//! Error types for `Riposte`
//!
//! One top-level error aggregates the domain errors so the CLI can map any
//! failure to an exit code. "Too late" counter attempts are not errors: they
//! are reported through [`AttemptOutcome`](crate::arbiter::AttemptOutcome).

use std::path::PathBuf;
use thiserror::Error;

use crate::window::WindowId;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `riposte` CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Engine error (duplicate window id, engine not running)
    pub const ENGINE_ERROR: i32 = 5;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `Riposte` operations.
#[derive(Debug, Error)]
pub enum RiposteError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Window engine error
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Notification sink error
    #[error(transparent)]
    Notify(#[from] NotifyError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl RiposteError {
    /// Returns the exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Engine(_) => ExitCode::ENGINE_ERROR,
            Self::Notify(_) => ExitCode::ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file (`<string>` for inline sources)
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}: {}", format_issues(errors))]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Configuration source exceeds the size limit
    #[error("configuration too large: {size} bytes (limit: {limit})")]
    TooLarge {
        /// Actual size in bytes
        size: usize,
        /// Configured limit in bytes
        limit: usize,
    },

    /// Required environment variable referenced with `${VAR:?message}` is not set
    #[error("environment variable '{var}' not set: {message}")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Message given after `:?` in the reference
        message: String,
    },
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "ranks[2].window")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Prevents the configuration from being used
    Error,
    /// Reported, but the configuration still loads
    Warning,
}

// ============================================================================
// Engine Errors
// ============================================================================

/// Window engine errors.
///
/// These are integration faults on the caller's side. Expected outcomes such
/// as a counter attempt arriving after the window closed are not errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A window with this id is already open
    #[error("window id already open: {id}")]
    DuplicateWindowId {
        /// The colliding id
        id: WindowId,
    },

    /// The monitor task was already started, or the engine has shut down
    #[error("engine not running: {0}")]
    NotRunning(String),
}

// ============================================================================
// Notification Errors
// ============================================================================

/// Failures reported by a [`NotificationSink`](crate::notify::NotificationSink).
///
/// The engine logs these and moves on; a failed delivery never undoes a
/// window's terminal transition.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The receiving side of a channel sink was dropped
    #[error("notification channel closed")]
    ChannelClosed,

    /// I/O error while writing a notification
    #[error("notification I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization of a notification failed
    #[error("notification encoding error: {0}")]
    Json(#[from] serde_json::Error),

    /// External transport rejected the notification
    #[error("transport error: {0}")]
    Transport(String),
}

impl NotifyError {
    /// Short label used for the failure metric.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ChannelClosed => "channel_closed",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Transport(_) => "transport",
        }
    }
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `Riposte` operations.
pub type Result<T> = std::result::Result<T, RiposteError>;

// ============================================================================
// Tests
// ============================================================================
