use thiserror::Error;

/// Canonical planwatch error taxonomy used across crates.
///
/// Classification guidance:
/// - [`PlanwatchError::InvalidConfig`]: config file/env/CLI contract violations
/// - [`PlanwatchError::Snapshot`]: a polled snapshot that cannot be interpreted
/// - [`PlanwatchError::UnsupportedUnit`]: an upstream unit string this build does not know
/// - [`PlanwatchError::Io`] / [`PlanwatchError::Json`]: raw std IO and decode failures
#[derive(Debug, Error)]
pub enum PlanwatchError {
    /// Invalid or inconsistent configuration.
    ///
    /// Examples:
    /// - unparseable `PLANWATCH_*` environment value
    /// - missing value for a CLI flag
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Poll input that is well-formed JSON but semantically unusable.
    ///
    /// Examples:
    /// - submission timestamp not in the engine's date format
    /// - metric value without a numeric component
    #[error("invalid snapshot: {0}")]
    Snapshot(String),

    /// Unknown unit in a duration string.
    ///
    /// Never defaulted: a new unit means the server contract changed.
    #[error("unsupported time unit: {0}")]
    UnsupportedUnit(String),

    /// Transparent std IO failures.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Transparent JSON decode/encode failures.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Standard planwatch result alias.
pub type Result<T> = std::result::Result<T, PlanwatchError>;
