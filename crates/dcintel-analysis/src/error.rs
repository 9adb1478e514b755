use dcintel_core::ToolId;
use thiserror::Error;

/// A response that cannot be turned into a record at all.
///
/// Field-level problems never surface here; they become `unavailable`
/// values with warnings on the record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizationError {
    #[error("{0} has no data domain")]
    NoDomain(ToolId),

    #[error("cannot determine entity key for {tool}: {reason}")]
    NoEntityKey { tool: ToolId, reason: String },
}

/// Invalid scoring or scenario configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("risk weights must sum to 1 (got {sum})")]
    WeightSum { sum: f64 },

    #[error("risk weight for {axis} is negative or not finite ({value})")]
    NegativeWeight { axis: &'static str, value: f64 },

    #[error("{name} must be {expected} (got {value})")]
    Parameter {
        name: &'static str,
        expected: &'static str,
        value: f64,
    },
}
