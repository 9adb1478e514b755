use thiserror::Error;

/// Call validation failures. Fatal to the offending call only.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("{tool}: missing required parameter '{name}'")]
    MissingParameter { tool: &'static str, name: &'static str },

    #[error("{tool}: unknown parameter '{name}'")]
    UnknownParameter { tool: &'static str, name: String },

    #[error("{tool}: parameter '{name}' must be {expected}, got {found}")]
    WrongType {
        tool: &'static str,
        name: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{tool}: parameter '{name}' = {value} outside [{min}, {max}]")]
    OutOfRange {
        tool: &'static str,
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}
