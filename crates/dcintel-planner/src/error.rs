use dcintel_core::ToolId;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("environment variable {var}: {reason}")]
    Env { var: &'static str, reason: String },

    #[error("invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error(transparent)]
    Analysis(#[from] dcintel_analysis::ConfigError),
}

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("empty target")]
    Empty,

    #[error("invalid country code '{0}' (expected 2 or 3 letters)")]
    Country(String),

    #[error("invalid site '{0}' (expected lat,lon)")]
    Site(String),
}

/// Run-level failures. Everything narrower degrades into the report.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("no targets to analyze")]
    NoTargets,

    #[error("credential rejected by {tool}: {reason}")]
    Auth { tool: ToolId, reason: String },

    #[error("no data: none of the {planned} planned calls succeeded")]
    NoData { planned: usize },
}
