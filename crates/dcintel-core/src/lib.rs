//! dcintel core: data model for the due-diligence pipeline
//!
//! Shared vocabulary of every stage:
//!
//! ```text
//! ToolCall ──► RawResponse ──► NormalizedRecord ──► FeatureVector
//!   (dispatch)     (normalize)        (matrix)          │
//!                                                       ▼
//!            Recommendation ◄── ScenarioResult ◄── RiskScore
//! ```
//!
//! - [`catalog`]: the fixed set of read-only tools and their parameter schemas
//! - [`domain`]: data domains and canonical field schemas (names, units, ranges)
//! - [`metric`]: value-or-unavailable numbers
//! - [`model`]: calls, responses, normalized records, feature vectors
//! - [`assessment`]: risk scores, scenarios, recommendations

pub mod assessment;
pub mod catalog;
pub mod domain;
pub mod error;
pub mod metric;
pub mod model;

pub use assessment::{
    NarrativeFlags, Recommendation, RecommendationEntry, RiskAxis, RiskScore, ScenarioAssumptions,
    ScenarioName, ScenarioResult, ScenarioWarning,
};
pub use catalog::{ParamKind, ParamSpec, ToolId};
pub use domain::{field, Domain, FieldSpec, Unit};
pub use error::CoreError;
pub use metric::Metric;
pub use model::{
    canonical_call, params, CallKey, FailureKind, FeatureVector, NormalizedRecord, Parameters,
    RawResponse, ResponseStatus, Scalar, ToolCall,
};
