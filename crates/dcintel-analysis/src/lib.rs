//! dcintel analysis: the pure stages of the due-diligence pipeline
//!
//! ```text
//! RawResponse ─► normalize ─► NormalizedRecord ─► matrix::build ─► FeatureVector
//!                                                                      │
//!   Recommendation ◄─ Synthesizer ◄─ ScenarioResult ◄─ ScenarioEngine ◄─ RiskScorer
//! ```
//!
//! Nothing here performs I/O or holds shared state. Given the same inputs
//! every stage returns the same outputs.

pub mod error;
pub mod matrix;
pub mod normalize;
pub mod risk;
pub mod scenario;
pub mod synthesize;

pub use error::{ConfigError, NormalizationError};
pub use matrix::{build, build_matrix, FeatureMatrix};
pub use normalize::{normalize, normalize_all};
pub use risk::{axis_score, Band, RiskScorer, RiskWeights};
pub use scenario::{irr, FinancialInputs, ScenarioConfig, ScenarioEngine};
pub use synthesize::{SynthesisConfig, Synthesizer};
