use chrono::{DateTime, Utc};
use dcintel_core::{FeatureVector, Recommendation, RiskScore, ScenarioResult};
use dcintel_dispatch::{DispatchStats, Tier};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Everything one analysis run produced. Serialized as the run's JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub tier: Tier,
    pub targets: Vec<String>,
    pub planned_calls: usize,
    /// Calls that returned a response or a per-call error before the deadline.
    pub completed_calls: usize,
    pub successful_calls: usize,
    /// Calls still pending when the session deadline passed.
    pub abandoned_calls: usize,
    pub timed_out: bool,
    pub dispatch: DispatchStats,
    pub features: BTreeMap<String, FeatureVector>,
    pub scores: BTreeMap<String, RiskScore>,
    pub scenarios: BTreeMap<String, Vec<ScenarioResult>>,
    pub recommendation: Recommendation,
    /// Targets that did not make it into the recommendation.
    pub excluded: Vec<String>,
    pub warnings: Vec<String>,
}

impl AnalysisReport {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn is_partial(&self) -> bool {
        self.timed_out
            || self.successful_calls < self.planned_calls
            || self
                .recommendation
                .entries
                .iter()
                .any(|e| e.narrative_flags.incomplete_data)
    }
}
