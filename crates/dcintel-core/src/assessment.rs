//! Scoring outputs: risk scores, return scenarios and recommendations.

use crate::domain::Domain;
use crate::metric::Metric;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ============================================================================
// Risk
// ============================================================================

/// The eight risk axes. Higher axis scores mean lower risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskAxis {
    PowerCost,
    GridMix,
    CarbonExposure,
    WaterStress,
    MarketLiquidity,
    PipelinePressure,
    ConnectivitySiting,
    MarketSentiment,
}

impl RiskAxis {
    pub const ALL: [RiskAxis; 8] = [
        RiskAxis::PowerCost,
        RiskAxis::GridMix,
        RiskAxis::CarbonExposure,
        RiskAxis::WaterStress,
        RiskAxis::MarketLiquidity,
        RiskAxis::PipelinePressure,
        RiskAxis::ConnectivitySiting,
        RiskAxis::MarketSentiment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskAxis::PowerCost => "power_cost",
            RiskAxis::GridMix => "grid_mix",
            RiskAxis::CarbonExposure => "carbon_exposure",
            RiskAxis::WaterStress => "water_stress",
            RiskAxis::MarketLiquidity => "market_liquidity",
            RiskAxis::PipelinePressure => "pipeline_pressure",
            RiskAxis::ConnectivitySiting => "connectivity_siting",
            RiskAxis::MarketSentiment => "market_sentiment",
        }
    }
}

impl fmt::Display for RiskAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    pub country: String,
    /// One entry per axis, 0-100 or unavailable.
    pub dimension_scores: BTreeMap<RiskAxis, Metric>,
    pub overall_score: Metric,
    pub missing_dimensions: BTreeSet<RiskAxis>,
    pub unavailable_domains: BTreeSet<Domain>,
}

impl RiskScore {
    pub fn axis(&self, axis: RiskAxis) -> Metric {
        self.dimension_scores
            .get(&axis)
            .copied()
            .unwrap_or(Metric::Unavailable)
    }

    pub fn present_axes(&self) -> impl Iterator<Item = (RiskAxis, f64)> + '_ {
        self.dimension_scores
            .iter()
            .filter_map(|(axis, m)| m.value().map(|v| (*axis, v)))
    }

    pub fn is_complete(&self) -> bool {
        self.missing_dimensions.is_empty()
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioName {
    Bear,
    Base,
    Bull,
}

impl ScenarioName {
    pub const ALL: [ScenarioName; 3] = [ScenarioName::Bear, ScenarioName::Base, ScenarioName::Bull];
}

impl fmt::Display for ScenarioName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScenarioName::Bear => "bear",
            ScenarioName::Base => "base",
            ScenarioName::Bull => "bull",
        })
    }
}

/// Inputs actually used for one scenario's cash flows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioAssumptions {
    pub capacity_mw: f64,
    pub price_per_mw_usd_m: f64,
    pub entry_cap_rate_pct: f64,
    pub exit_cap_rate_pct: f64,
    /// Multiplier applied to operating income (1 − σ, 1, 1 + σ).
    pub price_multiplier: f64,
    pub noi_growth_pct: f64,
    pub horizon: u32,
    pub risk_factor: f64,
    /// Inputs that fell back to configured defaults.
    pub defaulted: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum ScenarioWarning {
    HighRisk { overall_score: f64, floor: f64 },
    RiskScoreUnavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub entity_key: String,
    pub scenario_name: ScenarioName,
    /// Percentage, e.g. 8.5 for 8.5 %.
    pub irr: Metric,
    pub assumptions: ScenarioAssumptions,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ScenarioWarning>,
}

impl ScenarioResult {
    pub fn has_high_risk_warning(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, ScenarioWarning::HighRisk { .. }))
    }
}

// ============================================================================
// Recommendation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NarrativeFlags {
    /// Two lowest-scoring present axes.
    pub risks: Vec<RiskAxis>,
    /// Two highest-scoring present axes.
    pub opportunities: Vec<RiskAxis>,
    pub incomplete_data: bool,
    pub high_risk: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationEntry {
    pub rank: usize,
    pub entity_key: String,
    pub overall_score: Metric,
    /// Base-scenario IRR.
    pub total_irr_estimate: Metric,
    /// Base IRR minus the score penalty; the ranking metric.
    pub risk_adjusted_return: Metric,
    pub capacity_mw: Metric,
    pub narrative_flags: NarrativeFlags,
    pub missing_axes: BTreeSet<RiskAxis>,
    pub unavailable_domains: BTreeSet<Domain>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Recommendation {
    pub entries: Vec<RecommendationEntry>,
    /// Scored entities left out because no axis was available.
    pub excluded: Vec<String>,
}

impl Recommendation {
    pub fn entity_keys(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.entity_key.as_str()).collect()
    }

    pub fn get(&self, entity_key: &str) -> Option<&RecommendationEntry> {
        self.entries.iter().find(|e| e.entity_key == entity_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_score_serializes_axis_keys() {
        let score = RiskScore {
            country: "DE".into(),
            dimension_scores: [
                (RiskAxis::PowerCost, Metric::Value(55.0)),
                (RiskAxis::WaterStress, Metric::Unavailable),
            ]
            .into_iter()
            .collect(),
            overall_score: Metric::Value(55.0),
            missing_dimensions: [RiskAxis::WaterStress].into_iter().collect(),
            unavailable_domains: [Domain::WaterStress].into_iter().collect(),
        };
        let json = serde_json::to_value(&score).unwrap();
        assert_eq!(json["dimension_scores"]["power_cost"], 55.0);
        assert_eq!(json["dimension_scores"]["water_stress"], "unavailable");
        assert_eq!(json["missing_dimensions"][0], "water_stress");
        assert_eq!(json["unavailable_domains"][0], "water-stress");
    }
}
