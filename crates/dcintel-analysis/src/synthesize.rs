//! Recommendation synthesizer: ranks scored countries and attaches caveats.
//!
//! Ranking metric is the risk-adjusted return
//! `base IRR − penalty_per_point × (100 − overall)`. Entities without a
//! metric rank after every entity that has one. Ties fall through overall
//! score (desc), capacity (desc), then country code (asc).

use crate::error::ConfigError;
use dcintel_core::{
    Metric, NarrativeFlags, Recommendation, RecommendationEntry, RiskAxis, RiskScore,
    ScenarioName, ScenarioResult,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// IRR percentage points deducted per point of score below 100.
    pub penalty_per_point: f64,
    /// How many axes to flag as risks and as opportunities.
    pub flagged_axes: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            penalty_per_point: 0.05,
            flagged_axes: 2,
        }
    }
}

impl SynthesisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.penalty_per_point.is_finite() || self.penalty_per_point < 0.0 {
            return Err(ConfigError::Parameter {
                name: "penalty_per_point",
                expected: "non-negative",
                value: self.penalty_per_point,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Synthesizer {
    config: SynthesisConfig,
}

impl Synthesizer {
    pub fn new(config: SynthesisConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn synthesize(
        &self,
        scores: &BTreeMap<String, RiskScore>,
        scenarios: &BTreeMap<String, Vec<ScenarioResult>>,
    ) -> Recommendation {
        let mut entries = Vec::new();
        let mut excluded = Vec::new();

        for (key, score) in scores {
            if score.present_axes().next().is_none() {
                tracing::warn!(entity = %key, "left out of recommendation: no risk axis available");
                excluded.push(key.clone());
                continue;
            }
            let results = scenarios.get(key).map(Vec::as_slice).unwrap_or_default();
            entries.push(self.entry(key, score, results));
        }

        entries.sort_by(compare_entries);
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.rank = i + 1;
        }

        Recommendation { entries, excluded }
    }

    fn entry(&self, key: &str, score: &RiskScore, results: &[ScenarioResult]) -> RecommendationEntry {
        let base = results
            .iter()
            .find(|r| r.scenario_name == ScenarioName::Base);
        let total_irr_estimate = base.map_or(Metric::Unavailable, |b| b.irr);
        // Only tracked capacity ranks; a configured default does not.
        let capacity_mw = base
            .filter(|b| !b.assumptions.defaulted.iter().any(|d| d == "capacity_mw"))
            .map_or(Metric::Unavailable, |b| {
                Metric::from_finite(b.assumptions.capacity_mw)
            });
        let incomplete_data = !score.missing_dimensions.is_empty()
            || !score.unavailable_domains.is_empty()
            || base.map_or(true, |b| !b.assumptions.defaulted.is_empty());

        let risk_adjusted_return = match (total_irr_estimate.value(), score.overall_score.value()) {
            (Some(irr), Some(overall)) => {
                Metric::from_finite(irr - self.config.penalty_per_point * (100.0 - overall))
            }
            _ => Metric::Unavailable,
        };

        let mut present: Vec<(RiskAxis, f64)> = score.present_axes().collect();
        present.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        let risks = present
            .iter()
            .take(self.config.flagged_axes)
            .map(|(axis, _)| *axis)
            .collect();
        present.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        let opportunities = present
            .iter()
            .take(self.config.flagged_axes)
            .map(|(axis, _)| *axis)
            .collect();

        RecommendationEntry {
            rank: 0,
            entity_key: key.to_string(),
            overall_score: score.overall_score,
            total_irr_estimate,
            risk_adjusted_return,
            capacity_mw,
            narrative_flags: NarrativeFlags {
                risks,
                opportunities,
                incomplete_data,
                high_risk: results.iter().any(ScenarioResult::has_high_risk_warning),
            },
            missing_axes: score.missing_dimensions.clone(),
            unavailable_domains: score.unavailable_domains.clone(),
        }
    }
}

/// Descending by value; unavailable sorts last.
fn desc(a: Metric, b: Metric) -> Ordering {
    match (a.value(), b.value()) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_entries(a: &RecommendationEntry, b: &RecommendationEntry) -> Ordering {
    desc(a.risk_adjusted_return, b.risk_adjusted_return)
        .then_with(|| desc(a.overall_score, b.overall_score))
        .then_with(|| desc(a.capacity_mw, b.capacity_mw))
        .then_with(|| a.entity_key.cmp(&b.entity_key))
}
