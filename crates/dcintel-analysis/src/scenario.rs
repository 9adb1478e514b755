//! Bear / base / bull return scenarios.
//!
//! Each scenario is a levered-free DCF over `horizon` periods:
//!
//! ```text
//! t = 0        −investment                      investment = capacity × price/MW
//! t = 1..h     NOI₁·(1+g)^(t−1)                 NOI₁ = investment × cap rate × multiplier
//! t = h        + NOI_{h+1} / exit cap           terminal sale
//! ```
//!
//! The risk factor `r = (100 − overall) / 100` widens both the income
//! spread and the exit cap-rate shift. IRR is solved by bisection.

use crate::error::ConfigError;
use dcintel_core::field::*;
use dcintel_core::{
    FeatureVector, Metric, RiskScore, ScenarioAssumptions, ScenarioName, ScenarioResult,
    ScenarioWarning,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const IRR_LOW: f64 = -0.99;
const IRR_HIGH: f64 = 10.0;
const IRR_TOLERANCE: f64 = 1e-10;
const IRR_MAX_ITERATIONS: usize = 200;

/// Scenario parameters and input fallbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub default_capacity_mw: f64,
    pub default_price_per_mw_usd_m: f64,
    pub default_cap_rate_pct: f64,
    /// Base income spread, widened by the risk factor.
    pub price_sd_pct: f64,
    /// Base exit cap-rate shift, widened by the risk factor.
    pub cap_rate_delta_pct: f64,
    pub noi_growth_pct: f64,
    pub horizon: u32,
    pub min_exit_cap_rate_pct: f64,
    /// Overall scores below this attach a high-risk warning.
    pub high_risk_floor: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            default_capacity_mw: 10.0,
            default_price_per_mw_usd_m: 10.0,
            default_cap_rate_pct: 6.5,
            price_sd_pct: 10.0,
            cap_rate_delta_pct: 0.5,
            noi_growth_pct: 2.0,
            horizon: 10,
            min_exit_cap_rate_pct: 0.5,
            high_risk_floor: 40.0,
        }
    }
}

impl ScenarioConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("default_capacity_mw", self.default_capacity_mw),
            ("default_price_per_mw_usd_m", self.default_price_per_mw_usd_m),
            ("default_cap_rate_pct", self.default_cap_rate_pct),
            ("min_exit_cap_rate_pct", self.min_exit_cap_rate_pct),
            ("horizon", self.horizon as f64),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Parameter {
                    name,
                    expected: "positive",
                    value,
                });
            }
        }
        // The bear multiplier 1 − σ(1 + r) must stay positive for r up to 1.
        if !(0.0..50.0).contains(&self.price_sd_pct) {
            return Err(ConfigError::Parameter {
                name: "price_sd_pct",
                expected: "in [0, 50)",
                value: self.price_sd_pct,
            });
        }
        for (name, value) in [
            ("cap_rate_delta_pct", self.cap_rate_delta_pct),
            ("noi_growth_pct", self.noi_growth_pct),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Parameter {
                    name,
                    expected: "non-negative",
                    value,
                });
            }
        }
        if !(0.0..=100.0).contains(&self.high_risk_floor) {
            return Err(ConfigError::Parameter {
                name: "high_risk_floor",
                expected: "in [0, 100]",
                value: self.high_risk_floor,
            });
        }
        Ok(())
    }
}

/// Entry inputs for one country's scenarios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialInputs {
    pub capacity_mw: f64,
    pub price_per_mw_usd_m: f64,
    pub cap_rate_pct: f64,
    /// Inputs that fell back to configured defaults.
    pub defaulted: Vec<String>,
}

impl FinancialInputs {
    /// Derive inputs from features: facility capacity else operational
    /// pipeline capacity; deal price per MW else market price per MW; market
    /// cap rate. Anything missing falls back to the configured default.
    pub fn from_features(features: &FeatureVector, config: &ScenarioConfig) -> Self {
        let mut defaulted = Vec::new();
        let mut pick = |name: &str, candidates: &[&str], default: f64| {
            candidates
                .iter()
                .find_map(|c| features.get(c).filter(|v| *v > 0.0))
                .unwrap_or_else(|| {
                    defaulted.push(name.to_string());
                    default
                })
        };
        let capacity_mw = pick(
            "capacity_mw",
            &[TOTAL_CAPACITY_MW, OPERATIONAL_CAPACITY_MW],
            config.default_capacity_mw,
        );
        let price_per_mw_usd_m = pick(
            "price_per_mw_usd_m",
            &[PRICE_PER_MW_USD_M, MARKET_PRICE_PER_MW_USD_M],
            config.default_price_per_mw_usd_m,
        );
        let cap_rate_pct = pick("cap_rate_pct", &[CAP_RATE_PCT], config.default_cap_rate_pct);
        Self {
            capacity_mw,
            price_per_mw_usd_m,
            cap_rate_pct,
            defaulted,
        }
    }

    pub fn investment_usd_m(&self) -> f64 {
        self.capacity_mw * self.price_per_mw_usd_m
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScenarioEngine {
    config: ScenarioConfig,
}

impl ScenarioEngine {
    pub fn new(config: ScenarioConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Bear, base and bull results, in that order.
    pub fn project(&self, inputs: &FinancialInputs, risk: &RiskScore) -> [ScenarioResult; 3] {
        let cfg = &self.config;
        let mut warnings = Vec::new();
        let risk_factor = match risk.overall_score.value() {
            Some(overall) => {
                if overall < cfg.high_risk_floor {
                    warnings.push(ScenarioWarning::HighRisk {
                        overall_score: overall,
                        floor: cfg.high_risk_floor,
                    });
                }
                ((100.0 - overall) / 100.0).clamp(0.0, 1.0)
            }
            None => {
                warnings.push(ScenarioWarning::RiskScoreUnavailable);
                1.0
            }
        };

        let sigma = cfg.price_sd_pct / 100.0 * (1.0 + risk_factor);
        let delta = cfg.cap_rate_delta_pct * (1.0 + risk_factor);
        let cap = inputs.cap_rate_pct;

        ScenarioName::ALL.map(|name| {
            let (multiplier, exit_cap) = match name {
                ScenarioName::Bear => (1.0 - sigma, cap + delta),
                ScenarioName::Base => (1.0, cap),
                ScenarioName::Bull => (1.0 + sigma, (cap - delta).max(cfg.min_exit_cap_rate_pct)),
            };
            let assumptions = ScenarioAssumptions {
                capacity_mw: inputs.capacity_mw,
                price_per_mw_usd_m: inputs.price_per_mw_usd_m,
                entry_cap_rate_pct: cap,
                exit_cap_rate_pct: exit_cap,
                price_multiplier: multiplier,
                noi_growth_pct: cfg.noi_growth_pct,
                horizon: cfg.horizon,
                risk_factor,
                defaulted: inputs.defaulted.clone(),
            };
            let flows = cash_flows(inputs.investment_usd_m(), &assumptions);
            let irr = Metric::from(irr(&flows).map(|r| r * 100.0));
            ScenarioResult {
                entity_key: risk.country.clone(),
                scenario_name: name,
                irr,
                assumptions,
                warnings: warnings.clone(),
            }
        })
    }

    /// Scenarios for every scored entity that has a feature vector.
    pub fn project_all(
        &self,
        features: &BTreeMap<String, FeatureVector>,
        scores: &BTreeMap<String, RiskScore>,
    ) -> BTreeMap<String, Vec<ScenarioResult>> {
        scores
            .iter()
            .filter_map(|(key, score)| {
                let inputs = FinancialInputs::from_features(features.get(key)?, &self.config);
                if !inputs.defaulted.is_empty() {
                    tracing::debug!(entity = %key, defaulted = ?inputs.defaulted, "scenario inputs defaulted");
                }
                Some((key.clone(), self.project(&inputs, score).to_vec()))
            })
            .collect()
    }
}

/// Period cash flows in USD m, index 0 being the purchase.
pub fn cash_flows(investment: f64, a: &ScenarioAssumptions) -> Vec<f64> {
    let h = a.horizon as usize;
    let growth = 1.0 + a.noi_growth_pct / 100.0;
    let noi_1 = investment * a.entry_cap_rate_pct / 100.0 * a.price_multiplier;
    let noi = |t: usize| noi_1 * growth.powi(t as i32 - 1);

    let mut flows = Vec::with_capacity(h + 1);
    flows.push(-investment);
    for t in 1..=h {
        flows.push(noi(t));
    }
    if let Some(last) = flows.last_mut() {
        *last += noi(h + 1) / (a.exit_cap_rate_pct / 100.0);
    }
    flows
}

pub fn npv(rate: f64, flows: &[f64]) -> f64 {
    flows
        .iter()
        .enumerate()
        .map(|(t, cf)| cf / (1.0 + rate).powi(t as i32))
        .sum()
}

/// Internal rate of return as a fraction, or `None` when NPV does not change
/// sign over [−99 %, 1000 %].
pub fn irr(flows: &[f64]) -> Option<f64> {
    let (mut lo, mut hi) = (IRR_LOW, IRR_HIGH);
    let (mut f_lo, f_hi) = (npv(lo, flows), npv(hi, flows));
    if !f_lo.is_finite() || !f_hi.is_finite() || f_lo.signum() == f_hi.signum() {
        return None;
    }
    for _ in 0..IRR_MAX_ITERATIONS {
        let mid = (lo + hi) / 2.0;
        let f_mid = npv(mid, flows);
        if f_mid == 0.0 || (hi - lo) / 2.0 < IRR_TOLERANCE {
            return Some(mid);
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }
    Some((lo + hi) / 2.0)
}
