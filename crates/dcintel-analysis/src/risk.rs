//! Eight-axis risk scorer over fixed reference bands.
//!
//! ```text
//! FeatureVector ──► sub-scores (piecewise-linear bands) ──► axis = mean of present sub-scores
//!                                                              │
//!                    overall = Σ wᵢ·axisᵢ / Σ wᵢ  over present axes only
//! ```
//!
//! Scores run 0-100 where 100 is the most attractive, lowest-risk reading.
//! Bands are absolute, so a country's score does not depend on which other
//! countries were analysed in the same run.

use crate::error::ConfigError;
use dcintel_core::field::*;
use dcintel_core::{FeatureVector, Metric, RiskAxis, RiskScore};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const WEIGHT_TOLERANCE: f64 = 1e-6;

// ============================================================================
// Bands
// ============================================================================

/// Piecewise-linear map from a raw reading to a 0-100 score.
///
/// Knots are sorted by `x`; readings outside the knots take the end scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band(pub &'static [(f64, f64)]);

impl Band {
    pub fn eval(&self, x: f64) -> f64 {
        let knots = self.0;
        let (Some(&(x0, y0)), Some(&(xn, yn))) = (knots.first(), knots.last()) else {
            return 0.0;
        };
        if x <= x0 {
            return y0;
        }
        if x >= xn {
            return yn;
        }
        for pair in knots.windows(2) {
            let ((xa, ya), (xb, yb)) = (pair[0], pair[1]);
            if x <= xb {
                let t = (x - xa) / (xb - xa);
                return ya + t * (yb - ya);
            }
        }
        yn
    }
}

pub const POWER_PRICE_BAND: Band = Band(&[(30.0, 100.0), (60.0, 70.0), (100.0, 40.0), (200.0, 0.0)]);
pub const FIRM_SHARE_BAND: Band = Band(&[(20.0, 0.0), (50.0, 60.0), (80.0, 100.0)]);
pub const VOLATILITY_BAND: Band = Band(&[(0.0, 100.0), (15.0, 70.0), (40.0, 20.0), (60.0, 0.0)]);
pub const CARBON_BAND: Band = Band(&[(0.0, 100.0), (200.0, 80.0), (450.0, 40.0), (900.0, 0.0)]);
pub const WATER_BAND: Band = Band(&[(0.0, 100.0), (20.0, 80.0), (40.0, 50.0), (80.0, 0.0)]);
pub const DEAL_COUNT_BAND: Band = Band(&[(0.0, 0.0), (5.0, 50.0), (20.0, 100.0)]);
pub const DEAL_VOLUME_BAND: Band = Band(&[(0.0, 0.0), (500.0, 60.0), (2000.0, 100.0)]);
pub const PIPELINE_RATIO_BAND: Band = Band(&[(0.0, 100.0), (0.3, 70.0), (1.0, 30.0), (2.0, 0.0)]);
pub const VACANCY_BAND: Band = Band(&[(0.0, 100.0), (10.0, 70.0), (25.0, 20.0), (40.0, 0.0)]);
pub const INDEX_BAND: Band = Band(&[(0.0, 0.0), (100.0, 100.0)]);

// ============================================================================
// Weights
// ============================================================================

/// Per-axis weights. Non-negative and summing to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    pub power_cost: f64,
    pub grid_mix: f64,
    pub carbon_exposure: f64,
    pub water_stress: f64,
    pub market_liquidity: f64,
    pub pipeline_pressure: f64,
    pub connectivity_siting: f64,
    pub market_sentiment: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            power_cost: 0.18,
            grid_mix: 0.12,
            carbon_exposure: 0.12,
            water_stress: 0.10,
            market_liquidity: 0.12,
            pipeline_pressure: 0.12,
            connectivity_siting: 0.14,
            market_sentiment: 0.10,
        }
    }
}

impl RiskWeights {
    pub fn get(&self, axis: RiskAxis) -> f64 {
        match axis {
            RiskAxis::PowerCost => self.power_cost,
            RiskAxis::GridMix => self.grid_mix,
            RiskAxis::CarbonExposure => self.carbon_exposure,
            RiskAxis::WaterStress => self.water_stress,
            RiskAxis::MarketLiquidity => self.market_liquidity,
            RiskAxis::PipelinePressure => self.pipeline_pressure,
            RiskAxis::ConnectivitySiting => self.connectivity_siting,
            RiskAxis::MarketSentiment => self.market_sentiment,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for axis in RiskAxis::ALL {
            let w = self.get(axis);
            if !w.is_finite() || w < 0.0 {
                return Err(ConfigError::NegativeWeight {
                    axis: axis.as_str(),
                    value: w,
                });
            }
        }
        let sum: f64 = RiskAxis::ALL.iter().map(|a| self.get(*a)).sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ConfigError::WeightSum { sum });
        }
        Ok(())
    }
}

// ============================================================================
// Scorer
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct RiskScorer {
    weights: RiskWeights,
}

impl RiskScorer {
    pub fn new(weights: RiskWeights) -> Result<Self, ConfigError> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &RiskWeights {
        &self.weights
    }

    pub fn score(&self, features: &FeatureVector) -> RiskScore {
        let mut dimension_scores = BTreeMap::new();
        let mut missing_dimensions = BTreeSet::new();
        let mut weighted = 0.0;
        let mut weight_sum = 0.0;

        for axis in RiskAxis::ALL {
            let score = axis_score(axis, features);
            match score {
                Some(s) => {
                    let w = self.weights.get(axis);
                    weighted += w * s;
                    weight_sum += w;
                }
                None => {
                    missing_dimensions.insert(axis);
                }
            }
            dimension_scores.insert(axis, Metric::from(score));
        }

        let overall_score = if weight_sum > 0.0 {
            Metric::from_finite((weighted / weight_sum).clamp(0.0, 100.0))
        } else {
            Metric::Unavailable
        };

        tracing::debug!(
            country = %features.entity_key,
            overall = %overall_score,
            missing = missing_dimensions.len(),
            "risk scored"
        );

        RiskScore {
            country: features.entity_key.clone(),
            dimension_scores,
            overall_score,
            missing_dimensions,
            unavailable_domains: features.unavailable_domains.clone(),
        }
    }
}

/// Score one axis, or `None` when none of its sub-scores is computable.
pub fn axis_score(axis: RiskAxis, f: &FeatureVector) -> Option<f64> {
    let subs: Vec<Option<f64>> = match axis {
        RiskAxis::PowerCost => vec![f.get(POWER_PRICE_USD_MWH).map(|x| POWER_PRICE_BAND.eval(x))],
        RiskAxis::GridMix => vec![
            firm_share(f).map(|x| FIRM_SHARE_BAND.eval(x)),
            f.get(PRICE_VOLATILITY_PCT).map(|x| VOLATILITY_BAND.eval(x)),
        ],
        RiskAxis::CarbonExposure => vec![f.get(CARBON_INTENSITY_KG_MWH).map(|x| CARBON_BAND.eval(x))],
        RiskAxis::WaterStress => vec![f.get(WATER_STRESS_PCT).map(|x| WATER_BAND.eval(x))],
        RiskAxis::MarketLiquidity => vec![
            f.get(TRANSACTION_COUNT).map(|x| DEAL_COUNT_BAND.eval(x)),
            f.get(TRANSACTION_VOLUME_USD_M).map(|x| DEAL_VOLUME_BAND.eval(x)),
        ],
        RiskAxis::PipelinePressure => vec![
            pipeline_ratio(f).map(|x| PIPELINE_RATIO_BAND.eval(x)),
            f.get(VACANCY_PCT).map(|x| VACANCY_BAND.eval(x)),
        ],
        RiskAxis::ConnectivitySiting => vec![
            f.get(SITE_SCORE).map(|x| INDEX_BAND.eval(x)),
            f.get(CONNECTIVITY_SCORE).map(|x| INDEX_BAND.eval(x)),
            f.get(RENEWABLE_POTENTIAL_SCORE).map(|x| INDEX_BAND.eval(x)),
        ],
        RiskAxis::MarketSentiment => vec![f.get(NEWS_SENTIMENT_INDEX).map(|x| INDEX_BAND.eval(x))],
    };
    let present: Vec<f64> = subs.into_iter().flatten().collect();
    if present.is_empty() {
        return None;
    }
    Some(present.iter().sum::<f64>() / present.len() as f64)
}

/// Dispatchable share of generation; needs all four firm components.
fn firm_share(f: &FeatureVector) -> Option<f64> {
    [GAS_PCT, COAL_PCT, NUCLEAR_PCT, HYDRO_PCT]
        .iter()
        .map(|name| f.get(name))
        .sum()
}

fn pipeline_ratio(f: &FeatureVector) -> Option<f64> {
    let pipeline = f.get(PIPELINE_CAPACITY_MW)?;
    let operational = f.get(OPERATIONAL_CAPACITY_MW).filter(|v| *v > 0.0)?;
    Some(pipeline / operational)
}
