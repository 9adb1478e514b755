//! Data domains and their canonical field schemas.
//!
//! Each domain owns a fixed set of fields with a unit and a valid range.
//! Normalized records always carry exactly the fields of their domain.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Data domain of a normalized record.
///
/// Variant order is the canonical merge order used by the feature matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Domain {
    Facility,
    Energy,
    FuelMix,
    Carbon,
    Renewable,
    Transaction,
    Pipeline,
    MarketReport,
    News,
    WaterStress,
}

impl Domain {
    pub const ALL: [Domain; 10] = [
        Domain::Facility,
        Domain::Energy,
        Domain::FuelMix,
        Domain::Carbon,
        Domain::Renewable,
        Domain::Transaction,
        Domain::Pipeline,
        Domain::MarketReport,
        Domain::News,
        Domain::WaterStress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Facility => "facility",
            Domain::Energy => "energy",
            Domain::FuelMix => "fuel-mix",
            Domain::Carbon => "carbon",
            Domain::Renewable => "renewable",
            Domain::Transaction => "transaction",
            Domain::Pipeline => "pipeline",
            Domain::MarketReport => "market-report",
            Domain::News => "news",
            Domain::WaterStress => "water-stress",
        }
    }

    /// Canonical schema of this domain.
    pub fn fields(&self) -> &'static [FieldSpec] {
        match self {
            Domain::Facility => FACILITY_FIELDS,
            Domain::Energy => ENERGY_FIELDS,
            Domain::FuelMix => FUEL_MIX_FIELDS,
            Domain::Carbon => CARBON_FIELDS,
            Domain::Renewable => RENEWABLE_FIELDS,
            Domain::Transaction => TRANSACTION_FIELDS,
            Domain::Pipeline => PIPELINE_FIELDS,
            Domain::MarketReport => MARKET_REPORT_FIELDS,
            Domain::News => NEWS_FIELDS,
            Domain::WaterStress => WATER_STRESS_FIELDS,
        }
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields().iter().find(|f| f.name == name)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical unit of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Count,
    Megawatts,
    UsdPerMwh,
    KgCo2ePerMwh,
    Percent,
    /// Dimensionless 0-100 index.
    Index,
    UsdMillions,
    UsdMillionsPerMw,
}

impl Unit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Count => "count",
            Unit::Megawatts => "MW",
            Unit::UsdPerMwh => "USD/MWh",
            Unit::KgCo2ePerMwh => "kgCO2e/MWh",
            Unit::Percent => "%",
            Unit::Index => "index",
            Unit::UsdMillions => "USD m",
            Unit::UsdMillionsPerMw => "USD m/MW",
        }
    }
}

/// One canonical field: name, unit and inclusive valid range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub unit: Unit,
    pub min: f64,
    pub max: f64,
}

impl FieldSpec {
    const fn new(name: &'static str, unit: Unit, min: f64, max: f64) -> Self {
        Self { name, unit, min, max }
    }

    pub fn in_range(&self, v: f64) -> bool {
        v.is_finite() && v >= self.min && v <= self.max
    }
}

/// Field names, shared between the normalizer, matrix and scorer.
pub mod field {
    pub const FACILITY_COUNT: &str = "facility_count";
    pub const TOTAL_CAPACITY_MW: &str = "total_capacity_mw";
    pub const SITE_SCORE: &str = "site_score";
    pub const CONNECTIVITY_SCORE: &str = "connectivity_score";

    pub const POWER_PRICE_USD_MWH: &str = "power_price_usd_mwh";
    pub const PRICE_VOLATILITY_PCT: &str = "price_volatility_pct";

    pub const GAS_PCT: &str = "gas_pct";
    pub const COAL_PCT: &str = "coal_pct";
    pub const NUCLEAR_PCT: &str = "nuclear_pct";
    pub const WIND_PCT: &str = "wind_pct";
    pub const SOLAR_PCT: &str = "solar_pct";
    pub const HYDRO_PCT: &str = "hydro_pct";

    pub const CARBON_INTENSITY_KG_MWH: &str = "carbon_intensity_kg_mwh";

    pub const RENEWABLE_POTENTIAL_SCORE: &str = "renewable_potential_score";
    pub const SOLAR_CAPACITY_FACTOR_PCT: &str = "solar_capacity_factor_pct";
    pub const WIND_CAPACITY_FACTOR_PCT: &str = "wind_capacity_factor_pct";

    pub const TRANSACTION_COUNT: &str = "transaction_count";
    pub const TRANSACTION_VOLUME_USD_M: &str = "transaction_volume_usd_m";
    pub const TRANSACTED_CAPACITY_MW: &str = "transacted_capacity_mw";
    pub const PRICE_PER_MW_USD_M: &str = "price_per_mw_usd_m";

    pub const PIPELINE_CAPACITY_MW: &str = "pipeline_capacity_mw";
    pub const OPERATIONAL_CAPACITY_MW: &str = "operational_capacity_mw";
    pub const VACANCY_PCT: &str = "vacancy_pct";

    pub const CAP_RATE_PCT: &str = "cap_rate_pct";
    pub const ABSORPTION_MW: &str = "absorption_mw";
    pub const MARKET_PRICE_PER_MW_USD_M: &str = "market_price_per_mw_usd_m";

    pub const NEWS_ARTICLE_COUNT: &str = "news_article_count";
    pub const NEWS_SENTIMENT_INDEX: &str = "news_sentiment_index";

    pub const WATER_STRESS_PCT: &str = "water_stress_pct";

    /// The six generation sources making up a complete fuel mix.
    pub const FUEL_MIX_COMPONENTS: [&str; 6] =
        [GAS_PCT, COAL_PCT, NUCLEAR_PCT, WIND_PCT, SOLAR_PCT, HYDRO_PCT];
}

use field::*;

const FACILITY_FIELDS: &[FieldSpec] = &[
    FieldSpec::new(FACILITY_COUNT, Unit::Count, 0.0, 1e6),
    FieldSpec::new(TOTAL_CAPACITY_MW, Unit::Megawatts, 0.0, 1e6),
    FieldSpec::new(SITE_SCORE, Unit::Index, 0.0, 100.0),
    FieldSpec::new(CONNECTIVITY_SCORE, Unit::Index, 0.0, 100.0),
];

const ENERGY_FIELDS: &[FieldSpec] = &[
    FieldSpec::new(POWER_PRICE_USD_MWH, Unit::UsdPerMwh, 0.0, 2000.0),
    FieldSpec::new(PRICE_VOLATILITY_PCT, Unit::Percent, 0.0, 100.0),
];

const FUEL_MIX_FIELDS: &[FieldSpec] = &[
    FieldSpec::new(GAS_PCT, Unit::Percent, 0.0, 100.0),
    FieldSpec::new(COAL_PCT, Unit::Percent, 0.0, 100.0),
    FieldSpec::new(NUCLEAR_PCT, Unit::Percent, 0.0, 100.0),
    FieldSpec::new(WIND_PCT, Unit::Percent, 0.0, 100.0),
    FieldSpec::new(SOLAR_PCT, Unit::Percent, 0.0, 100.0),
    FieldSpec::new(HYDRO_PCT, Unit::Percent, 0.0, 100.0),
];

const CARBON_FIELDS: &[FieldSpec] = &[FieldSpec::new(
    CARBON_INTENSITY_KG_MWH,
    Unit::KgCo2ePerMwh,
    0.0,
    1500.0,
)];

const RENEWABLE_FIELDS: &[FieldSpec] = &[
    FieldSpec::new(RENEWABLE_POTENTIAL_SCORE, Unit::Index, 0.0, 100.0),
    FieldSpec::new(SOLAR_CAPACITY_FACTOR_PCT, Unit::Percent, 0.0, 100.0),
    FieldSpec::new(WIND_CAPACITY_FACTOR_PCT, Unit::Percent, 0.0, 100.0),
];

const TRANSACTION_FIELDS: &[FieldSpec] = &[
    FieldSpec::new(TRANSACTION_COUNT, Unit::Count, 0.0, 1e5),
    FieldSpec::new(TRANSACTION_VOLUME_USD_M, Unit::UsdMillions, 0.0, 1e6),
    FieldSpec::new(TRANSACTED_CAPACITY_MW, Unit::Megawatts, 0.0, 1e6),
    FieldSpec::new(PRICE_PER_MW_USD_M, Unit::UsdMillionsPerMw, 0.0, 100.0),
];

const PIPELINE_FIELDS: &[FieldSpec] = &[
    FieldSpec::new(PIPELINE_CAPACITY_MW, Unit::Megawatts, 0.0, 1e6),
    FieldSpec::new(OPERATIONAL_CAPACITY_MW, Unit::Megawatts, 0.0, 1e6),
    FieldSpec::new(VACANCY_PCT, Unit::Percent, 0.0, 100.0),
];

const MARKET_REPORT_FIELDS: &[FieldSpec] = &[
    FieldSpec::new(CAP_RATE_PCT, Unit::Percent, 0.0, 30.0),
    FieldSpec::new(ABSORPTION_MW, Unit::Megawatts, 0.0, 1e5),
    FieldSpec::new(MARKET_PRICE_PER_MW_USD_M, Unit::UsdMillionsPerMw, 0.0, 100.0),
];

const NEWS_FIELDS: &[FieldSpec] = &[
    FieldSpec::new(NEWS_ARTICLE_COUNT, Unit::Count, 0.0, 1e4),
    FieldSpec::new(NEWS_SENTIMENT_INDEX, Unit::Index, 0.0, 100.0),
];

const WATER_STRESS_FIELDS: &[FieldSpec] =
    &[FieldSpec::new(WATER_STRESS_PCT, Unit::Percent, 0.0, 100.0)];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn field_names_do_not_collide_across_domains() {
        let mut seen = HashSet::new();
        for domain in Domain::ALL {
            for spec in domain.fields() {
                assert!(seen.insert(spec.name), "duplicate field {}", spec.name);
            }
        }
    }

    #[test]
    fn canonical_order_matches_ord() {
        let mut sorted = Domain::ALL;
        sorted.sort();
        assert_eq!(sorted, Domain::ALL);
    }

    #[test]
    fn serde_uses_kebab_case() {
        assert_eq!(
            serde_json::to_string(&Domain::MarketReport).unwrap(),
            "\"market-report\""
        );
        assert_eq!(Domain::WaterStress.to_string(), "water-stress");
    }
}
