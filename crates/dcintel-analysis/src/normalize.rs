//! Response normalizer: tool payloads to canonical per-domain records.
//!
//! ```text
//! RawResponse ──► entity key ──► error status? ──► all-unavailable record (tagged)
//!                                    │
//!                                    ▼
//!                       per-tool extraction (aliases, unit conversion)
//!                                    │
//!                                    ▼
//!                       range check against the domain schema
//!                                    │
//!                                    ▼
//!                             NormalizedRecord
//! ```
//!
//! Extraction reads each canonical field from a short list of accepted source
//! keys. Anything absent, of the wrong type, in an unknown unit or out of range
//! becomes `unavailable` with a warning; a bad field never aborts its record.

use crate::error::NormalizationError;
use dcintel_core::field::*;
use dcintel_core::{Domain, Metric, NormalizedRecord, RawResponse, Scalar, ToolId};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Tolerance on the fuel-mix sum, in percentage points.
pub const FUEL_MIX_TOLERANCE: f64 = 0.5;

const LB_TO_KG: f64 = 0.453592;

/// Normalize one response into its domain's canonical record.
///
/// Error responses become empty records carrying the failure reason. The
/// entity key is resolved first, so a response that has no domain
/// (`get_platform_stats`) or no resolvable key (a site score without a
/// `country`) is an `Err` whether or not the call itself failed.
pub fn normalize(response: &RawResponse) -> Result<NormalizedRecord, NormalizationError> {
    let tool = response.tool_id;
    let domain = tool.domain().ok_or(NormalizationError::NoDomain(tool))?;
    let body = Body::new(&response.payload);
    let entity_key = entity_key(response, &body)?;
    let mut record = NormalizedRecord::empty(domain, entity_key, tool);

    if let Some((_, reason)) = response.failure() {
        record.error = Some(reason.to_string());
        return Ok(record);
    }

    let mut out = RecordBuilder::new(domain);
    match tool {
        ToolId::SearchFacilities => facility_search(&body, &mut out),
        ToolId::GetFacility => facility_detail(&body, &mut out),
        ToolId::GetSiteScore => site_score(&body, &mut out),
        ToolId::GetEnergyPrices => energy_prices(&body, &mut out),
        ToolId::GetGridFuelMix => fuel_mix(&body, &mut out),
        ToolId::GetCarbonIntensity => carbon_intensity(&body, &mut out),
        ToolId::GetRenewablePotential => renewable_potential(&body, &mut out),
        ToolId::GetTransactions => transactions(&body, &mut out),
        ToolId::GetCapacityPipeline => capacity_pipeline(&body, &mut out),
        ToolId::GetMarketReport => market_report(&body, &mut out),
        ToolId::GetNews => news(&body, &mut out),
        ToolId::GetWaterStress => water_stress(&body, &mut out),
        ToolId::GetPlatformStats => {}
    }
    out.finish(&mut record);

    for warning in &record.warnings {
        tracing::debug!(tool = %tool, entity = %record.entity_key, %warning, "normalization warning");
    }
    Ok(record)
}

/// Normalize a batch, keeping records and errors apart.
pub fn normalize_all<'a>(
    responses: impl IntoIterator<Item = &'a RawResponse>,
) -> (Vec<NormalizedRecord>, Vec<NormalizationError>) {
    let mut records = Vec::new();
    let mut errors = Vec::new();
    for response in responses {
        match normalize(response) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(error = %e, "response skipped");
                errors.push(e);
            }
        }
    }
    (records, errors)
}

fn entity_key(response: &RawResponse, body: &Body<'_>) -> Result<String, NormalizationError> {
    let tool = response.tool_id;
    let param = |name: &str| {
        response
            .parameters
            .get(name)
            .and_then(Scalar::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };
    let missing = |reason: &str| NormalizationError::NoEntityKey {
        tool,
        reason: reason.to_string(),
    };

    match tool {
        ToolId::GetFacility => body
            .with(&["facility"])
            .text(&["country", "country_code"])
            .map(str::to_ascii_uppercase)
            .or_else(|| param("facility_id").map(str::to_string))
            .ok_or_else(|| missing("no country in payload and no facility_id")),
        ToolId::GetSiteScore => param("country")
            .or_else(|| body.text(&["country", "country_code"]))
            .map(str::to_ascii_uppercase)
            .ok_or_else(|| missing("site analysis without a country")),
        _ => tool
            .key_param()
            .and_then(param)
            .map(str::to_ascii_uppercase)
            .ok_or_else(|| missing("key parameter absent")),
    }
}

// ============================================================================
// Payload access
// ============================================================================

/// Read-only view over a payload: the top-level object, an optional `data`
/// envelope, and any nested objects pulled in with [`Body::with`].
#[derive(Clone)]
struct Body<'a> {
    scopes: Vec<&'a Map<String, Value>>,
    array: Option<&'a [Value]>,
}

impl<'a> Body<'a> {
    fn new(payload: &'a Value) -> Self {
        match payload {
            Value::Array(items) => Self {
                scopes: Vec::new(),
                array: Some(items.as_slice()),
            },
            Value::Object(map) => {
                let mut scopes = vec![map];
                let mut array = None;
                match map.get("data") {
                    Some(Value::Object(inner)) => scopes.push(inner),
                    Some(Value::Array(items)) => array = Some(items.as_slice()),
                    _ => {}
                }
                Self { scopes, array }
            }
            _ => Self {
                scopes: Vec::new(),
                array: None,
            },
        }
    }

    /// Add the first nested object found under `keys` as a searched scope.
    fn with(&self, keys: &[&str]) -> Self {
        let mut next = self.clone();
        if let Some(Value::Object(inner)) = self.raw(keys) {
            next.scopes.insert(0, inner);
        }
        next
    }

    fn raw(&self, keys: &[&str]) -> Option<&'a Value> {
        keys.iter().find_map(|key| {
            self.scopes
                .iter()
                .find_map(|scope| scope.get(*key).filter(|v| !v.is_null()))
        })
    }

    fn text(&self, keys: &[&str]) -> Option<&'a str> {
        self.raw(keys)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// First present key among `keys`, coerced to a number. A present value of
    /// the wrong type is reported and treated as absent.
    fn number(&self, keys: &[&str], warnings: &mut Vec<String>) -> Option<f64> {
        for key in keys {
            let Some(value) = self.scopes.iter().find_map(|s| s.get(*key)) else {
                continue;
            };
            match coerce(value) {
                Coerced::Number(v) => return Some(v),
                Coerced::Null => continue,
                Coerced::Invalid(found) => {
                    warnings.push(format!("{key}: expected a number, found {found}"));
                    return None;
                }
            }
        }
        None
    }

    fn items(&self, keys: &[&str]) -> Option<&'a [Value]> {
        if let Some(Value::Array(items)) = self.raw(keys) {
            return Some(items.as_slice());
        }
        self.array
    }

    fn is_empty(&self) -> bool {
        self.scopes.iter().all(|s| s.is_empty()) && self.array.is_none()
    }
}

enum Coerced {
    Number(f64),
    Null,
    Invalid(&'static str),
}

fn coerce(value: &Value) -> Coerced {
    match value {
        Value::Number(n) => n
            .as_f64()
            .filter(|v| v.is_finite())
            .map_or(Coerced::Invalid("a non-finite number"), Coerced::Number),
        Value::String(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            match cleaned.parse::<f64>() {
                Ok(v) if v.is_finite() => Coerced::Number(v),
                _ if cleaned.is_empty() => Coerced::Null,
                _ => Coerced::Invalid("a non-numeric string"),
            }
        }
        Value::Null => Coerced::Null,
        Value::Bool(_) => Coerced::Invalid("a boolean"),
        Value::Array(_) => Coerced::Invalid("an array"),
        Value::Object(_) => Coerced::Invalid("an object"),
    }
}

/// Numeric values of `keys` across `items`; unreadable entries are counted.
fn item_numbers(items: &[Value], keys: &[&str], out: &mut RecordBuilder) -> Vec<Option<f64>> {
    let mut scratch = Vec::new();
    let values: Vec<_> = items
        .iter()
        .map(|item| Body::new(item).number(keys, &mut scratch))
        .collect();
    if !scratch.is_empty() {
        out.warn(format!(
            "{} of {} items had an unreadable {}",
            scratch.len(),
            items.len(),
            keys[0]
        ));
    }
    values
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Collects converted values, then range-checks them into a record.
struct RecordBuilder {
    domain: Domain,
    values: BTreeMap<&'static str, f64>,
    warnings: Vec<String>,
}

impl RecordBuilder {
    fn new(domain: Domain) -> Self {
        Self {
            domain,
            values: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    fn set(&mut self, name: &'static str, value: Option<f64>) {
        if let Some(v) = value {
            self.values.insert(name, v);
        }
    }

    fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    fn finish(self, record: &mut NormalizedRecord) {
        record.warnings = self.warnings;
        for spec in self.domain.fields() {
            let Some(&v) = self.values.get(spec.name) else {
                continue;
            };
            if spec.in_range(v) {
                record.fields.insert(spec.name.to_string(), Metric::Value(v));
            } else {
                record.warnings.push(format!(
                    "{}: {v} {} outside [{}, {}]",
                    spec.name,
                    spec.unit.symbol(),
                    spec.min,
                    spec.max
                ));
            }
        }
    }
}

// ============================================================================
// Units
// ============================================================================

fn unit_key(raw: &str) -> String {
    raw.to_ascii_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .replace("co2eq", "")
        .replace("co2e", "")
        .replace("co2", "")
        .replace('$', "usd")
        .replace('¢', "cents")
}

/// Factor from a reported price unit to USD/MWh.
fn price_factor(unit: Option<&str>) -> Option<f64> {
    let Some(unit) = unit else {
        return Some(1.0);
    };
    match unit_key(unit).as_str() {
        "usd/mwh" => Some(1.0),
        "cents/kwh" | "c/kwh" | "ct/kwh" => Some(10.0),
        "usd/kwh" => Some(1000.0),
        _ => None,
    }
}

/// Factor from a reported emission-intensity unit to kgCO2e/MWh.
fn carbon_factor(unit: Option<&str>) -> Option<f64> {
    let Some(unit) = unit else {
        return Some(1.0);
    };
    match unit_key(unit).as_str() {
        "g/kwh" | "kg/mwh" => Some(1.0),
        "lb/mwh" | "lbs/mwh" => Some(LB_TO_KG),
        "t/mwh" | "kg/kwh" => Some(1000.0),
        _ => None,
    }
}

// ============================================================================
// Per-tool extraction
// ============================================================================

const CAPACITY_KEYS: &[&str] = &[
    "power_capacity_mw",
    "capacity_mw",
    "total_power_mw",
    "it_capacity_mw",
];
const COUNT_KEYS: &[&str] = &["total", "count", "total_count"];

fn facility_search(body: &Body<'_>, out: &mut RecordBuilder) {
    let items = body.items(&["facilities", "results", "items"]);
    let count = body
        .number(COUNT_KEYS, &mut out.warnings)
        .or_else(|| items.map(|i| i.len() as f64));
    out.set(FACILITY_COUNT, count);

    let total = body
        .number(&[TOTAL_CAPACITY_MW], &mut out.warnings)
        .or_else(|| {
            let caps: Vec<f64> = item_numbers(items?, CAPACITY_KEYS, out)
                .into_iter()
                .flatten()
                .collect();
            (!caps.is_empty()).then(|| caps.iter().sum())
        });
    out.set(TOTAL_CAPACITY_MW, total);
}

fn facility_detail(body: &Body<'_>, out: &mut RecordBuilder) {
    let body = body.with(&["facility"]);
    if body.is_empty() {
        return;
    }
    out.set(FACILITY_COUNT, Some(1.0));
    let capacity = body.number(CAPACITY_KEYS, &mut out.warnings);
    out.set(TOTAL_CAPACITY_MW, capacity);
    let connectivity = body.number(&[CONNECTIVITY_SCORE], &mut out.warnings);
    out.set(CONNECTIVITY_SCORE, connectivity);
}

fn site_score(body: &Body<'_>, out: &mut RecordBuilder) {
    let body = body.with(&["analysis", "scores"]);
    let site = body.number(&[SITE_SCORE, "overall_score", "score"], &mut out.warnings);
    out.set(SITE_SCORE, site);
    let connectivity = body.number(
        &[CONNECTIVITY_SCORE, "fiber_score", "network_score"],
        &mut out.warnings,
    );
    out.set(CONNECTIVITY_SCORE, connectivity);
}

fn energy_prices(body: &Body<'_>, out: &mut RecordBuilder) {
    let series: Vec<f64> = body
        .items(&["prices", "series"])
        .map(|items| {
            item_numbers(items, &["price", "value"], out)
                .into_iter()
                .flatten()
                .collect()
        })
        .unwrap_or_default();

    let price = match body.number(&[POWER_PRICE_USD_MWH], &mut out.warnings) {
        Some(v) => Some(v),
        None => {
            let reported = body
                .number(&["average_price", "avg_price", "price"], &mut out.warnings)
                .or_else(|| mean(&series));
            let unit = body.text(&["unit", "price_unit", "units"]);
            match (reported, price_factor(unit)) {
                (Some(p), Some(factor)) => Some(p * factor),
                (Some(_), None) => {
                    out.warn(format!(
                        "{POWER_PRICE_USD_MWH}: unknown price unit '{}'",
                        unit.unwrap_or_default()
                    ));
                    None
                }
                (None, _) => None,
            }
        }
    };
    out.set(POWER_PRICE_USD_MWH, price);

    let volatility = body
        .number(&[PRICE_VOLATILITY_PCT, "volatility_pct"], &mut out.warnings)
        .or_else(|| coefficient_of_variation(&series));
    out.set(PRICE_VOLATILITY_PCT, volatility);
}

/// Sample standard deviation over mean, in percent.
fn coefficient_of_variation(series: &[f64]) -> Option<f64> {
    if series.len() < 2 {
        return None;
    }
    let m = mean(series)?;
    if m <= 0.0 {
        return None;
    }
    let var =
        series.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (series.len() as f64 - 1.0);
    Some(var.sqrt() / m * 100.0)
}

const FUEL_ALIASES: [(&str, &[&str]); 6] = [
    (GAS_PCT, &["gas", "natural_gas", GAS_PCT]),
    (COAL_PCT, &["coal", COAL_PCT]),
    (NUCLEAR_PCT, &["nuclear", NUCLEAR_PCT]),
    (WIND_PCT, &["wind", WIND_PCT]),
    (SOLAR_PCT, &["solar", SOLAR_PCT]),
    (HYDRO_PCT, &["hydro", "hydroelectric", HYDRO_PCT]),
];

fn fuel_mix(body: &Body<'_>, out: &mut RecordBuilder) {
    let mix = body.with(&["fuel_mix", "mix", "generation_mix"]);
    let mut shares = [None; 6];
    for (slot, (_, aliases)) in shares.iter_mut().zip(FUEL_ALIASES) {
        *slot = mix.number(aliases, &mut out.warnings);
    }

    let present: Vec<f64> = shares.iter().flatten().copied().collect();
    let sum: f64 = present.iter().sum();
    let fractions = !present.is_empty() && present.iter().all(|v| *v <= 1.0) && sum <= 1.05;
    if fractions {
        for share in shares.iter_mut().flatten() {
            *share *= 100.0;
        }
    }

    // A complete mix must balance; a partial one can only overshoot.
    let total: f64 = shares.iter().flatten().sum();
    let unbalanced = if shares.iter().all(Option::is_some) {
        (total - 100.0).abs() > FUEL_MIX_TOLERANCE
    } else {
        total > 100.0 + FUEL_MIX_TOLERANCE
    };
    if unbalanced {
        out.warn(format!(
            "fuel mix sums to {total:.2}%, outside 100 ± {FUEL_MIX_TOLERANCE}; components dropped"
        ));
        return;
    }
    for ((name, _), share) in FUEL_ALIASES.iter().zip(shares) {
        out.set(*name, share);
    }
}

fn carbon_intensity(body: &Body<'_>, out: &mut RecordBuilder) {
    if let Some(v) = body.number(&[CARBON_INTENSITY_KG_MWH], &mut out.warnings) {
        out.set(CARBON_INTENSITY_KG_MWH, Some(v));
        return;
    }
    let reported = body.number(
        &["carbon_intensity", "intensity", "average_intensity", "value"],
        &mut out.warnings,
    );
    let unit = body.text(&["unit", "units"]);
    match (reported, carbon_factor(unit)) {
        (Some(v), Some(factor)) => out.set(CARBON_INTENSITY_KG_MWH, Some(v * factor)),
        (Some(_), None) => out.warn(format!(
            "{CARBON_INTENSITY_KG_MWH}: unknown intensity unit '{}'",
            unit.unwrap_or_default()
        )),
        (None, _) => {}
    }
}

fn renewable_potential(body: &Body<'_>, out: &mut RecordBuilder) {
    let score = body.number(
        &[
            RENEWABLE_POTENTIAL_SCORE,
            "renewable_score",
            "potential_score",
            "score",
        ],
        &mut out.warnings,
    );
    out.set(RENEWABLE_POTENTIAL_SCORE, score);

    for (name, fraction_keys) in [
        (SOLAR_CAPACITY_FACTOR_PCT, ["solar_capacity_factor", "solar_cf"]),
        (WIND_CAPACITY_FACTOR_PCT, ["wind_capacity_factor", "wind_cf"]),
    ] {
        let pct = body.number(&[name], &mut out.warnings).or_else(|| {
            body.number(&fraction_keys, &mut out.warnings)
                .map(|f| f * 100.0)
        });
        out.set(name, pct);
    }
}

fn transactions(body: &Body<'_>, out: &mut RecordBuilder) {
    let items = body.items(&["transactions", "deals", "results"]);
    let count = body
        .number(COUNT_KEYS, &mut out.warnings)
        .or_else(|| items.map(|i| i.len() as f64));
    out.set(TRANSACTION_COUNT, count);

    let Some(items) = items else {
        return;
    };
    let values_usd = item_numbers(items, &["value_usd", "deal_value_usd", "price_usd"], out);
    let values_m = item_numbers(items, &["value_usd_m", "deal_value_usd_m"], out);
    let capacities = item_numbers(items, &["capacity_mw", "mw"], out);

    let values: Vec<Option<f64>> = values_m
        .into_iter()
        .zip(values_usd)
        .map(|(m, usd)| m.or(usd.map(|v| v / 1e6)))
        .collect();

    let volume: Vec<f64> = values.iter().flatten().copied().collect();
    out.set(
        TRANSACTION_VOLUME_USD_M,
        (!volume.is_empty()).then(|| volume.iter().sum()),
    );
    let capacity: Vec<f64> = capacities.iter().flatten().copied().collect();
    out.set(
        TRANSACTED_CAPACITY_MW,
        (!capacity.is_empty()).then(|| capacity.iter().sum()),
    );

    let (priced_value, priced_mw) = values
        .iter()
        .zip(&capacities)
        .filter_map(|(v, mw)| Some(((*v)?, (*mw)?)))
        .filter(|(_, mw)| *mw > 0.0)
        .fold((0.0, 0.0), |(sv, sm), (v, mw)| (sv + v, sm + mw));
    if priced_mw > 0.0 {
        out.set(PRICE_PER_MW_USD_M, Some(priced_value / priced_mw));
    }
}

fn capacity_pipeline(body: &Body<'_>, out: &mut RecordBuilder) {
    let pipeline = body
        .number(&[PIPELINE_CAPACITY_MW, "pipeline_mw"], &mut out.warnings)
        .or_else(|| {
            let stages: Vec<f64> = ["under_construction_mw", "planned_mw"]
                .iter()
                .filter_map(|k| body.number(&[*k], &mut out.warnings))
                .collect();
            (!stages.is_empty()).then(|| stages.iter().sum())
        });
    out.set(PIPELINE_CAPACITY_MW, pipeline);

    let operational = body.number(
        &[OPERATIONAL_CAPACITY_MW, "operational_mw", "live_mw"],
        &mut out.warnings,
    );
    out.set(OPERATIONAL_CAPACITY_MW, operational);

    let vacancy = body.number(&[VACANCY_PCT], &mut out.warnings).or_else(|| {
        body.number(&["vacancy_rate"], &mut out.warnings)
            .map(|f| f * 100.0)
    });
    out.set(VACANCY_PCT, vacancy);
}

fn market_report(body: &Body<'_>, out: &mut RecordBuilder) {
    let body = body.with(&["metrics", "market"]);

    let cap_rate = match body.number(&[CAP_RATE_PCT], &mut out.warnings) {
        Some(v) => Some(v),
        // Bare cap rates below 1 are fractions; sub-1 % cap rates do not occur.
        None => body
            .number(&["cap_rate", "average_cap_rate"], &mut out.warnings)
            .map(|v| if v > 0.0 && v < 1.0 { v * 100.0 } else { v }),
    };
    out.set(CAP_RATE_PCT, cap_rate);

    let absorption = body.number(&[ABSORPTION_MW, "net_absorption_mw"], &mut out.warnings);
    out.set(ABSORPTION_MW, absorption);

    let price = body
        .number(
            &[MARKET_PRICE_PER_MW_USD_M, PRICE_PER_MW_USD_M],
            &mut out.warnings,
        )
        .or_else(|| {
            body.number(
                &["price_per_mw_usd", "avg_price_per_mw_usd"],
                &mut out.warnings,
            )
            .map(|v| v / 1e6)
        });
    out.set(MARKET_PRICE_PER_MW_USD_M, price);
}

fn news(body: &Body<'_>, out: &mut RecordBuilder) {
    let items = body.items(&["articles", "news", "results", "items"]);
    let count = body
        .number(COUNT_KEYS, &mut out.warnings)
        .or_else(|| items.map(|i| i.len() as f64));
    out.set(NEWS_ARTICLE_COUNT, count);

    if let Some(index) = body.number(&[NEWS_SENTIMENT_INDEX, "sentiment_index"], &mut out.warnings)
    {
        out.set(NEWS_SENTIMENT_INDEX, Some(index));
        return;
    }
    if let Some(s) = body.number(&["average_sentiment", "sentiment"], &mut out.warnings) {
        out.set(NEWS_SENTIMENT_INDEX, Some((s + 1.0) * 50.0));
        return;
    }

    let Some(items) = items else {
        return;
    };
    let raw: Vec<f64> = item_numbers(items, &["sentiment", "sentiment_score"], out)
        .into_iter()
        .flatten()
        .collect();
    let (valid, invalid): (Vec<f64>, Vec<f64>) =
        raw.into_iter().partition(|s| (-1.0..=1.0).contains(s));
    if !invalid.is_empty() {
        out.warn(format!(
            "{} article sentiments outside [-1, 1] ignored",
            invalid.len()
        ));
    }
    out.set(
        NEWS_SENTIMENT_INDEX,
        mean(&valid).map(|s| (s + 1.0) * 50.0),
    );
}

fn water_stress(body: &Body<'_>, out: &mut RecordBuilder) {
    let pct = body.number(&[WATER_STRESS_PCT], &mut out.warnings).or_else(|| {
        // WRI Aqueduct baseline water stress, 0-5.
        body.number(
            &["water_stress_score", "bws_score", "score"],
            &mut out.warnings,
        )
        .map(|s| s * 20.0)
    });
    out.set(WATER_STRESS_PCT, pct);
}
