//! The fixed catalog of read-only market-intelligence tools.
//!
//! Every tool declares its parameter schema, HTTP path and (for scoreable
//! tools) the domain its response normalizes into. Validation happens here,
//! before any network activity.

use crate::domain::Domain;
use crate::error::CoreError;
use crate::model::{Parameters, Scalar};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::form_urlencoded;

/// Parameters that travel in the path rather than the query string.
const PATH_PARAMS: [&str; 2] = ["facility_id", "market"];

/// Percent-encode one path segment. `/`, `?` and `#` never reach the route.
fn encode_segment(raw: &str) -> String {
    // Form encoding writes a space as '+', which a path would keep literally.
    form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolId {
    SearchFacilities,
    GetFacility,
    GetSiteScore,
    GetEnergyPrices,
    GetGridFuelMix,
    GetCarbonIntensity,
    GetRenewablePotential,
    GetTransactions,
    GetCapacityPipeline,
    GetMarketReport,
    GetNews,
    GetWaterStress,
    GetPlatformStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Str,
    Int,
    Float,
}

impl ParamKind {
    pub fn name(&self) -> &'static str {
        match self {
            ParamKind::Str => "string",
            ParamKind::Int => "integer",
            ParamKind::Float => "number",
        }
    }
}

/// Declared parameter of a tool.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    /// Inclusive numeric bounds; values outside are rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<(f64, f64)>,
    /// Inclusive bounds that values are clamped into instead of rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clamp: Option<(i64, i64)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<i64>,
}

impl ParamSpec {
    const fn req(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            range: None,
            clamp: None,
            default: None,
        }
    }

    const fn opt(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            range: None,
            clamp: None,
            default: None,
        }
    }

    const fn ranged(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }

    const fn clamped(mut self, min: i64, max: i64, default: i64) -> Self {
        self.clamp = Some((min, max));
        self.default = Some(default);
        self
    }
}

use ParamKind::{Float, Int, Str};

const SEARCH_FACILITIES: &[ParamSpec] = &[
    ParamSpec::req("country", Str),
    ParamSpec::opt("region", Str),
    ParamSpec::opt("provider", Str),
    ParamSpec::opt("query", Str),
    ParamSpec::opt("state", Str),
    ParamSpec::opt("city", Str),
    ParamSpec::opt("limit", Int).clamped(1, 100, 25),
    ParamSpec::opt("offset", Int).ranged(0.0, 1e9),
];
const GET_FACILITY: &[ParamSpec] = &[ParamSpec::req("facility_id", Str)];
const GET_SITE_SCORE: &[ParamSpec] = &[
    ParamSpec::req("lat", Float).ranged(-90.0, 90.0),
    ParamSpec::req("lon", Float).ranged(-180.0, 180.0),
    ParamSpec::opt("country", Str),
    ParamSpec::opt("radius_miles", Int).ranged(1.0, 500.0),
];
const REGION_WINDOW: &[ParamSpec] = &[
    ParamSpec::req("region", Str),
    ParamSpec::req("window", Str),
];
const REGION: &[ParamSpec] = &[ParamSpec::req("region", Str)];
const MARKET: &[ParamSpec] = &[ParamSpec::req("market", Str)];
const COUNTRY: &[ParamSpec] = &[ParamSpec::req("country", Str)];
const GET_TRANSACTIONS: &[ParamSpec] = &[
    ParamSpec::req("country", Str),
    ParamSpec::req("since", Str),
    ParamSpec::opt("limit", Int).clamped(1, 100, 25),
];
const GET_NEWS: &[ParamSpec] = &[
    ParamSpec::req("market", Str),
    ParamSpec::opt("limit", Int).clamped(1, 50, 10),
];
const NONE: &[ParamSpec] = &[];

impl ToolId {
    pub const ALL: [ToolId; 13] = [
        ToolId::SearchFacilities,
        ToolId::GetFacility,
        ToolId::GetSiteScore,
        ToolId::GetEnergyPrices,
        ToolId::GetGridFuelMix,
        ToolId::GetCarbonIntensity,
        ToolId::GetRenewablePotential,
        ToolId::GetTransactions,
        ToolId::GetCapacityPipeline,
        ToolId::GetMarketReport,
        ToolId::GetNews,
        ToolId::GetWaterStress,
        ToolId::GetPlatformStats,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ToolId::SearchFacilities => "search_facilities",
            ToolId::GetFacility => "get_facility",
            ToolId::GetSiteScore => "get_site_score",
            ToolId::GetEnergyPrices => "get_energy_prices",
            ToolId::GetGridFuelMix => "get_grid_fuel_mix",
            ToolId::GetCarbonIntensity => "get_carbon_intensity",
            ToolId::GetRenewablePotential => "get_renewable_potential",
            ToolId::GetTransactions => "get_transactions",
            ToolId::GetCapacityPipeline => "get_capacity_pipeline",
            ToolId::GetMarketReport => "get_market_report",
            ToolId::GetNews => "get_news",
            ToolId::GetWaterStress => "get_water_stress",
            ToolId::GetPlatformStats => "get_platform_stats",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolId::SearchFacilities => "Search data center facilities by country, provider or keyword",
            ToolId::GetFacility => "Details of a single facility",
            ToolId::GetSiteScore => "Composite site suitability score for a coordinate",
            ToolId::GetEnergyPrices => "Wholesale power prices for a grid region",
            ToolId::GetGridFuelMix => "Generation fuel mix of a grid region",
            ToolId::GetCarbonIntensity => "Grid carbon intensity for a region",
            ToolId::GetRenewablePotential => "Renewable resource potential of a market",
            ToolId::GetTransactions => "M&A transactions in a country since a date",
            ToolId::GetCapacityPipeline => "Operational and planned capacity of a country",
            ToolId::GetMarketReport => "Market statistics: cap rates, absorption, pricing",
            ToolId::GetNews => "Recent industry news for a market",
            ToolId::GetWaterStress => "Baseline water stress of a country",
            ToolId::GetPlatformStats => "Platform-wide coverage statistics",
        }
    }

    pub fn params(&self) -> &'static [ParamSpec] {
        match self {
            ToolId::SearchFacilities => SEARCH_FACILITIES,
            ToolId::GetFacility => GET_FACILITY,
            ToolId::GetSiteScore => GET_SITE_SCORE,
            ToolId::GetEnergyPrices | ToolId::GetCarbonIntensity => REGION_WINDOW,
            ToolId::GetGridFuelMix => REGION,
            ToolId::GetRenewablePotential | ToolId::GetMarketReport => MARKET,
            ToolId::GetTransactions => GET_TRANSACTIONS,
            ToolId::GetCapacityPipeline | ToolId::GetWaterStress => COUNTRY,
            ToolId::GetNews => GET_NEWS,
            ToolId::GetPlatformStats => NONE,
        }
    }

    /// Domain the response normalizes into; `None` for unscored tools.
    pub fn domain(&self) -> Option<Domain> {
        match self {
            ToolId::SearchFacilities | ToolId::GetFacility | ToolId::GetSiteScore => {
                Some(Domain::Facility)
            }
            ToolId::GetEnergyPrices => Some(Domain::Energy),
            ToolId::GetGridFuelMix => Some(Domain::FuelMix),
            ToolId::GetCarbonIntensity => Some(Domain::Carbon),
            ToolId::GetRenewablePotential => Some(Domain::Renewable),
            ToolId::GetTransactions => Some(Domain::Transaction),
            ToolId::GetCapacityPipeline => Some(Domain::Pipeline),
            ToolId::GetMarketReport => Some(Domain::MarketReport),
            ToolId::GetNews => Some(Domain::News),
            ToolId::GetWaterStress => Some(Domain::WaterStress),
            ToolId::GetPlatformStats => None,
        }
    }

    /// Parameter whose value is the entity key of the response.
    pub fn key_param(&self) -> Option<&'static str> {
        match self {
            ToolId::SearchFacilities
            | ToolId::GetSiteScore
            | ToolId::GetTransactions
            | ToolId::GetCapacityPipeline
            | ToolId::GetWaterStress => Some("country"),
            ToolId::GetFacility => Some("facility_id"),
            ToolId::GetEnergyPrices | ToolId::GetGridFuelMix | ToolId::GetCarbonIntensity => {
                Some("region")
            }
            ToolId::GetRenewablePotential | ToolId::GetMarketReport | ToolId::GetNews => {
                Some("market")
            }
            ToolId::GetPlatformStats => None,
        }
    }

    /// Backend path with `{name}` placeholders for path parameters.
    pub fn path_template(&self) -> &'static str {
        match self {
            ToolId::SearchFacilities => "/api/v1/facilities",
            ToolId::GetFacility => "/api/v1/facilities/{facility_id}",
            ToolId::GetSiteScore => "/api/v1/energy/site-analysis",
            ToolId::GetEnergyPrices => "/api/v1/energy/prices",
            ToolId::GetGridFuelMix => "/api/v1/energy/fuel-mix",
            ToolId::GetCarbonIntensity => "/api/v1/energy/carbon-intensity",
            ToolId::GetRenewablePotential => "/api/v1/energy/renewable-potential",
            ToolId::GetTransactions => "/api/v1/transactions",
            ToolId::GetCapacityPipeline => "/api/v1/pipeline",
            ToolId::GetMarketReport => "/api/v1/markets/{market}",
            ToolId::GetNews => "/api/v1/news",
            ToolId::GetWaterStress => "/api/v1/water-stress",
            ToolId::GetPlatformStats => "/api/v1/stats",
        }
    }

    /// Backend path, with path parameters substituted as single
    /// percent-encoded segments.
    pub fn path(&self, parameters: &Parameters) -> String {
        let mut path = self.path_template().to_string();
        for name in PATH_PARAMS {
            let placeholder = format!("{{{name}}}");
            if path.contains(&placeholder) {
                let value = parameters
                    .get(name)
                    .map(|v| encode_segment(&v.to_string()))
                    .unwrap_or_default();
                path = path.replace(&placeholder, &value);
            }
        }
        path
    }

    /// Query-string pairs for the backend. Path parameters are excluded and
    /// site-analysis parameters use the backend's names and units.
    pub fn query(&self, parameters: &Parameters) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for (name, value) in parameters {
            match (self, name.as_str()) {
                (ToolId::GetFacility, "facility_id") | (ToolId::GetMarketReport, "market") => {}
                (ToolId::GetSiteScore, "lon") => out.push(("lng".into(), value.to_string())),
                (ToolId::GetSiteScore, "radius_miles") => {
                    let meters = value.as_f64().unwrap_or(25.0) * 1609.0;
                    out.push(("radius".into(), format!("{}", meters.round() as i64)));
                }
                _ => out.push((name.clone(), value.to_string())),
            }
        }
        out
    }

    /// Validate `parameters` against this tool's schema.
    ///
    /// Returns the canonical parameter map: empty optional strings dropped,
    /// integers widened where a number is declared, clamped parameters clamped.
    pub fn validate(&self, parameters: &Parameters) -> Result<Parameters, CoreError> {
        let specs = self.params();
        for name in parameters.keys() {
            if !specs.iter().any(|s| s.name == name) {
                return Err(CoreError::UnknownParameter {
                    tool: self.name(),
                    name: name.clone(),
                });
            }
        }

        let mut out = Parameters::new();
        for spec in specs {
            let Some(value) = parameters.get(spec.name) else {
                if spec.required {
                    return Err(CoreError::MissingParameter {
                        tool: self.name(),
                        name: spec.name,
                    });
                }
                if let Some(default) = spec.default {
                    out.insert(spec.name.to_string(), Scalar::Int(default));
                }
                continue;
            };

            let checked = match (spec.kind, value) {
                (Str, Scalar::Str(s)) if s.trim().is_empty() => {
                    if spec.required {
                        return Err(CoreError::MissingParameter {
                            tool: self.name(),
                            name: spec.name,
                        });
                    }
                    continue;
                }
                (Str, Scalar::Str(s)) => Scalar::Str(s.trim().to_string()),
                (Int, Scalar::Int(i)) => Scalar::Int(*i),
                (Float, Scalar::Float(x)) if x.is_finite() => Scalar::Float(*x),
                (Float, Scalar::Int(i)) => Scalar::Float(*i as f64),
                _ => {
                    return Err(CoreError::WrongType {
                        tool: self.name(),
                        name: spec.name,
                        expected: spec.kind.name(),
                        found: value.type_name(),
                    })
                }
            };

            if let (Some((min, max)), Some(v)) = (spec.range, checked.as_f64()) {
                if v < min || v > max {
                    return Err(CoreError::OutOfRange {
                        tool: self.name(),
                        name: spec.name,
                        value: v,
                        min,
                        max,
                    });
                }
            }

            let checked = match (spec.clamp, &checked) {
                (Some((min, max)), Scalar::Int(i)) => Scalar::Int((*i).clamp(min, max)),
                _ => checked,
            };
            out.insert(spec.name.to_string(), checked);
        }
        Ok(out)
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ToolId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolId::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| CoreError::UnknownTool(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::params;

    #[test]
    fn parses_tool_names() {
        assert_eq!("get_news".parse::<ToolId>().unwrap(), ToolId::GetNews);
        assert!(matches!(
            "delete_everything".parse::<ToolId>(),
            Err(CoreError::UnknownTool(_))
        ));
        for tool in ToolId::ALL {
            assert_eq!(tool.name().parse::<ToolId>().unwrap(), tool);
        }
    }

    #[test]
    fn missing_required_parameter_is_rejected() {
        let err = ToolId::GetEnergyPrices
            .validate(&params([("region", "DE")]))
            .unwrap_err();
        assert!(matches!(err, CoreError::MissingParameter { name: "window", .. }));
    }

    #[test]
    fn wrong_type_is_rejected() {
        let err = ToolId::GetNews
            .validate(&params([
                ("market", Scalar::from("SG")),
                ("limit", Scalar::from("ten")),
            ]))
            .unwrap_err();
        assert!(matches!(err, CoreError::WrongType { name: "limit", .. }));
    }

    #[test]
    fn unknown_parameter_is_rejected() {
        let err = ToolId::GetWaterStress
            .validate(&params([("country", "DE"), ("colour", "blue")]))
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownParameter { .. }));
    }

    #[test]
    fn limit_is_clamped_and_empty_strings_dropped() {
        let out = ToolId::SearchFacilities
            .validate(&params([
                ("country", Scalar::from("US")),
                ("provider", Scalar::from("")),
                ("limit", Scalar::from(500i64)),
            ]))
            .unwrap();
        assert_eq!(out["limit"], Scalar::Int(100));
        assert!(!out.contains_key("provider"));

        let news = ToolId::GetNews
            .validate(&params([
                ("market", Scalar::from("SG")),
                ("limit", Scalar::from(80i64)),
            ]))
            .unwrap();
        assert_eq!(news["limit"], Scalar::Int(50));
    }

    #[test]
    fn missing_limit_takes_default() {
        let out = ToolId::GetNews.validate(&params([("market", "SG")])).unwrap();
        assert_eq!(out["limit"], Scalar::Int(10));
    }

    #[test]
    fn coordinates_are_range_checked_and_widened() {
        let err = ToolId::GetSiteScore
            .validate(&params([("lat", Scalar::from(95.0)), ("lon", Scalar::from(0.0))]))
            .unwrap_err();
        assert!(matches!(err, CoreError::OutOfRange { name: "lat", .. }));

        let ok = ToolId::GetSiteScore
            .validate(&params([("lat", Scalar::from(50i64)), ("lon", Scalar::from(8.6))]))
            .unwrap();
        assert_eq!(ok["lat"], Scalar::Float(50.0));
    }

    #[test]
    fn site_score_query_uses_backend_names() {
        let p = params([
            ("lat", Scalar::from(32.7)),
            ("lon", Scalar::from(-96.8)),
            ("radius_miles", Scalar::from(25i64)),
        ]);
        let q = ToolId::GetSiteScore.query(&p);
        assert!(q.contains(&("lng".to_string(), "-96.8".to_string())));
        assert!(q.contains(&("radius".to_string(), "40225".to_string())));
    }

    #[test]
    fn path_parameters_are_substituted() {
        let p = params([("market", "Frankfurt")]);
        assert_eq!(ToolId::GetMarketReport.path(&p), "/api/v1/markets/Frankfurt");
        assert!(ToolId::GetMarketReport.query(&p).is_empty());
    }

    #[test]
    fn path_parameters_cannot_change_the_route() {
        let p = params([("market", "../stats?x=1#frag")]);
        assert_eq!(
            ToolId::GetMarketReport.path(&p),
            "/api/v1/markets/..%2Fstats%3Fx%3D1%23frag"
        );
        let p = params([("facility_id", "a b+c")]);
        assert_eq!(ToolId::GetFacility.path(&p), "/api/v1/facilities/a%20b%2Bc");
        assert_eq!(
            ToolId::GetFacility.path_template(),
            "/api/v1/facilities/{facility_id}"
        );
    }
}
