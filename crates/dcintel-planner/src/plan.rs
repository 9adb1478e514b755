//! Per-country call sets.
//!
//! Every planned call depends only on the target, never on another call's
//! result, so the whole set can be fanned out at once.

use crate::config::PlannerConfig;
use crate::error::TargetError;
use dcintel_core::{params, Parameters, Scalar, ToolId};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A country to analyze, optionally with a candidate site.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Target {
    pub country: String,
    pub site: Option<Site>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Site {
    pub lat: f64,
    pub lon: f64,
}

impl Target {
    pub fn country(code: &str) -> Result<Self, TargetError> {
        code.parse()
    }
}

/// `DE` or `DE@50.11,8.68`.
impl FromStr for Target {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TargetError::Empty);
        }
        let (code, site) = match s.split_once('@') {
            Some((code, site)) => (code.trim(), Some(parse_site(site)?)),
            None => (s, None),
        };
        if !(2..=3).contains(&code.len()) || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(TargetError::Country(code.to_string()));
        }
        Ok(Target {
            country: code.to_ascii_uppercase(),
            site,
        })
    }
}

fn parse_site(s: &str) -> Result<Site, TargetError> {
    let bad = || TargetError::Site(s.to_string());
    let (lat, lon) = s.split_once(',').ok_or_else(bad)?;
    let lat: f64 = lat.trim().parse().map_err(|_| bad())?;
    let lon: f64 = lon.trim().parse().map_err(|_| bad())?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(bad());
    }
    Ok(Site { lat, lon })
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.site {
            Some(site) => write!(f, "{}@{},{}", self.country, site.lat, site.lon),
            None => f.write_str(&self.country),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCall {
    pub country: String,
    pub tool: ToolId,
    pub parameters: Parameters,
}

/// Calls for every target, grouped by target in input order.
///
/// Duplicate targets are planned once.
pub fn plan(targets: &[Target], config: &PlannerConfig) -> Vec<PlannedCall> {
    let mut seen = std::collections::BTreeSet::new();
    let mut calls = Vec::new();
    for target in targets {
        if !seen.insert(target.country.clone()) {
            continue;
        }
        for tool in &config.tools {
            calls.push(PlannedCall {
                country: target.country.clone(),
                tool: *tool,
                parameters: parameters_for(*tool, &target.country, config),
            });
        }
        if let Some(site) = target.site {
            calls.push(PlannedCall {
                country: target.country.clone(),
                tool: ToolId::GetSiteScore,
                parameters: params([
                    ("lat", Scalar::Float(site.lat)),
                    ("lon", Scalar::Float(site.lon)),
                    ("country", Scalar::from(target.country.as_str())),
                ]),
            });
        }
    }
    calls
}

fn parameters_for(tool: ToolId, country: &str, config: &PlannerConfig) -> Parameters {
    let mut p = Parameters::new();
    if let Some(key) = tool.key_param() {
        p.insert(key.to_string(), Scalar::from(country));
    }
    match tool {
        ToolId::SearchFacilities => {
            p.insert("limit".into(), Scalar::Int(config.facility_limit));
        }
        ToolId::GetEnergyPrices | ToolId::GetCarbonIntensity => {
            p.insert("window".into(), Scalar::from(config.energy_window.as_str()));
        }
        ToolId::GetTransactions => {
            p.insert(
                "since".into(),
                Scalar::from(config.transactions_since.as_str()),
            );
        }
        ToolId::GetNews => {
            p.insert("limit".into(), Scalar::Int(config.news_limit));
        }
        _ => {}
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(codes: &[&str]) -> Vec<Target> {
        codes.iter().map(|c| c.parse().unwrap()).collect()
    }

    #[test]
    fn parses_targets() {
        assert_eq!(Target::country("de").unwrap().country, "DE");
        let t: Target = "sg@1.35,103.8".parse().unwrap();
        assert_eq!(t.country, "SG");
        assert_eq!(t.site, Some(Site { lat: 1.35, lon: 103.8 }));
        assert_eq!(t.to_string(), "SG@1.35,103.8");

        assert!(matches!("".parse::<Target>(), Err(TargetError::Empty)));
        assert!(matches!("GERMANY".parse::<Target>(), Err(TargetError::Country(_))));
        assert!(matches!("D1".parse::<Target>(), Err(TargetError::Country(_))));
        assert!(matches!("DE@95,0".parse::<Target>(), Err(TargetError::Site(_))));
        assert!(matches!("DE@north".parse::<Target>(), Err(TargetError::Site(_))));
    }

    #[test]
    fn one_call_per_tool_per_country() {
        let config = PlannerConfig::default();
        let calls = plan(&targets(&["DE", "SG", "US"]), &config);
        assert_eq!(calls.len(), 3 * config.tools.len());
        assert!(calls[..10].iter().all(|c| c.country == "DE"));
    }

    #[test]
    fn six_countries_nine_tools_is_fifty_four_calls() {
        let config = PlannerConfig {
            tools: PlannerConfig::default()
                .tools
                .into_iter()
                .filter(|t| *t != ToolId::SearchFacilities)
                .collect(),
            ..PlannerConfig::default()
        };
        let calls = plan(&targets(&["DE", "NL", "IE", "SG", "US", "JP"]), &config);
        assert_eq!(calls.len(), 54);
    }

    #[test]
    fn every_planned_call_validates() {
        let config = PlannerConfig::default();
        for call in plan(&targets(&["DE", "SG@1.3,103.8"]), &config) {
            call.tool
                .validate(&call.parameters)
                .unwrap_or_else(|e| panic!("{} rejected: {e}", call.tool));
        }
    }

    #[test]
    fn duplicates_are_planned_once_and_sites_add_a_call() {
        let config = PlannerConfig::default();
        let calls = plan(&targets(&["DE", "de", "DE@50.1,8.7"]), &config);
        assert_eq!(calls.len(), config.tools.len());

        let calls = plan(&targets(&["DE@50.1,8.7"]), &config);
        assert_eq!(calls.len(), config.tools.len() + 1);
        let site = calls.last().unwrap();
        assert_eq!(site.tool, ToolId::GetSiteScore);
        assert_eq!(site.parameters["country"], Scalar::from("DE"));
    }

    #[test]
    fn region_and_market_tools_are_keyed_by_country() {
        let config = PlannerConfig::default();
        let calls = plan(&targets(&["IE"]), &config);
        let fuel = calls.iter().find(|c| c.tool == ToolId::GetGridFuelMix).unwrap();
        assert_eq!(fuel.parameters["region"], Scalar::from("IE"));
        let news = calls.iter().find(|c| c.tool == ToolId::GetNews).unwrap();
        assert_eq!(news.parameters["market"], Scalar::from("IE"));
        assert_eq!(news.parameters["limit"], Scalar::Int(10));
    }
}
