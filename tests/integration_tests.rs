//! Integration tests for the complete dcintel pipeline
//!
//! These tests verify end-to-end functionality across crates:
//! - Catalog → Dispatcher → RawResponse (dedup, budgets)
//! - Planner → Dispatcher → Normalizer → Matrix → Risk → Scenarios → Recommendation
//! - Config file → Planner
//!
//! Run with: cargo test --test integration_tests

use async_trait::async_trait;
use dcintel_dispatch::{HttpReply, HttpRequest, Transport, TransportError};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Serves country-dependent payloads for every scoreable tool.
#[derive(Default)]
struct MarketBackend {
    calls: AtomicUsize,
}

fn key_of(request: &HttpRequest) -> String {
    request
        .query
        .iter()
        .find(|(k, _)| matches!(k.as_str(), "country" | "region" | "market"))
        .map(|(_, v)| v.clone())
        .or_else(|| request.path.rsplit('/').next().map(str::to_string))
        .unwrap_or_default()
}

fn market_payload(tool: dcintel_core::ToolId, key: &str) -> Value {
    use dcintel_core::ToolId;

    // Singapore: expensive, carbon-heavy power and water-stressed.
    let sg = key == "SG";
    match tool {
        ToolId::SearchFacilities => json!({"total": 3, "total_capacity_mw": if sg { 220 } else { 480 }}),
        ToolId::GetEnergyPrices => json!({"power_price_usd_mwh": if sg { 190 } else { 85 }}),
        ToolId::GetGridFuelMix => json!({"fuel_mix": if sg {
            json!({"gas": 95, "coal": 1, "nuclear": 0, "wind": 0, "solar": 4, "hydro": 0})
        } else {
            json!({"gas": 15, "coal": 25, "nuclear": 5, "wind": 33, "solar": 12, "hydro": 10})
        }}),
        ToolId::GetCarbonIntensity => json!({"carbon_intensity": if sg { 410 } else { 380 }, "unit": "g/kWh"}),
        ToolId::GetRenewablePotential => json!({"renewable_potential_score": if sg { 25 } else { 65 }}),
        ToolId::GetTransactions => json!({"transactions": [
            {"value_usd_m": 300, "capacity_mw": 30},
            {"value_usd_m": 500, "capacity_mw": 50}
        ]}),
        ToolId::GetCapacityPipeline => json!({"pipeline_mw": 400, "operational_mw": 1200, "vacancy_pct": if sg { 2 } else { 8 }}),
        ToolId::GetMarketReport => json!({"market": {"cap_rate_pct": if sg { 5.2 } else { 6.0 }}}),
        ToolId::GetNews => json!({"articles": [{"sentiment": 0.1}], "total": 1}),
        ToolId::GetWaterStress => json!({"water_stress_pct": if sg { 85 } else { 20 }}),
        _ => json!({}),
    }
}

#[async_trait]
impl Transport for MarketBackend {
    async fn get(&self, request: &HttpRequest) -> Result<HttpReply, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(HttpReply::json(200, &market_payload(request.tool, &key_of(request))))
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

#[tokio::test]
async fn test_identical_news_calls_share_one_network_call() {
    use dcintel_core::{params, Scalar, ToolId};
    use dcintel_dispatch::{DispatchConfig, Dispatcher};

    let backend = Arc::new(MarketBackend::default());
    let dispatcher = Dispatcher::new(DispatchConfig::default(), backend.clone());

    let call = || params([("market", Scalar::from("SG")), ("limit", Scalar::from(10i64))]);
    let (a, b) = tokio::join!(
        dispatcher.dispatch(ToolId::GetNews, call()),
        dispatcher.dispatch(ToolId::GetNews, call())
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    assert_eq!(a, b);

    let ra = dcintel_analysis::normalize(&a).unwrap();
    let rb = dcintel_analysis::normalize(&b).unwrap();
    assert_eq!(ra, rb);
    assert_eq!(ra.entity_key, "SG");
}

#[tokio::test]
async fn test_validation_failure_never_reaches_backend() {
    use dcintel_core::{params, Scalar, ToolId};
    use dcintel_dispatch::{DispatchConfig, DispatchError, Dispatcher};

    let backend = Arc::new(MarketBackend::default());
    let dispatcher = Dispatcher::new(DispatchConfig::default(), backend.clone());

    let result = dispatcher
        .dispatch(
            ToolId::GetSiteScore,
            params([("lat", Scalar::Float(123.0)), ("lon", Scalar::Float(8.0))]),
        )
        .await;
    assert!(matches!(result, Err(DispatchError::Validation(_))));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    assert_eq!(dispatcher.stats().network_attempts, 0);
}

// ============================================================================
// Planner → Recommendation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_cross_border_run_ranks_lower_risk_market_first() {
    use dcintel_core::{Domain, RiskAxis, ScenarioName};
    use dcintel_planner::{Planner, PlannerConfig, Target};

    let backend = Arc::new(MarketBackend::default());
    let planner = Planner::new(PlannerConfig::default(), backend.clone()).unwrap();
    let targets: Vec<Target> = ["SG", "DE"].iter().map(|c| c.parse().unwrap()).collect();

    let report = planner.run(&targets).await.unwrap();
    assert_eq!(backend.calls.load(Ordering::SeqCst), 20);
    assert_eq!(report.recommendation.entity_keys(), vec!["DE", "SG"]);

    let de = &report.features["DE"];
    assert!(de.unavailable_domains.is_empty());
    assert!(!report.features["SG"].unavailable_domains.contains(&Domain::WaterStress));

    let sg_scores = &report.scores["SG"];
    let de_scores = &report.scores["DE"];
    for axis in [RiskAxis::PowerCost, RiskAxis::WaterStress, RiskAxis::CarbonExposure] {
        assert!(
            de_scores.axis(axis).value().unwrap() > sg_scores.axis(axis).value().unwrap(),
            "{axis}"
        );
    }

    let sg = report.recommendation.get("SG").unwrap();
    assert!(sg.narrative_flags.risks.contains(&RiskAxis::WaterStress));
    assert!(!sg.narrative_flags.incomplete_data);

    let names: Vec<ScenarioName> = report.scenarios["DE"]
        .iter()
        .map(|s| s.scenario_name)
        .collect();
    assert_eq!(names, ScenarioName::ALL.to_vec());
}

#[tokio::test(start_paused = true)]
async fn test_run_with_config_file() {
    use dcintel_dispatch::Tier;
    use dcintel_planner::{Planner, PlannerConfig, Target};
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "tier": "pro",
            "tools": ["get_energy_prices", "get_water_stress"],
            "synthesis": {{"penalty_per_point": 0.1}}
        }}"#
    )
    .unwrap();

    let config = PlannerConfig::from_file(file.path()).unwrap();
    config.validate().unwrap();
    assert_eq!(config.tier, Tier::Pro);

    let backend = Arc::new(MarketBackend::default());
    let planner = Planner::new(config, backend.clone()).unwrap();
    let report = planner
        .run(&[Target::country("DE").unwrap(), Target::country("IE").unwrap()])
        .await
        .unwrap();

    assert_eq!(report.planned_calls, 4);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 4);
    assert_eq!(report.recommendation.entries.len(), 2);
    assert!(report
        .recommendation
        .entries
        .iter()
        .all(|e| e.narrative_flags.incomplete_data));

    let json: Value = serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap();
    assert_eq!(json["planned_calls"], 4);
    assert!(json["generated_at"].is_string());
}
