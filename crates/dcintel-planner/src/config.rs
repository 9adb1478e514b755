//! Planner configuration: JSON file, environment overrides, validation.
//!
//! Precedence is defaults < config file < environment.

use crate::error::ConfigError;
use dcintel_analysis::{RiskWeights, ScenarioConfig, SynthesisConfig};
use dcintel_core::ToolId;
use dcintel_dispatch::{Credential, DispatchConfig, RateLimits, RetryPolicy, Tier, MAX_ATTEMPTS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_BASE_URL: &str = "DCINTEL_BASE_URL";
pub const ENV_API_TOKEN: &str = "DCINTEL_API_TOKEN";
pub const ENV_TIER: &str = "DCINTEL_TIER";

/// How the pro-tier token is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    #[default]
    Bearer,
    /// Forwarded as `X-API-Key`.
    ApiKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub base_url: String,
    pub tier: Tier,
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
    pub auth_scheme: AuthScheme,
    pub request_timeout_secs: u64,
    /// Wall-clock budget for one analysis run.
    pub session_deadline_secs: u64,
    pub max_queue_wait_secs: u64,
    pub max_attempts: u32,
    /// Overrides the tier's ceilings.
    pub limits: Option<RateLimits>,
    /// Country-keyed tools issued for every target.
    pub tools: Vec<ToolId>,
    pub energy_window: String,
    pub transactions_since: String,
    pub facility_limit: i64,
    pub news_limit: i64,
    pub weights: RiskWeights,
    pub scenario: ScenarioConfig,
    pub synthesis: SynthesisConfig,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            tier: Tier::Free,
            api_token: None,
            auth_scheme: AuthScheme::Bearer,
            request_timeout_secs: 15,
            session_deadline_secs: 600,
            max_queue_wait_secs: 65,
            max_attempts: RetryPolicy::default().max_attempts,
            limits: None,
            tools: vec![
                ToolId::SearchFacilities,
                ToolId::GetEnergyPrices,
                ToolId::GetGridFuelMix,
                ToolId::GetCarbonIntensity,
                ToolId::GetRenewablePotential,
                ToolId::GetTransactions,
                ToolId::GetCapacityPipeline,
                ToolId::GetMarketReport,
                ToolId::GetNews,
                ToolId::GetWaterStress,
            ],
            energy_window: "30d".to_string(),
            transactions_since: "2023-01-01".to_string(),
            facility_limit: 25,
            news_limit: 10,
            weights: RiskWeights::default(),
            scenario: ScenarioConfig::default(),
            synthesis: SynthesisConfig::default(),
        }
    }
}

impl PlannerConfig {
    /// Defaults, then `path` if given, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|var| std::env::var(var).ok())
    }

    /// Apply overrides from `lookup`. Empty values are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_BASE_URL) {
            self.base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(token) = get(ENV_API_TOKEN) {
            self.api_token = Some(token.trim().to_string());
        }
        if let Some(tier) = get(ENV_TIER) {
            self.tier = tier.trim().parse().map_err(|reason| ConfigError::Env {
                var: ENV_TIER,
                reason,
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(invalid("base_url", "must not be empty"));
        }
        for (name, value) in [
            ("request_timeout_secs", self.request_timeout_secs),
            ("session_deadline_secs", self.session_deadline_secs),
            ("max_attempts", u64::from(self.max_attempts)),
        ] {
            if value == 0 {
                return Err(invalid(name, "must be positive"));
            }
        }
        if self.max_attempts > MAX_ATTEMPTS {
            return Err(invalid("max_attempts", "must be at most 3"));
        }
        if let Some(limits) = self.limits {
            if limits.per_day == 0 || limits.per_minute == 0 {
                return Err(invalid("limits", "ceilings must be positive"));
            }
        }
        if self.tools.is_empty() {
            return Err(invalid("tools", "at least one tool is required"));
        }
        for tool in &self.tools {
            if !plannable(*tool) {
                return Err(invalid(
                    "tools",
                    &format!("{tool} is not keyed by country, region or market"),
                ));
            }
        }
        if !(1..=100).contains(&self.facility_limit) {
            return Err(invalid("facility_limit", "must be in 1..=100"));
        }
        if !(1..=50).contains(&self.news_limit) {
            return Err(invalid("news_limit", "must be in 1..=50"));
        }
        self.weights.validate()?;
        self.scenario.validate()?;
        self.synthesis.validate()?;
        Ok(())
    }

    pub fn session_deadline(&self) -> Duration {
        Duration::from_secs(self.session_deadline_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn credential(&self) -> Option<Credential> {
        let token = self.api_token.clone()?;
        Some(match self.auth_scheme {
            AuthScheme::Bearer => Credential::Bearer(token),
            AuthScheme::ApiKey => Credential::ApiKey(token),
        })
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        let mut config = DispatchConfig::for_tier(self.tier).with_retry(RetryPolicy {
            max_attempts: self.max_attempts,
            ..RetryPolicy::default()
        });
        if let Some(limits) = self.limits {
            config.limits = limits;
        }
        config.max_queue_wait = Duration::from_secs(self.max_queue_wait_secs);
        config.credential = self.credential();
        config
    }
}

/// Tools the planner can issue from a country code alone.
pub fn plannable(tool: ToolId) -> bool {
    tool.domain().is_some()
        && matches!(tool.key_param(), Some("country" | "region" | "market"))
        && tool != ToolId::GetSiteScore
}

fn invalid(name: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.to_string(),
    }
}
