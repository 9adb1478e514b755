//! Dispatcher configuration: tiers, rate ceilings, retry policy, credentials.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Service tier. Decides rate ceilings and whether calls carry a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Pro,
}

impl Tier {
    pub fn limits(&self) -> RateLimits {
        match self {
            Tier::Free => RateLimits {
                per_day: 100,
                per_minute: 10,
            },
            Tier::Pro => RateLimits {
                per_day: 10_000,
                per_minute: 100,
            },
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "pro" => Ok(Tier::Pro),
            other => Err(format!("unknown tier '{other}' (expected free or pro)")),
        }
    }
}

/// Two independent call ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimits {
    pub per_day: u32,
    pub per_minute: u32,
}

/// Hard cap on attempts per call, the first one included.
pub const MAX_ATTEMPTS: u32 = 3;

/// Retry schedule for transient failures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: f64,
    pub max_delay: Duration,
    /// Maximum jitter as a fraction of the computed delay.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            base_delay: Duration::from_millis(500),
            factor: 2.0,
            max_delay: Duration::from_secs(8),
            jitter: 0.1,
        }
    }
}

/// How the pro-tier credential is attached to requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// `X-API-Key: <key>`
    ApiKey(String),
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub tier: Tier,
    pub limits: RateLimits,
    pub retry: RetryPolicy,
    /// Longest a call may wait for a per-minute slot before failing.
    pub max_queue_wait: Duration,
    pub credential: Option<Credential>,
}

impl DispatchConfig {
    pub fn for_tier(tier: Tier) -> Self {
        Self {
            tier,
            limits: tier.limits(),
            retry: RetryPolicy::default(),
            max_queue_wait: Duration::from_secs(65),
            credential: None,
        }
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Credential actually sent: free-tier calls are unauthenticated.
    pub fn effective_credential(&self) -> Option<&Credential> {
        match self.tier {
            Tier::Free => None,
            Tier::Pro => self.credential.as_ref(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::for_tier(Tier::Free)
    }
}
