//! Call, response, record and feature types shared across the pipeline.

use crate::catalog::ToolId;
use crate::domain::Domain;
use crate::metric::Metric;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ============================================================================
// Parameters
// ============================================================================

/// A scalar tool parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Bool(_) => "bool",
            Scalar::Int(_) => "integer",
            Scalar::Float(_) => "number",
            Scalar::Str(_) => "string",
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Str(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Str(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

impl From<f64> for Scalar {
    fn from(x: f64) -> Self {
        Scalar::Float(x)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

/// Tool parameters. Ordered so the serialization is canonical.
pub type Parameters = BTreeMap<String, Scalar>;

/// Build a parameter map from `(name, value)` pairs.
pub fn params<I, K, V>(pairs: I) -> Parameters
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Scalar>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Canonical serialization of a call: tool id plus the sorted parameter map.
pub fn canonical_call(tool: ToolId, parameters: &Parameters) -> String {
    let params = serde_json::to_string(parameters).unwrap_or_default();
    format!("{}:{}", tool.name(), params)
}

/// Dedup key of a call: SHA-256 of its canonical serialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallKey(String);

impl CallKey {
    pub fn of(tool: ToolId, parameters: &Parameters) -> Self {
        let digest = Sha256::digest(canonical_call(tool, parameters).as_bytes());
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        CallKey(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Calls and responses
// ============================================================================

/// One issued attempt of a logical tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_id: ToolId,
    pub parameters: Parameters,
    pub issued_at: DateTime<Utc>,
    pub attempt_count: u32,
}

impl ToolCall {
    pub fn first(tool_id: ToolId, parameters: Parameters) -> Self {
        Self {
            tool_id,
            parameters,
            issued_at: Utc::now(),
            attempt_count: 1,
        }
    }

    /// A fresh attempt of the same logical call.
    pub fn next_attempt(&self) -> Self {
        Self {
            tool_id: self.tool_id,
            parameters: self.parameters.clone(),
            issued_at: Utc::now(),
            attempt_count: self.attempt_count + 1,
        }
    }

    pub fn key(&self) -> CallKey {
        CallKey::of(self.tool_id, &self.parameters)
    }
}

/// Why a call ended without usable data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// 4xx other than 401/403/429.
    Client,
    /// 401/403 or a rejected credential.
    Auth,
    /// 5xx after the attempt cap.
    Server,
    /// 429 after the attempt cap.
    Throttled,
    /// Connection or timeout failure after the attempt cap.
    Network,
    /// Body was not JSON.
    InvalidPayload,
    /// Backend answered with an `{"error": ...}` envelope.
    Backend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResponseStatus {
    Ok,
    Error { kind: FailureKind, reason: String },
}

/// A terminal response to a logical call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResponse {
    pub tool_id: ToolId,
    pub parameters: Parameters,
    #[serde(flatten)]
    pub status: ResponseStatus,
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl RawResponse {
    pub fn ok(tool_id: ToolId, parameters: Parameters, payload: serde_json::Value) -> Self {
        Self {
            tool_id,
            parameters,
            status: ResponseStatus::Ok,
            payload,
            received_at: Utc::now(),
        }
    }

    pub fn error(
        tool_id: ToolId,
        parameters: Parameters,
        kind: FailureKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            tool_id,
            parameters,
            status: ResponseStatus::Error {
                kind,
                reason: reason.into(),
            },
            payload: serde_json::Value::Null,
            received_at: Utc::now(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, ResponseStatus::Ok)
    }

    pub fn failure(&self) -> Option<(FailureKind, &str)> {
        match &self.status {
            ResponseStatus::Ok => None,
            ResponseStatus::Error { kind, reason } => Some((*kind, reason.as_str())),
        }
    }
}

// ============================================================================
// Normalized records and feature vectors
// ============================================================================

/// Canonical per-domain record for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub domain: Domain,
    pub entity_key: String,
    pub source_tool: ToolId,
    /// Exactly the fields of `domain`'s schema.
    pub fields: BTreeMap<String, Metric>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NormalizedRecord {
    /// A record with every field of `domain` unavailable.
    pub fn empty(domain: Domain, entity_key: impl Into<String>, source_tool: ToolId) -> Self {
        let fields = domain
            .fields()
            .iter()
            .map(|f| (f.name.to_string(), Metric::Unavailable))
            .collect();
        Self {
            domain,
            entity_key: entity_key.into(),
            source_tool,
            fields,
            warnings: Vec::new(),
            error: None,
        }
    }

    pub fn get(&self, name: &str) -> Metric {
        self.fields.get(name).copied().unwrap_or(Metric::Unavailable)
    }

    pub fn available_count(&self) -> usize {
        self.fields.values().filter(|m| m.is_available()).count()
    }
}

/// Merged features of one country.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    pub entity_key: String,
    pub features: BTreeMap<String, Metric>,
    /// Domains that contributed no available field.
    pub unavailable_domains: BTreeSet<Domain>,
    pub warnings: Vec<String>,
}

impl FeatureVector {
    pub fn new(entity_key: impl Into<String>) -> Self {
        Self {
            entity_key: entity_key.into(),
            ..Default::default()
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.features.get(name).and_then(Metric::value)
    }

    pub fn metric(&self, name: &str) -> Metric {
        self.features.get(name).copied().unwrap_or(Metric::Unavailable)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Metric) {
        self.features.insert(name.into(), value);
    }

    pub fn available_count(&self) -> usize {
        self.features.values().filter(|m| m.is_available()).count()
    }
}
