//! The rate-limited, deduplicating query dispatcher.
//!
//! ```text
//! dispatch(tool, params)
//!   │ validate against catalog ──► Err(Validation)
//!   │ run cache hit? ────────────► cached RawResponse (no budget)
//!   ▼
//! attempt loop (≤ max_attempts)
//!   │ rate budget ──────────────► Err(RateLimitExceeded)
//!   │ transport.get
//!   ├─ 2xx json ────────────────► RawResponse ok
//!   ├─ 429 / 5xx / net error ───► backoff, retry (Retry-After wins)
//!   └─ other 4xx / auth ────────► RawResponse error
//! ```

use crate::backoff::Backoff;
use crate::config::{DispatchConfig, MAX_ATTEMPTS};
use crate::error::DispatchError;
use crate::limiter::RateLimiter;
use crate::transport::{HttpReply, HttpRequest, Transport};
use dcintel_core::{
    canonical_call, CallKey, FailureKind, Parameters, RawResponse, ToolCall, ToolId,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Counters for one dispatcher's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Network attempts actually sent.
    pub network_attempts: u64,
    /// Logical calls answered from the run cache.
    pub cache_hits: u64,
    /// Attempts beyond the first.
    pub retries: u64,
    /// Calls refused by a rate ceiling.
    pub rate_limited: u64,
}

enum Outcome {
    Done(RawResponse),
    Retry {
        kind: FailureKind,
        reason: String,
        retry_after: Option<Duration>,
    },
}

pub struct Dispatcher {
    config: DispatchConfig,
    transport: Arc<dyn Transport>,
    limiter: RateLimiter,
    cache: Mutex<HashMap<CallKey, Arc<OnceCell<RawResponse>>>>,
    stats: Mutex<DispatchStats>,
}

impl Dispatcher {
    /// Configured attempts, held to `1..=MAX_ATTEMPTS`.
    fn max_attempts(&self) -> u32 {
        self.config.retry.max_attempts.clamp(1, MAX_ATTEMPTS)
    }

    pub fn new(config: DispatchConfig, transport: Arc<dyn Transport>) -> Self {
        let limiter = RateLimiter::new(config.limits);
        Self {
            config,
            transport,
            limiter,
            cache: Mutex::new(HashMap::new()),
            stats: Mutex::new(DispatchStats::default()),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn stats(&self) -> DispatchStats {
        *self.stats.lock()
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Issue a validated, deduplicated, rate-limited call.
    pub async fn dispatch(
        &self,
        tool_id: ToolId,
        parameters: Parameters,
    ) -> Result<RawResponse, DispatchError> {
        let parameters = tool_id.validate(&parameters)?;
        let key = CallKey::of(tool_id, &parameters);

        let cell = {
            let mut cache = self.cache.lock();
            Arc::clone(cache.entry(key).or_default())
        };

        if let Some(hit) = cell.get() {
            self.record_cache_hit(tool_id, &parameters);
            return Ok(hit.clone());
        }

        let mut executed = false;
        let result = cell
            .get_or_try_init(|| {
                executed = true;
                self.execute(tool_id, parameters.clone())
            })
            .await;

        match result {
            Ok(response) => {
                if !executed {
                    self.record_cache_hit(tool_id, &parameters);
                }
                Ok(response.clone())
            }
            Err(err) => {
                if matches!(err, DispatchError::RateLimitExceeded { .. }) {
                    self.stats.lock().rate_limited += 1;
                }
                Err(err)
            }
        }
    }

    fn record_cache_hit(&self, tool_id: ToolId, parameters: &Parameters) {
        self.stats.lock().cache_hits += 1;
        tracing::debug!(tool = %tool_id, call = %canonical_call(tool_id, parameters), "cache hit");
    }

    async fn execute(
        &self,
        tool_id: ToolId,
        parameters: Parameters,
    ) -> Result<RawResponse, DispatchError> {
        let mut call = ToolCall::first(tool_id, parameters);
        let mut backoff = Backoff::new(self.config.retry);

        loop {
            self.limiter.acquire(self.config.max_queue_wait).await?;
            {
                let mut stats = self.stats.lock();
                stats.network_attempts += 1;
                if call.attempt_count > 1 {
                    stats.retries += 1;
                }
            }
            tracing::info!(
                target: "dcintel::audit",
                tool = %call.tool_id,
                call = %canonical_call(call.tool_id, &call.parameters),
                attempt = call.attempt_count,
                issued_at = %call.issued_at.to_rfc3339(),
                "tool call issued"
            );

            let request = HttpRequest::for_call(
                call.tool_id,
                &call.parameters,
                self.config.effective_credential().cloned(),
            );
            let outcome = match self.transport.get(&request).await {
                Ok(reply) => classify_reply(&call, reply),
                Err(e) if e.is_transient() => Outcome::Retry {
                    kind: FailureKind::Network,
                    reason: e.to_string(),
                    retry_after: None,
                },
                Err(e) => Outcome::Done(RawResponse::error(
                    call.tool_id,
                    call.parameters.clone(),
                    FailureKind::Network,
                    e.to_string(),
                )),
            };

            match outcome {
                Outcome::Done(response) => return Ok(response),
                Outcome::Retry {
                    kind,
                    reason,
                    retry_after,
                } => {
                    if call.attempt_count >= self.max_attempts() {
                        tracing::warn!(
                            tool = %call.tool_id,
                            attempts = call.attempt_count,
                            %reason,
                            "giving up after transient failures"
                        );
                        return Ok(RawResponse::error(
                            call.tool_id,
                            call.parameters,
                            kind,
                            format!("{reason} (after {} attempts)", call.attempt_count),
                        ));
                    }
                    let delay = backoff.next_delay(retry_after);
                    tracing::warn!(
                        tool = %call.tool_id,
                        attempt = call.attempt_count,
                        max_attempts = self.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        %reason,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    call = call.next_attempt();
                }
            }
        }
    }
}

fn classify_reply(call: &ToolCall, reply: HttpReply) -> Outcome {
    let error = |kind, reason: String| {
        Outcome::Done(RawResponse::error(
            call.tool_id,
            call.parameters.clone(),
            kind,
            reason,
        ))
    };

    match reply.status {
        200..=299 => match serde_json::from_str::<serde_json::Value>(&reply.body) {
            Ok(payload) => match backend_error(&payload) {
                Some(reason) => error(FailureKind::Backend, reason),
                None => Outcome::Done(RawResponse::ok(
                    call.tool_id,
                    call.parameters.clone(),
                    payload,
                )),
            },
            Err(e) => error(FailureKind::InvalidPayload, format!("invalid JSON: {e}")),
        },
        429 => Outcome::Retry {
            kind: FailureKind::Throttled,
            reason: "HTTP 429 Too Many Requests".to_string(),
            retry_after: reply.retry_after,
        },
        500..=599 => Outcome::Retry {
            kind: FailureKind::Server,
            reason: format!("HTTP {}", reply.status),
            retry_after: reply.retry_after,
        },
        401 | 403 => error(
            FailureKind::Auth,
            format!("HTTP {}: {}", reply.status, snippet(&reply.body)),
        ),
        status => error(
            FailureKind::Client,
            format!("HTTP {status}: {}", snippet(&reply.body)),
        ),
    }
}

/// The backend reports failures as `{"error": "..."}` with a 200 status.
fn backend_error(payload: &serde_json::Value) -> Option<String> {
    let obj = payload.as_object()?;
    let message = obj.get("error").filter(|m| !m.is_null())?;
    if obj.len() > 2 {
        return None;
    }
    Some(
        message
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| message.to_string()),
    )
}

fn snippet(body: &str) -> String {
    const MAX: usize = 200;
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call() -> ToolCall {
        ToolCall::first(ToolId::GetNews, dcintel_core::params([("market", "SG")]))
    }

    #[test]
    fn backend_error_envelope_is_an_error() {
        let reply = HttpReply::json(200, &json!({"error": "Backend request failed"}));
        match classify_reply(&call(), reply) {
            Outcome::Done(r) => {
                assert_eq!(
                    r.failure(),
                    Some((FailureKind::Backend, "Backend request failed"))
                );
            }
            Outcome::Retry { .. } => panic!("should not retry"),
        }
    }

    #[test]
    fn payload_with_error_field_among_data_is_ok() {
        let reply = HttpReply::json(
            200,
            &json!({"error": null, "articles": [], "total": 0, "market": "SG"}),
        );
        assert!(matches!(classify_reply(&call(), reply), Outcome::Done(r) if r.is_ok()));
    }

    #[test]
    fn status_classes() {
        let retry = |status| {
            matches!(
                classify_reply(
                    &call(),
                    HttpReply {
                        status,
                        retry_after: None,
                        body: String::new()
                    }
                ),
                Outcome::Retry { .. }
            )
        };
        assert!(retry(429));
        assert!(retry(500));
        assert!(retry(503));
        assert!(!retry(400));
        assert!(!retry(401));
        assert!(!retry(404));
    }

    #[test]
    fn non_json_body_is_invalid_payload() {
        let reply = HttpReply {
            status: 200,
            retry_after: None,
            body: "<html>".into(),
        };
        match classify_reply(&call(), reply) {
            Outcome::Done(r) => assert_eq!(r.failure().unwrap().0, FailureKind::InvalidPayload),
            Outcome::Retry { .. } => panic!("should not retry"),
        }
    }

    #[test]
    fn snippet_truncates_on_char_boundary() {
        let long = "é".repeat(300);
        let s = snippet(&long);
        assert!(s.ends_with("..."));
        assert_eq!(s.chars().count(), 203);
    }
}
