//! Dispatcher behaviour against scripted transports.
//!
//! Time-dependent tests run with a paused tokio clock so backoff sleeps and
//! rate-window waits complete instantly while still being measurable.

use async_trait::async_trait;
use dcintel_core::{params, FailureKind, Scalar, ToolId};
use dcintel_dispatch::*;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Replies are scripted per path; once a script runs dry the fallback is used.
struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Result<HttpReply, TransportError>>>>,
    fallback: HttpReply,
    latency: Duration,
    seen: Mutex<Vec<(Instant, HttpRequest)>>,
}

impl ScriptedTransport {
    fn new(fallback: HttpReply) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback,
            latency: Duration::ZERO,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn ok() -> Self {
        Self::new(HttpReply::json(200, &json!({"articles": [], "total": 0})))
    }

    fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn script(self, path: &str, replies: Vec<Result<HttpReply, TransportError>>) -> Self {
        self.scripts
            .lock()
            .insert(path.to_string(), replies.into_iter().collect());
        self
    }

    fn calls(&self) -> usize {
        self.seen.lock().len()
    }

    fn starts(&self) -> Vec<Instant> {
        self.seen.lock().iter().map(|(t, _)| *t).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, request: &HttpRequest) -> Result<HttpReply, TransportError> {
        self.seen.lock().push((Instant::now(), request.clone()));
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let scripted = self
            .scripts
            .lock()
            .get_mut(&request.path)
            .and_then(|q| q.pop_front());
        scripted.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

fn status(code: u16) -> Result<HttpReply, TransportError> {
    Ok(HttpReply {
        status: code,
        retry_after: None,
        body: String::new(),
    })
}

fn dispatcher(config: DispatchConfig, transport: Arc<ScriptedTransport>) -> Dispatcher {
    Dispatcher::new(config, transport)
}

fn news(market: &str) -> dcintel_core::Parameters {
    params([("market", Scalar::from(market)), ("limit", Scalar::from(10i64))])
}

// ============================================================================
// Deduplication
// ============================================================================

#[tokio::test]
async fn identical_calls_share_one_network_request() {
    let transport = Arc::new(ScriptedTransport::ok().with_latency(Duration::from_millis(20)));
    let d = dispatcher(DispatchConfig::for_tier(Tier::Pro), Arc::clone(&transport));

    let (a, b) = tokio::join!(
        d.dispatch(ToolId::GetNews, news("SG")),
        d.dispatch(ToolId::GetNews, news("SG")),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(transport.calls(), 1);
    assert_eq!(a, b);
    let stats = d.stats();
    assert_eq!(stats.network_attempts, 1);
    assert_eq!(stats.cache_hits, 1);
}

#[tokio::test]
async fn default_limit_and_explicit_limit_dedupe() {
    let transport = Arc::new(ScriptedTransport::ok());
    let d = dispatcher(DispatchConfig::for_tier(Tier::Pro), Arc::clone(&transport));

    d.dispatch(ToolId::GetNews, params([("market", "SG")]))
        .await
        .unwrap();
    d.dispatch(ToolId::GetNews, news("SG")).await.unwrap();
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn cache_hits_do_not_consume_budget() {
    let transport = Arc::new(ScriptedTransport::ok());
    let mut config = DispatchConfig::for_tier(Tier::Free);
    config.limits = RateLimits {
        per_day: 1,
        per_minute: 1,
    };
    let d = dispatcher(config, Arc::clone(&transport));

    for _ in 0..5 {
        d.dispatch(ToolId::GetNews, news("SG")).await.unwrap();
    }
    assert_eq!(d.limiter().granted(), 1);

    let err = d.dispatch(ToolId::GetNews, news("DE")).await.unwrap_err();
    assert!(matches!(err, DispatchError::RateLimitExceeded { .. }));
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn invalid_parameters_never_reach_the_network() {
    let transport = Arc::new(ScriptedTransport::ok());
    let d = dispatcher(DispatchConfig::default(), Arc::clone(&transport));

    let err = d
        .dispatch(ToolId::GetEnergyPrices, params([("region", "ERCOT")]))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Validation(_)));

    let err = d
        .dispatch(
            ToolId::GetSiteScore,
            params([("lat", Scalar::from("north")), ("lon", Scalar::from(1.0))]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Validation(_)));
    assert_eq!(transport.calls(), 0);
    assert_eq!(d.limiter().granted(), 0);
}

// ============================================================================
// Retries
// ============================================================================

#[tokio::test(start_paused = true)]
async fn transient_failure_is_retried_until_success() {
    let transport = Arc::new(
        ScriptedTransport::ok().script("/api/v1/news", vec![status(503), status(502)]),
    );
    let d = dispatcher(DispatchConfig::for_tier(Tier::Pro), Arc::clone(&transport));

    let start = Instant::now();
    let response = d.dispatch(ToolId::GetNews, news("SG")).await.unwrap();
    assert!(response.is_ok());
    assert_eq!(transport.calls(), 3);
    // 500 ms + 1000 ms before jitter.
    assert!(Instant::now().duration_since(start) >= Duration::from_millis(1500));
    assert_eq!(d.stats().retries, 2);
}

#[tokio::test(start_paused = true)]
async fn attempts_never_exceed_the_cap() {
    let transport = Arc::new(ScriptedTransport::new(HttpReply {
        status: 500,
        retry_after: None,
        body: String::new(),
    }));
    let d = dispatcher(DispatchConfig::for_tier(Tier::Pro), Arc::clone(&transport));

    let response = d.dispatch(ToolId::GetNews, news("SG")).await.unwrap();
    assert_eq!(transport.calls(), 3);
    let (kind, reason) = response.failure().unwrap();
    assert_eq!(kind, FailureKind::Server);
    assert!(reason.contains("3 attempts"));

    let starts = transport.starts();
    let gaps: Vec<_> = starts.windows(2).map(|w| w[1] - w[0]).collect();
    assert!(gaps[1] >= gaps[0]);
}

#[tokio::test(start_paused = true)]
async fn configured_attempts_above_the_cap_are_held_to_it() {
    let transport = Arc::new(ScriptedTransport::new(HttpReply {
        status: 503,
        retry_after: None,
        body: String::new(),
    }));
    let mut config = DispatchConfig::for_tier(Tier::Pro);
    config.retry.max_attempts = 10;
    let d = dispatcher(config, Arc::clone(&transport));

    let response = d.dispatch(ToolId::GetNews, news("SG")).await.unwrap();
    assert_eq!(transport.calls(), MAX_ATTEMPTS as usize);
    assert!(response.failure().unwrap().1.contains("3 attempts"));
}

#[tokio::test(start_paused = true)]
async fn network_errors_are_transient() {
    let transport = Arc::new(ScriptedTransport::ok().script(
        "/api/v1/news",
        vec![Err(TransportError::Timeout("15s elapsed".into()))],
    ));
    let d = dispatcher(DispatchConfig::for_tier(Tier::Pro), Arc::clone(&transport));

    assert!(d.dispatch(ToolId::GetNews, news("SG")).await.unwrap().is_ok());
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn retry_after_header_sets_the_delay() {
    let throttled = Ok(HttpReply {
        status: 429,
        retry_after: Some(Duration::from_secs(5)),
        body: String::new(),
    });
    let transport = Arc::new(ScriptedTransport::ok().script("/api/v1/news", vec![throttled]));
    let d = dispatcher(DispatchConfig::for_tier(Tier::Pro), Arc::clone(&transport));

    let start = Instant::now();
    assert!(d.dispatch(ToolId::GetNews, news("SG")).await.unwrap().is_ok());
    let starts = transport.starts();
    assert_eq!(starts.len(), 2);
    assert!(starts[1].duration_since(start) >= Duration::from_secs(5));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let transport = Arc::new(ScriptedTransport::ok().script(
        "/api/v1/news",
        vec![Ok(HttpReply {
            status: 404,
            retry_after: None,
            body: r#"{"detail":"unknown market"}"#.into(),
        })],
    ));
    let d = dispatcher(DispatchConfig::for_tier(Tier::Pro), Arc::clone(&transport));

    let response = d.dispatch(ToolId::GetNews, news("XX")).await.unwrap();
    assert_eq!(transport.calls(), 1);
    let (kind, reason) = response.failure().unwrap();
    assert_eq!(kind, FailureKind::Client);
    assert!(reason.contains("unknown market"));
}

#[tokio::test]
async fn auth_failures_are_reported_not_retried() {
    let transport = Arc::new(
        ScriptedTransport::ok().script("/api/v1/news", vec![status(401)]),
    );
    let config = DispatchConfig::for_tier(Tier::Pro).with_credential(Credential::Bearer("bad".into()));
    let d = dispatcher(config, Arc::clone(&transport));

    let response = d.dispatch(ToolId::GetNews, news("SG")).await.unwrap();
    assert_eq!(response.failure().unwrap().0, FailureKind::Auth);
    assert_eq!(transport.calls(), 1);
}

// ============================================================================
// Rate ceilings
// ============================================================================

#[tokio::test(start_paused = true)]
async fn per_minute_ceiling_fails_fast_without_queue_budget() {
    let transport = Arc::new(ScriptedTransport::ok());
    let mut config = DispatchConfig::for_tier(Tier::Free);
    config.max_queue_wait = Duration::ZERO;
    let d = dispatcher(config, Arc::clone(&transport));

    let mut ok = 0;
    let mut limited = 0;
    for i in 0..12 {
        match d.dispatch(ToolId::GetNews, news(&format!("M{i}"))).await {
            Ok(_) => ok += 1,
            Err(DispatchError::RateLimitExceeded {
                ceiling: Ceiling::PerMinute,
                limit: 10,
            }) => limited += 1,
            Err(e) => panic!("unexpected error {e}"),
        }
    }
    assert_eq!((ok, limited), (10, 2));
    assert_eq!(transport.calls(), 10);
    assert_eq!(d.stats().rate_limited, 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_calls_never_exceed_the_rolling_window() {
    let transport = Arc::new(ScriptedTransport::ok().with_latency(Duration::from_secs(2)));
    let d = Arc::new(dispatcher(
        DispatchConfig::for_tier(Tier::Free),
        Arc::clone(&transport),
    ));

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..18 {
        let d = Arc::clone(&d);
        tasks.spawn(async move { d.dispatch(ToolId::GetNews, news(&format!("M{i}"))).await });
    }
    while let Some(joined) = tasks.join_next().await {
        assert!(joined.unwrap().unwrap().is_ok());
    }

    let starts = transport.starts();
    assert_eq!(starts.len(), 18);
    for (i, t) in starts.iter().enumerate() {
        let in_window = starts[i..]
            .iter()
            .filter(|s| s.duration_since(*t) < Duration::from_secs(60))
            .count();
        assert!(in_window <= 10, "{in_window} starts within 60s");
    }
}

#[tokio::test]
async fn daily_ceiling_is_enforced() {
    let transport = Arc::new(ScriptedTransport::ok());
    let mut config = DispatchConfig::for_tier(Tier::Pro);
    config.limits.per_day = 4;
    let d = dispatcher(config, Arc::clone(&transport));

    for i in 0..4 {
        d.dispatch(ToolId::GetNews, news(&format!("M{i}")))
            .await
            .unwrap();
    }
    let err = d.dispatch(ToolId::GetNews, news("M9")).await.unwrap_err();
    assert!(matches!(
        err,
        DispatchError::RateLimitExceeded {
            ceiling: Ceiling::PerDay,
            limit: 4
        }
    ));
    assert_eq!(transport.calls(), 4);
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn pro_tier_attaches_credentials_uniformly() {
    let transport = Arc::new(ScriptedTransport::ok());
    let config =
        DispatchConfig::for_tier(Tier::Pro).with_credential(Credential::Bearer("tok".into()));
    let d = dispatcher(config, Arc::clone(&transport));

    d.dispatch(ToolId::GetNews, news("SG")).await.unwrap();
    d.dispatch(ToolId::GetWaterStress, params([("country", "SG")]))
        .await
        .unwrap();

    let seen = transport.seen.lock();
    assert!(seen
        .iter()
        .all(|(_, r)| r.credential == Some(Credential::Bearer("tok".into()))));
}
