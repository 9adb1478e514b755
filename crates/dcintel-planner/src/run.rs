//! Run orchestration.
//!
//! ```text
//! targets ─► plan ─► JoinSet(dispatch × N) ──┬─► per-country barrier ─► normalize
//!                        ▲                   │
//!                 session deadline ──abort───┘
//!
//! records ─► build_matrix ─► score ─► project_all ─► synthesize ─► AnalysisReport
//! ```
//!
//! A country is normalized once all of its planned calls have come back, or
//! when the deadline abandons the rest.

use crate::config::PlannerConfig;
use crate::error::{ConfigError, RunError};
use crate::plan::{plan, PlannedCall, Target};
use crate::report::AnalysisReport;
use chrono::Utc;
use dcintel_analysis::{
    build_matrix, normalize_all, RiskScorer, ScenarioEngine, Synthesizer,
};
use dcintel_core::{FailureKind, NormalizedRecord, RawResponse, RiskScore};
use dcintel_dispatch::{DispatchError, Dispatcher, Tier, Transport};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct Planner {
    config: PlannerConfig,
    dispatcher: Arc<Dispatcher>,
    scorer: RiskScorer,
    engine: ScenarioEngine,
    synthesizer: Synthesizer,
}

/// Per-run bookkeeping between fan-out and analysis.
#[derive(Default)]
struct Collected {
    outstanding: BTreeMap<String, usize>,
    pending: BTreeMap<String, Vec<RawResponse>>,
    records: Vec<NormalizedRecord>,
    warnings: Vec<String>,
    completed: usize,
    successful: usize,
}

impl Collected {
    fn new(calls: &[PlannedCall]) -> Self {
        let mut outstanding = BTreeMap::new();
        for call in calls {
            *outstanding.entry(call.country.clone()).or_insert(0) += 1;
        }
        Self {
            outstanding,
            ..Self::default()
        }
    }

    /// Account for one finished call, then release its country if that was
    /// the last one outstanding.
    fn finish(&mut self, country: &str, response: Option<RawResponse>) {
        self.completed += 1;
        if let Some(response) = response {
            if response.is_ok() {
                self.successful += 1;
            }
            self.pending
                .entry(country.to_string())
                .or_default()
                .push(response);
        }
        if let Some(left) = self.outstanding.get_mut(country) {
            *left = left.saturating_sub(1);
            if *left == 0 {
                debug!(country, "all calls returned");
                self.release(country);
            }
        }
    }

    fn release(&mut self, country: &str) {
        let Some(responses) = self.pending.remove(country) else {
            return;
        };
        let (records, errors) = normalize_all(&responses);
        for err in errors {
            warn!(country, error = %err, "response not normalized");
            self.warnings.push(format!("{country}: {err}"));
        }
        self.records.extend(records);
    }

    fn release_all(&mut self) {
        let countries: Vec<String> = self.pending.keys().cloned().collect();
        for country in countries {
            self.release(&country);
        }
    }
}

impl Planner {
    pub fn new(config: PlannerConfig, transport: Arc<dyn Transport>) -> Result<Self, ConfigError> {
        config.validate()?;
        let scorer = RiskScorer::new(config.weights)?;
        let engine = ScenarioEngine::new(config.scenario.clone())?;
        let synthesizer = Synthesizer::new(config.synthesis.clone())?;
        if config.tier == Tier::Pro && config.api_token.is_none() {
            warn!("pro tier configured without an API token");
        }
        let dispatcher = Arc::new(Dispatcher::new(config.dispatch_config(), transport));
        Ok(Self {
            config,
            dispatcher,
            scorer,
            engine,
            synthesizer,
        })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn plan(&self, targets: &[Target]) -> Vec<PlannedCall> {
        plan(targets, &self.config)
    }

    /// Run with the configured session deadline.
    pub async fn run(&self, targets: &[Target]) -> Result<AnalysisReport, RunError> {
        self.run_until(targets, Instant::now() + self.config.session_deadline())
            .await
    }

    /// Run until every call returns or `deadline` passes, whichever is first.
    pub async fn run_until(
        &self,
        targets: &[Target],
        deadline: Instant,
    ) -> Result<AnalysisReport, RunError> {
        if targets.is_empty() {
            return Err(RunError::NoTargets);
        }
        let run_id = Uuid::new_v4();
        let calls = self.plan(targets);
        let planned = calls.len();
        info!(%run_id, targets = targets.len(), planned, tier = ?self.config.tier, "analysis run started");

        let mut collected = Collected::new(&calls);
        let in_flight = self.dispatcher.config().limits.per_minute.max(1) as usize;
        let permits = Arc::new(Semaphore::new(in_flight));

        let mut tasks = JoinSet::new();
        for call in calls {
            let dispatcher = Arc::clone(&self.dispatcher);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let result = dispatcher.dispatch(call.tool, call.parameters.clone()).await;
                (call, result)
            });
        }

        let sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(sleep);
        let mut timed_out = false;

        loop {
            let joined = tokio::select! {
                biased;
                joined = tasks.join_next() => joined,
                _ = &mut sleep => {
                    timed_out = true;
                    break;
                }
            };
            let Some(joined) = joined else {
                break;
            };
            let (call, result) = match joined {
                Ok(done) => done,
                Err(err) => {
                    warn!(error = %err, "dispatch task did not finish");
                    continue;
                }
            };

            match result {
                Ok(response) => {
                    if let Some((kind, reason)) = response.failure() {
                        if kind == FailureKind::Auth && self.config.tier == Tier::Pro {
                            tasks.abort_all();
                            return Err(RunError::Auth {
                                tool: call.tool,
                                reason: reason.to_string(),
                            });
                        }
                        collected
                            .warnings
                            .push(format!("{}: {} failed: {reason}", call.country, call.tool));
                    }
                    collected.finish(&call.country, Some(response));
                }
                Err(err) => {
                    if matches!(err, DispatchError::RateLimitExceeded { .. }) {
                        warn!(country = %call.country, tool = %call.tool, error = %err, "call refused");
                    } else {
                        warn!(country = %call.country, tool = %call.tool, error = %err, "call rejected");
                    }
                    collected
                        .warnings
                        .push(format!("{}: {} not sent: {err}", call.country, call.tool));
                    collected.finish(&call.country, None);
                }
            }
        }

        let abandoned = tasks.len();
        if timed_out {
            tasks.abort_all();
            warn!(%run_id, abandoned, "session deadline reached; continuing with partial data");
            collected.warnings.push(format!(
                "session deadline reached: {abandoned} of {planned} calls abandoned"
            ));
        }
        collected.release_all();

        if collected.successful == 0 {
            return Err(RunError::NoData { planned });
        }

        let report = self.analyze(run_id, targets, planned, abandoned, timed_out, collected);
        info!(
            %run_id,
            completed = report.completed_calls,
            successful = report.successful_calls,
            abandoned = report.abandoned_calls,
            ranked = report.recommendation.entries.len(),
            excluded = report.excluded.len(),
            timed_out = report.timed_out,
            "analysis run finished"
        );
        Ok(report)
    }

    fn analyze(
        &self,
        run_id: Uuid,
        targets: &[Target],
        planned: usize,
        abandoned: usize,
        timed_out: bool,
        collected: Collected,
    ) -> AnalysisReport {
        let matrix = build_matrix(&collected.records);
        let scores: BTreeMap<String, RiskScore> = matrix
            .vectors
            .iter()
            .map(|(key, vector)| (key.clone(), self.scorer.score(vector)))
            .collect();
        let scenarios = self.engine.project_all(&matrix.vectors, &scores);
        let recommendation = self.synthesizer.synthesize(&scores, &scenarios);

        let ranked: BTreeSet<&str> = recommendation
            .entries
            .iter()
            .map(|e| e.entity_key.as_str())
            .collect();
        let target_keys: Vec<String> = targets
            .iter()
            .map(|t| t.country.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let excluded = target_keys
            .iter()
            .filter(|k| !ranked.contains(k.as_str()))
            .cloned()
            .collect();

        AnalysisReport {
            run_id,
            generated_at: Utc::now(),
            tier: self.config.tier,
            targets: target_keys,
            planned_calls: planned,
            completed_calls: collected.completed,
            successful_calls: collected.successful,
            abandoned_calls: abandoned,
            timed_out,
            dispatch: self.dispatcher.stats(),
            features: matrix.vectors,
            scores,
            scenarios,
            recommendation,
            excluded,
            warnings: collected.warnings,
        }
    }
}
