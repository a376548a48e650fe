//! One publication cycle: gate, quota, candidates, selection, publish.

use chrono::Duration;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

pub mod candidate;
pub mod outcome;
pub mod publisher;
pub mod quota;
pub mod rate_limit_gate;
pub mod render;
pub mod selector;

use crate::adapters::{MirrorChannel, PlatformAdapter};
use crate::clock::Clock;
use crate::config::SchedulerConfig;
use crate::errors::{SourceError, StoreError};
use crate::sources::{NewsSource, SocialFeed, TokenSource, WhaleSource};
use crate::store::Stores;
use candidate::{CandidateEvent, CandidateSource};
use outcome::{CycleOutcome, Reason};
use publisher::{PublishOutcome, Publisher, PublisherSettings};
use quota::QuotaLedger;
use rate_limit_gate::RateLimitGate;
use selector::Selection;

pub struct Scheduler {
    sources: Vec<Arc<dyn CandidateSource>>,
    platform: Arc<dyn PlatformAdapter>,
    ledger: QuotaLedger,
    gate: RateLimitGate,
    publisher: Publisher,
    clock: Arc<dyn Clock>,
    min_interval: Duration,
}

impl Scheduler {
    pub fn new(
        config: &SchedulerConfig,
        stores: &Stores,
        platform: Arc<dyn PlatformAdapter>,
        mirror: Option<Arc<dyn MirrorChannel>>,
        feed: Arc<dyn SocialFeed>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let gate = RateLimitGate::new(stores.rate_limit.clone(), config.rate_limit_fallback);
        let sources: Vec<Arc<dyn CandidateSource>> = vec![
            Arc::new(WhaleSource::new(stores.whales.clone(), stores.records.clone(), config)),
            Arc::new(NewsSource::new(feed, stores.records.clone(), config)),
            Arc::new(TokenSource::new(
                stores.tokens.clone(),
                stores.cooldowns.clone(),
                stores.records.clone(),
                config,
            )),
        ];
        let publisher = Publisher::new(
            platform.clone(),
            mirror,
            stores.records.clone(),
            stores.cooldowns.clone(),
            gate.clone(),
            clock.clone(),
            PublisherSettings::from(config),
        );

        Self {
            sources,
            platform,
            ledger: QuotaLedger::new(stores.records.clone(), config.caps),
            gate,
            publisher,
            clock,
            min_interval: config.min_post_interval,
        }
    }

    /// Replaces the candidate sources. Order is priority order.
    pub fn with_sources(mut self, sources: Vec<Arc<dyn CandidateSource>>) -> Self {
        self.sources = sources;
        self
    }

    pub fn ledger(&self) -> &QuotaLedger {
        &self.ledger
    }

    pub fn gate(&self) -> &RateLimitGate {
        &self.gate
    }

    /// Runs one cycle. Every path ends in a structured outcome.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> CycleOutcome {
        if let Err(e) = self.platform.ensure_configured() {
            error!(error = %e, "platform adapter is not configured");
            return CycleOutcome::empty().failed(Reason::ConfigurationError, e.to_string());
        }

        let now = self.clock.now();
        let resume_at = match self.gate.blocked_until(now).await {
            Ok(resume_at) => resume_at,
            Err(e) => return store_unavailable(CycleOutcome::empty(), e),
        };
        let quota = match self.ledger.snapshot(now).await {
            Ok(quota) => quota,
            Err(e) => return store_unavailable(CycleOutcome::empty().with_resume_at(resume_at), e),
        };

        let outcome = CycleOutcome::from_quota(&quota).with_resume_at(resume_at);
        if let Some(reason) = selector::precheck(resume_at, &quota, now, self.min_interval) {
            info!(reason = ?reason, resume_at = ?resume_at, "cycle skipped before querying sources");
            return outcome.skipped(reason);
        }

        let (mut outcome, candidates, capped_unqueried) =
            match self.collect_candidates(outcome, &quota, now).await {
                Ok(collected) => collected,
                Err((outcome, e)) => return store_unavailable(outcome, e),
            };

        let candidate = match selector::select(candidates, &quota, now) {
            Selection::Publish(candidate) => candidate,
            Selection::Skip(Reason::NoCandidates) if capped_unqueried => {
                info!(reason = ?Reason::CategoryLimit, "nothing to publish");
                return outcome.skipped(Reason::CategoryLimit);
            }
            Selection::Skip(reason) => {
                info!(reason = ?reason, "nothing to publish");
                return outcome.skipped(reason);
            }
        };

        outcome = outcome.with_selected(candidate.category, &candidate.natural_key);
        match self.publisher.publish(&candidate).await {
            Ok(PublishOutcome::Published { post_id, mirrored }) => {
                outcome.posted(candidate.category, post_id, mirrored)
            }
            Ok(PublishOutcome::Throttled { resume_at }) => outcome
                .skipped(Reason::RateLimited)
                .with_resume_at(Some(resume_at)),
            Ok(PublishOutcome::AlreadyPublished) => outcome.skipped(Reason::AlreadyPublished),
            Ok(PublishOutcome::Stale) => outcome.skipped(Reason::StaleCandidate),
            Ok(PublishOutcome::Failed { error, abandoned }) => {
                let error = if abandoned {
                    format!("{error} (abandoned after repeated failures)")
                } else {
                    error
                };
                outcome.failed(Reason::PublishFailed, error)
            }
            Err(e) => store_unavailable(outcome, e),
        }
    }

    /// Queries every source in priority order. Sources whose category is full
    /// and that cannot bypass the cap are not queried. Returns whether any
    /// source was skipped that way.
    async fn collect_candidates(
        &self,
        mut outcome: CycleOutcome,
        quota: &quota::QuotaSnapshot,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(CycleOutcome, Vec<CandidateEvent>, bool), (CycleOutcome, StoreError)> {
        let mut candidates = Vec::new();
        let mut capped_unqueried = false;

        for source in &self.sources {
            let category = source.category();
            if !quota.category_under_cap(category) && !source.may_bypass_cap() {
                capped_unqueried = true;
                continue;
            }

            let result = source.next_candidate(now).await;
            let diag = outcome.diagnostics_mut(category);
            diag.queried = true;

            match result {
                Ok(Some(candidate)) => {
                    diag.candidate = Some(candidate.natural_key.clone());
                    candidates.push(candidate);
                }
                Ok(None) => {}
                Err(SourceError::Store(e @ StoreError::Unavailable(_))) => {
                    return Err((outcome, e));
                }
                Err(e) => {
                    warn!(category = %category, error = %e, "candidate source failed");
                    diag.error = Some(e.to_string());
                }
            }
        }

        Ok((outcome, candidates, capped_unqueried))
    }
}

fn store_unavailable(outcome: CycleOutcome, err: StoreError) -> CycleOutcome {
    error!(error = %err, "store unavailable, aborting cycle");
    outcome.failed(Reason::StoreUnavailable, err.to_string())
}
