//! Lyrics resolution engine
//!
//! Decides which sources to query for a track, in what order and with what
//! concurrency, and picks the winner.
//!
//! # Fixed-format path
//! Repository first; on confirmed absence of `yrc`/`lrc` the external API is
//! asked for the same format. Errors end the request immediately.
//!
//! # Standard path
//! Two concurrent branches under one deadline:
//! - **Repository branch:** every candidate format (`ttml`, then the
//!   fallback order) probed in parallel; the winner is the first `Found`
//!   in candidate order, never in completion order
//! - **External branch:** one unhinted probe
//!
//! Any repository hit beats any external hit. Only when the repository
//! branch comes back empty does the external outcome decide.

use crate::error::{ResolveError, SourceError};
use crate::formats::{repository_candidates, LyricFormat};
use crate::services::call_governor::{CallGovernor, CallKind, GovernorPolicy};
use crate::services::result_cache::ResultCache;
use crate::sources::{ExternalSource, RepositorySource};
use crate::types::{
    FetchOutcome, LyricHit, ResolveOptions, ResolveRequest, SearchResult, Source, SourceFailure,
};
use crate::utils::RequestScope;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Settle time allowed past the deadline for in-flight cancellation
const DEADLINE_GRACE: Duration = Duration::from_millis(250);

/// Where repository probes execute
///
/// Selection semantics are identical either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeStrategy {
    /// Probes are polled inside the request task
    #[default]
    Inline,
    /// Each probe runs on its own tokio task
    Spawned,
}

/// Cache sizing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub capacity: usize,
    pub probe_ttl: Duration,
    pub probe_capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            capacity: 1000,
            probe_ttl: Duration::from_secs(600),
            probe_capacity: 4000,
        }
    }
}

/// Engine construction settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolverSettings {
    pub policy: GovernorPolicy,
    pub cache: CacheSettings,
    pub probe_strategy: ProbeStrategy,
}

/// Result of the repository branch
#[derive(Debug, Default)]
struct RepositoryBranch {
    /// Highest-priority hit
    hit: Option<LyricHit>,
    /// Per-format failures, in candidate order
    failures: Vec<SourceFailure>,
}

/// Lyrics resolution engine
///
/// Cheap to share behind an `Arc`; all state is the two caches and the
/// governor's permit pool.
pub struct LyricsResolver {
    repository: Arc<dyn RepositorySource>,
    external: Arc<dyn ExternalSource>,
    governor: Arc<CallGovernor>,
    /// Final search results, successes only
    results: Arc<ResultCache<SearchResult>>,
    /// Per-format repository hits, keyed `id:format`
    probes: Arc<ResultCache<LyricHit>>,
    probe_strategy: ProbeStrategy,
}

impl LyricsResolver {
    pub fn new(
        repository: Arc<dyn RepositorySource>,
        external: Arc<dyn ExternalSource>,
        settings: ResolverSettings,
    ) -> Self {
        let cache = settings.cache;
        Self {
            repository,
            external,
            governor: Arc::new(CallGovernor::new(settings.policy)),
            results: Arc::new(ResultCache::new("search", cache.ttl, cache.capacity)),
            probes: Arc::new(ResultCache::new(
                "repository-probe",
                cache.probe_ttl,
                cache.probe_capacity,
            )),
            probe_strategy: settings.probe_strategy,
        }
    }

    pub fn governor(&self) -> &CallGovernor {
        &self.governor
    }

    pub fn result_cache(&self) -> &ResultCache<SearchResult> {
        &self.results
    }

    pub fn probe_cache(&self) -> &ResultCache<LyricHit> {
        &self.probes
    }

    /// Periodic expiry sweep of both caches until `token` is cancelled
    pub fn spawn_maintenance(
        &self,
        interval: Duration,
        token: CancellationToken,
    ) -> (JoinHandle<()>, JoinHandle<()>) {
        (
            Arc::clone(&self.results).spawn_cleanup(interval, token.clone()),
            Arc::clone(&self.probes).spawn_cleanup(interval, token),
        )
    }

    /// Resolve lyrics for `track_id`
    ///
    /// Fails synchronously only for a blank track id; every upstream
    /// problem is reported as [`SearchResult::NotFound`].
    pub async fn resolve(
        &self,
        track_id: &str,
        options: &ResolveOptions,
    ) -> Result<SearchResult, ResolveError> {
        let track_id = track_id.trim();
        if track_id.is_empty() {
            return Err(ResolveError::MissingTrackId);
        }

        let request = ResolveRequest::new(track_id, options);
        let span = info_span!(
            "resolve",
            request_id = %Uuid::new_v4(),
            track_id = %request.id,
            fixed_format = ?request.fixed_format,
        );

        Ok(self.resolve_request(request).instrument(span).await)
    }

    async fn resolve_request(&self, request: ResolveRequest) -> SearchResult {
        let key = request.cache_key();
        if let Some(cached) = self.results.get(&key).await {
            debug!(key = %key, "Search cache hit");
            return cached;
        }

        let scope = self.governor.request_scope();
        let budget = self.governor.policy().deadline + DEADLINE_GRACE;

        let work = async {
            match request.fixed_format {
                Some(format) => self.resolve_fixed(&request.id, format, &scope).await,
                None => {
                    let candidates = repository_candidates(request.fallback_order.as_deref());
                    self.resolve_standard(&request.id, &candidates, &scope).await
                }
            }
        };

        let result = match tokio::time::timeout(budget, work).await {
            Ok(result) => result,
            Err(_) => {
                warn!(budget_ms = budget.as_millis() as u64, "Resolution overran its deadline");
                let error = ResolveError::Aggregate(vec![
                    ResolveError::Timeout(self.governor.policy().deadline),
                    ResolveError::source("repository", SourceError::DeadlineExceeded),
                    ResolveError::source("external", SourceError::DeadlineExceeded),
                ]);
                SearchResult::not_found(&request.id, &error)
            }
        };
        scope.cancel();

        match &result {
            SearchResult::Found { format, source, .. } => {
                info!(%format, %source, "Lyrics resolved");
                self.results.set(key, result.clone()).await;
            }
            SearchResult::NotFound {
                error, status_code, ..
            } => {
                info!(status_code = ?status_code, error = %error, "Lyrics not resolved");
            }
        }

        result
    }

    /// Fixed-format path
    async fn resolve_fixed(
        &self,
        id: &str,
        format: LyricFormat,
        scope: &RequestScope,
    ) -> SearchResult {
        match self.probe_repository(id, format, scope).await {
            FetchOutcome::Found(hit) => return SearchResult::found(id, hit),
            FetchOutcome::Error(failure) => {
                let error = ResolveError::source(format!("repository[{format}]"), failure.error);
                return SearchResult::not_found(id, &error);
            }
            FetchOutcome::NotFound { .. } => {}
        }

        if format.has_external_equivalent() {
            match self.probe_external(id, Some(format), scope).await {
                FetchOutcome::Found(hit) => return SearchResult::found(id, hit),
                FetchOutcome::Error(failure) => {
                    let error = ResolveError::source(format!("external[{format}]"), failure.error);
                    return SearchResult::not_found(id, &error);
                }
                FetchOutcome::NotFound { .. } => {}
            }
        }

        let error = ResolveError::NotFound(format!("no {format} lyrics for track {id}"));
        SearchResult::not_found(id, &error)
    }

    /// Standard path: repository fan-out raced against one external probe
    async fn resolve_standard(
        &self,
        id: &str,
        candidates: &[LyricFormat],
        scope: &RequestScope,
    ) -> SearchResult {
        let external_scope = scope.child();
        let repository = self.repository_branch(id, candidates, scope);
        let external = self.probe_external(id, None, &external_scope);
        tokio::pin!(repository);
        tokio::pin!(external);

        // Drive both; only the repository result is awaited unconditionally
        let mut external_outcome = None;
        let branch = loop {
            tokio::select! {
                biased;
                branch = &mut repository => break branch,
                outcome = &mut external, if external_outcome.is_none() => {
                    external_outcome = Some(outcome);
                }
            }
        };

        if let Some(hit) = branch.hit {
            if external_outcome.is_none() {
                external_scope.cancel();
            }
            return SearchResult::found(id, hit);
        }

        let external_outcome = match external_outcome {
            Some(outcome) => outcome,
            None => external.await,
        };

        match external_outcome {
            FetchOutcome::Found(hit) => SearchResult::found(id, hit),
            other => {
                let error = aggregate_failure(candidates, &branch.failures, other);
                SearchResult::not_found(id, &error)
            }
        }
    }

    /// Probe every candidate in parallel and select by candidate order
    ///
    /// Stops as soon as the best `Found` has no unresolved candidate ahead
    /// of it; lower-priority probes still pending are cancelled.
    async fn repository_branch(
        &self,
        id: &str,
        candidates: &[LyricFormat],
        scope: &RequestScope,
    ) -> RepositoryBranch {
        let branch_scope = scope.child();
        let mut slots: Vec<Option<FetchOutcome>> = vec![None; candidates.len()];

        {
            let branch_scope = &branch_scope;
            let mut pending: FuturesUnordered<_> = candidates
                .iter()
                .enumerate()
                .map(|(index, format)| async move {
                    (index, self.probe_repository(id, *format, branch_scope).await)
                })
                .collect();

            while let Some((index, outcome)) = pending.next().await {
                slots[index] = Some(outcome);
                if winner_settled(&slots) {
                    break;
                }
            }
        }

        let unresolved = slots.iter().filter(|slot| slot.is_none()).count();
        if unresolved > 0 {
            debug!(unresolved, "Winner settled, cancelling lower-priority probes");
        }
        branch_scope.cancel();

        let mut branch = RepositoryBranch::default();
        for outcome in slots.into_iter().flatten() {
            match outcome {
                FetchOutcome::Found(hit) => {
                    if branch.hit.is_none() {
                        branch.hit = Some(hit);
                    }
                }
                FetchOutcome::Error(failure) => {
                    warn!(
                        format = ?failure.format,
                        error = %failure.error,
                        "Repository probe failed (sibling probes unaffected)"
                    );
                    branch.failures.push(failure);
                }
                FetchOutcome::NotFound { .. } => {}
            }
        }

        branch
    }

    /// One repository probe, served from the probe cache when possible
    async fn probe_repository(
        &self,
        id: &str,
        format: LyricFormat,
        scope: &RequestScope,
    ) -> FetchOutcome {
        let key = format!("{id}:{format}");
        if let Some(hit) = self.probes.get(&key).await {
            debug!(%format, "Repository probe cache hit");
            return FetchOutcome::Found(hit);
        }

        let label = format!("repository[{format}]");
        let outcome = match self.probe_strategy {
            ProbeStrategy::Inline => {
                let repository = &self.repository;
                self.governor
                    .call(&label, CallKind::RepositoryProbe, Some(format), scope, || {
                        repository.fetch(id, format)
                    })
                    .await
            }
            ProbeStrategy::Spawned => self.spawn_repository_probe(id, format, label, scope).await,
        };

        let outcome = validate_outcome(outcome, Source::Repository, Some(format));
        if let FetchOutcome::Found(hit) = &outcome {
            self.probes.set(key, hit.clone()).await;
        }
        outcome
    }

    async fn spawn_repository_probe(
        &self,
        id: &str,
        format: LyricFormat,
        label: String,
        scope: &RequestScope,
    ) -> FetchOutcome {
        let repository = Arc::clone(&self.repository);
        let governor = Arc::clone(&self.governor);
        let scope = scope.clone();
        let id = id.to_string();

        let task = tokio::spawn(
            async move {
                governor
                    .call(&label, CallKind::RepositoryProbe, Some(format), &scope, || {
                        repository.fetch(&id, format)
                    })
                    .await
            }
            .in_current_span(),
        );

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => FetchOutcome::error(Some(format), SourceError::Worker(e.to_string())),
        }
    }

    async fn probe_external(
        &self,
        id: &str,
        format_hint: Option<LyricFormat>,
        scope: &RequestScope,
    ) -> FetchOutcome {
        let label = match format_hint {
            Some(format) => format!("external[{format}]"),
            None => "external".to_string(),
        };
        let external = &self.external;

        let outcome = self
            .governor
            .call_admitted(
                &label,
                CallKind::ExternalProbe,
                format_hint,
                scope,
                || external.admit(),
                || external.fetch(id, format_hint),
            )
            .await;

        let outcome = validate_outcome(outcome, Source::External, format_hint);
        if let FetchOutcome::Error(failure) = &outcome {
            warn!(error = %failure.error, "External probe failed");
        }
        outcome
    }
}

/// Reject hits that break result invariants
///
/// Blank content, a side-channel primary, a hit attributed to the other
/// source, or a format other than the one asked for are all ambiguous
/// answers and count as errors rather than absence.
fn validate_outcome(
    outcome: FetchOutcome,
    expected_source: Source,
    expected_format: Option<LyricFormat>,
) -> FetchOutcome {
    let hit = match outcome {
        FetchOutcome::Found(hit) => hit,
        other => return other,
    };

    let problem = if hit.content.trim().is_empty() {
        Some(format!("{expected_source} returned blank {} content", hit.format))
    } else if hit.format.is_side_channel() && expected_format != Some(hit.format) {
        Some(format!("{expected_source} returned side-channel {} as primary", hit.format))
    } else if hit.source != expected_source {
        Some(format!("{expected_source} probe attributed its hit to {}", hit.source))
    } else if expected_format.is_some_and(|format| format != hit.format) {
        Some(format!(
            "{expected_source} returned {} when asked for {}",
            hit.format,
            expected_format.map(|f| f.as_str()).unwrap_or_default()
        ))
    } else {
        None
    };

    match problem {
        Some(problem) => {
            FetchOutcome::error(Some(hit.format), SourceError::EmptyContent(problem))
        }
        None if expected_source == Source::Repository => FetchOutcome::Found(LyricHit {
            translation: None,
            romaji: None,
            ..hit
        }),
        None => FetchOutcome::Found(hit),
    }
}

/// Whether the outcome is decided: every slot up to the first `Found`
/// has resolved, or every slot has resolved
fn winner_settled(slots: &[Option<FetchOutcome>]) -> bool {
    for slot in slots {
        match slot {
            None => return false,
            Some(FetchOutcome::Found(_)) => return true,
            Some(_) => {}
        }
    }
    true
}

/// Combine both branches' failures into one error
fn aggregate_failure(
    candidates: &[LyricFormat],
    repository_failures: &[SourceFailure],
    external: FetchOutcome,
) -> ResolveError {
    let mut errors: Vec<ResolveError> = repository_failures
        .iter()
        .map(|failure| {
            let context = match failure.format {
                Some(format) => format!("repository[{format}]"),
                None => "repository".to_string(),
            };
            ResolveError::source(context, failure.error.clone())
        })
        .collect();

    if errors.is_empty() {
        let tried = candidates
            .iter()
            .map(LyricFormat::as_str)
            .collect::<Vec<_>>()
            .join(",");
        errors.push(ResolveError::NotFound(format!("repository has none of [{tried}]")));
    }

    match external {
        FetchOutcome::Error(failure) => {
            errors.push(ResolveError::source("external", failure.error));
        }
        FetchOutcome::NotFound { .. } => {
            errors.push(ResolveError::NotFound("external API has no lyrics".to_string()));
        }
        FetchOutcome::Found(_) => {}
    }

    ResolveError::Aggregate(errors)
}
