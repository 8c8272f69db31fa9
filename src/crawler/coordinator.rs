//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop. The coordinator task is the
//! only owner of the frontier and the only writer of the seen ledger, so the
//! check-then-mark on a URL is never interleaved with another decision on
//! the same URL. Fetches run on a bounded pool of worker tasks and report
//! back to the loop.

use crate::config::{CrawlConfig, FetchConfig};
use crate::crawler::fetcher::{FetchError, FetchedDocument, Fetcher};
use crate::crawler::parser::{parse_document, ParsedPage};
use crate::crawler::scheduler::{CrawlBudget, Frontier, FrontierEntry};
use crate::index::{DocumentEmitter, IndexDocument, IndexError, RecoveredPage};
use crate::state::{RunState, SeenStatus};
use crate::storage::{
    lock_storage, RunCounts, SeenStore, SharedStorage, SqliteStorage, Storage, StorageError,
};
use crate::url::{LinkFilter, Rejection};
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use url::Url;

/// How often (in settled URLs) progress is logged
const PROGRESS_INTERVAL: u64 = 10;

/// Reasons a run ends in `Aborted`
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Crawl cancelled")]
    Cancelled,

    #[error("Ledger failure: {0}")]
    Storage(#[from] StorageError),

    #[error("Index write failed: {0}")]
    Index(#[from] IndexError),

    #[error("Fetch worker failed: {0}")]
    Worker(String),
}

impl From<JoinError> for CrawlError {
    fn from(e: JoinError) -> Self {
        Self::Worker(e.to_string())
    }
}

/// Final state and counters of one run
#[derive(Debug)]
pub struct RunOutcome {
    pub state: RunState,
    pub counts: RunCounts,
    /// Set when the run aborted
    pub error: Option<CrawlError>,
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        self.state == RunState::Completed
    }
}

type WorkerResult = (FrontierEntry, Result<(FetchedDocument, ParsedPage), FetchError>);

/// Main crawler coordinator structure
pub struct Coordinator {
    filter: LinkFilter,
    fetcher: Arc<Fetcher>,
    storage: SharedStorage,
    frontier: Frontier,
    /// URLs handed to a worker and not yet settled
    in_flight: HashSet<String>,
    budget: Arc<CrawlBudget>,
    concurrency: usize,
    run_id: i64,
    cancel: CancellationToken,
    state: RunState,
    counts: RunCounts,
    settled: u64,
}

impl Coordinator {
    /// Creates a coordinator for run `run_id`
    ///
    /// The crawl budget starts from the documents already accepted in the
    /// ledger, so a resumed run keeps counting where the crashed one stopped.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated crawl configuration
    /// * `fetch` - HTTP fetch settings
    /// * `client` - HTTP client shared by every worker
    /// * `storage` - The context's ledger
    /// * `run_id` - Run the failures are recorded against
    /// * `concurrency` - Maximum fetches in flight
    /// * `cancel` - Token that aborts the run when cancelled
    pub fn new(
        config: Arc<CrawlConfig>,
        fetch: &FetchConfig,
        client: Client,
        storage: SharedStorage,
        run_id: i64,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> Result<Self, CrawlError> {
        let already_accepted = lock_storage(&storage)?.count_seen(SeenStatus::Accepted)?;
        let budget = CrawlBudget::new(config.crawl_limit(), already_accepted);

        Ok(Self {
            filter: LinkFilter::new(Arc::clone(&config)),
            fetcher: Arc::new(Fetcher::new(client, config, fetch)),
            storage,
            frontier: Frontier::new(),
            in_flight: HashSet::new(),
            budget: Arc::new(budget),
            concurrency: concurrency.max(1),
            run_id,
            cancel,
            state: RunState::Idle,
            counts: RunCounts::default(),
            settled: 0,
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Loads the persisted frontier and queues the entry URL at depth 0
    ///
    /// On a fresh ledger this queues only `entry`. On resume the stored
    /// frontier comes back first, in its original order, and `entry` is
    /// skipped if it was already queued or decided.
    pub fn seed(&mut self, entry: &Url) -> Result<usize, CrawlError> {
        let shared = Arc::clone(&self.storage);
        let mut storage = lock_storage(&shared)?;

        let restored = storage.load_frontier()?;
        if !restored.is_empty() {
            tracing::info!("Resuming with {} URLs in the frontier", restored.len());
        }
        for record in &restored {
            match FrontierEntry::from_record(record) {
                Some(entry) => {
                    self.frontier.push(entry);
                }
                None => {
                    tracing::warn!("Dropping unparsable frontier entry {}", record.url);
                    storage.remove_from_frontier(&record.url)?;
                }
            }
        }

        self.admit(&mut storage, entry, 0, None)?;
        Ok(self.frontier.len())
    }

    /// Settles pages whose fetch reached the genesis index before an
    /// interruption but never made it into the ledger
    ///
    /// Each page is marked accepted and its stored content is parsed for
    /// links, so the URL is not fetched a second time. Call after
    /// [`Coordinator::seed`].
    ///
    /// # Returns
    ///
    /// The number of pages settled
    pub fn reconcile(&mut self, pages: Vec<RecoveredPage>) -> Result<usize, CrawlError> {
        let shared = Arc::clone(&self.storage);
        let mut storage = lock_storage(&shared)?;
        let mut reconciled = 0;

        for page in pages {
            let Ok(url) = Url::parse(&page.url) else {
                tracing::warn!("Skipping unparsable recovered page {}", page.url);
                continue;
            };
            if storage.is_seen(&page.url)? || !self.budget.try_reserve() {
                continue;
            }

            self.budget.commit();
            storage.mark_seen(&page.url, SeenStatus::Accepted, None)?;
            storage.remove_from_frontier(&page.url)?;
            self.counts.accepted += 1;
            reconciled += 1;
            tracing::info!("Recovered {} from the genesis index", page.url);

            if !self.budget.is_exhausted() {
                let parsed = parse_document(&page.mime, &page.content, &url);
                for link in &parsed.links {
                    self.admit(&mut storage, link, page.depth + 1, Some(&url))?;
                }
            }
        }

        Ok(reconciled)
    }

    /// Runs the crawl to completion or abort
    ///
    /// This is the core crawling logic that:
    /// 1. Pops URLs in FIFO order, skipping ones already decided
    /// 2. Reserves a crawl-limit slot and hands the URL to a fetch worker
    /// 3. Emits accepted documents to the genesis index
    /// 4. Marks the outcome in the seen ledger
    /// 5. Gates outbound links and queues them at depth + 1
    ///
    /// The run completes once the frontier is empty (or the limit is used
    /// up) and every in-flight fetch has settled. Cancellation, a ledger
    /// failure or an index write failure abort it.
    pub async fn run(&mut self, emitter: &DocumentEmitter) -> RunOutcome {
        self.state = RunState::Running;
        tracing::info!(
            "Starting crawl run {} into genesis generation {} with {} queued URLs",
            self.run_id,
            emitter.generation(),
            self.frontier.len()
        );
        let start_time = std::time::Instant::now();

        let mut workers: JoinSet<WorkerResult> = JoinSet::new();
        let result = self.drive(&mut workers, emitter).await;

        if !workers.is_empty() {
            tracing::debug!("Stopping {} in-flight fetches", workers.len());
            workers.shutdown().await;
        }

        let (state, error) = match result {
            Ok(()) => {
                tracing::info!(
                    "Crawl run {} completed: {} accepted, {} rejected, {} failed in {:?}",
                    self.run_id,
                    self.counts.accepted,
                    self.counts.rejected,
                    self.counts.failed,
                    start_time.elapsed()
                );
                (RunState::Completed, None)
            }
            Err(e) => {
                tracing::error!("Crawl run {} aborted: {}", self.run_id, e);
                (RunState::Aborted, Some(e))
            }
        };
        self.state = state;

        RunOutcome {
            state,
            counts: self.counts,
            error,
        }
    }

    async fn drive(
        &mut self,
        workers: &mut JoinSet<WorkerResult>,
        emitter: &DocumentEmitter,
    ) -> Result<(), CrawlError> {
        let cancel = self.cancel.clone();
        loop {
            if cancel.is_cancelled() {
                return Err(CrawlError::Cancelled);
            }

            self.dispatch(workers)?;

            if workers.is_empty() {
                if !self.frontier.is_empty() {
                    tracing::info!(
                        "Crawl limit reached with {} URLs left in the frontier",
                        self.frontier.len()
                    );
                }
                return Ok(());
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(CrawlError::Cancelled),
                joined = workers.join_next() => {
                    if let Some(joined) = joined {
                        let (entry, result) = joined?;
                        self.settle(entry, result, emitter).await?;
                    }
                }
            }
        }
    }

    /// Starts fetches until the pool is full, the frontier is empty or the
    /// crawl limit is reserved
    fn dispatch(&mut self, workers: &mut JoinSet<WorkerResult>) -> Result<(), CrawlError> {
        while workers.len() < self.concurrency {
            let Some(entry) = self.frontier.pop() else {
                break;
            };

            let key = entry.url.as_str();
            {
                let mut storage = lock_storage(&self.storage)?;
                if storage.is_seen(key)? {
                    tracing::debug!("Skipping {}, already decided", key);
                    storage.remove_from_frontier(key)?;
                    continue;
                }

                if !self.budget.try_reserve() {
                    drop(storage);
                    self.frontier.push_front(entry);
                    break;
                }

                storage.mark_in_flight(key)?;
            }
            self.in_flight.insert(entry.url.to_string());

            tracing::debug!("Fetching {} (depth {})", entry.url, entry.depth);
            let fetcher = Arc::clone(&self.fetcher);
            let cancel = self.cancel.clone();
            workers.spawn(async move {
                let result = fetcher
                    .fetch(&entry.url, entry.depth, &cancel)
                    .await
                    .map(|document| {
                        let parsed =
                            parse_document(&document.mime, &document.content, &document.final_url);
                        (document, parsed)
                    });
                (entry, result)
            });
        }

        Ok(())
    }

    /// Records the outcome of one fetch
    async fn settle(
        &mut self,
        entry: FrontierEntry,
        result: Result<(FetchedDocument, ParsedPage), FetchError>,
        emitter: &DocumentEmitter,
    ) -> Result<(), CrawlError> {
        let key = entry.url.to_string();
        self.in_flight.remove(&key);

        match result {
            Ok((document, parsed)) => {
                self.budget.commit();
                emitter
                    .emit(IndexDocument::from_fetched(document, &parsed))
                    .await?;

                let shared = Arc::clone(&self.storage);
                let mut storage = lock_storage(&shared)?;
                storage.mark_seen(&key, SeenStatus::Accepted, None)?;
                storage.remove_from_frontier(&key)?;
                self.counts.accepted += 1;

                if self.budget.is_exhausted() {
                    tracing::debug!("Crawl limit reached, not following links of {}", key);
                } else {
                    let depth = entry.depth + 1;
                    for link in &parsed.links {
                        self.admit(&mut storage, link, depth, Some(&entry.url))?;
                    }
                }
            }
            Err(FetchError::Cancelled) => {
                self.budget.release();
                return Err(CrawlError::Cancelled);
            }
            Err(error) => {
                self.budget.release();
                tracing::warn!("Rejecting {}: {}", key, error);

                let mut storage = lock_storage(&self.storage)?;
                storage.mark_seen(&key, SeenStatus::Rejected, Some(error.code()))?;
                storage.record_failure(
                    self.run_id,
                    &key,
                    error.code(),
                    &error.to_string(),
                    error.attempts(),
                )?;
                storage.remove_from_frontier(&key)?;
                self.counts.failed += 1;
            }
        }

        self.settled += 1;
        if self.settled % PROGRESS_INTERVAL == 0 {
            tracing::info!(
                "Progress: {} URLs settled, {} accepted ({} in ledger), {} in frontier",
                self.settled,
                self.counts.accepted,
                self.budget.accepted(),
                self.frontier.len()
            );
        }

        Ok(())
    }

    /// Gates a candidate URL and queues it when eligible
    ///
    /// Filter rejections are memoized by the raw link and recorded as
    /// rejected in the seen ledger. Accepted candidates are deduplicated by
    /// their normalized form against the ledger and the frontier.
    ///
    /// # Returns
    ///
    /// `true` if the URL was queued
    fn admit(
        &mut self,
        storage: &mut SqliteStorage,
        link: &Url,
        depth: u32,
        origin: Option<&Url>,
    ) -> Result<bool, CrawlError> {
        let raw = link.as_str();
        if storage.cached_rejection(raw)?.is_some() {
            return Ok(false);
        }

        let normalized = match self.filter.evaluate(link, depth) {
            Ok(url) => url,
            // depth belongs to the path, not the URL; a slower sibling may
            // still reach it within the limit
            Err(rejection @ Rejection::TooDeep { .. }) => {
                tracing::debug!("Filtered {}: {}", raw, rejection);
                return Ok(false);
            }
            Err(rejection) => {
                tracing::debug!("Filtered {}: {}", raw, rejection);
                storage.record_rejection(raw, rejection.code())?;
                if storage.mark_seen(raw, SeenStatus::Rejected, Some(rejection.code()))? {
                    self.counts.rejected += 1;
                }
                return Ok(false);
            }
        };

        if self.frontier.contains(&normalized)
            || self.in_flight.contains(normalized.as_str())
            || storage.is_seen(normalized.as_str())?
        {
            return Ok(false);
        }

        let entry = FrontierEntry {
            url: normalized,
            depth,
            origin: origin.cloned(),
        };
        storage.push_frontier(&entry.to_record())?;
        Ok(self.frontier.push(entry))
    }
}
