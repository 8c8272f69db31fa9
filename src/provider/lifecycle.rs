//! Provider lifecycle: warm-up, execution and the three shutdown paths

use crate::config::{AppConfig, CrawlConfig, LedgerPolicy, LoadedConfig};
use crate::crawler::{build_http_client, Coordinator, CrawlError};
use crate::index::{
    promote, DocumentEmitter, GenesisOutcome, IndexBackend, PromotionReport, RecoveredPage,
    SqliteIndex,
};
use crate::provider::{ProviderError, RuntimeContext};
use crate::state::{ProviderState, RunState};
use crate::storage::{
    lock_storage, open_storage, RunCounts, RunStatus, SeenStore, SharedStorage, Storage,
};
use reqwest::Client;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Capabilities the host pipeline drives a data provider through
///
/// The host calls `warm_up`, then `execute`, then exactly one of the
/// shutdown methods depending on how execution ended.
#[allow(async_fn_in_trait)]
pub trait DataProvider {
    /// Prepares the provider's stores for a run
    fn warm_up(&mut self, context: &RuntimeContext) -> Result<(), ProviderError>;

    /// Runs one crawl for the context
    async fn execute(&mut self, context: &RuntimeContext) -> Result<RunReport, ProviderError>;

    /// Normal shutdown after a completed run
    fn cool_down(&mut self, context: &RuntimeContext) -> Result<(), ProviderError>;

    /// Shutdown after the host cancelled the run
    fn cancelled_shutdown(&mut self, context: &RuntimeContext) -> Result<(), ProviderError>;

    /// Shutdown after a fatal error
    fn emergency_shutdown(&mut self, context: &RuntimeContext) -> Result<(), ProviderError>;
}

/// Result of one `execute` call
#[derive(Debug)]
pub struct RunReport {
    pub run_id: i64,
    pub state: RunState,
    pub counts: RunCounts,
    /// Genesis generation the run wrote to
    pub generation: i64,
    /// Set when `auto-promote` promoted the finished genesis
    pub promotion: Option<PromotionReport>,
    /// Why the run aborted
    pub error: Option<CrawlError>,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        self.state == RunState::Completed
    }

    pub fn was_cancelled(&self) -> bool {
        matches!(self.error, Some(CrawlError::Cancelled))
    }
}

/// Run left behind by a crashed process, picked up on warm-up
#[derive(Debug, Clone, Copy)]
struct Resumable {
    run_id: i64,
}

/// Data provider crawling a site into the genesis index
pub struct CrawlerProvider {
    app: AppConfig,
    crawl: Arc<CrawlConfig>,
    config_hash: String,
    client: Client,
    state: ProviderState,
    storage: Option<SharedStorage>,
    context: Option<String>,
    resumable: Option<Resumable>,
    cancel: CancellationToken,
}

impl CrawlerProvider {
    /// Creates a provider from a validated configuration
    pub fn new(config: LoadedConfig) -> Result<Self, ProviderError> {
        let client = build_http_client(&config.app.fetch)?;

        Ok(Self {
            app: config.app,
            crawl: Arc::new(config.crawl),
            config_hash: config.hash,
            client,
            state: ProviderState::Uninitialized,
            storage: None,
            context: None,
            resumable: None,
            cancel: CancellationToken::new(),
        })
    }

    pub fn state(&self) -> ProviderState {
        self.state
    }

    /// Token that aborts the current run when cancelled
    ///
    /// A cancelled token is replaced on the next warm-up, so fetch a fresh
    /// handle for every run.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The ledger opened by the last warm-up
    pub fn storage(&self) -> Option<SharedStorage> {
        self.storage.clone()
    }

    /// Runs warm-up, execute and the matching shutdown in one call
    pub async fn run_once(&mut self, context: &RuntimeContext) -> Result<RunReport, ProviderError> {
        self.warm_up(context)?;

        let report = match self.execute(context).await {
            Ok(report) => report,
            Err(e) => {
                if let Err(cleanup) = self.emergency_shutdown(context) {
                    tracing::error!("Emergency cleanup failed: {}", cleanup);
                }
                return Err(e);
            }
        };

        if report.is_completed() {
            self.cool_down(context)?;
        } else if report.was_cancelled() {
            self.cancelled_shutdown(context)?;
        } else {
            self.emergency_shutdown(context)?;
        }

        Ok(report)
    }

    fn ensure_transition(&self, next: ProviderState) -> Result<(), ProviderError> {
        if self.state.can_transition_to(next) {
            Ok(())
        } else {
            Err(ProviderError::InvalidTransition {
                from: self.state,
                to: next,
            })
        }
    }

    fn ensure_context(&self, context: &RuntimeContext) -> Result<&SharedStorage, ProviderError> {
        match (&self.context, &self.storage) {
            (Some(name), Some(storage)) if *name == context.context => Ok(storage),
            (Some(name), Some(_)) => Err(ProviderError::RuntimeValidation(format!(
                "provider was warmed up for context '{}', not '{}'",
                name, context.context
            ))),
            _ => Err(ProviderError::InvalidTransition {
                from: self.state,
                to: ProviderState::Executing,
            }),
        }
    }

    /// Decides between resuming an interrupted run and starting clean
    fn prepare_ledger(&mut self, storage: &SharedStorage) -> Result<(), ProviderError> {
        let mut ledger = lock_storage(storage)?;
        self.resumable = None;

        if self.app.provider.ledger_policy == LedgerPolicy::ResumeInterrupted {
            if let Some(run) = ledger.get_latest_run()? {
                if run.status == RunStatus::Running {
                    if run.config_hash != self.config_hash {
                        tracing::warn!(
                            "Configuration changed since run {} started, resuming anyway",
                            run.id
                        );
                    }
                    tracing::info!(
                        "Resuming interrupted run {} ({} accepted so far)",
                        run.id,
                        ledger.count_seen(crate::state::SeenStatus::Accepted)?
                    );
                    self.resumable = Some(Resumable { run_id: run.id });
                    return Ok(());
                }
            }
        }

        let interrupted = ledger.reset_running_runs()?;
        if interrupted > 0 {
            tracing::info!("Discarding {} interrupted run(s)", interrupted);
        }
        ledger.reset()?;
        ledger.reset_filter_store()?;
        Ok(())
    }

    /// Clears both stores and moves to a terminal state
    fn shut_down(&mut self, next: ProviderState) -> Result<(), ProviderError> {
        self.ensure_transition(next)?;

        if let Some(storage) = &self.storage {
            let mut ledger = lock_storage(storage)?;
            ledger.reset()?;
            ledger.reset_filter_store()?;
        }
        self.resumable = None;

        tracing::info!("Provider {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Pages of a resumed generation whose fetch finished before the crash
    fn recover_settled(
        storage: &SharedStorage,
        index: &SqliteIndex,
        generation: i64,
    ) -> Result<Vec<RecoveredPage>, ProviderError> {
        let in_flight = lock_storage(storage)?.in_flight_frontier()?;
        let mut pages = Vec::new();
        for record in in_flight {
            if let Some(page) = index.recovered_page(generation, &record.url)? {
                pages.push(page);
            }
        }
        Ok(pages)
    }

    fn open_index(&self) -> Result<SqliteIndex, ProviderError> {
        let index = &self.app.index;
        Ok(SqliteIndex::open(
            Path::new(&index.directory),
            &index.database_name,
        )?)
    }
}

impl DataProvider for CrawlerProvider {
    fn warm_up(&mut self, context: &RuntimeContext) -> Result<(), ProviderError> {
        self.ensure_transition(ProviderState::WarmedUp)?;
        crate::config::validate_name("context", &context.context)
            .map_err(|e| ProviderError::RuntimeValidation(e.to_string()))?;

        let storage: SharedStorage = Arc::new(Mutex::new(open_storage(
            Path::new(&self.app.provider.state_path),
            &context.context,
        )?));
        self.prepare_ledger(&storage)?;

        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
        self.storage = Some(storage);
        self.context = Some(context.context.clone());

        tracing::info!("Provider warmed up for context '{}'", context.context);
        self.state = ProviderState::WarmedUp;
        Ok(())
    }

    async fn execute(&mut self, context: &RuntimeContext) -> Result<RunReport, ProviderError> {
        self.ensure_transition(ProviderState::Executing)?;
        let storage = Arc::clone(self.ensure_context(context)?);

        // validation comes before any store mutation
        let entry = context.entry_url(&self.crawl.seed)?;
        tracing::info!(
            "Executing {} dispatch for context '{}' from {}",
            context.dispatch_type,
            context.context,
            entry
        );
        self.state = ProviderState::Executing;

        let resumable = self.resumable.take();
        let run_id = match resumable {
            Some(resumable) => resumable.run_id,
            None => lock_storage(&storage)?.create_run(
                context.dispatch_type.as_str(),
                entry.as_str(),
                &self.config_hash,
            )?,
        };

        let mut index = self.open_index()?;
        let label = format!("{}-run-{}", context.context, run_id);
        let generation = index.open_genesis(&label, resumable.is_some())?;
        tracing::info!("Writing genesis generation {} ({})", generation, label);

        let recovered = if resumable.is_some() {
            Self::recover_settled(&storage, &index, generation)?
        } else {
            Vec::new()
        };

        let mut coordinator = Coordinator::new(
            Arc::clone(&self.crawl),
            &self.app.fetch,
            self.client.clone(),
            Arc::clone(&storage),
            run_id,
            self.app.provider.concurrency as usize,
            self.cancel.clone(),
        )?;

        let emitter = DocumentEmitter::start(Box::new(index), generation);
        let prepared = coordinator
            .seed(&entry)
            .and_then(|_| coordinator.reconcile(recovered));
        let outcome = match prepared {
            Ok(_) => coordinator.run(&emitter).await,
            Err(e) => crate::crawler::RunOutcome {
                state: RunState::Aborted,
                counts: RunCounts::default(),
                error: Some(e),
            },
        };

        let mut state = outcome.state;
        let mut error = outcome.error;
        let genesis = if state == RunState::Completed {
            GenesisOutcome::Finalize
        } else {
            GenesisOutcome::Discard
        };

        if let Err(e) = emitter.finish(genesis).await {
            tracing::error!("Failed to settle genesis generation {}: {}", generation, e);
            if state == RunState::Completed {
                state = RunState::Aborted;
                error = Some(CrawlError::Index(e));
            }
        }

        let status = match state {
            RunState::Completed => RunStatus::Completed,
            _ => RunStatus::Aborted,
        };
        lock_storage(&storage)?.finish_run(run_id, status, outcome.counts)?;

        let promotion = if state == RunState::Completed && self.app.index.auto_promote {
            let report = promote(
                Path::new(&self.app.index.directory),
                &self.app.index.database_name,
            )?;
            tracing::info!(
                "Promoted generation {} to stable ({} documents)",
                report.promoted,
                report.document_count
            );
            Some(report)
        } else {
            None
        };

        Ok(RunReport {
            run_id,
            state,
            counts: outcome.counts,
            generation,
            promotion,
            error,
        })
    }

    fn cool_down(&mut self, _context: &RuntimeContext) -> Result<(), ProviderError> {
        self.shut_down(ProviderState::CooledDown)
    }

    fn cancelled_shutdown(&mut self, _context: &RuntimeContext) -> Result<(), ProviderError> {
        self.cancel.cancel();
        self.shut_down(ProviderState::Cancelled)
    }

    fn emergency_shutdown(&mut self, _context: &RuntimeContext) -> Result<(), ProviderError> {
        self.cancel.cancel();
        self.shut_down(ProviderState::EmergencyStopped)
    }
}
