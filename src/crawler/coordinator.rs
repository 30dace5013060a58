//! Crawler coordinator - main crawl orchestration logic
//!
//! This module wires the renderer, the pagination controller, and the store
//! together, including:
//! - Preparing the schema and recording the run
//! - Opening the source page and driving pagination
//! - Closing the browser session on every exit path
//! - Writing the harvest in one batch and reporting totals

use crate::config::Config;
use crate::crawler::controller::{CancelFlag, PaginationController, PaginationEnd, StopReason};
use crate::crawler::extractor::QuoteExtractor;
use crate::crawler::renderer::{ChromeRenderer, PageRenderer};
use crate::crawler::PaginationOutcome;
use crate::storage::{open_store, QuoteRecord, QuoteStore, RunStatus, RunTotals, SqliteStore};
use crate::HarvestError;
use std::path::Path;
use std::time::Duration;

/// How a crawl that produced a report ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// Pagination reached `Done` and every record was persisted
    Finished(StopReason),

    /// Navigation failed after at least one page was extracted; earlier records were persisted
    Partial { reason: String },
}

/// Final report of a crawl run
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub run_id: i64,
    pub pages_visited: u32,
    pub records_extracted: usize,
    pub records_persisted: usize,
    pub blocks_skipped: usize,
    pub page_errors: u32,
    pub outcome: CrawlOutcome,

    /// Persisted records, in crawl order, carrying their new ids
    pub records: Vec<QuoteRecord>,
}

impl CrawlReport {
    fn run_status(&self) -> RunStatus {
        match self.outcome {
            CrawlOutcome::Finished(StopReason::Cancelled) => RunStatus::Interrupted,
            CrawlOutcome::Finished(_) => RunStatus::Completed,
            CrawlOutcome::Partial { .. } => RunStatus::Partial,
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator<S: QuoteStore> {
    config: Config,
    config_hash: String,
    store: S,
    extractor: QuoteExtractor,
    cancel: CancelFlag,
}

impl<S: QuoteStore> Coordinator<S> {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `config_hash` - Hash of the configuration file, stored on the run row
    /// * `store` - Where quotes and run rows are written
    pub fn new(
        config: Config,
        config_hash: impl Into<String>,
        store: S,
    ) -> Result<Self, HarvestError> {
        let extractor = QuoteExtractor::new(&config.source)?;

        Ok(Self {
            config,
            config_hash: config_hash.into(),
            store,
            extractor,
            cancel: CancelFlag::new(),
        })
    }

    /// Uses `cancel` instead of a private, never-set flag
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs one crawl with `renderer`
    ///
    /// The renderer is closed before this returns, whatever the outcome.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - Records were persisted (all of them, or those
    ///   extracted before a navigation failure)
    /// * `Err(HarvestError::Navigation)` - The source failed before any page was extracted
    /// * `Err(HarvestError::Persistence)` - The batch write was rejected; nothing was written
    pub async fn run<R: PageRenderer>(
        &mut self,
        mut renderer: R,
    ) -> Result<CrawlReport, HarvestError> {
        let run_id = match self.prepare_run() {
            Ok(run_id) => run_id,
            Err(e) => {
                close_renderer(&mut renderer).await;
                return Err(e);
            }
        };

        let paginated = self.paginate(&mut renderer).await;
        close_renderer(&mut renderer).await;

        self.finish(run_id, paginated)
    }

    fn prepare_run(&mut self) -> Result<i64, HarvestError> {
        self.store
            .ensure_schema()
            .map_err(|source| HarvestError::Persistence {
                attempted: 0,
                persisted: 0,
                source,
            })?;

        let run_id = self
            .store
            .create_run(&self.config_hash, &self.config.source.url)?;
        tracing::info!("Starting crawl run {} at {}", run_id, self.config.source.url);
        Ok(run_id)
    }

    /// Opens the source and drives the controller; `Err` only before the loop starts
    async fn paginate<R: PageRenderer>(
        &self,
        renderer: &mut R,
    ) -> Result<PaginationOutcome, HarvestError> {
        renderer.open(&self.config.source.url).await?;

        let max_pages = self.config.crawler.max_pages;
        PaginationController::new(&self.extractor, max_pages, self.cancel.clone())
            .run(renderer)
            .await
    }

    fn finish(
        &mut self,
        run_id: i64,
        paginated: Result<PaginationOutcome, HarvestError>,
    ) -> Result<CrawlReport, HarvestError> {
        let outcome = match paginated {
            Ok(outcome) => outcome,
            Err(e) => {
                self.record_failure(run_id, RunTotals::default(), &e);
                return Err(e);
            }
        };

        let totals = RunTotals {
            pages_visited: outcome.pages_visited,
            records_extracted: outcome.records.len(),
            records_persisted: 0,
        };

        let crawl_outcome = match outcome.end {
            PaginationEnd::Done(reason) => CrawlOutcome::Finished(reason),
            PaginationEnd::Failed(e) if outcome.pages_extracted > 0 => {
                tracing::warn!(
                    "Navigation failed after {} pages; persisting {} records extracted so far",
                    outcome.pages_extracted,
                    outcome.records.len()
                );
                CrawlOutcome::Partial {
                    reason: e.to_string(),
                }
            }
            PaginationEnd::Failed(e) => {
                self.record_failure(run_id, totals, &e);
                return Err(e);
            }
        };

        let mut records = outcome.records;
        let ids = match self.store.insert_batch(&records) {
            Ok(ids) => ids,
            Err(source) => {
                let error = HarvestError::Persistence {
                    attempted: records.len(),
                    persisted: 0,
                    source,
                };
                tracing::error!("{}", error);
                self.record_failure(run_id, totals, &error);
                return Err(error);
            }
        };

        for (record, id) in records.iter_mut().zip(&ids) {
            record.id = Some(*id);
        }

        let report = CrawlReport {
            run_id,
            pages_visited: outcome.pages_visited,
            records_extracted: records.len(),
            records_persisted: ids.len(),
            blocks_skipped: outcome.blocks_skipped,
            page_errors: outcome.page_errors,
            outcome: crawl_outcome,
            records,
        };

        let error_message = match &report.outcome {
            CrawlOutcome::Partial { reason } => Some(reason.as_str()),
            CrawlOutcome::Finished(_) => None,
        };
        let totals = RunTotals {
            records_persisted: report.records_persisted,
            ..totals
        };
        if let Err(e) = self
            .store
            .finish_run(run_id, report.run_status(), totals, error_message)
        {
            tracing::warn!("Quotes were saved but run {} could not be updated: {}", run_id, e);
        }

        tracing::info!(
            "Crawl finished: {} pages, {} quotes extracted, {} persisted",
            report.pages_visited,
            report.records_extracted,
            report.records_persisted
        );

        Ok(report)
    }

    fn record_failure(&mut self, run_id: i64, totals: RunTotals, error: &HarvestError) {
        if let Err(e) = self
            .store
            .finish_run(run_id, RunStatus::Failed, totals, Some(&error.to_string()))
        {
            tracing::warn!("Run {} could not be marked failed: {}", run_id, e);
        }
    }
}

async fn close_renderer<R: PageRenderer>(renderer: &mut R) {
    if let Err(e) = renderer.close().await {
        tracing::warn!("Failed to close browser session: {}", e);
    }
}

/// Runs a complete crawl with a headless Chrome session
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the SQLite store and create the schema if needed
/// 2. Launch the browser
/// 3. Walk the source's pages up to the configured bound
/// 4. Close the browser
/// 5. Insert every extracted quote in one transaction
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `config_hash` - Hash of the configuration file, stored on the run row
/// * `cancel` - Checked between pages; set it to stop early
///
/// # Example
///
/// ```no_run
/// use quote_harvest::config::load_config_with_hash;
/// use quote_harvest::crawler::{run_crawl, CancelFlag};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("harvest.toml"))?;
/// let report = run_crawl(config, &hash, CancelFlag::new()).await?;
/// println!("{} quotes saved", report.records_persisted);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: Config,
    config_hash: &str,
    cancel: CancelFlag,
) -> Result<CrawlReport, HarvestError> {
    let store = open_store(
        Path::new(&config.output.database_path),
        Duration::from_millis(config.output.busy_timeout_ms),
    )
    .map_err(|source| HarvestError::Persistence {
        attempted: 0,
        persisted: 0,
        source,
    })?;

    let mut coordinator: Coordinator<SqliteStore> =
        Coordinator::new(config, config_hash, store)?.with_cancel_flag(cancel);

    let config = coordinator.config();
    let renderer = ChromeRenderer::launch(&config.browser, &config.crawler, &config.source).await?;
    coordinator.run(renderer).await
}
