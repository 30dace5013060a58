//! Pagination controller - the fetch, extract, advance loop
//!
//! The loop is an explicit state machine over [`CrawlState`]:
//!
//! ```text
//! Start -> Fetching -> Extracting -> Advancing -> Done
//!              |                        |   \
//!              v                        v    `-> Fetching (next page)
//!            Failed                   Failed
//! ```
//!
//! Only renderer failures end the loop in `Failed`. A page that cannot be
//! parsed is logged and skipped; an empty page is not a reason to stop.

use crate::crawler::extractor::QuoteExtractor;
use crate::crawler::renderer::{PageRenderer, RenderedPage};
use crate::state::CrawlState;
use crate::storage::QuoteRecord;
use crate::HarvestError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag, checked between pages
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that the crawl stop before the next page
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why the loop reached `Done`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The current page had no next-page control
    NoNextPage,
    /// The configured page bound was reached
    PageLimit,
    /// The cancellation flag was set
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoNextPage => "no next page",
            Self::PageLimit => "page limit reached",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// How the loop ended
#[derive(Debug)]
pub enum PaginationEnd {
    Done(StopReason),
    /// The renderer failed; carries the navigation error
    Failed(HarvestError),
}

/// Everything the loop produced
#[derive(Debug)]
pub struct PaginationOutcome {
    /// Records in page-visit order, then block order within each page
    pub records: Vec<QuoteRecord>,

    /// Pages whose document was obtained
    pub pages_visited: u32,

    /// Pages whose document was obtained and parsed without error
    pub pages_extracted: u32,

    /// Malformed quote blocks that were skipped
    pub blocks_skipped: usize,

    /// Pages whose document could not be parsed at all
    pub page_errors: u32,

    pub end: PaginationEnd,
}

/// Drives a [`PageRenderer`] through the source's pages
pub struct PaginationController<'a> {
    extractor: &'a QuoteExtractor,
    max_pages: u32,
    cancel: CancelFlag,
}

impl<'a> PaginationController<'a> {
    /// # Arguments
    ///
    /// * `extractor` - Parses each rendered document
    /// * `max_pages` - Upper bound on pages visited; at least 1
    /// * `cancel` - Checked before each advance
    pub fn new(extractor: &'a QuoteExtractor, max_pages: u32, cancel: CancelFlag) -> Self {
        Self {
            extractor,
            max_pages: max_pages.max(1),
            cancel,
        }
    }

    /// Runs the loop on an already opened renderer
    ///
    /// The renderer is borrowed, not consumed; closing it stays with the caller.
    ///
    /// # Returns
    ///
    /// * `Ok(PaginationOutcome)` - The loop reached `Done` or `Failed`
    /// * `Err(HarvestError::InvalidTransition)` - Internal state machine violation
    pub async fn run<R: PageRenderer>(
        &self,
        renderer: &mut R,
    ) -> Result<PaginationOutcome, HarvestError> {
        let mut state = CrawlState::Start;
        let mut page_number: u32 = 1;
        let mut document: Option<RenderedPage> = None;

        let mut records = Vec::new();
        let mut pages_visited = 0;
        let mut pages_extracted = 0;
        let mut blocks_skipped = 0;
        let mut page_errors = 0;
        let mut end = None;

        while !state.is_terminal() {
            let next = match state {
                CrawlState::Start => CrawlState::Fetching,

                CrawlState::Fetching => {
                    tracing::info!("Crawling page {}...", page_number);
                    match renderer.current_document().await {
                        Ok(rendered) => {
                            pages_visited = page_number;
                            document = Some(rendered);
                            CrawlState::Extracting
                        }
                        Err(e) => {
                            tracing::error!("Page {} failed to render: {}", page_number, e);
                            end = Some(PaginationEnd::Failed(e));
                            CrawlState::Failed
                        }
                    }
                }

                CrawlState::Extracting => {
                    let RenderedPage { url, html } = document.take().unwrap_or(RenderedPage {
                        url: String::new(),
                        html: String::new(),
                    });
                    match self.extractor.extract(&html) {
                        Ok(extraction) => {
                            for warning in &extraction.warnings {
                                tracing::warn!("Page {}: {}", page_number, warning);
                            }
                            tracing::info!(
                                "Page {} ({}): {} quotes, {} blocks skipped",
                                page_number,
                                url,
                                extraction.records.len(),
                                extraction.warnings.len()
                            );
                            blocks_skipped += extraction.warnings.len();
                            records.extend(extraction.records);
                            pages_extracted += 1;
                        }
                        Err(e) => {
                            tracing::warn!(
                                "Page {} could not be parsed, moving on: {}",
                                page_number,
                                e
                            );
                            page_errors += 1;
                        }
                    }
                    CrawlState::Advancing
                }

                CrawlState::Advancing => {
                    if page_number >= self.max_pages {
                        tracing::info!("Reached page limit ({})", self.max_pages);
                        end = Some(PaginationEnd::Done(StopReason::PageLimit));
                        CrawlState::Done
                    } else if self.cancel.is_cancelled() {
                        tracing::info!("Crawl cancelled after page {}", page_number);
                        end = Some(PaginationEnd::Done(StopReason::Cancelled));
                        CrawlState::Done
                    } else {
                        match renderer.advance().await {
                            Ok(true) => {
                                page_number += 1;
                                CrawlState::Fetching
                            }
                            Ok(false) => {
                                tracing::info!("No next page after page {}", page_number);
                                end = Some(PaginationEnd::Done(StopReason::NoNextPage));
                                CrawlState::Done
                            }
                            Err(e) => {
                                tracing::error!(
                                    "Failed to advance past page {}: {}",
                                    page_number,
                                    e
                                );
                                end = Some(PaginationEnd::Failed(e));
                                CrawlState::Failed
                            }
                        }
                    }
                }

                CrawlState::Done | CrawlState::Failed => break,
            };

            state = transition(state, next)?;
        }

        let end = end.unwrap_or(PaginationEnd::Done(StopReason::NoNextPage));

        Ok(PaginationOutcome {
            records,
            pages_visited,
            pages_extracted,
            blocks_skipped,
            page_errors,
            end,
        })
    }
}

fn transition(from: CrawlState, to: CrawlState) -> Result<CrawlState, HarvestError> {
    if !from.can_transition_to(to) {
        return Err(HarvestError::InvalidTransition { from, to });
    }
    tracing::trace!("{} -> {}", from, to);
    Ok(to)
}
