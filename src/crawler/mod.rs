//! Crawler module for rendering, extracting, and paginating
//!
//! This module contains the core crawling logic, including:
//! - Headless browser rendering with explicit readiness waits
//! - Quote extraction from rendered markup
//! - The pagination state machine
//! - Overall crawl coordination and persistence

mod controller;
mod coordinator;
mod extractor;
mod renderer;

pub use controller::{
    CancelFlag, PaginationController, PaginationEnd, PaginationOutcome, StopReason,
};
pub use coordinator::{run_crawl, Coordinator, CrawlOutcome, CrawlReport};
pub use extractor::{Extraction, ExtractionWarning, QuoteExtractor, SkipReason};
pub use renderer::{poll_until, ChromeRenderer, PageRenderer, RenderedPage};
