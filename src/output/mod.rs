//! Output module for crawl reports and store statistics
//!
//! This module handles:
//! - Printing the final report of a crawl run
//! - Previewing harvested records
//! - Summarizing what the store holds across runs

mod report;
pub mod stats;

pub use report::{print_failure, print_preview, print_report};
pub use stats::{load_statistics, print_statistics, HarvestStatistics};
