//! Statistics generation from the quote store
//!
//! This module provides functionality for extracting and displaying
//! what the store holds across every crawl run.

use crate::storage::{QuoteStore, RunRecord, StorageResult};

/// Number of tags listed by [`print_statistics`]
const TOP_TAGS: usize = 10;

/// Number of runs listed by [`print_statistics`]
const RECENT_RUNS: usize = 5;

/// Store statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Total number of quote rows, duplicates included
    pub total_quotes: u64,

    pub distinct_authors: u64,

    /// Most used tags with their row counts, most frequent first
    pub top_tags: Vec<(String, u64)>,

    /// Most recent runs, newest first
    pub recent_runs: Vec<RunRecord>,
}

/// Loads statistics from the store
///
/// # Arguments
///
/// * `store` - The store to query
pub fn load_statistics(store: &dyn QuoteStore) -> StorageResult<HarvestStatistics> {
    let total_quotes = store.count_quotes()?;
    let distinct_authors = store.count_distinct_authors()?;

    let mut top_tags = store.tag_counts()?;
    top_tags.truncate(TOP_TAGS);

    let recent_runs = store.latest_runs(RECENT_RUNS)?;

    Ok(HarvestStatistics {
        total_quotes,
        distinct_authors,
        top_tags,
        recent_runs,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Quotes stored: {}", stats.total_quotes);
    println!("  Distinct authors: {}", stats.distinct_authors);
    println!();

    if !stats.top_tags.is_empty() {
        println!("Top Tags:");
        for (tag, count) in &stats.top_tags {
            let percentage = if stats.total_quotes > 0 {
                (*count as f64 / stats.total_quotes as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", tag, count, percentage);
        }
        println!();
    }

    if stats.recent_runs.is_empty() {
        println!("No crawl runs recorded");
        return;
    }

    println!("Recent Runs:");
    for run in &stats.recent_runs {
        println!(
            "  #{} {} [{}] pages: {}, extracted: {}, persisted: {}",
            run.id,
            run.started_at,
            run.status.to_db_string(),
            run.pages_visited,
            run.records_extracted,
            run.records_persisted
        );
        if let Some(message) = &run.error_message {
            println!("      {}", message);
        }
    }
}
