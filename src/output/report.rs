//! Human-readable crawl reports

use crate::crawler::{CrawlOutcome, CrawlReport};
use crate::storage::QuoteRecord;
use crate::HarvestError;

/// Longest quote body shown in a preview line, in characters
const PREVIEW_TEXT_WIDTH: usize = 72;

/// Prints the totals of a finished crawl to stdout
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Report (run {}) ===\n", report.run_id);

    println!("  Pages visited:     {}", report.pages_visited);
    println!("  Records extracted: {}", report.records_extracted);
    println!("  Records persisted: {}", report.records_persisted);
    if report.blocks_skipped > 0 {
        println!("  Blocks skipped:    {}", report.blocks_skipped);
    }
    if report.page_errors > 0 {
        println!("  Unparseable pages: {}", report.page_errors);
    }

    match &report.outcome {
        CrawlOutcome::Finished(reason) => println!("\nFinished: {}", reason),
        CrawlOutcome::Partial { reason } => {
            println!("\nPartial: navigation stopped early, earlier pages were saved");
            println!("  Reason: {}", reason);
        }
    }
}

/// Prints the failing stage and reason of a crawl that produced no report
pub fn print_failure(error: &HarvestError) {
    eprintln!("Crawl failed during {}: {}", error.stage(), error);
    if let HarvestError::Persistence {
        attempted,
        persisted,
        ..
    } = error
    {
        eprintln!("  {} records attempted, {} persisted", attempted, persisted);
    }
}

/// Prints up to `limit` records, one line each
pub fn print_preview(records: &[QuoteRecord], limit: usize) {
    if limit == 0 || records.is_empty() {
        return;
    }

    println!("\nFirst {} of {} records:", limit.min(records.len()), records.len());
    for record in records.iter().take(limit) {
        println!("  {}", preview_line(record));
    }
}

fn preview_line(record: &QuoteRecord) -> String {
    let id = record
        .id
        .map(|id| format!("#{}", id))
        .unwrap_or_else(|| "-".to_string());

    let text = truncate(&record.text, PREVIEW_TEXT_WIDTH);
    let mut line = format!("{} {} ({})", id, text, record.author);
    if !record.tags.is_empty() {
        line.push_str(" [");
        line.push_str(&record.tags_string());
        line.push(']');
    }
    line
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut short: String = text.chars().take(width.saturating_sub(3)).collect();
    short.push_str("...");
    short
}
