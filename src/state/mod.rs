//! State module for tracking crawl progress
//!
//! - `CrawlState`: the pagination loop's states and its legal transitions

mod crawl_state;

pub use crawl_state::CrawlState;
