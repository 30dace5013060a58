/// Crawl state definitions for the pagination loop
///
/// This module defines every state the pagination controller can be in and
/// which moves between them are legal.
use std::fmt;

/// Represents the current state of the pagination loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlState {
    // ===== Active States =====
    /// Accumulator is empty and the page counter is at 1
    Start,

    /// Waiting for the renderer to produce the current document
    Fetching,

    /// Pulling quote records out of the current document
    Extracting,

    /// Deciding whether to stop or to move on to the next page
    Advancing,

    // ===== Terminal States =====
    /// The loop stopped normally (no next page, page limit, or cancellation)
    Done,

    /// The renderer could not load or render a page in time
    Failed,
}

impl CrawlState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if moving from `self` to `next` is a legal step
    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        matches!(
            (self, next),
            (Self::Start, Self::Fetching)
                | (Self::Fetching, Self::Extracting)
                | (Self::Fetching, Self::Failed)
                | (Self::Extracting, Self::Advancing)
                | (Self::Advancing, Self::Fetching)
                | (Self::Advancing, Self::Done)
                | (Self::Advancing, Self::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Advancing => "advancing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Returns all possible crawl states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Start,
            Self::Fetching,
            Self::Extracting,
            Self::Advancing,
            Self::Done,
            Self::Failed,
        ]
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
