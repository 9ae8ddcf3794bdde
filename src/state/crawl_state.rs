/// Crawl state definitions for a single crawl target
///
/// ```text
/// Start -> DiscoverPages -> Enumerating -> Flushing -> Done
///                 |                           |
///                 +--------> Aborted <--------+
/// ```
///
/// `Flushing -> Aborted` covers a failed CSV write.
use std::fmt;

/// Represents the current state of one target's crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlState {
    /// Slug received, not yet normalized
    Start,

    /// Fetching the search root to read the pagination markers
    DiscoverPages,

    /// Walking listing pages in order and fetching their advertisements
    Enumerating,

    /// Writing the accumulated records to the target's CSV file
    Flushing,

    // ===== Terminal States =====
    /// All pages processed and records flushed
    Done,

    /// Page count could not be determined, or the output could not be written
    Aborted,
}

impl CrawlState {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true if `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        matches!(
            (self, next),
            (Self::Start, Self::DiscoverPages)
                | (Self::DiscoverPages, Self::Enumerating)
                | (Self::DiscoverPages, Self::Aborted)
                | (Self::Enumerating, Self::Flushing)
                | (Self::Flushing, Self::Done)
                | (Self::Flushing, Self::Aborted)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::DiscoverPages => "discover_pages",
            Self::Enumerating => "enumerating",
            Self::Flushing => "flushing",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }

    /// Returns all possible crawl states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Start,
            Self::DiscoverPages,
            Self::Enumerating,
            Self::Flushing,
            Self::Done,
            Self::Aborted,
        ]
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
