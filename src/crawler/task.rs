use crate::listing::Listing;
use std::fmt;
use url::Url;

/// What a queued task does when it runs
#[derive(Debug)]
pub enum TaskKind {
    /// Fetch a page of search results; `page` counts from 1 per seed
    ListingPage { page: u32 },
    /// Fetch a detail page and complete the carried preview
    DetailPage { listing: Box<Listing> },
    /// The seed's traversal is over
    Done,
}

impl TaskKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ListingPage { .. } => "listing",
            Self::DetailPage { .. } => "detail",
            Self::Done => "done",
        }
    }
}

/// One pending fetch, owned by its seed's queue until it completes
#[derive(Debug)]
pub struct CrawlTask {
    pub url: Url,
    pub kind: TaskKind,
    /// Requests the transport issued for this task, filled in after the fetch
    pub attempt: u32,
}

impl CrawlTask {
    pub fn listing(url: Url, page: u32) -> Self {
        Self {
            url,
            kind: TaskKind::ListingPage { page },
            attempt: 0,
        }
    }

    pub fn detail(url: Url, listing: Listing) -> Self {
        Self {
            url,
            kind: TaskKind::DetailPage {
                listing: Box::new(listing),
            },
            attempt: 0,
        }
    }

    pub fn done(url: Url) -> Self {
        Self {
            url,
            kind: TaskKind::Done,
            attempt: 0,
        }
    }
}

impl fmt::Display for CrawlTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.label(), self.url)
    }
}
