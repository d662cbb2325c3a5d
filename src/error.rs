// =============================================================================
// error.rs - EVERYTHING THAT CAN GO WRONG BETWEEN A COURT AND A RECORD
// =============================================================================
//
// Court websites fail in a small number of ways, and we surface all of them
// the same way: the error propagates, that court's run ends, and the other
// courts carry on. No retries. If the clerk's server is down, it is down.
// =============================================================================

use thiserror::Error;

use crate::models::CourtId;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("browser error: {0}")]
    Browser(String),

    #[error("{court}: could not extract {field}: {detail}")]
    Extraction {
        court: CourtId,
        field: &'static str,
        detail: String,
    },

    #[error("{0}: extract called before the site was fetched")]
    NotFetched(CourtId),

    #[error("{0}: back-scraping is not supported")]
    BackScrapeUnsupported(CourtId),

    #[error("unknown court '{0}'")]
    UnknownCourt(String),

    #[error("invalid setting {name}: {detail}")]
    InvalidSetting { name: &'static str, detail: String },

    #[error("deferred index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

impl ScrapeError {
    pub fn extraction(court: CourtId, field: &'static str, detail: impl Into<String>) -> Self {
        ScrapeError::Extraction {
            court,
            field,
            detail: detail.into(),
        }
    }
}
