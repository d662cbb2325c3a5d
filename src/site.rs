// =============================================================================
// site.rs - THE LIFE CYCLE EVERY COURT FOLLOWS
// =============================================================================
//
// A court module is configured, it fetches, it extracts. That's it:
//
//     Configured -> Fetched -> Extracted
//
// A back-scrape reuses the same site and repeats Fetched -> Extracted once
// per historical cursor (a page number or a year), strictly in order. Nothing
// survives between cursors except the URL the site is currently pointed at.
// =============================================================================

use std::fmt;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::ScrapeError;
use crate::models::{CourtId, RecordSet};

/// Where a site is in its life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteState {
    Configured,
    Fetched,
    Extracted,
}

/// One historical position to re-scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackScrapeCursor {
    Page(u32),
    Year(i32),
}

impl fmt::Display for BackScrapeCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackScrapeCursor::Page(page) => write!(f, "page {page}"),
            BackScrapeCursor::Year(year) => write!(f, "year {year}"),
        }
    }
}

/// The contract every court module implements.
#[async_trait(?Send)]
pub trait OpinionSite {
    fn court_id(&self) -> CourtId;

    /// The URL the next `download` will fetch.
    fn url(&self) -> &str;

    fn state(&self) -> SiteState;

    /// Fetch the current URL, replacing whatever was fetched before.
    async fn download(&mut self) -> Result<(), ScrapeError>;

    /// Bind every case found in the fetched pages into records.
    ///
    /// Calling it again without a new download gives the same records.
    async fn extract(&mut self) -> Result<RecordSet, ScrapeError>;

    /// Historical cursors this court supports. Empty means none.
    fn back_scrape_cursors(&self) -> Vec<BackScrapeCursor> {
        Vec::new()
    }

    /// Point the site at `cursor` and fetch it.
    async fn download_backwards(&mut self, cursor: BackScrapeCursor) -> Result<(), ScrapeError> {
        let _ = cursor;
        Err(ScrapeError::BackScrapeUnsupported(self.court_id()))
    }
}

/// Fetch and extract the current listing.
pub async fn run_forward(site: &mut dyn OpinionSite) -> Result<RecordSet, ScrapeError> {
    info!(court = %site.court_id(), url = site.url(), "Scraping");
    site.download().await?;
    let records = site.extract().await?;
    info!(
        court = %site.court_id(),
        records = records.len(),
        state = ?site.state(),
        "Scrape complete"
    );
    Ok(records)
}

/// Re-run fetch and extract once per cursor, in order.
///
/// The first failure ends the run; results for earlier cursors are lost
/// with it, exactly as a forward scrape loses everything on failure.
pub async fn run_back_scrape(
    site: &mut dyn OpinionSite,
    cursors: &[BackScrapeCursor],
) -> Result<Vec<(BackScrapeCursor, RecordSet)>, ScrapeError> {
    if cursors.is_empty() {
        warn!(court = %site.court_id(), "No back-scrape cursors; nothing to do");
    }

    let mut results = Vec::with_capacity(cursors.len());
    for &cursor in cursors {
        info!(court = %site.court_id(), %cursor, "Back-scraping");
        site.download_backwards(cursor).await?;
        let records = site.extract().await?;
        info!(
            court = %site.court_id(),
            %cursor,
            url = site.url(),
            records = records.len(),
            state = ?site.state(),
            "Back-scrape cursor complete"
        );
        results.push((cursor, records));
    }
    Ok(results)
}

/// Guard shared by the court modules: extraction needs fetched pages.
pub(crate) fn ensure_fetched(court: CourtId, state: SiteState) -> Result<(), ScrapeError> {
    match state {
        SiteState::Configured => Err(ScrapeError::NotFetched(court)),
        SiteState::Fetched | SiteState::Extracted => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CaseRecord, PrecedentialStatus};
    use chrono::NaiveDate;

    /// A site whose "pages" are just the cursor it was pointed at.
    struct EchoSite {
        url: String,
        state: SiteState,
        fetched: Vec<String>,
    }

    impl EchoSite {
        fn new() -> Self {
            Self {
                url: "http://echo/".into(),
                state: SiteState::Configured,
                fetched: Vec::new(),
            }
        }
    }

    #[async_trait(?Send)]
    impl OpinionSite for EchoSite {
        fn court_id(&self) -> CourtId {
            CourtId::Nm
        }

        fn url(&self) -> &str {
            &self.url
        }

        fn state(&self) -> SiteState {
            self.state
        }

        async fn download(&mut self) -> Result<(), ScrapeError> {
            self.fetched.push(self.url.clone());
            self.state = SiteState::Fetched;
            Ok(())
        }

        async fn extract(&mut self) -> Result<RecordSet, ScrapeError> {
            ensure_fetched(self.court_id(), self.state)?;
            self.state = SiteState::Extracted;
            Ok(RecordSet::new(
                self.court_id(),
                vec![CaseRecord {
                    case_name: self.url.clone(),
                    docket_number: "1".into(),
                    case_date: NaiveDate::from_ymd_opt(2014, 1, 1).unwrap(),
                    judges: String::new(),
                    precedential_status: PrecedentialStatus::Published,
                    neutral_citation: None,
                    summary: None,
                    download_url: self.url.clone(),
                }],
            ))
        }

        fn back_scrape_cursors(&self) -> Vec<BackScrapeCursor> {
            vec![BackScrapeCursor::Page(1), BackScrapeCursor::Page(2)]
        }

        async fn download_backwards(&mut self, cursor: BackScrapeCursor) -> Result<(), ScrapeError> {
            self.url = format!("http://echo/?{cursor}");
            self.download().await
        }
    }

    #[tokio::test]
    async fn test_extract_before_download_fails() {
        let mut site = EchoSite::new();
        let err = site.extract().await.unwrap_err();
        assert!(matches!(err, ScrapeError::NotFetched(CourtId::Nm)));
    }

    #[tokio::test]
    async fn test_forward_walks_the_state_machine() {
        let mut site = EchoSite::new();
        assert_eq!(site.state(), SiteState::Configured);
        let records = run_forward(&mut site).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(site.state(), SiteState::Extracted);
    }

    #[tokio::test]
    async fn test_back_scrape_visits_cursors_in_order() {
        let mut site = EchoSite::new();
        let cursors = site.back_scrape_cursors();
        let results = run_back_scrape(&mut site, &cursors).await.unwrap();
        assert_eq!(site.fetched, vec!["http://echo/?page 1", "http://echo/?page 2"]);
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].0, BackScrapeCursor::Page(2));
        assert_eq!(results[1].1.case_names(), vec!["http://echo/?page 2"]);
    }

    #[test]
    fn test_cursor_display() {
        assert_eq!(BackScrapeCursor::Year(1999).to_string(), "year 1999");
    }
}
