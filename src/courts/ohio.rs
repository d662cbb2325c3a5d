// =============================================================================
// ohio.rs - THE SUPREME COURT OF OHIO'S REPORTER OF DECISIONS
// =============================================================================
//
// One big results table (`#Table1`), one case per row, everything in its own
// column. This is the well-behaved one. Enjoy it while it lasts.
//
//     | name (link) | docket | summary | author | decided | web cite |
//
// The same listing serves the twelve district courts of appeals and the Court
// of Claims through the `Source` parameter, and older years through
// `iaFilter`. Rows whose docket cell is blank are separators and skipped.
// =============================================================================

use std::rc::Rc;
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::NaiveDate;
use scraper::{ElementRef, Selector};
use tracing::{debug, info};

use crate::error::ScrapeError;
use crate::fetcher::{Document, PageSource};
use crate::models::{CaseRecord, CourtId, PrecedentialStatus, RecordSet};
use crate::site::{ensure_fetched, BackScrapeCursor, OpinionSite, SiteState};
use crate::text::{collapse_ws, element_text};

const COURT: CourtId = CourtId::Ohio;

/// Supreme Court is 0, the district courts 1-12, the Court of Claims 13.
pub const MAX_COURT_INDEX: u8 = 13;

const FIRST_ARCHIVE_YEAR: i32 = 1992;
const LAST_ARCHIVE_YEAR: i32 = 2013;

static ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#Table1 tr").expect("valid selector"));
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").expect("valid selector"));
static FIRST_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

pub struct OhioSite {
    court_index: u8,
    url: String,
    source: Rc<dyn PageSource>,
    document: Option<Document>,
    state: SiteState,
}

impl OhioSite {
    pub fn new(court_index: u8, year: i32, source: Rc<dyn PageSource>) -> Result<Self, ScrapeError> {
        if court_index > MAX_COURT_INDEX {
            return Err(ScrapeError::UnknownCourt(format!("ohio source {court_index}")));
        }
        Ok(Self {
            court_index,
            url: make_url(court_index, year),
            source,
            document: None,
            state: SiteState::Configured,
        })
    }

    fn parse_row(&self, doc: &Document, cells: &[ElementRef<'_>]) -> Result<CaseRecord, ScrapeError> {
        let case_name = element_text(cells[0]);
        let download_url = cells[0]
            .select(&FIRST_LINK)
            .next()
            .and_then(|a| doc.href_of(a))
            .ok_or_else(|| ScrapeError::extraction(COURT, "download url", format!("no link for '{case_name}'")))?;

        let docket_number = element_text(cells[1]);
        let summary = Some(element_text(cells[2])).filter(|s| !s.is_empty());

        // The author cell sometimes lists a panel; the first name is the author.
        let judges = cells[3]
            .text()
            .map(collapse_ws)
            .find(|t| !t.is_empty())
            .unwrap_or_default();

        let date_text = element_text(cells[4]);
        let case_date = NaiveDate::parse_from_str(&date_text, "%m/%d/%Y").map_err(|e| {
            ScrapeError::extraction(COURT, "case date", format!("'{date_text}' for {docket_number}: {e}"))
        })?;

        let neutral_citation = Some(element_text(cells[5]).replace('-', " ")).filter(|c| !c.is_empty());

        Ok(CaseRecord {
            case_name,
            docket_number,
            case_date,
            judges,
            precedential_status: PrecedentialStatus::Published,
            neutral_citation,
            summary,
            download_url,
        })
    }
}

pub fn make_url(court_index: u8, year: i32) -> String {
    format!(
        "http://www.sconet.state.oh.us/ROD/docs/default.asp?Page=1&Sort={sort}&PageSize=100&Source={court_index}&iaFilter={year}&ColumnMask=669",
        sort = urlencoding::encode("docdecided DESC"),
    )
}

#[async_trait(?Send)]
impl OpinionSite for OhioSite {
    fn court_id(&self) -> CourtId {
        COURT
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn state(&self) -> SiteState {
        self.state
    }

    async fn download(&mut self) -> Result<(), ScrapeError> {
        let page = self.source.get(&self.url).await?;
        self.document = Some(Document::from_page(&page)?);
        self.state = SiteState::Fetched;
        Ok(())
    }

    async fn extract(&mut self) -> Result<RecordSet, ScrapeError> {
        ensure_fetched(COURT, self.state)?;
        let doc = self.document.as_ref().ok_or(ScrapeError::NotFetched(COURT))?;

        let mut records = Vec::new();
        for row in doc.select(&ROW).skip(1) {
            let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
            if cells.len() < 6 || element_text(cells[1]).is_empty() {
                debug!(court = %COURT, cells = cells.len(), "Skipping separator row");
                continue;
            }
            records.push(self.parse_row(doc, &cells)?);
        }
        info!(
            court = %COURT,
            source = self.court_index,
            records = records.len(),
            "Extracted decisions table"
        );

        self.state = SiteState::Extracted;
        Ok(RecordSet::new(COURT, records))
    }

    fn back_scrape_cursors(&self) -> Vec<BackScrapeCursor> {
        (FIRST_ARCHIVE_YEAR..=LAST_ARCHIVE_YEAR)
            .map(BackScrapeCursor::Year)
            .collect()
    }

    async fn download_backwards(&mut self, cursor: BackScrapeCursor) -> Result<(), ScrapeError> {
        match cursor {
            BackScrapeCursor::Year(year) => {
                self.url = make_url(self.court_index, year);
                self.download().await
            }
            BackScrapeCursor::Page(_) => Err(ScrapeError::BackScrapeUnsupported(COURT)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::testing::StaticSource;
    use crate::site::{run_back_scrape, run_forward};

    const DECISIONS: &str = r#"
        <table id="Table1">
          <tr><td>Case Caption</td><td>Case No.</td><td>Topics</td><td>Author</td><td>Decided</td><td>Cite</td></tr>
          <tr>
            <td><a href="/rod/docs/pdf/0/2014/2014-ohio-3123.pdf">State ex rel. Hogan v. Ghee</a></td>
            <td>2013-1789</td>
            <td>Mandamus - inmate's request for records denied.</td>
            <td><span>Per Curiam</span><br><span>O'Connor, C.J.</span></td>
            <td>07/22/2014</td>
            <td>2014-Ohio-3123</td>
          </tr>
          <tr><td></td><td> </td><td></td><td></td><td></td><td></td></tr>
          <tr>
            <td><a href="/rod/docs/pdf/0/2014/2014-ohio-3160.pdf">Disciplinary Counsel v. Smith</a></td>
            <td>2014-0123</td>
            <td></td>
            <td></td>
            <td>07/24/2014</td>
            <td>2014-Ohio-3160</td>
          </tr>
        </table>
    "#;

    fn url_2014() -> String {
        make_url(0, 2014)
    }

    #[test]
    fn test_make_url() {
        assert_eq!(
            make_url(3, 2001),
            "http://www.sconet.state.oh.us/ROD/docs/default.asp?Page=1&Sort=docdecided%20DESC&PageSize=100&Source=3&iaFilter=2001&ColumnMask=669"
        );
    }

    #[test]
    fn test_court_index_is_bounded() {
        let source: Rc<dyn PageSource> = Rc::new(StaticSource::new());
        assert!(OhioSite::new(13, 2014, Rc::clone(&source)).is_ok());
        assert!(matches!(
            OhioSite::new(14, 2014, source),
            Err(ScrapeError::UnknownCourt(_))
        ));
    }

    #[tokio::test]
    async fn test_rows_are_bound_column_by_column() {
        let source = Rc::new(StaticSource::new().with_page(&url_2014(), DECISIONS));
        let mut site = OhioSite::new(0, 2014, source).unwrap();
        let set = run_forward(&mut site).await.unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(
            set.case_names(),
            vec!["State ex rel. Hogan v. Ghee", "Disciplinary Counsel v. Smith"]
        );
        assert_eq!(set.docket_numbers(), vec!["2013-1789", "2014-0123"]);
        assert_eq!(
            set.summaries(),
            vec![Some("Mandamus - inmate's request for records denied."), None]
        );
        assert_eq!(set.judges(), vec!["Per Curiam", ""]);
        assert_eq!(
            set.neutral_citations(),
            vec![Some("2014 Ohio 3123"), Some("2014 Ohio 3160")]
        );
        assert_eq!(set.case_dates()[1], NaiveDate::from_ymd_opt(2014, 7, 24).unwrap());
        assert_eq!(
            set.download_urls()[0],
            "http://www.sconet.state.oh.us/rod/docs/pdf/0/2014/2014-ohio-3123.pdf"
        );
    }

    #[tokio::test]
    async fn test_reextract_is_idempotent() {
        let source = Rc::new(StaticSource::new().with_page(&url_2014(), DECISIONS));
        let mut site = OhioSite::new(0, 2014, source).unwrap();
        site.download().await.unwrap();
        assert_eq!(site.extract().await.unwrap(), site.extract().await.unwrap());
    }

    #[tokio::test]
    async fn test_back_scrape_walks_years() {
        let source = Rc::new(
            StaticSource::new()
                .with_page(&make_url(2, 1992), DECISIONS)
                .with_page(&make_url(2, 1993), DECISIONS),
        );
        let mut site = OhioSite::new(2, 2014, source.clone()).unwrap();

        let all = site.back_scrape_cursors();
        assert_eq!(all.first(), Some(&BackScrapeCursor::Year(1992)));
        assert_eq!(all.last(), Some(&BackScrapeCursor::Year(2013)));

        let results = run_back_scrape(&mut site, &all[..2]).await.unwrap();
        assert_eq!(source.requests(), vec![make_url(2, 1992), make_url(2, 1993)]);
        assert_eq!(results[1].1.len(), 2);
    }

    #[tokio::test]
    async fn test_bad_date_is_an_extraction_error() {
        let html = DECISIONS.replace("07/24/2014", "July 24");
        let source = Rc::new(StaticSource::new().with_page(&url_2014(), &html));
        let mut site = OhioSite::new(0, 2014, source).unwrap();
        site.download().await.unwrap();
        let err = site.extract().await.unwrap_err();
        assert!(matches!(err, ScrapeError::Extraction { field: "case date", .. }));
    }
}
