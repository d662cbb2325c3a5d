// =============================================================================
// tex.rs - TEXAS, WHERE YOU NEED A WHOLE BROWSER TO READ A LIST
// =============================================================================
//
// The Texas appellate search (TAMES) is a Telerik RadGrid behind an ASP.NET
// form. To get a list of opinions we have to:
//
//   1. open the search page
//   2. tick our court (the Supreme Court comes pre-ticked)
//   3. tick "Opinions" and "Orders"
//   4. type a date window into two date pickers
//   5. press Search
//   6. read the pager, then click "next" until we've seen every page
//
// The grid gives us the PDF link and the docket, but the case style only
// lives on each case's detail page. Those are fetched lazily, one per case,
// through a `DeferredList`, and never more than once.
//
// The grid is redrawn by an ASP.NET postback, so the old DOM lingers for a
// moment after every click. We wait for the grid after Search and for the
// pager's current page to move after every "next".
//
// Every case on a run gets the configured case date. The grid shows event
// dates, not decision dates, and the search window is what we asked for.
// =============================================================================

use std::rc::Rc;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeDelta};
use scraper::{ElementRef, Selector};
use tracing::{debug, info, warn};

use crate::browser::{BrowserLauncher, BrowserSession};
use crate::config::Config;
use crate::deferred::{DeferredFetch, DeferredList};
use crate::error::ScrapeError;
use crate::fetcher::{Document, PageSource};
use crate::models::{CaseRecord, CourtId, PrecedentialStatus, RecordSet};
use crate::site::{ensure_fetched, OpinionSite, SiteState};
use crate::text::{collapse_ws, direct_text, element_text, titlecase};

const COURT: CourtId = CourtId::Tex;

const SEARCH_URL: &str = "http://www.search.txcourts.gov/CaseSearch.aspx?coa=cossup&d=1";

/// Checkbox position of each court in the search form.
pub const COURTS: [(&str, u8); 16] = [
    ("sc", 0),
    ("ccrimapp", 1),
    ("capp_1", 2),
    ("capp_2", 3),
    ("capp_3", 4),
    ("capp_4", 5),
    ("capp_5", 6),
    ("capp_6", 7),
    ("capp_7", 8),
    ("capp_8", 9),
    ("capp_9", 10),
    ("capp_10", 11),
    ("capp_11", 12),
    ("capp_12", 13),
    ("capp_13", 14),
    ("capp_14", 15),
];

const COURT_CHECKBOX: &str = "#ctl00_ContentPlaceHolder1_chkListCourts_";
const OPINIONS_CHECKBOX: &str = "#ctl00_ContentPlaceHolder1_chkListDocTypes_0";
const ORDERS_CHECKBOX: &str = "#ctl00_ContentPlaceHolder1_chkListDocTypes_1";
const DATE_FROM: &str = "#ctl00_ContentPlaceHolder1_dtDocumentFrom_dateInput";
const DATE_TO: &str = "#ctl00_ContentPlaceHolder1_dtDocumentTo_dateInput";
const SEARCH_BUTTON: &str = "#ctl00_ContentPlaceHolder1_btnSearchText";
pub const NEXT_PAGE: &str = ".rgPageNext";

const GRID_ID: &str = "ctl00_ContentPlaceHolder1_grdDocuments_ctl00";
const RESULTS_GRID: &str = "#ctl00_ContentPlaceHolder1_grdDocuments_ctl00";
const FORM_DATE: &str = "%m/%d/%Y";

const FIRST_POLL: Duration = Duration::from_millis(100);
const MAX_POLL: Duration = Duration::from_secs(1);

static GRID_ROWS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("#ctl00_ContentPlaceHolder1_grdDocuments_ctl00 tr").expect("valid selector")
});
static PAGER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("thead .rgInfoPart > strong").expect("valid selector"));
static CURRENT_PAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("thead .rgNumPart .rgCurrentPage").expect("valid selector"));
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr[id]").expect("valid selector"));
static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));
static LABEL_CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.span2").expect("valid selector"));

pub fn court_number(name: &str) -> Option<u8> {
    COURTS
        .iter()
        .find(|(court, _)| *court == name)
        .map(|&(_, number)| number)
}

/// What the RadGrid pager claims about the result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pager {
    records: Option<usize>,
    pages: usize,
}

fn read_pager(doc: &Document) -> Result<Pager, ScrapeError> {
    let numbers: Vec<String> = doc.select(&PAGER).map(element_text).collect();
    if numbers.len() < 2 {
        // Small result sets render without a pager.
        warn!(court = %COURT, "No pager on results page; assuming one page");
        return Ok(Pager {
            records: numbers.first().and_then(|n| n.parse().ok()),
            pages: 1,
        });
    }
    let parse = |field: &'static str, text: &str| {
        text.parse::<usize>()
            .map_err(|e| ScrapeError::extraction(COURT, field, format!("'{text}': {e}")))
    };
    Ok(Pager {
        records: Some(parse("record count", &numbers[0])?),
        pages: parse("page count", &numbers[1])?.max(1),
    })
}

/// The page number the pager has highlighted, if there is a pager.
fn current_page(doc: &Document) -> Option<usize> {
    doc.select(&CURRENT_PAGE)
        .next()
        .and_then(|el| element_text(el).parse().ok())
}

/// First day of the search window: `lookback_days` before `case_date`.
fn window_start(case_date: NaiveDate, lookback_days: i64) -> Result<NaiveDate, ScrapeError> {
    let invalid = |detail: String| ScrapeError::InvalidSetting {
        name: "tex_lookback_days",
        detail,
    };
    if lookback_days < 0 {
        return Err(invalid(format!("{lookback_days} is negative")));
    }
    TimeDelta::try_days(lookback_days)
        .and_then(|lookback| case_date.checked_sub_signed(lookback))
        .ok_or_else(|| invalid(format!("{lookback_days} days before {case_date} is out of range")))
}

/// One result row, minus the case name.
#[derive(Debug, Clone, PartialEq, Eq)]
struct GridRow {
    download_url: String,
    docket_number: String,
    detail_url: String,
}

/// Rows mentioning an opinion or an order. The grid numbers them from zero
/// on every page.
fn opinion_count(doc: &Document) -> usize {
    doc.select(&GRID_ROWS)
        .filter(|row| {
            let text: String = row.text().collect();
            text.contains("Opinion") || text.contains("Order")
        })
        .count()
}

fn grid_rows(doc: &Document) -> Result<Vec<GridRow>, ScrapeError> {
    let count = opinion_count(doc);
    let mut rows = Vec::with_capacity(count);
    for n in 0..count {
        let id = format!("{GRID_ID}__{n}");
        let row = doc
            .select(&ROW)
            .find(|tr| tr.value().id() == Some(id.as_str()))
            .ok_or_else(|| ScrapeError::extraction(COURT, "grid row", format!("no row '{id}'")))?;
        rows.push(parse_row(doc, row, &id)?);
    }
    Ok(rows)
}

fn parse_row(doc: &Document, row: ElementRef<'_>, id: &str) -> Result<GridRow, ScrapeError> {
    let cells: Vec<ElementRef<'_>> = row
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "td")
        .collect();
    if cells.len() < 5 {
        return Err(ScrapeError::extraction(
            COURT,
            "grid row",
            format!("'{id}' has {} cells", cells.len()),
        ));
    }

    let link_in = |cell: ElementRef<'_>, field: &'static str| {
        cell.select(&LINK)
            .next()
            .and_then(|a| doc.href_of(a))
            .ok_or_else(|| ScrapeError::extraction(COURT, field, format!("no link in '{id}'")))
    };
    let download_url = link_in(cells[3], "download url")?;
    let detail_url = link_in(cells[4], "case detail url")?;
    let docket_number = cells[4]
        .text()
        .find(|t| t.contains('-'))
        .map(collapse_ws)
        .ok_or_else(|| ScrapeError::extraction(COURT, "docket number", format!("none in '{id}'")))?;

    Ok(GridRow {
        download_url,
        docket_number,
        detail_url,
    })
}

/// Reads the case style off a case detail page.
pub struct CaseStyleFetcher {
    source: Rc<dyn PageSource>,
}

/// The value next to a `div.span2` label, e.g. "Style:".
fn labeled_value(doc: &Document, label: &str) -> Option<String> {
    let label_cell = doc
        .select(&LABEL_CELL)
        .find(|div| element_text(*div).contains(label))?;
    let value_cell = label_cell
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "div")?;
    direct_text(value_cell)
        .into_iter()
        .map(collapse_ws)
        .find(|t| !t.is_empty())
}

#[async_trait(?Send)]
impl DeferredFetch for CaseStyleFetcher {
    type Output = String;

    async fn fetch(&self, seed: &str) -> Result<String, ScrapeError> {
        let doc = Document::from_page(&self.source.get(seed).await?)?;
        let plaintiff = labeled_value(&doc, "Style:")
            .ok_or_else(|| ScrapeError::extraction(COURT, "case name", format!("no style on {seed}")))?;
        let name = match labeled_value(&doc, "v.:") {
            Some(defendant) => titlecase(&format!("{plaintiff} v. {defendant}")),
            None => titlecase(&plaintiff),
        };
        debug!(seed, case = name.as_str(), "Fetched case style");
        Ok(name)
    }
}

pub struct TexasSite {
    court_name: String,
    court_number: u8,
    case_date: NaiveDate,
    window_start: NaiveDate,
    page_wait: Duration,
    url: String,
    launcher: Rc<dyn BrowserLauncher>,
    source: Rc<dyn PageSource>,
    pages: Vec<Document>,
    case_names: Option<DeferredList<CaseStyleFetcher>>,
    state: SiteState,
}

impl TexasSite {
    pub fn new(
        config: &Config,
        launcher: Rc<dyn BrowserLauncher>,
        source: Rc<dyn PageSource>,
    ) -> Result<Self, ScrapeError> {
        let court_number = court_number(&config.tex_court)
            .ok_or_else(|| ScrapeError::UnknownCourt(format!("tex court '{}'", config.tex_court)))?;
        Ok(Self {
            court_name: config.tex_court.clone(),
            court_number,
            case_date: config.tex_case_date,
            window_start: window_start(config.tex_case_date, config.tex_lookback_days)?,
            page_wait: config.browser_element_wait,
            url: SEARCH_URL.to_string(),
            launcher,
            source,
            pages: Vec::new(),
            case_names: None,
            state: SiteState::Configured,
        })
    }

    async fn search(&self, session: &mut dyn BrowserSession) -> Result<Vec<Document>, ScrapeError> {
        session.navigate(&self.url).await?;

        // The Supreme Court box is ticked by default; clicking it would untick it.
        if self.court_number != 0 {
            session
                .click(&format!("{COURT_CHECKBOX}{}", self.court_number))
                .await?;
        }
        session.click(OPINIONS_CHECKBOX).await?;
        session.click(ORDERS_CHECKBOX).await?;

        let from = self.window_start.format(FORM_DATE).to_string();
        let to = self.case_date.format(FORM_DATE).to_string();
        session.fill(DATE_FROM, &from).await?;
        session.fill(DATE_TO, &to).await?;
        session.click(SEARCH_BUTTON).await?;
        session.wait_for(RESULTS_GRID).await?;

        let first = Document::parse(&session.page_source().await?, &self.url)?;
        let pager = read_pager(&first)?;
        info!(
            court = %COURT,
            tex_court = self.court_name.as_str(),
            from = from.as_str(),
            to = to.as_str(),
            records = ?pager.records,
            pages = pager.pages,
            "Search submitted"
        );

        let mut pages = vec![first];
        for page in 2..=pager.pages {
            session.click(NEXT_PAGE).await?;
            debug!(page, "Reading next results page");
            pages.push(self.wait_for_page(session, page).await?);
        }
        Ok(pages)
    }

    /// Re-read the DOM until the pager says we're on `page`.
    async fn wait_for_page(
        &self,
        session: &mut dyn BrowserSession,
        page: usize,
    ) -> Result<Document, ScrapeError> {
        let deadline = tokio::time::Instant::now() + self.page_wait;
        let mut delay = FIRST_POLL;
        loop {
            let doc = Document::parse(&session.page_source().await?, &self.url)?;
            let showing = current_page(&doc);
            if showing == Some(page) {
                return Ok(doc);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ScrapeError::Browser(format!(
                    "results page {page} never loaded (pager shows {showing:?})"
                )));
            }
            debug!(page, showing = ?showing, "Results page not redrawn yet");
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(MAX_POLL);
        }
    }
}

#[async_trait(?Send)]
impl OpinionSite for TexasSite {
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
        let mut session = self.launcher.launch().await?;
        let searched = self.search(session.as_mut()).await;
        // Close the browser whether or not the search worked.
        let closed = session.close().await;
        let pages = searched?;
        closed?;

        self.pages = pages;
        self.case_names = None;
        self.state = SiteState::Fetched;
        Ok(())
    }

    async fn extract(&mut self) -> Result<RecordSet, ScrapeError> {
        ensure_fetched(COURT, self.state)?;

        let mut rows = Vec::new();
        for page in &self.pages {
            rows.extend(grid_rows(page)?);
        }

        let names = self.case_names.get_or_insert_with(|| {
            let seeds = rows.iter().map(|r| r.detail_url.clone()).collect();
            DeferredList::new(
                seeds,
                CaseStyleFetcher {
                    source: Rc::clone(&self.source),
                },
            )
        });
        let cached = (0..names.len()).filter(|&i| names.is_resolved(i)).count();
        debug!(court = %COURT, cached, total = names.len(), "Resolving case styles");
        let names = names.resolve_all().await?;

        let records: Vec<CaseRecord> = rows
            .into_iter()
            .zip(names)
            .map(|(row, case_name)| CaseRecord {
                case_name,
                docket_number: row.docket_number,
                case_date: self.case_date,
                judges: String::new(),
                precedential_status: PrecedentialStatus::Published,
                neutral_citation: None,
                summary: None,
                download_url: row.download_url,
            })
            .collect();
        info!(court = %COURT, records = records.len(), "Extracted search results");

        self.state = SiteState::Extracted;
        Ok(RecordSet::new(COURT, records))
    }
}
