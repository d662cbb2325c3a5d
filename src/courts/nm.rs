// =============================================================================
// nm.rs - NEW MEXICO, ONE GRIDVIEW AT A TIME
// =============================================================================
//
// The New Mexico Compilation Commission lists recent opinions in an ASP.NET
// GridView. No postbacks are needed to read the first page, so a plain GET
// does it. Each data row is four cells:
//
//     Supreme Court:      date | case name (link) | citation | docket
//     Court of Appeals:   date | case name (link) | docket   | (filing info)
//
// Slip opinions have no neutral citation yet; that is what makes them slip.
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
use crate::site::{ensure_fetched, OpinionSite, SiteState};
use crate::text::{element_text, titlecase};

const SUPREME_URL: &str = "http://www.nmcompcomm.us/nmcases/nmsc.aspx";
const SLIP_URL: &str = "http://www.nmcompcomm.us/nmcases/NMCASlip.aspx";

static ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table#GridView1 tr").expect("valid selector"));
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").expect("valid selector"));
static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%m/%d/%y", "%Y-%m-%d"];

/// Which column holds what. The two New Mexico listings differ only here.
#[derive(Debug, Clone, Copy)]
struct Layout {
    docket_cell: usize,
    citation_cell: Option<usize>,
}

pub struct NmSite {
    court: CourtId,
    url: String,
    layout: Layout,
    source: Rc<dyn PageSource>,
    document: Option<Document>,
    state: SiteState,
}

impl NmSite {
    pub fn supreme(source: Rc<dyn PageSource>) -> Self {
        Self::build(
            CourtId::Nm,
            SUPREME_URL,
            Layout {
                docket_cell: 3,
                citation_cell: Some(2),
            },
            source,
        )
    }

    pub fn appeals_slip(source: Rc<dyn PageSource>) -> Self {
        Self::build(
            CourtId::NmCtAppSlip,
            SLIP_URL,
            Layout {
                docket_cell: 2,
                citation_cell: None,
            },
            source,
        )
    }

    fn build(court: CourtId, url: &str, layout: Layout, source: Rc<dyn PageSource>) -> Self {
        Self {
            court,
            url: url.to_string(),
            layout,
            source,
            document: None,
            state: SiteState::Configured,
        }
    }

    fn parse_row(&self, doc: &Document, cells: &[ElementRef<'_>]) -> Result<CaseRecord, ScrapeError> {
        let date_text = element_text(cells[0]);
        let case_date = parse_date(&date_text)
            .ok_or_else(|| ScrapeError::extraction(self.court, "case date", format!("'{date_text}'")))?;

        let link = cells[1]
            .select(&LINK)
            .next()
            .ok_or_else(|| ScrapeError::extraction(self.court, "download url", "row has no case link"))?;
        let case_name = titlecase(&element_text(link));
        let download_url = doc
            .href_of(link)
            .ok_or_else(|| ScrapeError::extraction(self.court, "download url", format!("bad link on '{case_name}'")))?;

        let docket_number = element_text(cells[self.layout.docket_cell]);
        if docket_number.is_empty() {
            return Err(ScrapeError::extraction(
                self.court,
                "docket number",
                format!("blank for '{case_name}'"),
            ));
        }

        let neutral_citation = self
            .layout
            .citation_cell
            .map(|i| element_text(cells[i]))
            .filter(|c| !c.is_empty());

        Ok(CaseRecord {
            case_name,
            docket_number,
            case_date,
            judges: String::new(),
            precedential_status: PrecedentialStatus::Published,
            neutral_citation,
            summary: None,
            download_url,
        })
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text.trim(), fmt).ok())
}

#[async_trait(?Send)]
impl OpinionSite for NmSite {
    fn court_id(&self) -> CourtId {
        self.court
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
        ensure_fetched(self.court, self.state)?;
        let doc = self.document.as_ref().ok_or(ScrapeError::NotFetched(self.court))?;

        let mut records = Vec::new();
        for row in doc.select(&ROW) {
            // Header rows are <th>, pager rows carry a single cell.
            let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
            if cells.len() < 4 {
                debug!(court = %self.court, cells = cells.len(), "Skipping non-data row");
                continue;
            }
            records.push(self.parse_row(doc, &cells)?);
        }
        info!(court = %self.court, records = records.len(), "Extracted grid rows");

        self.state = SiteState::Extracted;
        Ok(RecordSet::new(self.court, records))
    }
}
