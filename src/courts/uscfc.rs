// =============================================================================
// uscfc.rs - UNITED STATES COURT OF FEDERAL CLAIMS
// =============================================================================
//
// The Court of Federal Claims publishes opinions through Drupal aggregator
// feeds rendered as plain HTML. Regular opinions and the Office of Special
// Masters' vaccine decisions live on two different aggregator sources with
// identical markup, so one module serves both courts:
//
//     <div class="feed-item">
//       <h3 class="feed-item-title"><a href="...pdf">SMITH v. USA</a></h3>
//       <span class="feed-item-date">Mon, 07/14/2014 - 14:21</span>
//       <div class="feed-item-body">Judge Wolski. No. 13-123C.</div>
//     </div>
//
// Older items are reached with Drupal's `?page=N` pager.
// =============================================================================

use std::rc::Rc;
use std::sync::LazyLock;

use aho_corasick::AhoCorasick;
use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Selector};
use tracing::{debug, info};

use crate::error::ScrapeError;
use crate::fetcher::{Document, PageSource};
use crate::models::{CaseRecord, CourtId, PrecedentialStatus, RecordSet};
use crate::site::{ensure_fetched, BackScrapeCursor, OpinionSite, SiteState};
use crate::text::{element_text, titlecase};

const OPINIONS_URL: &str = "http://www.uscfc.uscourts.gov/aggregator/sources/8";
const VACCINE_URL: &str = "http://www.uscfc.uscourts.gov/aggregator/sources/7";

static ITEM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.feed-item").expect("valid selector"));
static TITLE_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".feed-item-title a[href]").expect("valid selector"));
static DATE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".feed-item-date").expect("valid selector"));
static BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".feed-item-body").expect("valid selector"));

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})/(\d{1,2})/(\d{4})").expect("valid regex"));
static DOCKET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{2}-\d{1,5}[A-Z]?)\b").expect("valid regex"));
static JUDGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:Chief Special Master|Special Master|Senior Judge|Chief Judge|Judge)\s+([A-Z][A-Za-z'\-]+)")
        .expect("valid regex")
});
/// Trailing "[Unpublished]" / "(Reissued)" style tags on titles.
static TITLE_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*[\[(][^\])]*[\])]\s*$").expect("valid regex"));

static UNPUBLISHED: LazyLock<AhoCorasick> = LazyLock::new(|| {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(["unpublished"])
        .expect("Failed to build unpublished automaton")
});

pub struct UscfcSite {
    court: CourtId,
    base_url: &'static str,
    url: String,
    cursors: Vec<BackScrapeCursor>,
    source: Rc<dyn PageSource>,
    document: Option<Document>,
    state: SiteState,
}

impl UscfcSite {
    /// Published and unpublished opinions of the regular judges.
    pub fn opinions(source: Rc<dyn PageSource>) -> Self {
        Self::build(
            CourtId::Uscfc,
            OPINIONS_URL,
            (1..=3).map(BackScrapeCursor::Page).collect(),
            source,
        )
    }

    /// Special masters' vaccine act decisions.
    pub fn vaccine(source: Rc<dyn PageSource>) -> Self {
        Self::build(
            CourtId::UscfcVaccine,
            VACCINE_URL,
            vec![BackScrapeCursor::Page(1)],
            source,
        )
    }

    fn build(
        court: CourtId,
        base_url: &'static str,
        cursors: Vec<BackScrapeCursor>,
        source: Rc<dyn PageSource>,
    ) -> Self {
        Self {
            court,
            base_url,
            url: base_url.to_string(),
            cursors,
            source,
            document: None,
            state: SiteState::Configured,
        }
    }

    pub fn page_url(&self, page: u32) -> String {
        format!("{}?page={page}", self.base_url)
    }

    fn parse_item(&self, doc: &Document, item: ElementRef<'_>) -> Result<CaseRecord, ScrapeError> {
        let link = item
            .select(&TITLE_LINK)
            .next()
            .ok_or_else(|| ScrapeError::extraction(self.court, "case name", "feed item has no title link"))?;
        let title = element_text(link);
        let download_url = doc
            .href_of(link)
            .ok_or_else(|| ScrapeError::extraction(self.court, "download url", format!("bad link on '{title}'")))?;

        let date_text = item.select(&DATE).next().map(element_text).unwrap_or_default();
        let case_date = parse_date(&date_text)
            .ok_or_else(|| ScrapeError::extraction(self.court, "case date", format!("'{date_text}' on '{title}'")))?;

        let body = item.select(&BODY).next().map(element_text).unwrap_or_default();

        // The docket usually sits in the body; a few items only carry it in the title.
        let docket_number = DOCKET_RE
            .captures(&body)
            .or_else(|| DOCKET_RE.captures(&title))
            .map(|c| c[1].to_string())
            .ok_or_else(|| ScrapeError::extraction(self.court, "docket number", format!("none for '{title}'")))?;

        let judges = JUDGE_RE
            .captures(&body)
            .map(|c| c[1].to_string())
            .unwrap_or_default();

        let precedential_status = if UNPUBLISHED.is_match(&title) || UNPUBLISHED.is_match(&body) {
            PrecedentialStatus::Unpublished
        } else {
            PrecedentialStatus::Published
        };

        Ok(CaseRecord {
            case_name: titlecase(&TITLE_TAG_RE.replace(&title, "")),
            docket_number,
            case_date,
            judges,
            precedential_status,
            neutral_citation: None,
            summary: None,
            download_url,
        })
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    let caps = DATE_RE.captures(text)?;
    NaiveDate::from_ymd_opt(caps[3].parse().ok()?, caps[1].parse().ok()?, caps[2].parse().ok()?)
}

#[async_trait(?Send)]
impl OpinionSite for UscfcSite {
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
        for item in doc.select(&ITEM) {
            let record = self.parse_item(doc, item)?;
            debug!(court = %self.court, case = record.case_name.as_str(), "Parsed feed item");
            records.push(record);
        }
        info!(court = %self.court, records = records.len(), "Extracted aggregator items");

        self.state = SiteState::Extracted;
        Ok(RecordSet::new(self.court, records))
    }

    fn back_scrape_cursors(&self) -> Vec<BackScrapeCursor> {
        self.cursors.clone()
    }

    async fn download_backwards(&mut self, cursor: BackScrapeCursor) -> Result<(), ScrapeError> {
        match cursor {
            BackScrapeCursor::Page(page) => {
                self.url = self.page_url(page);
                self.download().await
            }
            BackScrapeCursor::Year(_) => Err(ScrapeError::BackScrapeUnsupported(self.court)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::testing::StaticSource;
    use crate::site::{run_back_scrape, run_forward};

    const AGGREGATOR: &str = r#"
        <html><body>
        <div class="feed-item">
          <h3 class="feed-item-title"><a href="/sites/default/files/opinions/SMITH071414.pdf#view">SMITH v. SECRETARY OF HEALTH AND HUMAN SERVICES [Unpublished]</a></h3>
          <div class="feed-item-meta"><span class="feed-item-date">Mon, 07/14/2014 - 14:21</span></div>
          <div class="feed-item-body"><p>Special Master Millman. No. 13-123V. Unpublished decision awarding fees.</p></div>
        </div>
        <div class="feed-item">
          <h3 class="feed-item-title"><a href="http://www.uscfc.uscourts.gov/sites/default/files/opinions/DOE.pdf">DOE v. SECRETARY OF HHS</a></h3>
          <div class="feed-item-meta"><span class="feed-item-date">Fri, 07/11/2014 - 09:02</span></div>
          <div class="feed-item-body">Chief Special Master Vowell. 12-876V. Ruling on entitlement.</div>
        </div>
        </body></html>
    "#;

    fn vaccine_source() -> Rc<StaticSource> {
        Rc::new(
            StaticSource::new()
                .with_page(VACCINE_URL, AGGREGATOR)
                .with_page(&format!("{VACCINE_URL}?page=1"), AGGREGATOR),
        )
    }

    #[tokio::test]
    async fn test_forward_scrape_binds_items() {
        let source = vaccine_source();
        let mut site = UscfcSite::vaccine(source.clone());
        let set = run_forward(&mut site).await.unwrap();

        assert_eq!(set.court, CourtId::UscfcVaccine);
        assert_eq!(
            set.case_names(),
            vec!["Smith v. Secretary of Health and Human Services", "Doe v. Secretary of Hhs"]
        );
        assert_eq!(set.docket_numbers(), vec!["13-123V", "12-876V"]);
        assert_eq!(set.judges(), vec!["Millman", "Vowell"]);
        assert_eq!(
            set.precedential_statuses(),
            vec![PrecedentialStatus::Unpublished, PrecedentialStatus::Published]
        );
        assert_eq!(
            set.case_dates(),
            vec![
                NaiveDate::from_ymd_opt(2014, 7, 14).unwrap(),
                NaiveDate::from_ymd_opt(2014, 7, 11).unwrap()
            ]
        );
        assert_eq!(
            set.download_urls()[0],
            "http://www.uscfc.uscourts.gov/sites/default/files/opinions/SMITH071414.pdf"
        );
    }

    #[tokio::test]
    async fn test_back_scrape_page_one_matches_forward_structure() {
        let source = vaccine_source();
        let mut forward = UscfcSite::vaccine(source.clone());
        let forward_set = run_forward(&mut forward).await.unwrap();

        let source = vaccine_source();
        let mut site = UscfcSite::vaccine(source.clone());
        let cursors = site.back_scrape_cursors();
        assert_eq!(cursors, vec![BackScrapeCursor::Page(1)]);

        let results = run_back_scrape(&mut site, &cursors).await.unwrap();
        assert_eq!(source.requests(), vec![format!("{VACCINE_URL}?page=1")]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].1.records, forward_set.records);
        assert_eq!(site.url(), format!("{VACCINE_URL}?page=1"));
    }

    #[tokio::test]
    async fn test_reextracting_is_idempotent() {
        let mut site = UscfcSite::vaccine(vaccine_source());
        site.download().await.unwrap();
        let first = site.extract().await.unwrap();
        let second = site.extract().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_missing_date_is_an_extraction_error() {
        let html = r#"<div class="feed-item"><h3 class="feed-item-title"><a href="/a.pdf">A v. B</a></h3>
                      <div class="feed-item-body">Judge Bush. 14-1C.</div></div>"#;
        let source = Rc::new(StaticSource::new().with_page(OPINIONS_URL, html));
        let mut site = UscfcSite::opinions(source);
        site.download().await.unwrap();
        let err = site.extract().await.unwrap_err();
        assert!(matches!(err, ScrapeError::Extraction { field: "case date", .. }));
    }

    #[tokio::test]
    async fn test_docket_falls_back_to_title() {
        let html = r#"<div class="feed-item"><h3 class="feed-item-title"><a href="/a.pdf">14-55C ACME CORP. v. UNITED STATES</a></h3>
                      <span class="feed-item-date">07/01/2014</span>
                      <div class="feed-item-body">Senior Judge Bruggink.</div></div>"#;
        let source = Rc::new(StaticSource::new().with_page(OPINIONS_URL, html));
        let mut site = UscfcSite::opinions(source);
        let set = run_forward(&mut site).await.unwrap();
        assert_eq!(set.docket_numbers(), vec!["14-55C"]);
        assert_eq!(set.judges(), vec!["Bruggink"]);
    }

    #[test]
    fn test_opinion_cursors_and_urls() {
        let site = UscfcSite::opinions(Rc::new(StaticSource::new()));
        assert_eq!(site.back_scrape_cursors().len(), 3);
        assert_eq!(site.page_url(2), format!("{OPINIONS_URL}?page=2"));
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("Tue, 1/7/2014 - 10:00"), NaiveDate::from_ymd_opt(2014, 1, 7));
        assert_eq!(parse_date("13/45/2014"), None);
    }
}
