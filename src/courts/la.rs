// =============================================================================
// la.rs - LOUISIANA SUPREME COURT NEWS RELEASES
// =============================================================================
//
// Louisiana doesn't publish an opinion list. It publishes press releases.
// Each release is a hand-edited page that goes roughly like this:
//
//     The Opinions handed down on the 7th day of July, 2014, are as follows:
//
//     BY KNOLL, J.:
//         2013-KA-1234 STATE OF LOUISIANA v. JOHN SMITH (Parish of Orleans)
//         2014-C -0099 ACME, INC. v. DOE
//     PER CURIAM:
//         2014-OB-0500 IN RE: MARY JONES
//
// So: one date per release, the docket and the caption share a link, and the
// author is whichever bold heading came last before the case. The year's
// landing page links to the releases; we read the two newest.
//
// The judge attribution is a heuristic and will always be one. Headings are
// matched to the cases beneath them, and when that comes up short the gap
// is filled with blanks at the front.
// =============================================================================

use std::rc::Rc;
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Selector};
use tracing::{debug, info, warn};

use crate::error::ScrapeError;
use crate::fetcher::{Document, PageSource};
use crate::models::{CaseRecord, CourtId, PrecedentialStatus, RecordSet};
use crate::site::{ensure_fetched, OpinionSite, SiteState};
use crate::text::{align_front, collapse_ws, contains_case_marker, direct_text, element_text, titlecase};

const COURT: CourtId = CourtId::La;

/// Releases read per run, newest first.
const RELEASES_PER_RUN: usize = 2;

static TD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").expect("valid selector"));
static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));
static STRONG: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("strong").expect("valid selector"));

/// Docket token such as `2013-KA-1234` or `2014-C -0099`.
static DOCKET_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+ ?-\w{1,2} ?- ?\d+").expect("valid regex"));
/// Docket span; greedy so consolidated dockets come out whole.
static DOCKET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+ ?-.*- ?\d+)").expect("valid regex"));
static WORDS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+.+").expect("valid regex"));
static RELEASE_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})\w{2} day of (\w+),\s*(\d{4})").expect("valid regex")
});
static JUDGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+\s*\w+,?\s?J?\.?)").expect("valid regex"));

pub struct LaSite {
    url: String,
    source: Rc<dyn PageSource>,
    releases: Vec<Document>,
    state: SiteState,
}

impl LaSite {
    pub fn new(year: i32, source: Rc<dyn PageSource>) -> Self {
        Self {
            url: format!("http://www.lasc.org/news_releases/{year}/default.asp"),
            source,
            releases: Vec::new(),
            state: SiteState::Configured,
        }
    }
}

/// Links to releases on the landing page: the cell before any cell that
/// says "Opinion" or "PER CURIAM".
fn release_links(landing: &Document) -> Vec<String> {
    let mut links = Vec::new();
    for td in landing.select(&TD) {
        let says_opinion = direct_text(td)
            .iter()
            .any(|t| t.contains("Opinion") || t.contains("PER CURIAM"));
        if !says_opinion {
            continue;
        }
        let previous = td
            .prev_siblings()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "td");
        if let Some(cell) = previous {
            links.extend(cell.select(&LINK).filter_map(|a| landing.href_of(a)));
        }
    }
    links
}

/// A paragraph that names one or more cases, with the bold heading that
/// precedes it.
struct CaseParagraph<'a> {
    paragraph: ElementRef<'a>,
    links: Vec<ElementRef<'a>>,
    heading: Option<ElementRef<'a>>,
}

/// Walk the release in document order, remembering every `strong` seen so
/// far, and pick out the case paragraphs.
fn case_paragraphs(doc: &Document) -> Vec<CaseParagraph<'_>> {
    let mut headings: Vec<ElementRef<'_>> = Vec::new();
    let mut paragraphs = Vec::new();

    for node in doc.html().root_element().descendants() {
        let Some(el) = ElementRef::wrap(node) else {
            continue;
        };
        match el.value().name() {
            "strong" => headings.push(el),
            "p" => {
                let text: String = el.text().collect();
                if !contains_case_marker(&text) {
                    continue;
                }
                // A heading inside an enclosing element doesn't precede it.
                let heading = headings
                    .iter()
                    .rev()
                    .find(|h| !el.ancestors().any(|a| a.id() == h.id()))
                    .copied();
                let links = el
                    .select(&LINK)
                    .filter(|a| !element_text(*a).is_empty())
                    .collect();
                paragraphs.push(CaseParagraph {
                    paragraph: el,
                    links,
                    heading,
                });
            }
            _ => {}
        }
    }
    paragraphs
}

fn release_date(doc: &Document) -> Option<NaiveDate> {
    let text = collapse_ws(
        &doc.html()
            .root_element()
            .text()
            .filter(|t| collapse_ws(t).contains("day of"))
            .collect::<Vec<_>>()
            .join(" "),
    );
    let caps = RELEASE_DATE_RE.captures(&text)?;
    let normalized = format!("{:0>2} {} {}", &caps[1], &caps[2], &caps[3]);
    NaiveDate::parse_from_str(&normalized, "%d %B %Y").ok()
}

fn case_name(link_text: &str, paragraph: ElementRef<'_>) -> Option<String> {
    let name = match DOCKET_TOKEN_RE.find_iter(link_text).last() {
        Some(docket) => {
            let rest = link_text[docket.end()..].trim();
            if rest.is_empty() {
                // The link is just the docket; the caption is loose text.
                let loose = collapse_ws(&direct_text(paragraph).join(" "));
                WORDS_RE.find(&loose)?.as_str().to_string()
            } else {
                rest.to_string()
            }
        }
        None => WORDS_RE.find(link_text)?.as_str().to_string(),
    };
    Some(titlecase(&name))
}

fn docket_number(link_text: &str, paragraph: ElementRef<'_>) -> Option<String> {
    let docket = |text: &str| DOCKET_RE.captures(text).map(|c| c[1].trim().to_string());
    docket(link_text).or_else(|| docket(&element_text(paragraph)))
}

/// One judge entry per case under each author heading, fitted to `links`.
fn judges(doc: &Document, paragraphs: &[CaseParagraph<'_>], links: usize) -> Vec<String> {
    let mut judges = Vec::new();
    for strong in doc.select(&STRONG) {
        let text = element_text(strong);
        if !(text.contains("J.") || text.contains("CURIAM")) {
            continue;
        }
        let Some(caps) = JUDGE_RE.captures(&text) else {
            continue;
        };
        let matched = caps[1].trim_end_matches([' ', ',']);
        let judge = matched.strip_prefix("BY ").unwrap_or(matched).to_string();
        let key = if judge.contains("CURIAM") { "CURIAM" } else { judge.as_str() };

        let count: usize = paragraphs
            .iter()
            .filter(|p| {
                p.heading.is_some_and(|h| {
                    element_text(h).contains(key) || direct_text(h).iter().any(|t| t.trim() == ":")
                })
            })
            .map(|p| p.links.len())
            .sum();
        debug!(judge = judge.as_str(), cases = count, "Attributed heading");
        judges.extend(std::iter::repeat(judge.clone()).take(count));
    }
    align_front(judges, links)
}

fn extract_release(doc: &Document) -> Result<Vec<CaseRecord>, ScrapeError> {
    let paragraphs = case_paragraphs(doc);
    let links: usize = paragraphs.iter().map(|p| p.links.len()).sum();
    if links == 0 {
        debug!(url = %doc.base_url(), "Release names no cases");
        return Ok(Vec::new());
    }

    let case_date = release_date(doc).ok_or_else(|| {
        ScrapeError::extraction(COURT, "case date", format!("no 'day of' date in {}", doc.base_url()))
    })?;
    let mut judges = judges(doc, &paragraphs, links).into_iter();

    let mut records = Vec::with_capacity(links);
    for p in &paragraphs {
        for &link in &p.links {
            let text = element_text(link);
            let case_name = case_name(&text, p.paragraph)
                .ok_or_else(|| ScrapeError::extraction(COURT, "case name", format!("'{text}'")))?;
            let docket_number = docket_number(&text, p.paragraph)
                .ok_or_else(|| ScrapeError::extraction(COURT, "docket number", format!("'{text}'")))?;
            let download_url = doc
                .href_of(link)
                .ok_or_else(|| ScrapeError::extraction(COURT, "download url", format!("'{text}'")))?;

            records.push(CaseRecord {
                case_name,
                docket_number,
                case_date,
                judges: judges.next().unwrap_or_default(),
                precedential_status: PrecedentialStatus::Published,
                neutral_citation: None,
                summary: None,
                download_url,
            });
        }
    }
    Ok(records)
}

#[async_trait(?Send)]
impl OpinionSite for LaSite {
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
        let landing = Document::from_page(&self.source.get(&self.url).await?)?;
        let links = release_links(&landing);
        if links.is_empty() {
            warn!(court = %COURT, url = self.url.as_str(), "Landing page links no opinion releases");
        }

        let mut releases = Vec::with_capacity(RELEASES_PER_RUN);
        for link in links.iter().take(RELEASES_PER_RUN) {
            let page = self.source.get(link).await?;
            releases.push(Document::from_page(&page)?);
        }
        info!(court = %COURT, releases = releases.len(), "Fetched news releases");

        self.releases = releases;
        self.state = SiteState::Fetched;
        Ok(())
    }

    async fn extract(&mut self) -> Result<RecordSet, ScrapeError> {
        ensure_fetched(COURT, self.state)?;

        let mut records = Vec::new();
        for release in &self.releases {
            let mut found = extract_release(release)?;
            debug!(url = %release.base_url(), cases = found.len(), "Parsed release");
            records.append(&mut found);
        }

        self.state = SiteState::Extracted;
        Ok(RecordSet::new(COURT, records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::testing::StaticSource;
    use crate::site::run_forward;

    const LANDING_URL: &str = "http://www.lasc.org/news_releases/2014/default.asp";
    const RELEASE_35: &str = "http://www.lasc.org/news_releases/2014/2014-035.asp";
    const RELEASE_36: &str = "http://www.lasc.org/news_releases/2014/2014-036.asp";

    const LANDING: &str = r#"
        <table>
          <tr><td><a href="2014-036.asp">News Release #036</a></td><td>Opinion</td></tr>
          <tr><td><a href="/news_releases/2014/2014-035.asp">News Release #035</a></td><td>PER CURIAM Opinions</td></tr>
          <tr><td><a href="2014-034.asp">News Release #034</a></td><td>Opinion</td></tr>
          <tr><td><a href="press.asp">Press</a></td><td>Announcement</td></tr>
        </table>
    "#;

    const RELEASE_A: &str = r#"
        <html><body>
        <p align="center"><strong>NEWS RELEASE # 036</strong></p>
        <p>The Opinions handed down on the <b>7th day of July, 2014</b>, are as follows:</p>
        <p><strong>BY KNOLL, J.:</strong></p>
        <p><a href="/opinions/2014/13-KA-1234.opn.pdf">2013-KA-1234 STATE OF LOUISIANA v. JOHN SMITH (Parish of Orleans)</a></p>
        <p><a href="/opinions/2014/14-C-0099.opn.pdf#page=1">2014-C -0099 ACME, INC. v. DOE</a></p>
        <p><strong>PER CURIAM:</strong></p>
        <p><a href="/opinions/2014/14-OB-0500.opn.pdf">2014-OB-0500 IN RE: MARY JONES</a></p>
        </body></html>
    "#;

    const RELEASE_B: &str = r#"
        <html><body>
        <p>The Opinions handed down on the 14th day of July, 2014, are as follows:</p>
        <p><a href="/opinions/2014/14-KK-0001.opn.pdf">2014-KK-0001 STATE v. ROE</a></p>
        <p><strong>GUIDRY, J.:</strong></p>
        <p><a href="/opinions/2014/14-CC-0002.opn.pdf">2014-CC-0002 DOE vs. ROE</a></p>
        </body></html>
    "#;

    fn source() -> Rc<StaticSource> {
        Rc::new(
            StaticSource::new()
                .with_page(LANDING_URL, LANDING)
                .with_page(RELEASE_36, RELEASE_A)
                .with_page(RELEASE_35, RELEASE_B),
        )
    }

    #[test]
    fn test_release_links_read_the_neighbouring_cell() {
        let landing = Document::parse(LANDING, LANDING_URL).unwrap();
        assert_eq!(
            release_links(&landing),
            vec![
                RELEASE_36,
                RELEASE_35,
                "http://www.lasc.org/news_releases/2014/2014-034.asp"
            ]
        );
    }

    #[tokio::test]
    async fn test_downloads_only_the_two_newest_releases() {
        let source = source();
        let mut site = LaSite::new(2014, source.clone());
        site.download().await.unwrap();
        assert_eq!(source.requests(), vec![LANDING_URL, RELEASE_36, RELEASE_35]);
    }

    #[tokio::test]
    async fn test_records_across_releases() {
        let mut site = LaSite::new(2014, source());
        let set = run_forward(&mut site).await.unwrap();

        assert_eq!(set.len(), 5);
        assert_eq!(
            set.case_names(),
            vec![
                "State of Louisiana v. John Smith (Parish of Orleans)",
                "Acme, Inc. v. Doe",
                "In Re: Mary Jones",
                "State v. Roe",
                "Doe vs. Roe",
            ]
        );
        assert_eq!(
            set.docket_numbers(),
            vec!["2013-KA-1234", "2014-C -0099", "2014-OB-0500", "2014-KK-0001", "2014-CC-0002"]
        );
        let july_7 = NaiveDate::from_ymd_opt(2014, 7, 7).unwrap();
        let july_14 = NaiveDate::from_ymd_opt(2014, 7, 14).unwrap();
        assert_eq!(set.case_dates(), vec![july_7, july_7, july_7, july_14, july_14]);
        assert_eq!(
            set.download_urls()[1],
            "http://www.lasc.org/opinions/2014/14-C-0099.opn.pdf"
        );
        assert!(set
            .precedential_statuses()
            .iter()
            .all(|s| *s == PrecedentialStatus::Published));
    }

    #[tokio::test]
    async fn test_judges_follow_headings_and_pad_at_front() {
        let mut site = LaSite::new(2014, source());
        let set = run_forward(&mut site).await.unwrap();
        assert_eq!(
            set.judges(),
            vec!["KNOLL, J.", "KNOLL, J.", "PER CURIAM", "", "GUIDRY, J."]
        );
        assert_eq!(set.judges().len(), set.case_names().len());
    }

    #[tokio::test]
    async fn test_reextract_is_idempotent() {
        let mut site = LaSite::new(2014, source());
        site.download().await.unwrap();
        let first = site.extract().await.unwrap();
        assert_eq!(first, site.extract().await.unwrap());
    }

    #[test]
    fn test_caption_falls_back_to_paragraph_text() {
        let doc = Document::parse(
            r#"<p><a href="/x.pdf">2014-K-0007</a> STATE v. LONE</p>"#,
            RELEASE_36,
        )
        .unwrap();
        let paragraphs = case_paragraphs(&doc);
        let p = &paragraphs[0];
        assert_eq!(case_name("2014-K-0007", p.paragraph).as_deref(), Some("State v. Lone"));
        assert_eq!(docket_number("2014-K-0007", p.paragraph).as_deref(), Some("2014-K-0007"));
    }

    #[test]
    fn test_docket_falls_back_to_paragraph() {
        let doc = Document::parse(
            r#"<p>2014-CA-0042 <a href="/x.pdf">SMITH v. JONES</a></p>"#,
            RELEASE_36,
        )
        .unwrap();
        let paragraphs = case_paragraphs(&doc);
        let p = &paragraphs[0];
        assert_eq!(docket_number("SMITH v. JONES", p.paragraph).as_deref(), Some("2014-CA-0042"));
        assert_eq!(case_name("SMITH v. JONES", p.paragraph).as_deref(), Some("Smith v. Jones"));
    }

    #[test]
    fn test_release_without_date_is_an_extraction_error() {
        let doc = Document::parse(
            r#"<p><a href="/x.pdf">2014-K-0007 STATE v. LONE</a></p>"#,
            RELEASE_36,
        )
        .unwrap();
        let err = extract_release(&doc).unwrap_err();
        assert!(matches!(err, ScrapeError::Extraction { field: "case date", .. }));
    }

    #[test]
    fn test_release_date_parsing() {
        let doc = Document::parse("<p>on the 1st day of August, 2013</p>", RELEASE_36).unwrap();
        assert_eq!(release_date(&doc), NaiveDate::from_ymd_opt(2013, 8, 1));
    }
}
