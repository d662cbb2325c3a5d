// ╔═╗╔═╗╦╔╗╔╦╔═╗╔╗╔  ╔═╗╔═╗╦═╗╔═╗╔═╗╔═╗╦═╗╔═╗
// ║ ║╠═╝║║║║║║ ║║║║  ╚═╗║  ╠╦╝╠═╣╠═╝║╣ ╠╦╝╚═╗
// ╚═╝╩  ╩╝╚╝╩╚═╝╝╚╝  ╚═╝╚═╝╩╚═╩ ╩╩  ╚═╝╩╚═╚═╝
//
// Seven courts. Seven websites. Seven opinions about what HTML is for.
//
// Each run walks the configured courts one after another, scrapes the current
// listing (or the historical archive, when back-scraping), and prints one
// JSON object per case on stdout. Logs go to stderr so the output can be
// piped straight into whatever wants the records.

mod browser;
mod config;
mod courts;
mod deferred;
mod error;
mod fetcher;
mod models;
mod site;
mod text;

use std::io::{self, Write};
use std::rc::Rc;

use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::browser::{BrowserLauncher, ChromiumLauncher};
use crate::config::Config;
use crate::error::ScrapeError;
use crate::fetcher::{HttpSource, PageSource};
use crate::models::{CaseRecord, CourtId, PrecedentialStatus, RecordSet};
use crate::site::{run_back_scrape, run_forward, BackScrapeCursor};

/// One line of output: a record plus where it came from.
#[derive(Serialize)]
struct OutputLine<'a> {
    court: CourtId,
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<String>,
    #[serde(flatten)]
    record: &'a CaseRecord,
}

/// What one record set looks like column by column. Blank required fields
/// mean a court changed its markup.
#[derive(Debug, Default, PartialEq, Eq)]
struct ColumnSummary {
    records: usize,
    blank_names: usize,
    blank_dockets: usize,
    blank_urls: usize,
    with_judges: usize,
    unpublished: usize,
    with_citation: usize,
    with_summary: usize,
    earliest: Option<NaiveDate>,
    latest: Option<NaiveDate>,
}

fn summarize(set: &RecordSet) -> ColumnSummary {
    let blank = |column: Vec<&str>| column.iter().filter(|v| v.trim().is_empty()).count();
    let dates = set.case_dates();
    ColumnSummary {
        records: set.len(),
        blank_names: blank(set.case_names()),
        blank_dockets: blank(set.docket_numbers()),
        blank_urls: blank(set.download_urls()),
        with_judges: set.judges().iter().filter(|j| !j.trim().is_empty()).count(),
        unpublished: set
            .precedential_statuses()
            .iter()
            .filter(|s| matches!(s, PrecedentialStatus::Unpublished))
            .count(),
        with_citation: set.neutral_citations().iter().flatten().count(),
        with_summary: set.summaries().iter().flatten().count(),
        earliest: dates.iter().min().copied(),
        latest: dates.iter().max().copied(),
    }
}

fn print_banner() {
    let banner = r#"
    ╔══════════════════════════════════════════════════════════╗
    ║                                                          ║
    ║   ╔═╗╔═╗╦╔╗╔╦╔═╗╔╗╔  ╔═╗╔═╗╦═╗╔═╗╔═╗╔═╗╦═╗╔═╗            ║
    ║   ║ ║╠═╝║║║║║║ ║║║║  ╚═╗║  ╠╦╝╠═╣╠═╝║╣ ╠╦╝╚═╗            ║
    ║   ╚═╝╩  ╩╝╚╝╩╚═╝╝╚╝  ╚═╝╚═╝╩╚═╩ ╩╩  ╚═╝╩╚═╚═╝            ║
    ║                                                          ║
    ║   Courts:  LA | OH | TX | USCFC | USCFC-VAX | NM | NMCA  ║
    ║   Output:  JSON lines on stdout                          ║
    ║                                                          ║
    ╚══════════════════════════════════════════════════════════╝
    "#;
    eprintln!("{banner}");
}

/// Scrape one court, forward or backward, into labelled record sets.
async fn scrape_court(
    court: CourtId,
    config: &Config,
    source: &Rc<dyn PageSource>,
    launcher: &Rc<dyn BrowserLauncher>,
) -> Result<Vec<(Option<BackScrapeCursor>, RecordSet)>, ScrapeError> {
    let mut site = courts::build_site(court, config, Rc::clone(source), Rc::clone(launcher))?;

    if config.back_scrape {
        let cursors = site.back_scrape_cursors();
        let results = run_back_scrape(site.as_mut(), &cursors).await?;
        Ok(results
            .into_iter()
            .map(|(cursor, set)| (Some(cursor), set))
            .collect())
    } else {
        Ok(vec![(None, run_forward(site.as_mut()).await?)])
    }
}

fn emit(out: &mut impl Write, cursor: Option<BackScrapeCursor>, set: &RecordSet) -> anyhow::Result<()> {
    for record in &set.records {
        let line = OutputLine {
            court: set.court,
            cursor: cursor.map(|c| c.to_string()),
            record,
        };
        serde_json::to_writer(&mut *out, &line).context("Failed to serialize record")?;
        writeln!(out).context("Failed to write record")?;
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .with_target(true)
        .with_line_number(true)
        .init();

    print_banner();

    let config = Config::from_env();
    info!(
        courts = ?config.courts,
        back_scrape = config.back_scrape,
        user_agent = config.user_agent.as_str(),
        "Configuration loaded"
    );

    let source: Rc<dyn PageSource> =
        Rc::new(HttpSource::new(&config).context("Failed to build HTTP client")?);
    let launcher: Rc<dyn BrowserLauncher> = Rc::new(ChromiumLauncher::new(&config));

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut failed = Vec::new();
    let mut total = 0usize;

    for &court in &config.courts {
        match scrape_court(court, &config, &source, &launcher).await {
            Ok(sets) => {
                for (cursor, set) in &sets {
                    let summary = summarize(set);
                    if set.is_empty() {
                        warn!(court = %court, "No records found");
                    } else if summary.blank_names + summary.blank_dockets + summary.blank_urls > 0 {
                        warn!(court = %court, ?summary, "Records with blank required fields");
                    } else {
                        debug!(court = %court, ?summary, "Record set");
                    }
                    total += set.len();
                    emit(&mut out, *cursor, set)?;
                }
                out.flush().context("Failed to flush stdout")?;
            }
            Err(e) => {
                error!(court = %court, error = %e, "Court scrape failed");
                failed.push(court);
            }
        }
    }

    info!(
        records = total,
        courts = config.courts.len(),
        failed = failed.len(),
        "Run complete"
    );

    if !failed.is_empty() && failed.len() == config.courts.len() {
        anyhow::bail!("every configured court failed: {failed:?}");
    }
    Ok(())
}
