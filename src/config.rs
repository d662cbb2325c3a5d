// =============================================================================
// config.rs - THE KNOBS
// =============================================================================
//
// Every tunable lives here and every one of them can be set from the
// environment, prefixed with OPINION_SCRAPER_. A `.env` file in the working
// directory is honored too.
//
// Nothing here controls retries, rate limits or schedules. There aren't any.
// Each run fetches a handful of pages, one after another, and exits.
// =============================================================================

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{Datelike, Local, NaiveDate};
use tracing::warn;

use crate::models::CourtId;

#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // WHAT TO RUN
    // =========================================================================

    /// Courts to scrape, in order. Default: all of them.
    pub courts: Vec<CourtId>,

    /// Walk each court's historical cursors instead of the current listing.
    pub back_scrape: bool,

    // =========================================================================
    // HTTP
    // =========================================================================

    /// Sent on every request. Court IT departments like to know who we are.
    pub user_agent: String,

    // =========================================================================
    // HEADLESS BROWSER (Texas only)
    // =========================================================================

    /// Local Chrome/Chromium binary.
    pub chromium_path: PathBuf,

    pub browser_headless: bool,

    /// How long to poll for an element before giving up on it.
    pub browser_element_wait: Duration,

    // =========================================================================
    // PER-COURT KNOBS
    // =========================================================================

    /// Texas court short name: `sc`, `ccrimapp`, `capp_1` .. `capp_14`.
    pub tex_court: String,

    /// Upper end of the Texas search window. Default: today.
    pub tex_case_date: NaiveDate,

    /// How many days back the Texas search window reaches.
    pub tex_lookback_days: i64,

    /// Ohio `Source` parameter: 0 is the Supreme Court, 1-12 the district
    /// courts of appeals, 13 the Court of Claims.
    pub ohio_court_index: u8,

    pub ohio_year: i32,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults that work with no environment at all.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let today = Local::now().date_naive();

        Config {
            courts: parse_courts(&env_or_default("OPINION_SCRAPER_COURTS", "")),
            back_scrape: parse_bool(&env_or_default("OPINION_SCRAPER_BACK_SCRAPE", "false")),

            user_agent: env_or_default(
                "OPINION_SCRAPER_USER_AGENT",
                concat!("opinion-scrapers/", env!("CARGO_PKG_VERSION")),
            ),

            chromium_path: PathBuf::from(env_or_default(
                "OPINION_SCRAPER_CHROMIUM_PATH",
                "/usr/bin/chromium",
            )),
            browser_headless: parse_bool(&env_or_default("OPINION_SCRAPER_BROWSER_HEADLESS", "true")),
            browser_element_wait: Duration::from_secs(
                env_or_default("OPINION_SCRAPER_BROWSER_WAIT_SECS", "10").parse().unwrap_or(10),
            ),

            tex_court: env_or_default("OPINION_SCRAPER_TEX_COURT", "sc"),
            tex_case_date: env::var("OPINION_SCRAPER_TEX_CASE_DATE")
                .ok()
                .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
                .unwrap_or(today),
            tex_lookback_days: env_or_default("OPINION_SCRAPER_TEX_LOOKBACK_DAYS", "5")
                .parse()
                .unwrap_or(5),

            ohio_court_index: env_or_default("OPINION_SCRAPER_OHIO_COURT_INDEX", "0")
                .parse()
                .unwrap_or(0),
            ohio_year: env_or_default("OPINION_SCRAPER_OHIO_YEAR", &today.year().to_string())
                .parse()
                .unwrap_or(today.year()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let today = Local::now().date_naive();
        Config {
            courts: CourtId::ALL.to_vec(),
            back_scrape: false,
            user_agent: concat!("opinion-scrapers/", env!("CARGO_PKG_VERSION")).to_string(),
            chromium_path: PathBuf::from("/usr/bin/chromium"),
            browser_headless: true,
            browser_element_wait: Duration::from_secs(10),
            tex_court: "sc".to_string(),
            tex_case_date: today,
            tex_lookback_days: 5,
            ohio_court_index: 0,
            ohio_year: today.year(),
        }
    }
}

/// Comma-separated court ids. Unknown names are logged and skipped; an empty
/// list means every court.
fn parse_courts(raw: &str) -> Vec<CourtId> {
    let mut courts = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match name.parse::<CourtId>() {
            Ok(court) if !courts.contains(&court) => courts.push(court),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Ignoring unknown court in OPINION_SCRAPER_COURTS"),
        }
    }
    if courts.is_empty() {
        CourtId::ALL.to_vec()
    } else {
        courts
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
