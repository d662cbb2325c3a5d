// =============================================================================
// models.rs - THE SHAPE OF A COURT OPINION, ONCE WE'VE PRIED IT LOOSE
// =============================================================================
//
// Every court publishes opinions differently. Some use tables, some use
// paragraphs with bold judge names, one uses an ASP.NET grid that only
// renders inside a real browser. By the time anything reaches this module,
// those differences are gone: a case is a case.
//
// Fields for one case are bound together when they are extracted, so a
// record set can never hand out a docket number that belongs to the case
// next door.
// =============================================================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ScrapeError;

/// The courts we know how to scrape.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CourtId {
    /// Louisiana Supreme Court news releases
    #[serde(rename = "la")]
    La,
    /// Supreme Court of Ohio (and, by index, the courts of appeals)
    #[serde(rename = "ohio")]
    Ohio,
    /// Texas Supreme Court and appellate courts, via the TAMES search
    #[serde(rename = "tex")]
    Tex,
    /// United States Court of Federal Claims
    #[serde(rename = "uscfc")]
    Uscfc,
    /// Court of Federal Claims, Office of Special Masters (vaccine cases)
    #[serde(rename = "uscfc_vaccine")]
    UscfcVaccine,
    /// New Mexico Supreme Court
    #[serde(rename = "nm")]
    Nm,
    /// New Mexico Court of Appeals slip opinions
    #[serde(rename = "nmctapp_slip")]
    NmCtAppSlip,
}

impl CourtId {
    pub const ALL: [CourtId; 7] = [
        CourtId::La,
        CourtId::Ohio,
        CourtId::Tex,
        CourtId::Uscfc,
        CourtId::UscfcVaccine,
        CourtId::Nm,
        CourtId::NmCtAppSlip,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CourtId::La => "la",
            CourtId::Ohio => "ohio",
            CourtId::Tex => "tex",
            CourtId::Uscfc => "uscfc",
            CourtId::UscfcVaccine => "uscfc_vaccine",
            CourtId::Nm => "nm",
            CourtId::NmCtAppSlip => "nmctapp_slip",
        }
    }
}

impl fmt::Display for CourtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CourtId {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        CourtId::ALL
            .into_iter()
            .find(|court| court.as_str() == wanted)
            .ok_or_else(|| ScrapeError::UnknownCourt(s.to_string()))
    }
}

/// Whether an opinion is binding precedent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PrecedentialStatus {
    Published,
    Unpublished,
}

impl fmt::Display for PrecedentialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrecedentialStatus::Published => write!(f, "Published"),
            PrecedentialStatus::Unpublished => write!(f, "Unpublished"),
        }
    }
}

/// One case, as published by one court.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    /// Title-cased where the court shouts in capitals.
    pub case_name: String,

    pub docket_number: String,

    /// The decision date. For courts that only give a release date, that.
    pub case_date: NaiveDate,

    /// Authoring judge(s). Empty when the page does not say.
    pub judges: String,

    pub precedential_status: PrecedentialStatus,

    /// Court-assigned, reporter-independent citation, e.g. "2014 Ohio 3123".
    pub neutral_citation: Option<String>,

    /// Only Ohio publishes these on the listing page.
    pub summary: Option<String>,

    /// Always absolute, never carries a `#fragment`.
    pub download_url: String,
}

/// Everything one scrape of one court produced.
///
/// The column accessors exist for harnesses that want the classic
/// "parallel lists" view. They are all derived from the same records, so
/// they are always the same length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSet {
    pub court: CourtId,
    pub records: Vec<CaseRecord>,
}

impl RecordSet {
    pub fn new(court: CourtId, records: Vec<CaseRecord>) -> Self {
        Self { court, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn case_names(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.case_name.as_str()).collect()
    }

    pub fn docket_numbers(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.docket_number.as_str()).collect()
    }

    pub fn case_dates(&self) -> Vec<NaiveDate> {
        self.records.iter().map(|r| r.case_date).collect()
    }

    pub fn judges(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.judges.as_str()).collect()
    }

    pub fn precedential_statuses(&self) -> Vec<PrecedentialStatus> {
        self.records.iter().map(|r| r.precedential_status).collect()
    }

    pub fn neutral_citations(&self) -> Vec<Option<&str>> {
        self.records
            .iter()
            .map(|r| r.neutral_citation.as_deref())
            .collect()
    }

    pub fn summaries(&self) -> Vec<Option<&str>> {
        self.records.iter().map(|r| r.summary.as_deref()).collect()
    }

    pub fn download_urls(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.download_url.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> CaseRecord {
        CaseRecord {
            case_name: name.to_string(),
            docket_number: "13-123".to_string(),
            case_date: NaiveDate::from_ymd_opt(2014, 7, 10).unwrap(),
            judges: String::new(),
            precedential_status: PrecedentialStatus::Published,
            neutral_citation: None,
            summary: None,
            download_url: "http://example.com/a.pdf".to_string(),
        }
    }

    #[test]
    fn test_court_id_round_trips_through_str() {
        for court in CourtId::ALL {
            assert_eq!(court.as_str().parse::<CourtId>().unwrap(), court);
        }
        assert_eq!(" OHIO ".parse::<CourtId>().unwrap(), CourtId::Ohio);
    }

    #[test]
    fn test_unknown_court_is_rejected() {
        let err = "narnia".parse::<CourtId>().unwrap_err();
        assert!(matches!(err, ScrapeError::UnknownCourt(ref s) if s == "narnia"));
    }

    #[test]
    fn test_columns_share_length() {
        let set = RecordSet::new(CourtId::Nm, vec![record("A v. B"), record("In re C")]);
        assert_eq!(set.case_names(), vec!["A v. B", "In re C"]);
        assert_eq!(set.docket_numbers().len(), 2);
        assert_eq!(set.case_dates().len(), 2);
        assert_eq!(set.judges().len(), 2);
        assert_eq!(set.precedential_statuses().len(), 2);
        assert_eq!(set.neutral_citations().len(), 2);
        assert_eq!(set.summaries().len(), 2);
        assert_eq!(set.download_urls().len(), 2);
    }

    #[test]
    fn test_record_serializes_with_court_names() {
        let set = RecordSet::new(CourtId::NmCtAppSlip, vec![record("A v. B")]);
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["court"], "nmctapp_slip");
        assert_eq!(json["records"][0]["case_date"], "2014-07-10");
        assert_eq!(json["records"][0]["precedential_status"], "Published");
    }
}
