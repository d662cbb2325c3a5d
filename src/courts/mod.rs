// =============================================================================
// courts/mod.rs - THE ROSTER
// =============================================================================
//
// One module per court website. Each one knows exactly one site's markup and
// nothing else, and each one implements `OpinionSite` so the binary can treat
// a Louisiana press release and a Texas search grid the same way.
//
// Some modules cover two courts. The Court of Federal Claims runs its regular
// opinions and its vaccine decisions off the same feed software, and the New
// Mexico Supreme Court and Court of Appeals share one grid layout.
// =============================================================================

pub mod la;
pub mod nm;
pub mod ohio;
pub mod tex;
pub mod uscfc;

use std::rc::Rc;

use chrono::{Datelike, Local};

use crate::browser::BrowserLauncher;
use crate::config::Config;
use crate::error::ScrapeError;
use crate::fetcher::PageSource;
use crate::models::CourtId;
use crate::site::OpinionSite;

/// Build the site for `court`, configured and ready to download.
///
/// Only Texas uses the browser launcher; nothing is launched here.
pub fn build_site(
    court: CourtId,
    config: &Config,
    source: Rc<dyn PageSource>,
    launcher: Rc<dyn BrowserLauncher>,
) -> Result<Box<dyn OpinionSite>, ScrapeError> {
    let site: Box<dyn OpinionSite> = match court {
        CourtId::La => Box::new(la::LaSite::new(Local::now().year(), source)),
        CourtId::Ohio => Box::new(ohio::OhioSite::new(
            config.ohio_court_index,
            config.ohio_year,
            source,
        )?),
        CourtId::Tex => Box::new(tex::TexasSite::new(config, launcher, source)?),
        CourtId::Uscfc => Box::new(uscfc::UscfcSite::opinions(source)),
        CourtId::UscfcVaccine => Box::new(uscfc::UscfcSite::vaccine(source)),
        CourtId::Nm => Box::new(nm::NmSite::supreme(source)),
        CourtId::NmCtAppSlip => Box::new(nm::NmSite::appeals_slip(source)),
    };
    Ok(site)
}
