// =============================================================================
// fetcher.rs - ONE GET, ONE DOCUMENT
// =============================================================================
//
// Every court module fetches pages through a `PageSource`. In production that
// is `HttpSource`, a thin wrapper over reqwest. In tests it's a map of URLs to
// fixture HTML, so no test ever touches a court's server.
//
// Two rules hold for anything that comes out of here:
//   1. A non-2xx status is an error. We don't retry, we don't guess.
//   2. A body declared as ISO-8859-1 is decoded as windows-1252. Court
//      servers say Latin-1 and then send curly quotes from Word. A body
//      that declares nothing is UTF-8 if it is valid UTF-8, and
//      windows-1252 if it isn't.
// =============================================================================

use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};
use url::Url;

use crate::config::Config;
use crate::error::ScrapeError;

/// A response body, already decoded to text.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects. Relative links resolve against this.
    pub url: String,
    pub body: String,
}

/// Anything that can turn a URL into page text.
#[async_trait(?Send)]
pub trait PageSource {
    async fn get(&self, url: &str) -> Result<FetchedPage, ScrapeError>;
}

/// The real thing: HTTP(S) over reqwest.
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(config: &Config) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait(?Send)]
impl PageSource for HttpSource {
    async fn get(&self, url: &str) -> Result<FetchedPage, ScrapeError> {
        debug!(url, "Fetching page");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let charset = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_from_content_type);
        let bytes = response.bytes().await?;
        let body = decode_body(&bytes, charset.as_deref());

        info!(
            url = final_url.as_str(),
            bytes = bytes.len(),
            charset = charset.as_deref().unwrap_or("undeclared"),
            "Fetched page"
        );

        Ok(FetchedPage {
            url: final_url,
            body,
        })
    }
}

/// Pull the `charset=` parameter out of a Content-Type header value.
pub fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"').to_string())
        } else {
            None
        }
    })
}

/// Pick the decoder for a declared charset.
///
/// ISO-8859-1 is always upgraded to windows-1252, which agrees with it on
/// every printable Latin-1 character and adds the 0x80-0x9F punctuation
/// that servers actually send. No charset means UTF-8; see [`decode_body`]
/// for what happens when that guess is wrong.
pub fn encoding_for(charset: Option<&str>) -> &'static Encoding {
    match charset {
        None => UTF_8,
        Some(label) if label.trim().eq_ignore_ascii_case("iso-8859-1") => WINDOWS_1252,
        Some(label) => Encoding::for_label(label.trim().as_bytes()).unwrap_or(UTF_8),
    }
}

pub fn decode_body(bytes: &[u8], charset: Option<&str>) -> String {
    if charset.is_none() {
        let unmarked = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        if let Some(text) = UTF_8.decode_without_bom_handling_and_without_replacement(unmarked) {
            return text.into_owned();
        }
        debug!("Undeclared body is not UTF-8; decoding as windows-1252");
        let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
        return text.into_owned();
    }

    let (text, _, had_errors) = encoding_for(charset).decode(bytes);
    if had_errors {
        debug!(charset, "Body contained bytes invalid for its charset");
    }
    text.into_owned()
}

/// A parsed page plus the URL it came from.
///
/// Links are never read raw: [`Document::absolute_link`] resolves them
/// against the page URL and strips in-page `#anchors`, which is as good as
/// having rewritten every link in the tree.
#[derive(Debug)]
pub struct Document {
    html: Html,
    base: Url,
}

impl Document {
    pub fn parse(body: &str, base_url: &str) -> Result<Self, ScrapeError> {
        let base = Url::parse(base_url).map_err(|source| ScrapeError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;
        Ok(Self {
            html: Html::parse_document(body),
            base,
        })
    }

    pub fn from_page(page: &FetchedPage) -> Result<Self, ScrapeError> {
        Self::parse(&page.body, &page.url)
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn select<'a, 'b>(&'a self, selector: &'b Selector) -> scraper::html::Select<'a, 'b> {
        self.html.select(selector)
    }

    /// Resolve `href` against the page and drop any fragment.
    pub fn absolute_link(&self, href: &str) -> Option<String> {
        let mut url = self.base.join(href.trim()).ok()?;
        url.set_fragment(None);
        Some(url.to_string())
    }

    /// The absolute `href` of an element, if it has one.
    pub fn href_of(&self, el: ElementRef<'_>) -> Option<String> {
        el.value().attr("href").and_then(|href| self.absolute_link(href))
    }
}
