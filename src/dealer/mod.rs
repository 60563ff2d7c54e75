//! Client for the dealership website: inventory feed and listing detail pages.

pub mod errors;
pub mod extract;
pub mod listings;

pub use errors::DealerError;

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use crate::data::models::Candidate;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0 Safari/537.36";

const FEED_TIMEOUT: Duration = Duration::from_secs(20);
const DETAIL_TIMEOUT: Duration = Duration::from_secs(25);

/// Where listing HTML comes from.
///
/// The batch scanner only talks to this trait, so it can be driven by the live
/// site or by canned pages.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Origin used to resolve relative links and image paths.
    fn base_url(&self) -> &Url;

    /// One page of the inventory feed as an HTML fragment. May be empty.
    async fn fetch_feed_page(&self, limit: u32, offset: u32) -> Result<String, DealerError>;

    /// A listing detail page.
    async fn fetch_page(&self, url: &str) -> Result<String, DealerError>;
}

/// Fetch one listing page and extract a candidate record from it.
///
/// Fetch failures propagate; markup problems only leave fields empty.
pub async fn scrape_listing<S>(source: &S, url: &str) -> Result<Candidate, DealerError>
where
    S: ListingSource + ?Sized,
{
    let body = source.fetch_page(url).await?;
    let candidate = extract::extract_listing(&body, url, source.base_url());
    trace!(url, missing = ?candidate.missing_title_fields(), "extracted listing");
    Ok(candidate)
}

/// `reqwest`-backed client for the live site.
pub struct DealerClient {
    http: reqwest::Client,
    base_url: Url,
}

impl DealerClient {
    pub fn new(base_url: Url) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { http, base_url })
    }

    /// The paginated inventory endpoint (includes sold cars; those are filtered per card).
    pub fn feed_url(&self, limit: u32, offset: u32) -> Result<Url, DealerError> {
        let mut url = self
            .base_url
            .join("isapi_xml.php")
            .map_err(|_| DealerError::InvalidUrl(self.base_url.to_string()))?;
        url.query_pairs_mut()
            .append_pair("module", "inventory")
            .append_pair("sold", "365_days")
            .append_pair("main", "")
            .append_pair("limit", &limit.to_string())
            .append_pair("orderby", "sold")
            .append_pair("offset", &offset.to_string());
        Ok(url)
    }

    async fn get_text(&self, url: &str, timeout: Duration) -> Result<String, DealerError> {
        let resp = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|source| DealerError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DealerError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        resp.text().await.map_err(|source| DealerError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl ListingSource for DealerClient {
    fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn fetch_feed_page(&self, limit: u32, offset: u32) -> Result<String, DealerError> {
        let url = self.feed_url(limit, offset)?;
        debug!(limit, offset, "fetching inventory feed page");
        self.get_text(url.as_str(), FEED_TIMEOUT).await
    }

    async fn fetch_page(&self, url: &str) -> Result<String, DealerError> {
        Url::parse(url).map_err(|_| DealerError::InvalidUrl(url.to_string()))?;
        self.get_text(url, DETAIL_TIMEOUT).await
    }
}
