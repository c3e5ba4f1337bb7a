//! Paginated SalesRabbit API client

use reqwest::header::{CONTENT_TYPE, IF_MODIFIED_SINCE};
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use sync_core::{EntityType, SyncError};
use watermark::Watermark;

/// Production API root
pub const DEFAULT_BASE_URL: &str = "https://api.salesrabbit.com";

/// Records requested per page
pub const DEFAULT_PAGE_SIZE: u32 = 2000;

/// SalesRabbit connection options
#[derive(Clone, Debug)]
pub struct SalesRabbitOpts {
    pub base_url: String,
    pub access_token: String,
    pub page_size: u32,
}

impl SalesRabbitOpts {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: access_token.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// How a request tells the API to return only records changed since the watermark.
pub trait ChangeFilter: Send + Sync {
    fn apply(&self, request: RequestBuilder, watermark: &Watermark) -> RequestBuilder;
}

/// Sends the watermark verbatim in `If-Modified-Since`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IfModifiedSince;

impl ChangeFilter for IfModifiedSince {
    fn apply(&self, request: RequestBuilder, watermark: &Watermark) -> RequestBuilder {
        request.header(IF_MODIFIED_SINCE, watermark.to_string())
    }
}

/// One API response page.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPage {
    /// The response's `data` payload, untouched
    pub data: Value,
    pub more_pages: bool,
    pub current_page: u32,
}

#[derive(Deserialize)]
struct PageResponse {
    #[serde(default)]
    data: Value,
    #[serde(default)]
    meta: PageMeta,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PageMeta {
    #[serde(default)]
    more_pages: bool,
    current_page: Option<u32>,
}

pub struct SalesRabbitClient {
    http: reqwest::Client,
    opts: SalesRabbitOpts,
    filter: Box<dyn ChangeFilter>,
}

impl SalesRabbitClient {
    pub fn new(opts: SalesRabbitOpts) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| SyncError::transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            opts,
            filter: Box::new(IfModifiedSince),
        })
    }

    /// Replace the default `If-Modified-Since` filter.
    pub fn with_change_filter(mut self, filter: impl ChangeFilter + 'static) -> Self {
        self.filter = Box::new(filter);
        self
    }

    fn endpoint_url(&self, entity: EntityType) -> String {
        format!(
            "{}/{}",
            self.opts.base_url.trim_end_matches('/'),
            entity.endpoint()
        )
    }

    /// Fetch every page changed since `watermark`, in page order.
    ///
    /// A `304 Not Modified` on any page means nothing changed and yields no
    /// pages, dropping whatever was gathered before it. Any other non-success
    /// status is fatal; nothing is retried.
    pub async fn fetch_pages(
        &self,
        entity: EntityType,
        watermark: &Watermark,
    ) -> Result<Vec<RawPage>, SyncError> {
        let url = self.endpoint_url(entity);
        let mut pages = Vec::new();
        let mut page: u32 = 1;

        loop {
            let request = self
                .http
                .get(&url)
                .bearer_auth(&self.opts.access_token)
                .header(CONTENT_TYPE, "application/json")
                .query(&[("perPage", self.opts.page_size), ("page", page)]);
            let request = self.filter.apply(request, watermark);

            let response = request
                .send()
                .await
                .map_err(|e| SyncError::transport(format!("GET {url} (page {page}): {e}")))?;

            let status = response.status();
            // Any 304 discards the whole run, including pages already fetched.
            if status == StatusCode::NOT_MODIFIED {
                tracing::info!("No {entity} changes since {watermark} (page {page})");
                return Ok(Vec::new());
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(SyncError::transport_status(status.as_u16(), body));
            }

            let bytes = response.bytes().await.map_err(|e| {
                SyncError::transport(format!("Failed to read page {page} from {url}: {e}"))
            })?;
            let parsed: PageResponse = serde_json::from_slice(&bytes).map_err(|e| {
                SyncError::transport(format!("Invalid JSON on page {page} from {url}: {e}"))
            })?;

            let more_pages = parsed.meta.more_pages;
            tracing::debug!(
                "Fetched {entity} page {page} ({} bytes, more pages: {more_pages})",
                bytes.len()
            );
            pages.push(RawPage {
                data: parsed.data,
                more_pages,
                current_page: parsed.meta.current_page.unwrap_or(page),
            });

            if !more_pages {
                break;
            }
            page += 1;
        }

        tracing::info!("Fetched {} pages of {entity}", pages.len());
        Ok(pages)
    }
}
