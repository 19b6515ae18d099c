pub mod error;
pub mod types;

pub use error::{FlickrError, Result};
pub use types::{Photo, PhotoPage, SearchParams};

use std::time::Duration;

use types::SearchResponse;

const BASE_URL: &str = "https://api.flickr.com/services/rest/";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct FlickrClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl FlickrClient {
    pub fn new(api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_key,
            base_url: BASE_URL.to_string(),
        })
    }

    /// Point the client at a different REST endpoint (a local stub in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Run `flickr.photos.search` and return one page of results.
    pub async fn search_page(&self, params: &SearchParams) -> Result<PhotoPage> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(&params.to_query())
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(FlickrError::Http {
                status: status.as_u16(),
                message: body,
            });
        }

        decode_search_page(&body)
    }

    /// Run `flickr.photos.search` and return the photos on the first page.
    pub async fn search_photos(&self, params: &SearchParams) -> Result<Vec<Photo>> {
        tracing::debug!(
            lat = params.lat,
            lon = params.lon,
            radius_km = params.radius_km,
            "Flickr photo search"
        );

        let page = self.search_page(params).await?;
        tracing::debug!(
            count = page.photo.len(),
            total = page.total,
            "Flickr photo search complete"
        );
        Ok(page.photo)
    }
}

/// Decode a `flickr.photos.search` body, turning a `"stat": "fail"` envelope
/// into [`FlickrError::Api`].
pub fn decode_search_page(body: &str) -> Result<PhotoPage> {
    let resp: SearchResponse = serde_json::from_str(body)?;
    if resp.stat != "ok" {
        return Err(FlickrError::Api {
            code: resp.code.unwrap_or_default(),
            message: resp.message.unwrap_or_else(|| format!("stat={}", resp.stat)),
        });
    }
    resp.photos
        .ok_or_else(|| FlickrError::Parse("response has no photos element".to_string()))
}
