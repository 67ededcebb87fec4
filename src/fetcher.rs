//! Record fetching
//!
//! One call to [`RecordSource::fetch`] is one network round trip. Retrying is the
//! job of [`crate::retry`]; persistence is the job of [`crate::aggregator`].

use crate::config::{ApiConfig, ID_PLACEHOLDER};
use crate::error::{FetchError, Result};
use crate::types::{ProductId, ProductRecord};
use crate::utils::{clean_description, encode_path_segment};
use serde::Deserialize;

/// Abstraction over the remote product API, enabling testability.
#[async_trait::async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch and decode the record for `id` with exactly one request
    async fn fetch(&self, id: &ProductId) -> std::result::Result<ProductRecord, FetchError>;
}

/// Production [`RecordSource`] backed by a shared `reqwest` client.
pub struct HttpRecordFetcher {
    client: reqwest::Client,
    url_template: String,
}

impl HttpRecordFetcher {
    /// Build a fetcher with the configured timeout and User-Agent
    ///
    /// `max_idle_per_host` should match the concurrency limit so every in-flight
    /// request can reuse a pooled connection.
    pub fn new(config: &ApiConfig, max_idle_per_host: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .pool_max_idle_per_host(max_idle_per_host)
            .build()?;

        Ok(Self {
            client,
            url_template: config.url_template.clone(),
        })
    }

    /// Request URL for an identifier
    pub fn url_for(&self, id: &ProductId) -> String {
        self.url_template
            .replace(ID_PLACEHOLDER, &encode_path_segment(id.as_str()))
    }
}

#[async_trait::async_trait]
impl RecordSource for HttpRecordFetcher {
    async fn fetch(&self, id: &ProductId) -> std::result::Result<ProductRecord, FetchError> {
        let url = self.url_for(id);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let raw: RawProduct = serde_json::from_slice(&body)?;
        Ok(raw.into_record())
    }
}

/// Product detail document as returned by the API (only the fields we keep)
///
/// Decoding is lenient: any JSON object is accepted and each field is taken as
/// whatever type the API sent.
#[derive(Debug, Default, Deserialize)]
pub struct RawProduct {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    name: Option<serde_json::Value>,
    #[serde(default)]
    url_key: Option<serde_json::Value>,
    #[serde(default)]
    price: Option<serde_json::Value>,
    #[serde(default)]
    description: Option<serde_json::Value>,
    #[serde(default)]
    images: Option<RawImages>,
}

/// The `images` field: normally a list, occasionally a lone entry
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawImages {
    List(Vec<RawImage>),
    Single(RawImage),
}

/// An image entry: either a bare URL or an object with size-specific URLs
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawImage {
    Url(String),
    Object(serde_json::Map<String, serde_json::Value>),
    Other(serde_json::Value),
}

/// URL fields checked on image objects, in order of preference
const IMAGE_URL_FIELDS: [&str; 6] = [
    "base_url",
    "large_url",
    "medium_url",
    "small_url",
    "thumbnail_url",
    "url",
];

impl RawImage {
    fn into_url(self) -> Option<String> {
        match self {
            RawImage::Url(url) => Some(url),
            RawImage::Object(fields) => IMAGE_URL_FIELDS
                .iter()
                .find_map(|key| fields.get(*key).and_then(|v| v.as_str()))
                .map(str::to_string),
            RawImage::Other(_) => None,
        }
    }
}

impl RawImages {
    fn into_vec(self) -> Vec<RawImage> {
        match self {
            RawImages::List(images) => images,
            RawImages::Single(image) => vec![image],
        }
    }
}

/// Text of a scalar field; non-string values keep their JSON rendering
fn lenient_text(value: Option<serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::Null => None,
        serde_json::Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

impl RawProduct {
    /// Map the raw document to a [`ProductRecord`], cleaning the description
    pub fn into_record(self) -> ProductRecord {
        let product_id = self.id.clone();
        let images = self
            .images
            .map(RawImages::into_vec)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|image| {
                let url = image.into_url();
                if url.is_none() {
                    tracing::debug!(product_id = ?product_id, "Skipping image entry without a URL");
                }
                url
            })
            .collect();

        let description = lenient_text(self.description);
        ProductRecord {
            id: self.id.filter(|id| !id.is_null()),
            name: lenient_text(self.name),
            url_key: lenient_text(self.url_key),
            price: self.price.filter(|price| !price.is_null()),
            description: clean_description(description.as_deref()),
            images,
        }
    }
}
