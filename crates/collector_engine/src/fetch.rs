use std::sync::mpsc;
use std::time::Duration;

use collector_logging::{collector_debug, collector_info, collector_warn};
use futures_util::StreamExt;

use crate::envelope::{decode_page, Page};
use crate::{CollectEvent, FailureKind, FetchError, RequestParams};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_bytes: 32 * 1024 * 1024,
        }
    }
}

/// Receives progress and retry diagnostics from the page loop.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: CollectEvent);
}

/// Writes every event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn emit(&self, event: CollectEvent) {
        match event {
            CollectEvent::Discovered {
                total_count,
                num_of_rows,
                total_pages,
            } => collector_info!(
                "total records: {total_count}, page size: {num_of_rows}, total pages: {total_pages}"
            ),
            CollectEvent::PageFetched {
                page,
                total_pages,
                items,
            } => collector_info!("page {page}/{total_pages}: {items} items"),
            CollectEvent::RetryScheduled {
                page,
                attempt,
                max_retries,
                error,
            } => collector_warn!(
                "page {page} request failed: {error}. retry {attempt}/{max_retries}..."
            ),
            CollectEvent::PageAbandoned {
                page,
                attempts,
                error,
            } => collector_warn!(
                "page {page} failed after {attempts} attempts ({error}); stopping collection"
            ),
        }
    }
}

pub struct ChannelProgressSink {
    tx: mpsc::Sender<CollectEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: mpsc::Sender<CollectEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: CollectEvent) {
        let _ = self.tx.send(event);
    }
}

/// One GET against the paginated endpoint.
#[async_trait::async_trait]
pub trait ApiClient: Send + Sync {
    async fn get_page(&self, params: &RequestParams) -> Result<Page, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestApiClient {
    base_url: reqwest::Url,
    settings: FetchSettings,
    client: reqwest::Client,
}

impl ReqwestApiClient {
    pub fn new(base_url: &str, settings: FetchSettings) -> Result<Self, FetchError> {
        let base_url = reqwest::Url::parse(base_url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            base_url,
            settings,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn request_url(&self, params: &RequestParams) -> reqwest::Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().extend_pairs(params.iter());
        url
    }

    async fn read_body(&self, response: reqwest::Response) -> Result<Vec<u8>, FetchError> {
        let max_bytes = self.settings.max_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }
}

#[async_trait::async_trait]
impl ApiClient for ReqwestApiClient {
    async fn get_page(&self, params: &RequestParams) -> Result<Page, FetchError> {
        let url = self.request_url(params);
        collector_debug!(
            "GET {} pageNo={}",
            self.base_url,
            params.page().unwrap_or_default()
        );

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let bytes = self.read_body(response).await?;
        decode_page(&bytes)
    }
}

/// Maps a reqwest failure, dropping the request URL so the service key never
/// ends up in a message.
fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    let kind = if err.is_timeout() {
        FailureKind::Timeout
    } else {
        FailureKind::Network
    };
    FetchError::new(kind, err.without_url().to_string())
}
