//! Published-sheet CSV download.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::records::{parse_sales_csv, SalesRecord};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP client build error: {0}")]
    HttpClientBuild(String),
    #[error("HTTP request failed for {url}: {message}")]
    HttpRequest { url: String, message: String },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub trait CsvFetcher: Send + Sync + 'static {
    fn fetch_text(&self, url: &str) -> impl Future<Output = Result<String, SourceError>> + Send;
}

#[derive(Debug, Clone)]
pub struct ReqwestCsvFetcher {
    client: reqwest::Client,
}

impl ReqwestCsvFetcher {
    pub fn new(timeout_ms: u64) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|err| SourceError::HttpClientBuild(err.to_string()))?;
        Ok(Self { client })
    }
}

impl CsvFetcher for ReqwestCsvFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, SourceError> {
        let request_error = |message: String| SourceError::HttpRequest {
            url: redacted_url(url).to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| request_error(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(request_error(format!("unexpected HTTP status {status}")));
        }

        response
            .text()
            .await
            .map_err(|err| request_error(err.to_string()))
    }
}

/// Appends `cb=<millis>` so intermediate caches never serve a stale sheet.
pub fn cache_busted_url(url: &str, now_ms: i64) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}cb={now_ms}")
}

/// URL without its query string, for logs and error messages.
pub fn redacted_url(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

pub async fn fetch_sales_records<F: CsvFetcher>(
    fetcher: &F,
    csv_url: &str,
    now_ms: i64,
) -> Result<Vec<SalesRecord>, SourceError> {
    let text = fetcher.fetch_text(&cache_busted_url(csv_url, now_ms)).await?;
    Ok(parse_sales_csv(&text)?)
}
