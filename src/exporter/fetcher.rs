use anyhow::Result;
use reqwest::{Client as HttpClient, Response, StatusCode};
use tracing::debug;

use super::parser::LineSplitter;
use crate::config::ExporterConfig;
use crate::error::ScrapeError;

/// HTTP client shared by every scrape. Cloning is cheap.
#[derive(Clone)]
pub struct ExporterClient {
    http_client: HttpClient,
}

impl ExporterClient {
    pub fn new(config: &ExporterConfig) -> Result<Self> {
        let mut builder = HttpClient::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http_client: builder.build()?,
        })
    }

    /// Issues the GET and hands back the body for streaming, provided the
    /// exporter answered `200 OK`.
    pub async fn open(&self, url: &str) -> Result<ScrapeBody, ScrapeError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(ScrapeError::Request)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ScrapeError::Status { status });
        }

        debug!("Exporter {} answered {}", url, status);
        Ok(ScrapeBody {
            response,
            splitter: Some(LineSplitter::new()),
        })
    }
}

/// A successful scrape response, read incrementally.
pub struct ScrapeBody {
    response: Response,
    splitter: Option<LineSplitter>,
}

impl ScrapeBody {
    /// Reads the next chunk of the body and returns the lines it completed.
    ///
    /// `Ok(None)` marks the end of the body. The last call before it returns
    /// any trailing line that had no terminating newline.
    pub async fn next_lines(&mut self) -> Result<Option<Vec<String>>, ScrapeError> {
        let Some(splitter) = self.splitter.as_mut() else {
            return Ok(None);
        };

        match self.response.chunk().await.map_err(ScrapeError::Read)? {
            Some(chunk) => Ok(Some(splitter.push(&chunk))),
            None => {
                let trailing = self.splitter.take().and_then(LineSplitter::finish);
                Ok(trailing.map(|line| vec![line]))
            }
        }
    }
}
