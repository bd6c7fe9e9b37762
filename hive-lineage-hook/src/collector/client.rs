//! HTTP client for the metadata collector
//!
//! One POST per record. The response body is read (bounded) for diagnostics
//! only; a non-2xx status is reported as a rejection.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::Url;

use crate::config::HookConfig;
use crate::error::{Error, Result};

use super::payload::WirePayload;

/// Header identifying the caller to the collector
pub const REQUESTED_BY_HEADER: &str = "X-Requested-By";

/// Value sent in [`REQUESTED_BY_HEADER`]
pub const REQUESTED_BY: &str = "HiveHook";

/// What the collector answered
#[derive(Debug, Clone)]
pub struct Delivery {
    pub status: u16,
    /// Response body, lossily decoded
    pub body: String,
    /// True if the body was cut at `max_response_bytes`
    pub truncated: bool,
}

/// HTTP client for the collector endpoint
pub struct CollectorClient {
    http_client: reqwest::Client,
    endpoint: Url,
    max_response_bytes: usize,
}

impl CollectorClient {
    /// Create a client for the configured (or default) endpoint
    ///
    /// Returns an error if the endpoint is not an http(s) URL.
    pub fn new(config: &HookConfig) -> Result<Self> {
        config.validate()?;

        let endpoint = config.endpoint();
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| Error::Config(format!("invalid collector uri {:?}: {}", endpoint, e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "unsupported collector uri scheme: {}",
                endpoint.scheme()
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(REQUESTED_BY_HEADER, HeaderValue::from_static(REQUESTED_BY));

        // Every record gets its own connection
        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .pool_max_idle_per_host(0)
            .no_proxy();

        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }

        if config.accept_invalid_certs {
            // Certificate chain and hostname checks are both skipped. Only
            // meant for collectors behind self-signed certificates.
            tracing::warn!(
                endpoint = %endpoint,
                "TLS certificate validation is disabled for the lineage collector"
            );
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http_client = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint,
            max_response_bytes: config.max_response_bytes,
        })
    }

    /// The endpoint records are posted to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Whether the endpoint uses TLS
    pub fn is_secure(&self) -> bool {
        self.endpoint.scheme() == "https"
    }

    /// Post one payload and read the answer
    pub async fn submit(&self, payload: &WirePayload) -> Result<Delivery> {
        let body = payload.encode();
        tracing::debug!(
            query_id = %payload.query_id,
            endpoint = %self.endpoint,
            post_data = %body,
            "Posting lineage record"
        );

        let mut response = self
            .http_client
            .post(self.endpoint.clone())
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Delivery(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let (body, truncated) = read_bounded(&mut response, self.max_response_bytes).await?;

        tracing::debug!(
            query_id = %payload.query_id,
            status = status.as_u16(),
            truncated,
            response = %body,
            "Post response"
        );

        if status.is_success() {
            Ok(Delivery {
                status: status.as_u16(),
                body,
                truncated,
            })
        } else {
            Err(Error::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

/// Read at most `limit` bytes of the body, decoding lossily
async fn read_bounded(response: &mut reqwest::Response, limit: usize) -> Result<(String, bool)> {
    let mut buf: Vec<u8> = Vec::new();
    let mut truncated = false;

    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| Error::Delivery(format!("failed to read response: {}", e)))?
    {
        let room = limit - buf.len();
        if chunk.len() > room {
            buf.extend_from_slice(&chunk[..room]);
            truncated = true;
            break;
        }
        buf.extend_from_slice(&chunk);
    }

    Ok((String::from_utf8_lossy(&buf).into_owned(), truncated))
}
