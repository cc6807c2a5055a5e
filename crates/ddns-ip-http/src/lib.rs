// # HTTP IP Source
//
// This crate provides an HTTP-based IP source for the DDNS reconciler.
//
// ## Behavior
//
// Each call to `current()` issues one GET to a plain-text echo service
// (e.g. api.ipify.org) and parses the trimmed body as an IP address.
// Nothing is cached between calls and nothing runs in the background:
// the engine decides when to ask.

use ddns_core::traits::{IpSource, IpVersion};
use ddns_core::{Error, Result};

use std::net::IpAddr;
use std::time::Duration;

/// Default HTTP timeout for echo requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP-based IP source
#[derive(Debug, Clone)]
pub struct HttpIpSource {
    /// URL to fetch IP from
    url: String,

    /// Only accept addresses of this version
    version: Option<IpVersion>,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpSource {
    /// Create a new HTTP IP source
    ///
    /// # Parameters
    ///
    /// - `url`: URL to fetch IP from (e.g., "https://api.ipify.org")
    /// - `version`: IP version to accept (None = either)
    pub fn new(url: impl Into<String>, version: Option<IpVersion>) -> Result<Self> {
        Self::with_timeout(url, version, DEFAULT_HTTP_TIMEOUT)
    }

    /// Create with a custom request timeout
    pub fn with_timeout(
        url: impl Into<String>,
        version: Option<IpVersion>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::ip_source(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            version,
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl IpSource for HttpIpSource {
    async fn current(&self) -> Result<IpAddr> {
        tracing::debug!("Fetching IP address from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::ip_source(format!("Request to {} failed: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(Error::ip_source(format!(
                "HTTP error from {}: {}",
                self.url,
                response.status()
            )));
        }

        let ip_text = response
            .text()
            .await
            .map_err(|e| Error::ip_source(format!("Failed to read response: {}", e)))?;

        let ip_text = ip_text.trim();

        let ip: IpAddr = ip_text
            .parse()
            .map_err(|_| Error::ip_source(format!("Invalid IP address: '{}'", ip_text)))?;

        if let Some(version) = self.version
            && !version.matches(&ip)
        {
            return Err(Error::ip_source(format!("Expected {:?} address, got: {}", version, ip)));
        }

        Ok(ip)
    }

    fn version(&self) -> Option<IpVersion> {
        self.version
    }
}
