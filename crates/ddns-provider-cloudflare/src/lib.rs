// # Cloudflare DNS Provider
//
// This crate provides a Cloudflare DNS provider implementation for the DDNS reconciler.
//
// - ✅ One logical API operation per trait call (list zones, list records, patch)
// - ✅ Full error propagation to engine (the next tick is the retry)
// - ✅ HTTP timeout configured (10 seconds)
// - ✅ Specific error handling for HTTP status codes (401/403, 404, 409, 429, 5xx)
// - ✅ Paginated listings
// - ✅ Dry-run mode for safe testing
// - ❌ NO retry or backoff logic (owned by the polling loop)
// - ❌ NO caching (zone ids are memoized by DdnsEngine)
//
// ## Security Requirements
//
// - API tokens NEVER appear in logs
// - Each call authenticates with the credential of the zone's owner
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones`
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=A`
// - Patch DNS Record: PATCH `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use ddns_core::config::{Credential, DEFAULT_API_BASE};
use ddns_core::traits::{DnsProvider, DnsRecord, Zone};
use ddns_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default HTTP timeout for API requests (10 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Page size for `GET /zones` (the endpoint caps it at 50)
const ZONES_PER_PAGE: u32 = 50;

/// Page size for `GET /zones/:zone_id/dns_records`
const RECORDS_PER_PAGE: u32 = 100;

const PROVIDER: &str = "cloudflare";

/// Cloudflare DNS provider
///
/// # Trust Level: Untrusted
///
/// This provider is isolated, stateless, and single-shot. All coordination
/// (scheduling, memoization, deciding what to patch) is owned by `DdnsEngine`.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests (zone and record listings)
/// - Log the intended PATCH payload
/// - **NOT** actually modify DNS records
pub struct CloudflareProvider {
    /// API base URL, without trailing slash
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip PATCH updates
    dry_run: bool,
}

impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `base_url`: API base, e.g. `https://api.cloudflare.com/client/v4`
    /// - `dry_run`: If true, perform GET requests but skip PATCH updates
    pub fn new(base_url: impl Into<String>, dry_run: bool) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_HTTP_TIMEOUT, dry_run)
    }

    /// Create a provider against the public Cloudflare API in live mode
    pub fn new_live() -> Result<Self> {
        Self::new(DEFAULT_API_BASE, false)
    }

    /// Create with a custom request timeout
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration, dry_run: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to build HTTP client: {}", e)))?;

        if dry_run {
            tracing::warn!("Cloudflare provider running in DRY-RUN mode - no changes will be made");
        }

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            dry_run,
        })
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET every page of a list endpoint
    ///
    /// # API Call
    ///
    /// ```http
    /// GET <path>?page=N&per_page=<per_page>[&extra...]
    /// Authorization: Bearer <token>
    /// ```
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        credential: &Credential,
        path: &str,
        extra: &[(&str, &str)],
        per_page: u32,
        what: &str,
    ) -> Result<Vec<T>> {
        let url = self.url(path);
        let mut items = Vec::new();
        let mut page: u32 = 1;

        loop {
            let mut query: Vec<(&str, String)> = extra.iter().map(|(k, v)| (*k, v.to_string())).collect();
            query.push(("page", page.to_string()));
            query.push(("per_page", per_page.to_string()));

            let response = self
                .client
                .get(&url)
                .bearer_auth(&credential.api_key)
                .header("Content-Type", "application/json")
                .query(&query)
                .send()
                .await
                .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;

            if !response.status().is_success() {
                return Err(status_error(response, what).await);
            }

            let body: CloudflareResponse<Vec<T>> = response
                .json()
                .await
                .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))?;
            let body = body.into_result(what)?;

            items.extend(body.result.unwrap_or_default());

            let total_pages = body.result_info.map_or(1, |info| info.total_pages);
            if page >= total_pages {
                break;
            }
            page += 1;
        }

        Ok(items)
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn list_zones(&self, credential: &Credential) -> Result<Vec<Zone>> {
        tracing::debug!("Listing zones visible to {}", credential.username);
        let zones: Vec<Zone> = self
            .get_all_pages(credential, "/zones", &[], ZONES_PER_PAGE, "Zone lookup failed")
            .await?;
        tracing::debug!("{} zone(s) visible to {}", zones.len(), credential.username);
        Ok(zones)
    }

    async fn list_a_records(&self, credential: &Credential, zone_id: &str) -> Result<Vec<DnsRecord>> {
        tracing::debug!("Listing A records of zone {}", zone_id);
        self.get_all_pages(
            credential,
            &format!("/zones/{}/dns_records", zone_id),
            &[("type", "A")],
            RECORDS_PER_PAGE,
            "Record lookup failed",
        )
        .await
    }

    /// Patch a record's content
    ///
    /// # API Call
    ///
    /// ```http
    /// PATCH /zones/:zone_id/dns_records/:record_id
    /// {
    ///   "type": "A", "name": "...", "content": "1.2.3.4",
    ///   "ttl": 1, "proxied": false, "comment": "...", "tags": []
    /// }
    /// ```
    async fn patch_record(
        &self,
        credential: &Credential,
        zone_id: &str,
        record: &DnsRecord,
        content: &str,
    ) -> Result<()> {
        let url = self.url(&format!("/zones/{}/dns_records/{}", zone_id, record.id));
        let payload = RecordPatch::new(record, content);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send PATCH request to {} with payload: {}",
                url,
                serde_json::to_string(&payload).unwrap_or_default()
            );
            return Ok(());
        }

        let response = self
            .client
            .patch(&url)
            .bearer_auth(&credential.api_key)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(status_error(response, "Failed to update record").await);
        }

        let body: CloudflareResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))?;
        body.into_result("Failed to update record")?;

        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Map a non-2xx response to an error
async fn status_error(response: reqwest::Response, what: &str) -> Error {
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());

    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "Invalid API token or insufficient permissions. Status: {}",
            status
        )),
        404 => Error::not_found(format!("{}: {}", what, status)),
        409 => Error::provider(
            PROVIDER,
            format!("Conflict: Record is being updated by another process. Status: {}", status),
        ),
        429 => Error::rate_limited(format!("Rate limit exceeded. Status: {}", status)),
        500..=599 => Error::provider(
            PROVIDER,
            format!("Cloudflare server error (transient): {} - {}", status, error_text),
        ),
        _ => Error::provider(PROVIDER, format!("{}: {} - {}", what, status, error_text)),
    }
}

#[derive(Deserialize, Debug)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct CloudflareResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<CloudflareError>,
    result: Option<T>,
    result_info: Option<ResultInfo>,
}

impl<T> CloudflareResponse<T> {
    /// Reject bodies that report `success: false` despite a 2xx status
    fn into_result(self, what: &str) -> Result<Self> {
        if self.success {
            return Ok(self);
        }
        let messages: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{} ({})", e.message, e.code))
            .collect();
        Err(Error::provider(
            PROVIDER,
            format!("{}: {}", what, messages.join("; ")),
        ))
    }
}

#[derive(Deserialize, Debug)]
struct CloudflareError {
    code: u32,
    message: String,
}

#[derive(Deserialize, Debug)]
struct ResultInfo {
    total_pages: u32,
}

/// PATCH body: the record's own fields with new content
#[derive(Serialize, Debug)]
struct RecordPatch<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    proxied: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<&'a str>,
    tags: &'a [String],
}

impl<'a> RecordPatch<'a> {
    fn new(record: &'a DnsRecord, content: &'a str) -> Self {
        Self {
            record_type: &record.record_type,
            name: &record.name,
            content,
            ttl: record.ttl,
            proxied: record.proxied,
            comment: record.comment.as_deref(),
            tags: &record.tags,
        }
    }
}
