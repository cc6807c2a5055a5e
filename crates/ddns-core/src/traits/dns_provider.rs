// # DNS Provider Trait
//
// Defines the interface for reading and patching DNS records via provider APIs.
//
// ## Implementations
//
// - Cloudflare: `ddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::DnsProvider;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//
//     let zones = provider.list_zones(&credential).await?;
//     let records = provider.list_a_records(&credential, &zones[0].id).await?;
//     provider.patch_record(&credential, &zones[0].id, &records[0], "1.2.3.4").await?;
//
//     Ok(())
// }
// ```

use crate::config::Credential;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A zone visible to a credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
}

/// A DNS record as the provider reports it
///
/// Only `content` is ever changed. Every other field is echoed back
/// unchanged on update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub id: String,
    pub name: String,
    pub content: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub ttl: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxied: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Trait for DNS provider implementations
///
/// # Trust Level: Untrusted
///
/// Providers perform exactly one logical API operation per call and report
/// the outcome. They must not:
/// - retry or back off (the next tick is the retry)
/// - cache zone ids or records (owned by the engine)
/// - decide whether a record needs updating (owned by the engine)
/// - spawn tasks
///
/// Every call carries the credential of the zone's owner, so one provider
/// instance serves every user in the credentials file.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// List every zone visible to `credential`
    async fn list_zones(&self, credential: &Credential) -> Result<Vec<Zone>, crate::Error>;

    /// List the A (IPv4) records of zone `zone_id`
    async fn list_a_records(
        &self,
        credential: &Credential,
        zone_id: &str,
    ) -> Result<Vec<DnsRecord>, crate::Error>;

    /// Set `record`'s content to `content`, carrying all other fields forward
    async fn patch_record(
        &self,
        credential: &Credential,
        zone_id: &str,
        record: &DnsRecord,
        content: &str,
    ) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
