// # IP Source Trait
//
// Defines the interface for discovering the current public IP address.
//
// ## Implementations
//
// - HTTP echo service: `ddns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::IpSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* IpSource implementation */;
//
//     let current_ip = source.current().await?;
//     println!("public address: {}", current_ip);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::IpAddr;

/// IP version (v4 or v6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    /// Whether `ip` belongs to this version
    pub fn matches(self, ip: &IpAddr) -> bool {
        match self {
            IpVersion::V4 => ip.is_ipv4(),
            IpVersion::V6 => ip.is_ipv6(),
        }
    }
}

/// Trait for IP source implementations
///
/// The engine calls [`IpSource::current`] exactly once per tick. Sources
/// must not cache between calls, retry, or spawn background work: timing
/// belongs to the engine's polling loop.
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Fetch the current public IP address
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddr)`: The current IP address
    /// - `Err(Error)`: If the address could not be determined this time
    async fn current(&self) -> Result<IpAddr, crate::Error>;

    /// Get the IP version this source reports
    ///
    /// Returns `None` if the implementation may report either version.
    fn version(&self) -> Option<IpVersion> {
        None
    }
}
