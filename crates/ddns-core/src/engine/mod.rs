//! Core DDNS engine
//!
//! The DdnsEngine is responsible for:
//! - Fetching the current public IP once per tick via IpSource
//! - Resolving and memoizing zone ids for zones configured by name
//! - Listing each zone's A records and patching managed records that drift
//! - Scheduling ticks on a fixed grid
//!
//! ## Architecture
//!
//! ```text
//!   interval ──tick──┐
//!                    ▼
//!             ┌──────────────┐     current()      ┌─────────────┐
//!             │  DdnsEngine  │ ─────────────────▶ │  IpSource   │
//!             └──────────────┘                    └─────────────┘
//!                    │
//!        ┌───────────┼─────────────────────┐
//!        ▼           ▼                     ▼
//! ┌─────────────┐ ┌──────────────┐  ┌─────────────┐
//! │ ZoneIdCache │ │ DnsProvider  │  │   Events    │
//! │ (memoize)   │ │ (list/patch) │  │  (notify)   │
//! └─────────────┘ └──────────────┘  └─────────────┘
//! ```
//!
//! ## Tick Flow
//!
//! 1. Fetch the current IP; on failure the whole tick is skipped
//! 2. For each zone, use the configured id or the memoized one, otherwise
//!    list zones and match the name exactly
//! 3. List the zone's A records
//! 4. For each record in the managed set whose content differs, patch it
//!
//! Failures never escape a tick. The next scheduled tick is the retry.

use crate::config::{DdnsConfig, ManagedZone, ZoneRef};
use crate::error::Result;
use crate::state::ZoneIdCache;
use crate::traits::{DnsProvider, IpSource};
use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, info, warn};

/// Events emitted by the DdnsEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started {
        zones_count: usize,
        interval_secs: u64,
    },

    /// A tick fetched the current address and is reconciling zones
    TickStarted {
        address: IpAddr,
    },

    /// The IP source failed; nothing was touched this tick
    IpFetchFailed {
        error: String,
    },

    /// A zone name was resolved to an id and memoized
    ZoneResolved {
        zone_name: String,
        zone_id: String,
    },

    /// A zone name could not be resolved this tick
    ZoneUnresolved {
        zone_name: String,
        reason: String,
    },

    /// Listing a zone's records failed; the zone was skipped this tick
    RecordsListFailed {
        zone_id: String,
        error: String,
    },

    /// A record was patched to the new address
    RecordUpdated {
        record_name: String,
        previous: String,
        new_ip: IpAddr,
    },

    /// A record already had the current address
    RecordUnchanged {
        record_name: String,
        current_ip: IpAddr,
    },

    /// Patching a record failed
    RecordUpdateFailed {
        record_name: String,
        error: String,
    },

    /// Engine stopped
    Stopped {
        reason: String,
    },
}

/// Summary of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Address fetched this tick, `None` if the fetch failed
    pub address: Option<IpAddr>,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    /// Zones whose id could not be resolved or whose records could not be listed
    pub zones_skipped: usize,
}

/// Core DDNS engine
///
/// The engine owns the zone list (immutable after load) and the zone id
/// cache (written only by name resolution). Everything runs on the calling
/// task; a tick is sequential end to end.
///
/// ## Lifecycle
///
/// 1. Create with [`DdnsEngine::new()`]
/// 2. Start with [`DdnsEngine::run()`] or [`DdnsEngine::run_until()`]
/// 3. The engine ticks until the shutdown signal resolves
///
/// ## Scheduling
///
/// The first tick runs immediately. Later ticks start every `interval_secs`
/// measured from the previous scheduled start, not from when the previous
/// tick finished. A tick that overruns one or more periods causes those
/// periods to be skipped rather than fired back to back.
pub struct DdnsEngine {
    /// IP source for the current address
    ip_source: Box<dyn IpSource>,

    /// DNS provider for zone and record calls
    provider: Box<dyn DnsProvider>,

    /// Zones to reconcile, in configuration order
    zones: Vec<ManagedZone>,

    /// Zone ids resolved by name during this process run
    zone_ids: ZoneIdCache,

    /// Tick period
    interval: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl DdnsEngine {
    /// Create a new DDNS engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        ip_source: Box<dyn IpSource>,
        provider: Box<dyn DnsProvider>,
        config: DdnsConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            ip_source,
            provider,
            zones: config.zones.zones,
            zone_ids: ZoneIdCache::new(),
            interval: Duration::from_secs(config.engine.interval_secs),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Zone ids resolved so far
    pub fn zone_ids(&self) -> &ZoneIdCache {
        &self.zone_ids
    }

    /// Run the engine until Ctrl-C
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run the engine until `shutdown` completes
    ///
    /// A tick in progress is allowed to finish before shutdown is observed.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let interval_secs = self.interval.as_secs();
        info!(
            "Reconciling {} zone(s) every {}s with {}",
            self.zones.len(),
            interval_secs,
            self.provider.provider_name()
        );
        if let Some(version) = self.ip_source.version() {
            info!("Only {:?} addresses are accepted from the IP source", version);
        }
        self.emit_event(EngineEvent::Started {
            zones_count: self.zones.len(),
            interval_secs,
        });

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks = IntervalStream::new(interval);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                Some(_) = ticks.next() => {
                    let report = self.tick().await;
                    debug!("Tick finished: {:?}", report);
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(EngineEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        Ok(())
    }

    /// Run one reconciliation pass over every zone
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        let address = match self.ip_source.current().await {
            Ok(ip) => ip,
            Err(e) => {
                warn!("Failed to fetch public IP, skipping this tick: {}", e);
                self.emit_event(EngineEvent::IpFetchFailed {
                    error: e.to_string(),
                });
                return report;
            }
        };

        info!("Current public IP: {}", address);
        report.address = Some(address);
        self.emit_event(EngineEvent::TickStarted { address });

        for index in 0..self.zones.len() {
            match self.resolve_zone_id(index).await {
                Some(zone_id) => self.reconcile_zone(index, &zone_id, address, &mut report).await,
                None => report.zones_skipped += 1,
            }
        }

        report
    }

    /// Get the id for zone `index`, listing zones if it is only known by name
    ///
    /// `None` means the zone is skipped this tick.
    async fn resolve_zone_id(&mut self, index: usize) -> Option<String> {
        let zone = &self.zones[index];
        let name = match &zone.reference {
            ZoneRef::ById(id) => return Some(id.clone()),
            ZoneRef::ByName(name) => name,
        };
        let owner = &zone.owner.username;

        if let Some(resolved) = self.zone_ids.entry(owner, name) {
            debug!(
                "Using zone id {} for {} (resolved at {})",
                resolved.id, name, resolved.resolved_at
            );
            return Some(resolved.id.clone());
        }

        debug!("Looking up zone id for {} (owner {})", name, owner);

        let zones = match self.provider.list_zones(&zone.owner).await {
            Ok(zones) => zones,
            Err(e) => {
                warn!("Zone lookup for {} failed: {}", name, e);
                self.emit_event(EngineEvent::ZoneUnresolved {
                    zone_name: name.clone(),
                    reason: e.to_string(),
                });
                return None;
            }
        };

        match zones.into_iter().find(|z| z.name == *name) {
            Some(found) => {
                info!("Resolved zone {} to id {}", name, found.id);
                self.emit_event(EngineEvent::ZoneResolved {
                    zone_name: name.clone(),
                    zone_id: found.id.clone(),
                });
                Some(self.zone_ids.insert(owner, name, found.id).to_string())
            }
            None => {
                warn!("No zone named {} is visible to {}", name, owner);
                self.emit_event(EngineEvent::ZoneUnresolved {
                    zone_name: name.clone(),
                    reason: "no zone with that name".to_string(),
                });
                None
            }
        }
    }

    /// Patch every managed A record of zone `index` that does not point at `address`
    async fn reconcile_zone(
        &self,
        index: usize,
        zone_id: &str,
        address: IpAddr,
        report: &mut TickReport,
    ) {
        let zone = &self.zones[index];

        let records = match self.provider.list_a_records(&zone.owner, zone_id).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Failed to list records of zone {}: {}", zone.reference, e);
                self.emit_event(EngineEvent::RecordsListFailed {
                    zone_id: zone_id.to_string(),
                    error: e.to_string(),
                });
                report.zones_skipped += 1;
                return;
            }
        };

        for name in &zone.records {
            if !records.iter().any(|r| &r.name == name) {
                warn!("Managed record {} has no A record in zone {}", name, zone.reference);
            }
        }

        let content = address.to_string();

        for record in records.iter().filter(|r| zone.manages(&r.name)) {
            if content_matches(&record.content, address) {
                debug!("{} already points at {}, skipping", record.name, address);
                report.unchanged += 1;
                self.emit_event(EngineEvent::RecordUnchanged {
                    record_name: record.name.clone(),
                    current_ip: address,
                });
                continue;
            }

            match self
                .provider
                .patch_record(&zone.owner, zone_id, record, &content)
                .await
            {
                Ok(()) => {
                    info!("Updated {} -> {} (was: {})", record.name, address, record.content);
                    report.updated += 1;
                    self.emit_event(EngineEvent::RecordUpdated {
                        record_name: record.name.clone(),
                        previous: record.content.clone(),
                        new_ip: address,
                    });
                }
                Err(e) => {
                    error!("Failed to update {}: {}", record.name, e);
                    report.failed += 1;
                    self.emit_event(EngineEvent::RecordUpdateFailed {
                        record_name: record.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Nobody listening is fine; a listener falling behind is worth a warning.
        if let Err(mpsc::error::TrySendError::Full(_)) = self.event_tx.try_send(event) {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}

/// Whether record content already holds `address`
fn content_matches(content: &str, address: IpAddr) -> bool {
    content
        .trim()
        .parse::<IpAddr>()
        .is_ok_and(|current| current == address)
}
