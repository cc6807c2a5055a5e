//! Test doubles and common utilities for engine contract tests
//!
//! The doubles share their state behind an `Arc`, so a test keeps a clone
//! as a handle after moving one copy into the engine.

#![allow(dead_code)]

use ddns_core::config::{Credential, Credentials, DdnsConfig, ManagedZoneSet};
use ddns_core::error::{Error, Result};
use ddns_core::traits::{DnsProvider, DnsRecord, IpSource, Zone};
use ddns_core::{DdnsEngine, EngineEvent};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

pub const USERS: &str = r#"{"users":[{"username":"a@x.com","api_key":"K"},{"username":"b@y.org","api_key":"L"}]}"#;

/// The zones document from the reference scenario
pub const SCENARIO_ZONES: &str = r#"{"ip_provider":"http://ip.test","zones":[{"zone":"example.com","username":"a@x.com","records":["www.example.com"]}]}"#;

#[derive(Default)]
struct IpState {
    address: Option<IpAddr>,
    delay: Duration,
    calls: Vec<Instant>,
}

/// An IpSource returning a settable address (or failing when unset)
#[derive(Clone, Default)]
pub struct MockIpSource {
    state: Arc<Mutex<IpState>>,
}

impl MockIpSource {
    pub fn new(address: IpAddr) -> Self {
        let source = Self::default();
        source.set_address(Some(address));
        source
    }

    /// A source whose every call fails
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn set_address(&self, address: Option<IpAddr>) {
        self.state.lock().unwrap().address = address;
    }

    /// Make each call take `delay` of (tokio) time
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = delay;
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    /// Instants at which current() was entered
    pub fn call_instants(&self) -> Vec<Instant> {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait::async_trait]
impl IpSource for MockIpSource {
    async fn current(&self) -> Result<IpAddr> {
        let (address, delay) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Instant::now());
            (state.address, state.delay)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        address.ok_or_else(|| Error::ip_source("echo service unreachable"))
    }
}

/// One call observed by the mock provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    ListZones {
        owner: String,
    },
    ListRecords {
        owner: String,
        zone_id: String,
    },
    Patch {
        owner: String,
        zone_id: String,
        record: DnsRecord,
        content: String,
    },
}

#[derive(Default)]
struct ProviderState {
    zones: HashMap<String, Vec<Zone>>,
    records: HashMap<String, Vec<DnsRecord>>,
    fail_zone_listing: bool,
    failing_record_lists: HashSet<String>,
    failing_patches: HashSet<String>,
    calls: Vec<ProviderCall>,
}

/// An in-memory DnsProvider that records every call
#[derive(Clone, Default)]
pub struct MockDnsProvider {
    state: Arc<Mutex<ProviderState>>,
}

impl MockDnsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make zone `name` with id `id` visible to `owner`
    pub fn add_zone(&self, owner: &str, id: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .zones
            .entry(owner.to_string())
            .or_default()
            .push(Zone {
                id: id.to_string(),
                name: name.to_string(),
            });
    }

    pub fn add_record(&self, zone_id: &str, record: DnsRecord) {
        self.state
            .lock()
            .unwrap()
            .records
            .entry(zone_id.to_string())
            .or_default()
            .push(record);
    }

    pub fn set_fail_zone_listing(&self, fail: bool) {
        self.state.lock().unwrap().fail_zone_listing = fail;
    }

    pub fn fail_record_listing(&self, zone_id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_record_lists
            .insert(zone_id.to_string());
    }

    pub fn fail_patch(&self, record_name: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_patches
            .insert(record_name.to_string());
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn list_zones_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ProviderCall::ListZones { .. }))
            .count()
    }

    pub fn list_records_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ProviderCall::ListRecords { .. }))
            .count()
    }

    /// Patch calls as (zone_id, record, content)
    pub fn patches(&self) -> Vec<(String, DnsRecord, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ProviderCall::Patch {
                    zone_id,
                    record,
                    content,
                    ..
                } => Some((zone_id, record, content)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn list_zones(&self, credential: &Credential) -> Result<Vec<Zone>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProviderCall::ListZones {
            owner: credential.username.clone(),
        });

        if state.fail_zone_listing {
            return Err(Error::provider("mock", "Zone lookup failed: 500"));
        }
        Ok(state.zones.get(&credential.username).cloned().unwrap_or_default())
    }

    async fn list_a_records(&self, credential: &Credential, zone_id: &str) -> Result<Vec<DnsRecord>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProviderCall::ListRecords {
            owner: credential.username.clone(),
            zone_id: zone_id.to_string(),
        });

        if state.failing_record_lists.contains(zone_id) {
            return Err(Error::provider("mock", "Record lookup failed: 500"));
        }
        Ok(state.records.get(zone_id).cloned().unwrap_or_default())
    }

    async fn patch_record(
        &self,
        credential: &Credential,
        zone_id: &str,
        record: &DnsRecord,
        content: &str,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProviderCall::Patch {
            owner: credential.username.clone(),
            zone_id: zone_id.to_string(),
            record: record.clone(),
            content: content.to_string(),
        });

        if state.failing_patches.contains(&record.name) {
            return Err(Error::provider("mock", "Failed to update record: 500"));
        }

        if let Some(stored) = state
            .records
            .get_mut(zone_id)
            .and_then(|records| records.iter_mut().find(|r| r.id == record.id))
        {
            stored.content = content.to_string();
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// An A record with non-default metadata so echo-back can be checked
pub fn record(id: &str, name: &str, content: &str) -> DnsRecord {
    DnsRecord {
        id: id.to_string(),
        name: name.to_string(),
        content: content.to_string(),
        record_type: "A".to_string(),
        ttl: 120,
        proxied: Some(true),
        comment: Some("home router".to_string()),
        tags: vec!["ddns".to_string()],
    }
}

pub fn ip(raw: &str) -> IpAddr {
    raw.parse().expect("valid test address")
}

/// Build a config from a zones document and the shared test credentials
pub fn config(zones_json: &str) -> DdnsConfig {
    let credentials = Credentials::from_json(USERS).expect("valid credentials");
    let zones = ManagedZoneSet::from_json(zones_json, &credentials).expect("valid zones");
    DdnsConfig::new(zones)
}

pub fn engine(
    zones_json: &str,
    ip_source: &MockIpSource,
    provider: &MockDnsProvider,
) -> (DdnsEngine, mpsc::Receiver<EngineEvent>) {
    DdnsEngine::new(
        Box::new(ip_source.clone()),
        Box::new(provider.clone()),
        config(zones_json),
    )
    .expect("engine construction succeeds")
}

/// Drain every event emitted so far
pub fn drain(rx: &mut mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
