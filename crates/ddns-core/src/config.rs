//! Configuration types for the DDNS system
//!
//! Two JSON documents feed the in-memory model:
//!
//! - the credentials file, `{"users": [{"username", "api_key"}]}`
//! - the zones file, `{"ip_provider", "zones": [{"zone"?, "id"?, "username", "records"}]}`
//!
//! Both are validated completely at load time. A zone entry that names
//! neither a zone nor an id never reaches the engine.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Default Cloudflare API v4 base URL
pub const DEFAULT_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// An API credential owned by one user
///
/// # Security
///
/// The Debug implementation does NOT expose the API key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Owner identifier (usually the account e-mail)
    pub username: String,

    /// API token
    /// ⚠️ NEVER log this value
    pub api_key: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            api_key: api_key.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("api_key", &"<REDACTED>")
            .finish()
    }
}

/// On-disk layout of the credentials file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsFile {
    pub users: Vec<Credential>,
}

/// On-disk layout of one entry in the zones file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneEntry {
    /// Zone name, looked up to find the id when `id` is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,

    /// Provider-side zone id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Owner of the credential used for this zone
    pub username: String,

    /// Record names this zone is allowed to modify
    #[serde(alias = "sites")]
    pub records: Vec<String>,
}

/// On-disk layout of the zones file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZonesFile {
    /// Plain-text IP echo endpoint
    pub ip_provider: String,

    /// DNS provider API base URL (defaults to Cloudflare v4)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,

    pub zones: Vec<ZoneEntry>,
}

/// All credentials, keyed by username
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    by_username: HashMap<String, Arc<Credential>>,
}

impl Credentials {
    /// Build the credential map, rejecting empty fields and duplicate usernames
    pub fn from_file(file: CredentialsFile) -> Result<Self> {
        let mut by_username = HashMap::with_capacity(file.users.len());

        for (index, user) in file.users.into_iter().enumerate() {
            if user.username.is_empty() {
                return Err(Error::config(format!("User entry {} has an empty username", index)));
            }
            if user.api_key.is_empty() {
                return Err(Error::config(format!(
                    "User '{}' has an empty api_key",
                    user.username
                )));
            }
            if by_username.contains_key(&user.username) {
                return Err(Error::config(format!(
                    "Duplicate username in credentials: {}",
                    user.username
                )));
            }
            by_username.insert(user.username.clone(), Arc::new(user));
        }

        Ok(Self { by_username })
    }

    /// Parse a credentials document
    pub fn from_json(raw: &str) -> Result<Self> {
        let file: CredentialsFile = serde_json::from_str(raw)?;
        Self::from_file(file)
    }

    /// Read and parse the credentials file at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Cannot read credentials file {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw).map_err(|e| Error::config(format!("{}: {}", path.display(), e)))
    }

    pub fn get(&self, username: &str) -> Option<&Arc<Credential>> {
        self.by_username.get(username)
    }

    pub fn len(&self) -> usize {
        self.by_username.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_username.is_empty()
    }
}

/// How a managed zone is identified at the provider
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ZoneRef {
    /// Only the name is known; the id is resolved by listing zones
    ByName(String),
    /// The id is configured; no lookup is needed
    ById(String),
}

impl fmt::Display for ZoneRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneRef::ByName(name) => write!(f, "{}", name),
            ZoneRef::ById(id) => write!(f, "id:{}", id),
        }
    }
}

/// A zone whose A records are kept pointed at the current address
#[derive(Debug, Clone)]
pub struct ManagedZone {
    pub reference: ZoneRef,
    pub owner: Arc<Credential>,
    pub records: Vec<String>,
}

impl ManagedZone {
    /// Whether `record_name` is in this zone's managed set
    pub fn manages(&self, record_name: &str) -> bool {
        self.records.iter().any(|r| r == record_name)
    }

    fn from_entry(index: usize, entry: ZoneEntry, credentials: &Credentials) -> Result<Self> {
        let reference = match (entry.id, entry.zone) {
            (Some(id), _) if !id.is_empty() => ZoneRef::ById(id),
            (_, Some(name)) if !name.is_empty() => ZoneRef::ByName(name),
            _ => {
                return Err(Error::config(format!(
                    "Zone entry {} has neither `zone` nor `id`",
                    index
                )));
            }
        };

        let owner = credentials.get(&entry.username).cloned().ok_or_else(|| {
            Error::config(format!(
                "Zone {} refers to unknown user '{}'",
                reference, entry.username
            ))
        })?;

        if entry.records.is_empty() {
            return Err(Error::config(format!("Zone {} manages no records", reference)));
        }

        Ok(Self {
            reference,
            owner,
            records: entry.records,
        })
    }
}

/// Everything the zones file describes, resolved against the credentials
#[derive(Debug, Clone)]
pub struct ManagedZoneSet {
    /// IP discovery endpoint
    pub ip_provider: String,
    /// DNS provider API base URL
    pub api_base: String,
    pub zones: Vec<ManagedZone>,
}

impl ManagedZoneSet {
    /// Validate a zones document and bind each zone to its owner's credential
    pub fn from_file(file: ZonesFile, credentials: &Credentials) -> Result<Self> {
        validate_url("ip_provider", &file.ip_provider)?;

        let api_base = file.api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        validate_url("api_base", &api_base)?;

        let zones = file
            .zones
            .into_iter()
            .enumerate()
            .map(|(index, entry)| ManagedZone::from_entry(index, entry, credentials))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            ip_provider: file.ip_provider,
            api_base,
            zones,
        })
    }

    /// Parse a zones document
    pub fn from_json(raw: &str, credentials: &Credentials) -> Result<Self> {
        let file: ZonesFile = serde_json::from_str(raw)?;
        Self::from_file(file, credentials)
    }

    /// Read and parse the zones file at `path`
    pub fn load(path: impl AsRef<Path>, credentials: &Credentials) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Cannot read zones file {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw, credentials)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))
    }
}

fn validate_url(field: &str, url: &str) -> Result<()> {
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(())
    } else {
        Err(Error::config(format!(
            "{} must use HTTP or HTTPS scheme. Got: '{}'",
            field, url
        )))
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds between the start of one tick and the start of the next
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Capacity of the internal event channel
    ///
    /// When full, new events are dropped with a warning log.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_interval_secs() -> u64 {
    300
}

fn default_event_channel_capacity() -> usize {
    1000
}

/// Main DDNS configuration
#[derive(Debug, Clone)]
pub struct DdnsConfig {
    pub zones: ManagedZoneSet,
    pub engine: EngineConfig,
}

impl DdnsConfig {
    pub fn new(zones: ManagedZoneSet) -> Self {
        Self {
            zones,
            engine: EngineConfig::default(),
        }
    }

    /// Set the polling interval
    pub fn with_interval_secs(mut self, interval_secs: u64) -> Self {
        self.engine.interval_secs = interval_secs;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.engine.interval_secs == 0 {
            return Err(Error::config("Poll interval must be > 0 seconds"));
        }
        if self.engine.event_channel_capacity == 0 {
            return Err(Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}
