// # ddns-core
//
// Core library for the polling DDNS reconciler.
//
// ## Architecture Overview
//
// This library provides the core functionality for dynamic DNS updates:
// - **IpSource**: Trait for discovering the current public IP
// - **DnsProvider**: Trait for listing zones/records and patching records
// - **DdnsEngine**: Fixed-interval loop that reconciles managed records
// - **ZoneIdCache**: Process-lifetime memo of zone ids resolved by name
// - **config**: Credentials and zones files, validated at load time
// - **install**: First-run scaffolding of both config files
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Timer-Driven**: One tick per period, sequential within a tick
// 3. **Library-First**: All core functionality can be used as a library
// 4. **Idempotency**: Records already holding the current address are left alone
// 5. **Fail Early**: Malformed configuration is rejected before the first tick

pub mod traits;
pub mod engine;
pub mod config;
pub mod error;
pub mod install;
pub mod state;

// Re-export core types for convenience
pub use traits::{IpSource, DnsProvider};
pub use engine::{DdnsEngine, EngineEvent, TickReport};
pub use config::{Credential, Credentials, DdnsConfig, EngineConfig, ManagedZone, ManagedZoneSet, ZoneRef};
pub use error::{Error, Result};
pub use state::ZoneIdCache;
