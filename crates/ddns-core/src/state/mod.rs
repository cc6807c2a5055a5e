// # Runtime State
//
// Process-lifetime state owned by the engine. Nothing here is persisted.

pub mod zone_ids;

pub use zone_ids::{ResolvedZone, ZoneIdCache};
