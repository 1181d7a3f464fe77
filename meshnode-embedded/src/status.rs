use alloc::string::String;

use serde::Serialize;

use crate::mesh::DiscoveryStatus;
use crate::types::Role;

/// Running counters of the receive and send paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MeshStats {
    pub frames_received: u32,
    pub malformed_dropped: u32,
    pub duplicates_dropped: u32,
    pub frames_forwarded: u32,
    pub deliveries_queued: u32,
    pub handoff_overflows: u32,
    pub send_failures: u32,
    pub pairing_regressions: u32,
}

/// Snapshot served to the configuration portal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshStatus {
    pub enabled: bool,
    pub role: Option<Role>,
    pub force_role: Option<Role>,
    pub mac: String,
    pub channel: u8,
    pub paired: bool,
    pub peer_count: usize,
    pub discovery: DiscoveryStatus,
    pub stats: MeshStats,
}

impl MeshStatus {
    pub fn to_json(&self) -> String {
        // Plain data, serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}
