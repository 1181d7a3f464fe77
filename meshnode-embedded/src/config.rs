use serde::{Deserialize, Serialize};

use crate::types::{Role, Topology, is_valid_channel};
use crate::{Error, Result};

/// Protocol timing and capacity knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshSettings {
    pub beacon_interval_ms: u64,
    pub discovery_timeout_ms: u64,
    pub retry_interval_ms: u64,
    pub peer_timeout_ms: u64,
    pub peer_sweep_interval_ms: u64,
    pub duplicate_window_ms: u64,
    pub pair_jitter_max_us: u32,
    pub initial_hop_budget: u8,
    pub hysteresis_db: u8,
    pub topology: Topology,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            beacon_interval_ms: 2_000,
            discovery_timeout_ms: 15_000,
            retry_interval_ms: 30_000,
            peer_timeout_ms: 300_000,
            peer_sweep_interval_ms: 60_000,
            duplicate_window_ms: 60_000,
            pair_jitter_max_us: 500,
            initial_hop_budget: 4,
            hysteresis_db: 10,
            topology: Topology::Flood,
        }
    }
}

/// Infrastructure connectivity as seen by the node at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UplinkState {
    pub connected: bool,
    pub backend_reachable: bool,
    /// Channel the access point sits on; a gateway must share it with the mesh.
    pub channel: Option<u8>,
}

/// The `mesh` section of the node configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub enabled: bool,
    pub force_role: Option<Role>,
    pub channel: u8,
    #[serde(flatten)]
    pub mesh: MeshSettings,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            force_role: None,
            channel: 1,
            mesh: MeshSettings::default(),
        }
    }
}

impl NodeConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| {
            log::error!("Failed to parse mesh config: {}", e);
            Error::ConfigError
        })
    }

    pub fn resolve_role(&self, uplink: &UplinkState) -> Role {
        if let Some(role) = self.force_role {
            log::info!("Role forced to {}", role);
            return role;
        }

        if !uplink.connected {
            log::info!("No uplink, acting as sensor");
            Role::Sensor
        } else if uplink.backend_reachable {
            log::info!("Backend reachable, acting as gateway");
            Role::Gateway
        } else {
            log::info!("Uplink without backend, acting as sensor");
            Role::Sensor
        }
    }

    pub fn resolve_channel(&self, role: Role, uplink: &UplinkState) -> u8 {
        match (role, uplink.connected, uplink.channel) {
            (Role::Gateway, true, Some(channel)) if is_valid_channel(channel) => {
                if channel != self.channel {
                    log::info!("Following uplink channel {} (configured {})", channel, self.channel);
                }
                channel
            }
            _ => self.channel,
        }
    }
}
