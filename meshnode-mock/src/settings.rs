use std::error::Error;
use std::path::Path;
use std::{env, fs};

use serde::{Deserialize, Serialize};

use meshnode_embedded::config::{NodeConfig, UplinkState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    /// Simulated milliseconds per step.
    pub tick_ms: u64,
    /// Real time between steps when running interactively.
    #[serde(default = "default_pace_ms")]
    pub pace_ms: u64,
    pub send_interval_ms: u64,
    /// Stop after this much simulated time; run until interrupted when absent.
    pub duration_ms: Option<u64>,
    pub seed: u64,
    /// Probability that a frame is lost on a link.
    #[serde(default)]
    pub loss: f64,
    #[serde(default = "default_measurement")]
    pub measurement: String,
}

fn default_pace_ms() -> u64 {
    100
}

fn default_measurement() -> String {
    "environment".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Uplink {
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub backend_reachable: bool,
    pub channel: Option<u8>,
    pub signal: Option<i8>,
}

impl Uplink {
    pub fn state(&self) -> UplinkState {
        UplinkState {
            connected: self.connected,
            backend_reachable: self.backend_reachable,
            channel: self.channel,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Measures {
    pub temperature: bool,
    pub humidity: bool,
    pub co2: bool,
    pub noise: f64,
}

impl Default for Measures {
    fn default() -> Self {
        Self {
            temperature: true,
            humidity: true,
            co2: false,
            noise: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub mac: String,
    #[serde(default)]
    pub uplink: Uplink,
    #[serde(default)]
    pub mesh: NodeConfig,
    #[serde(default)]
    pub measures: Measures,
    /// Source id carried in readings; the node name when absent.
    pub source_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub a: String,
    pub b: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub logger: Logger,
    pub simulation: Simulation,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Settings {
    /// Load the bundled configuration, or the file named by `MESHNODE_CONFIG`.
    pub fn new() -> Result<Self, Box<dyn Error>> {
        match env::var("MESHNODE_CONFIG") {
            Ok(path) => Self::from_file(path),
            Err(_) => Self::from_toml(include_str!(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/../",
                "configs/default.toml"
            ))),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        Self::from_toml(&fs::read_to_string(path)?)
    }

    pub fn from_toml(text: &str) -> Result<Self, Box<dyn Error>> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), Box<dyn Error>> {
        if self.simulation.tick_ms == 0 {
            return Err("simulation.tick_ms must be positive".into());
        }
        if !(0.0..=1.0).contains(&self.simulation.loss) {
            return Err(format!("simulation.loss {} outside 0..=1", self.simulation.loss).into());
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if meshnode_embedded::parse_mac(&node.mac).is_none() {
                return Err(format!("node {}: invalid mac {}", node.name, node.mac).into());
            }
            if self.nodes[..i].iter().any(|other| other.name == node.name) {
                return Err(format!("duplicate node name {}", node.name).into());
            }
        }

        for link in &self.links {
            for end in [&link.a, &link.b] {
                if !self.nodes.iter().any(|node| &node.name == end) {
                    return Err(format!("link references unknown node {}", end).into());
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_config_loads() {
        let settings = Settings::from_toml(include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../",
            "configs/default.toml"
        )))
        .unwrap();

        assert!(!settings.nodes.is_empty());
        assert!(!settings.links.is_empty());
    }

    #[test]
    fn test_rejects_unknown_link_end() {
        let text = r#"
            [logger]
            level = "info"

            [simulation]
            tick_ms = 100
            send_interval_ms = 1000
            seed = 1

            [[nodes]]
            name = "a"
            mac = "02:00:00:00:00:01"

            [[links]]
            a = "a"
            b = "ghost"
        "#;
        assert!(Settings::from_toml(text).is_err());
    }

    #[test]
    fn test_node_mesh_section() {
        let text = r#"
            [logger]
            level = "debug"

            [simulation]
            tick_ms = 50
            send_interval_ms = 1000
            seed = 1

            [[nodes]]
            name = "gw"
            mac = "24:6F:28:00:00:01"
            uplink = { connected = true, backend_reachable = true, channel = 11, signal = -40 }

            [nodes.mesh]
            channel = 6
            topology = "star"
        "#;
        let settings = Settings::from_toml(text).unwrap();
        let node = &settings.nodes[0];

        assert_eq!(node.mesh.channel, 6);
        assert_eq!(node.mesh.mesh.topology, meshnode_embedded::Topology::Star);
        assert_eq!(node.uplink.signal, Some(-40));
        assert_eq!(settings.simulation.measurement, "environment");
    }
}
