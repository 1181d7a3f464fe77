use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time;

use meshnode_embedded::parse_mac;
use meshnode_embedded::status::MeshStatus;

use crate::medium::{Medium, SharedMedium, SimClock};
use crate::node::{GatewayRecord, RecordLog, SimNode};
use crate::settings::Settings;

pub mod medium;
pub mod node;
pub mod settings;
pub mod simulate;

/// Frames delivered within one step before the step gives up; bounds broadcast storms.
const MAX_DELIVERIES_PER_STEP: usize = 10_000;

/// Simulated day length, so readings follow a visible daily cycle.
const DAY_MS: u64 = 30 * 60 * 1000;

pub struct Simulation {
    nodes: Vec<SimNode>,
    medium: SharedMedium,
    clock: SimClock,
    records: RecordLog,
    tick_ms: u64,
    send_interval_ms: u64,
}

impl Simulation {
    pub fn new(settings: &Settings) -> Result<Self, Box<dyn Error>> {
        let simulation = &settings.simulation;
        let mut medium = Medium::new(simulation.loss, simulation.seed);

        for link in &settings.links {
            let a = Self::address_of(settings, &link.a)?;
            let b = Self::address_of(settings, &link.b)?;
            medium.connect(a, b);
        }

        let medium = Arc::new(Mutex::new(medium));
        let clock = SimClock::default();
        let records: RecordLog = Arc::new(Mutex::new(Vec::new()));

        let nodes = settings
            .nodes
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                SimNode::new(
                    index,
                    spec,
                    &medium,
                    &clock,
                    simulation.seed,
                    &simulation.measurement,
                    &records,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            nodes,
            medium,
            clock,
            records,
            tick_ms: simulation.tick_ms,
            send_interval_ms: simulation.send_interval_ms,
        })
    }

    fn address_of(settings: &Settings, name: &str) -> Result<[u8; 6], Box<dyn Error>> {
        settings
            .nodes
            .iter()
            .find(|node| node.name == name)
            .and_then(|node| parse_mac(&node.mac))
            .ok_or_else(|| format!("unknown node {}", name).into())
    }

    /// Advance simulated time by one tick and settle all traffic it caused.
    pub fn step(&mut self) {
        let now = self.clock.advance(self.tick_ms);
        let day_fraction = (now % DAY_MS) as f64 / DAY_MS as f64;

        for node in self.nodes.iter_mut() {
            node.manager.update();
        }
        self.settle();

        for node in self.nodes.iter_mut() {
            node.maybe_send(now, self.send_interval_ms, day_fraction);
        }
        self.settle();

        // Hand deliveries queued during this step to the gateway callbacks
        for node in self.nodes.iter_mut() {
            node.manager.update();
        }
        self.settle();
    }

    /// Deliver frames until the air is quiet.
    fn settle(&mut self) {
        for _ in 0..MAX_DELIVERIES_PER_STEP {
            let transmission = self.lock_medium().next_transmission();
            let Some(transmission) = transmission else {
                break;
            };

            if let Some(node) = self.node_by_address(&transmission.destination) {
                node.manager.on_receive(&transmission.source, &transmission.bytes);
            }
        }

        loop {
            let completion = self.lock_medium().next_completion();
            let Some((source, destination, status)) = completion else {
                break;
            };
            if let Some(node) = self.node_by_address(&source) {
                node.manager.on_send_complete(&destination, status);
            }
        }
    }

    fn lock_medium(&self) -> std::sync::MutexGuard<'_, Medium> {
        self.medium.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn node_by_address(&mut self, address: &[u8; 6]) -> Option<&mut SimNode> {
        self.nodes.iter_mut().find(|node| node.address == *address)
    }

    pub fn run_for(&mut self, duration_ms: u64) {
        let steps = duration_ms.div_ceil(self.tick_ms);
        for _ in 0..steps {
            self.step();
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now()
    }

    pub fn node(&self, name: &str) -> Option<&SimNode> {
        self.nodes.iter().find(|node| node.name == name)
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut SimNode> {
        self.nodes.iter_mut().find(|node| node.name == name)
    }

    pub fn nodes(&self) -> &[SimNode] {
        &self.nodes
    }

    pub fn records(&self) -> Vec<GatewayRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn statuses(&self) -> Vec<(String, MeshStatus)> {
        self.nodes
            .iter()
            .map(|node| (node.name.clone(), node.manager.status()))
            .collect()
    }
}

pub async fn run(settings: &Arc<Settings>) -> Result<(), Box<dyn Error>> {
    let mut simulation = Simulation::new(settings)?;
    let duration = settings.simulation.duration_ms;

    tracing::info!(
        "Simulating {} nodes over {} links",
        simulation.nodes().len(),
        settings.links.len()
    );

    let mut interval = time::interval(Duration::from_millis(settings.simulation.pace_ms.max(1)));
    let mut report = time::interval(Duration::from_secs(10));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                simulation.step();
                if duration.is_some_and(|limit| simulation.now_ms() >= limit) {
                    break;
                }
            },
            _ = report.tick() => {
                for (name, status) in simulation.statuses() {
                    tracing::info!("{}: {}", name, status.to_json());
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    tracing::info!(
        "Stopped at {} ms with {} gateway records",
        simulation.now_ms(),
        simulation.records().len()
    );
    Ok(())
}
