use std::error::Error;
use std::sync::{Arc, Mutex};

use rand::SeedableRng;
use rand::rngs::StdRng;

use meshnode_embedded::mesh::MeshDelivery;
use meshnode_embedded::uplink::LineProtocol;
use meshnode_embedded::{MacAddress, MacDisplay, MeshManager, Role, parse_mac};

use crate::medium::{NoopDelay, SharedMedium, SimClock, SimRadio};
use crate::settings;
use crate::simulate::ReadingModel;

pub type SimManager = MeshManager<SimRadio, SimClock, StdRng, NoopDelay>;

/// A reading that reached a gateway, as the backend would store it.
#[derive(Debug, Clone)]
pub struct GatewayRecord {
    pub gateway: String,
    pub delivery: MeshDelivery,
    pub line: Option<String>,
}

pub type RecordLog = Arc<Mutex<Vec<GatewayRecord>>>;

pub struct SimNode {
    pub name: String,
    pub address: MacAddress,
    pub manager: SimManager,
    source_id: String,
    model: ReadingModel,
    rng: StdRng,
    next_send_at: u64,
}

impl SimNode {
    pub fn new(
        index: usize,
        node: &settings::Node,
        medium: &SharedMedium,
        clock: &SimClock,
        seed: u64,
        measurement: &str,
        records: &RecordLog,
    ) -> Result<Self, Box<dyn Error>> {
        let address = parse_mac(&node.mac).ok_or_else(|| format!("invalid mac {}", node.mac))?;
        let node_seed = seed.wrapping_add(index as u64);

        let radio = SimRadio::new(address, Arc::clone(medium), node.uplink.signal);
        let mut manager = MeshManager::new(
            radio,
            clock.clone(),
            StdRng::seed_from_u64(node_seed),
            NoopDelay,
            &node.mesh,
        );

        let uplink = node.uplink.state();
        let role = node.mesh.resolve_role(&uplink);
        let channel = node.mesh.resolve_channel(role, &uplink);
        if let Err(e) = manager.init(role, channel) {
            tracing::error!("{}: mesh init failed: {}", node.name, e);
        }

        if role == Role::Gateway {
            let gateway = node.name.clone();
            let measurement = measurement.to_string();
            let records = Arc::clone(records);
            let clock = clock.clone();

            manager.set_data_callback(move |delivery| {
                let line = LineProtocol::new(&measurement).render(delivery, clock.now() * 1_000_000);
                match &line {
                    Some(line) => tracing::info!("{} <- {}", gateway, line),
                    None => tracing::debug!("{}: empty reading from {}", gateway, MacDisplay(&delivery.originator)),
                }

                if let Ok(mut records) = records.lock() {
                    records.push(GatewayRecord {
                        gateway: gateway.clone(),
                        delivery: delivery.clone(),
                        line,
                    });
                }
            });
        }

        let measures = &node.measures;
        Ok(Self {
            name: node.name.clone(),
            address,
            manager,
            source_id: node.source_id.clone().unwrap_or_else(|| node.name.clone()),
            model: ReadingModel::new(measures.temperature, measures.humidity, measures.co2, measures.noise),
            rng: StdRng::seed_from_u64(node_seed ^ 0x5EED),
            next_send_at: 0,
        })
    }

    /// Originate a reading when the send interval elapsed and the node can send.
    pub fn maybe_send(&mut self, now: u64, interval_ms: u64, day_fraction: f64) {
        if self.manager.role() != Some(Role::Sensor) || now < self.next_send_at {
            return;
        }
        if !self.manager.is_paired() {
            return;
        }

        let reading = self.model.sample(day_fraction, &mut self.rng);
        match self
            .manager
            .send(reading.temperature, reading.humidity, reading.co2, &self.source_id)
        {
            Ok(sequence) => tracing::debug!(
                "{} sent seq {} (temp={:.1}, hum={:.1})",
                self.name,
                sequence,
                reading.temperature,
                reading.humidity
            ),
            Err(e) => tracing::warn!("{} failed to send: {}", self.name, e),
        }
        self.next_send_at = now + interval_ms;
    }
}
