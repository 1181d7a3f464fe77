//! Rendering of gateway deliveries as InfluxDB line protocol records.

use alloc::string::String;
use core::fmt::Write;

use crate::mesh::MeshDelivery;
use crate::types::{MacAddress, SensorReading};

/// Prefix of the backend device name; the rest is the originator MAC in upper-case hex.
pub const DEVICE_PREFIX: &str = "moni-";

struct DeviceName<'a>(&'a MacAddress);

impl core::fmt::Display for DeviceName<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for byte in self.0 {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

pub struct LineProtocol<'a> {
    measurement: &'a str,
}

impl<'a> LineProtocol<'a> {
    pub fn new(measurement: &'a str) -> Self {
        Self { measurement }
    }

    /// `None` when the delivery carries no usable reading.
    pub fn render(&self, delivery: &MeshDelivery, timestamp_ns: u64) -> Option<String> {
        let fields = [
            ("temp", delivery.reading.temperature),
            ("hum", delivery.reading.humidity),
            ("co2", delivery.reading.co2),
        ];
        if !fields.iter().any(|(_, v)| SensorReading::is_available(*v)) {
            return None;
        }

        let mut line = String::new();
        escape_into(&mut line, self.measurement, false);
        line.push_str(",device=");
        let _ = write!(line, "{}{}", DEVICE_PREFIX, DeviceName(&delivery.originator));
        if !delivery.source_id.is_empty() {
            line.push_str(",sensor=");
            escape_into(&mut line, &delivery.source_id, true);
        }

        let mut separator = ' ';
        for (name, value) in fields.iter().filter(|(_, v)| SensorReading::is_available(*v)) {
            let _ = write!(line, "{}{}={}", separator, name, value);
            separator = ',';
        }

        let _ = write!(line, " {}", timestamp_ns);
        Some(line)
    }
}

fn escape_into(out: &mut String, text: &str, tag: bool) {
    for ch in text.chars() {
        if ch == ',' || ch == ' ' || (tag && ch == '=') {
            out.push('\\');
        }
        out.push(ch);
    }
}
