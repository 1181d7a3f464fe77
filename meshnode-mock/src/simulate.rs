use rand::Rng;
use rand_distr::{Distribution, Normal};

use meshnode_embedded::SensorReading;

pub fn simulated_temperature(day_fraction: f64) -> f64 {
    let radians = day_fraction * 2.0 * std::f64::consts::PI;

    // Coldest just before dawn, warmest mid-afternoon
    18.0 + 6.0 * (radians - std::f64::consts::FRAC_PI_2 * 1.5).sin()
}

pub fn simulated_humidity(day_fraction: f64) -> f64 {
    let radians = day_fraction * 2.0 * std::f64::consts::PI;

    if (0.3..=0.7).contains(&day_fraction) {
        (radians.sin().max(0.0) * 25.0) + 45.0
    } else {
        (radians.cos().max(0.0) * 30.0) + 40.0
    }
}

pub fn simulated_co2(day_fraction: f64) -> f64 {
    // Occupied hours push CO2 up from the outdoor baseline
    if (0.35..=0.75).contains(&day_fraction) {
        420.0 + 500.0 * ((day_fraction - 0.35) / 0.4 * std::f64::consts::PI).sin()
    } else {
        420.0
    }
}

/// Which quantities a simulated sensor measures, and how noisy it is.
#[derive(Debug, Clone)]
pub struct ReadingModel {
    pub temperature: bool,
    pub humidity: bool,
    pub co2: bool,
    noise: Option<Normal<f64>>,
}

impl ReadingModel {
    pub fn new(temperature: bool, humidity: bool, co2: bool, noise_std_dev: f64) -> Self {
        Self {
            temperature,
            humidity,
            co2,
            // A negative or NaN deviation yields a clean signal
            noise: Normal::new(0.0, noise_std_dev).ok(),
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, day_fraction: f64, rng: &mut R) -> SensorReading {
        let mut measure = |enabled: bool, base: f64| -> f32 {
            if enabled {
                let noise = self.noise.as_ref().map_or(0.0, |n| n.sample(&mut *rng));
                (base + noise) as f32
            } else {
                meshnode_embedded::NOT_AVAILABLE
            }
        };

        SensorReading {
            temperature: measure(self.temperature, simulated_temperature(day_fraction)),
            humidity: measure(self.humidity, simulated_humidity(day_fraction).clamp(0.0, 100.0)),
            co2: measure(self.co2, simulated_co2(day_fraction)),
        }
    }
}

impl Default for ReadingModel {
    fn default() -> Self {
        Self::new(true, true, false, 0.3)
    }
}
