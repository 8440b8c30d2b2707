use std::time::Duration;

use serde::Serialize;

use relay_api::{Location, now_ms};
use stage_geofence::GeofenceConfig;

// ═══════════════════════════════════════════════════════════════
//  Reading (wire shape сенсора)
// ═══════════════════════════════════════════════════════════════

/// То, что сенсор кладёт в датаграмму. Температура уходит строкой
/// с двумя знаками после запятой, как у реальных ушных меток.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub source_id: String,
    pub timestamp: i64,
    pub location: Location,
    pub temperature: String,
    pub activity: &'static str,
}

pub const ACTIVITIES: [&str; 4] = ["pastando", "descansando", "andando", "correndo"];

/// Запас за границей зоны для "сбежавших" позиций, градусы.
const ESCAPE_MARGIN: f64 = 0.0005;
const ESCAPE_SPREAD: f64 = 0.001;

const BASE_TEMPERATURE: f64 = 38.0;
const TEMPERATURE_SPREAD: f64 = 1.0;

// ═══════════════════════════════════════════════════════════════
//  Sensor
// ═══════════════════════════════════════════════════════════════

pub struct Sensor {
    pub id: String,
    zone: GeofenceConfig,
    escape_probability: f64,
}

impl Sensor {
    pub fn new(id: String, zone: GeofenceConfig, escape_probability: f64) -> Self {
        Self { id, zone, escape_probability }
    }

    pub fn reading(&self, rng: &mut Rng) -> Reading {
        self.reading_at(rng, now_ms())
    }

    pub fn reading_at(&self, rng: &mut Rng, timestamp: i64) -> Reading {
        let temperature = BASE_TEMPERATURE + (rng.next_f64() * 2.0 - 1.0) * TEMPERATURE_SPREAD;
        Reading {
            source_id: self.id.clone(),
            timestamp,
            location: self.position(rng),
            temperature: format!("{temperature:.2}"),
            activity: ACTIVITIES[rng.next_intn(ACTIVITIES.len())],
        }
    }

    fn position(&self, rng: &mut Rng) -> Location {
        let z = &self.zone;
        if rng.next_f64() < self.escape_probability {
            Location::new(
                z.center_lat + escape_offset(rng, z.max_lat_deviation),
                z.center_lon + escape_offset(rng, z.max_lon_deviation),
            )
        } else {
            Location::new(
                z.center_lat + (rng.next_f64() * 2.0 - 1.0) * z.max_lat_deviation,
                z.center_lon + (rng.next_f64() * 2.0 - 1.0) * z.max_lon_deviation,
            )
        }
    }
}

fn escape_offset(rng: &mut Rng, deviation: f64) -> f64 {
    let offset = deviation + ESCAPE_MARGIN + rng.next_f64() * ESCAPE_SPREAD;
    if rng.next_f64() < 0.5 { -offset } else { offset }
}

// ═══════════════════════════════════════════════════════════════
//  RNG (xorshift64*)
// ═══════════════════════════════════════════════════════════════

/// Детерминированный генератор: одинаковый seed даёт одинаковую
/// последовательность показаний. `seed = 0` берёт seed из часов.
pub struct Rng(u64);

impl Rng {
    const MULTIPLIER: u64 = 0x2545_F491_4F6C_DD1D;

    pub fn new(seed: i64) -> Self {
        match seed {
            0 => Self::from_clock(),
            s => Self(s as u64),
        }
    }

    fn from_clock() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x9E37_79B9_7F4A_7C15);
        Self(nanos.max(1))
    }

    fn step(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        x.wrapping_mul(Self::MULTIPLIER)
    }

    /// Равномерно в [0, 1): старшие 53 бита как мантисса.
    pub fn next_f64(&mut self) -> f64 {
        const SCALE: f64 = 1.0 / (1u64 << 53) as f64;
        (self.step() >> 11) as f64 * SCALE
    }

    pub fn next_intn(&mut self, n: usize) -> usize {
        (self.next_f64() * n.max(1) as f64) as usize
    }

    /// Пауза из полуинтервала [min, max); при `min == max` ровно `min`.
    pub fn interval(&mut self, min: Duration, max: Duration) -> Duration {
        let span = max.saturating_sub(min);
        min + span.mul_f64(self.next_f64())
    }
}
