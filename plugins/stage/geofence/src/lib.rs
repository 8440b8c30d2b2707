use relay_api::Location;
use serde::Deserialize;

/// Прямоугольная зона вокруг центра фермы: отклонение по каждой оси
/// не больше заданного.
#[derive(Debug, Clone, Deserialize)]
pub struct GeofenceConfig {
    #[serde(default = "default_center_lat")]
    pub center_lat: f64,
    #[serde(default = "default_center_lon")]
    pub center_lon: f64,
    /// Максимальное отклонение по широте, градусы.
    #[serde(default = "default_max_deviation")]
    pub max_lat_deviation: f64,
    /// Максимальное отклонение по долготе, градусы.
    #[serde(default = "default_max_deviation")]
    pub max_lon_deviation: f64,
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self {
            center_lat: default_center_lat(),
            center_lon: default_center_lon(),
            max_lat_deviation: default_max_deviation(),
            max_lon_deviation: default_max_deviation(),
        }
    }
}

fn default_center_lat() -> f64 {
    -19.92
}
fn default_center_lon() -> f64 {
    -43.93
}
fn default_max_deviation() -> f64 {
    0.0008
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeofenceStatus {
    Inside,
    Outside,
    /// Запись без координат — ни inside, ни outside.
    Unknown,
}

impl std::fmt::Display for GeofenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeofenceStatus::Inside => f.write_str("inside"),
            GeofenceStatus::Outside => f.write_str("outside"),
            GeofenceStatus::Unknown => f.write_str("unknown"),
        }
    }
}

pub struct Geofence {
    config: GeofenceConfig,
}

impl Geofence {
    pub fn new(config: GeofenceConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, location: Option<&Location>) -> GeofenceStatus {
        let Some(loc) = location else {
            return GeofenceStatus::Unknown;
        };
        let c = &self.config;
        if (loc.lat - c.center_lat).abs() > c.max_lat_deviation
            || (loc.lon - c.center_lon).abs() > c.max_lon_deviation
        {
            GeofenceStatus::Outside
        } else {
            GeofenceStatus::Inside
        }
    }
}

impl Default for Geofence {
    fn default() -> Self {
        Self::new(GeofenceConfig::default())
    }
}
