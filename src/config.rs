use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::entities::{Coordinates, SecondClickPolicy};

pub const API_KEY_VAR: &str = "ORS_API_KEY";

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub directions: DirectionsConfig,
    pub geocoding: GeocodingConfig,
    pub map: MapSettings,
    pub request_timeout: Duration,
    /// Sessions untouched for longer than this are evicted.
    pub session_ttl: Duration,
    pub second_click: SecondClickPolicy,
}

#[derive(Clone, Debug)]
pub struct DirectionsConfig {
    pub api_base: String,
    pub api_key: Option<String>,
}

#[derive(Clone, Debug)]
pub struct GeocodingConfig {
    pub api_base: String,
    pub user_agent: String,
}

#[derive(Clone, Debug)]
pub struct MapSettings {
    pub tile_url: String,
    pub attribution: String,
    pub max_zoom: u8,
    pub default_center: Coordinates,
    pub default_zoom: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            directions: DirectionsConfig {
                api_base: "https://api.openrouteservice.org".into(),
                api_key: None,
            },
            geocoding: GeocodingConfig {
                api_base: "https://nominatim.openstreetmap.org".into(),
                user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).into(),
            },
            map: MapSettings::default(),
            request_timeout: Duration::from_secs(10),
            session_ttl: Duration::from_secs(30 * 60),
            second_click: SecondClickPolicy::default(),
        }
    }
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            tile_url: "https://tile.openstreetmap.org/{z}/{x}/{y}.png".into(),
            attribution: "&copy; OpenStreetMap contributors".into(),
            max_zoom: 19,
            default_center: Coordinates::new(51.505, -0.09),
            default_zoom: 13,
        }
    }
}

impl Config {
    /// Defaults plus the directions credential, when one is set.
    pub fn from_env() -> Self {
        let api_key = env::var(API_KEY_VAR)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        let mut config = Self::default();
        config.directions.api_key = api_key;
        config
    }
}
