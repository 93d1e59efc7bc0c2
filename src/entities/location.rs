use geo_types::Coord;
use serde::{Deserialize, Serialize};

pub const PLACEHOLDER_NAME: &str = "Locating...";
pub const FALLBACK_NAME: &str = "Unknown Location";

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Builds coordinates from a `[longitude, latitude]` pair as used on the wire.
    pub fn from_lon_lat([longitude, latitude]: [f64; 2]) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn to_lon_lat(self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

impl From<Coordinates> for Coord<f64> {
    fn from(coordinates: Coordinates) -> Self {
        Coord {
            x: coordinates.longitude,
            y: coordinates.latitude,
        }
    }
}

impl From<Coord<f64>> for Coordinates {
    fn from(coord: Coord<f64>) -> Self {
        Self {
            latitude: coord.y,
            longitude: coord.x,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Origin,
    Destination,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NamedPoint {
    pub coordinates: Coordinates,
    pub name: String,
}

impl NamedPoint {
    /// A point whose name is still being resolved.
    pub fn unresolved(coordinates: Coordinates) -> Self {
        Self {
            coordinates,
            name: PLACEHOLDER_NAME.into(),
        }
    }

    pub fn named(coordinates: Coordinates, name: impl Into<String>) -> Self {
        Self {
            coordinates,
            name: name.into(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.name != PLACEHOLDER_NAME
    }
}

#[test]
fn wire_order_is_swapped() {
    let coordinates = Coordinates::from_lon_lat([-0.1, 51.5]);
    assert_eq!(coordinates, Coordinates::new(51.5, -0.1));
    assert_eq!(coordinates.to_lon_lat(), [-0.1, 51.5]);

    let coord: Coord<f64> = coordinates.into();
    assert_eq!(coord.x, -0.1);
    assert_eq!(coord.y, 51.5);
}
