use serde::{Deserialize, Serialize};

use crate::entities::Coordinates;
use crate::error::{invalid_input_error, Error};

pub const MAX_CANDIDATES: usize = 3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelMode {
    #[default]
    Driving,
    Cycling,
    Walking,
}

impl TravelMode {
    /// Routing profile identifier understood by the directions service.
    pub fn profile(&self) -> &'static str {
        match self {
            Self::Driving => "driving-car",
            Self::Cycling => "cycling-regular",
            Self::Walking => "foot-walking",
        }
    }
}

/// The origin/destination/mode triple a route fetch was issued for.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub origin: Coordinates,
    pub destination: Coordinates,
    pub mode: TravelMode,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteCandidate {
    pub geometry: Vec<Coordinates>,
    pub distance_km: f64,
    pub duration_min: f64,
}

impl RouteCandidate {
    pub fn new(geometry: Vec<Coordinates>, distance_meters: f64, duration_seconds: f64) -> Self {
        Self {
            geometry,
            distance_km: (distance_meters / 10.0).round() / 100.0,
            duration_min: (duration_seconds * 5.0 / 3.0).round() / 100.0,
        }
    }

    pub fn distance_label(&self) -> String {
        format!("{:.2} km", self.distance_km)
    }

    pub fn duration_label(&self) -> String {
        format!("{:.2} min", self.duration_min)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteSet {
    pub candidates: Vec<RouteCandidate>,
    pub selected: usize,
}

impl RouteSet {
    pub fn new(mut candidates: Vec<RouteCandidate>) -> Self {
        candidates.truncate(MAX_CANDIDATES);

        Self {
            candidates,
            selected: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn selected(&self) -> Option<&RouteCandidate> {
        self.candidates.get(self.selected)
    }

    pub fn select(&mut self, index: usize) -> Result<(), Error> {
        if index >= self.candidates.len() {
            return Err(invalid_input_error());
        }

        self.selected = index;
        Ok(())
    }
}

#[test]
fn distance_and_duration_round_to_two_decimals() {
    let candidate = RouteCandidate::new(vec![], 12345.0, 987.0);
    assert_eq!(candidate.distance_label(), "12.35 km");
    assert_eq!(candidate.duration_label(), "16.45 min");

    let candidate = RouteCandidate::new(vec![], 5000.0, 600.0);
    assert_eq!(candidate.distance_label(), "5.00 km");
    assert_eq!(candidate.duration_label(), "10.00 min");
}

#[test]
fn route_set_keeps_selection_in_range() {
    let candidate = RouteCandidate::new(vec![], 1000.0, 60.0);
    let mut routes = RouteSet::new(vec![candidate.clone(); 5]);

    assert_eq!(routes.len(), MAX_CANDIDATES);
    assert_eq!(routes.selected, 0);
    assert!(routes.select(2).is_ok());
    assert_eq!(routes.select(3), Err(invalid_input_error()));
    assert_eq!(routes.selected, 2);

    let empty = RouteSet::default();
    assert!(empty.selected().is_none());
}

#[test]
fn modes_map_to_profiles() {
    assert_eq!(TravelMode::Driving.profile(), "driving-car");
    assert_eq!(TravelMode::Cycling.profile(), "cycling-regular");
    assert_eq!(TravelMode::Walking.profile(), "foot-walking");
    assert_eq!(TravelMode::default(), TravelMode::Driving);
}
