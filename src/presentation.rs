//! Render model for the browser map.
//!
//! A [`MapView`] is derived from a [`PlannerSession`] on every request and
//! owns no state of its own. The browser hands it to the mapping toolkit as is.

use geo_types::{Coord, Rect};
use serde::{Deserialize, Serialize};

use crate::config::MapSettings;
use crate::entities::{Coordinates, PlannerSession, Slot};

/// Polyline colours, one per candidate route.
pub const PALETTE: [&str; 3] = ["#2563eb", "#16a34a", "#db2777"];

const SELECTED_WEIGHT: u8 = 6;
const SELECTED_OPACITY: f64 = 1.0;
const ALTERNATIVE_WEIGHT: u8 = 4;
const ALTERNATIVE_OPACITY: f64 = 0.5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileLayer {
    pub url: String,
    pub attribution: String,
    pub max_zoom: u8,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub slot: Slot,
    pub position: Coordinates,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    pub index: usize,
    /// `[latitude, longitude]` pairs, the order the mapping toolkit expects.
    pub points: Vec<[f64; 2]>,
    pub color: String,
    pub weight: u8,
    pub opacity: f64,
    pub selected: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south_west: Coordinates,
    pub north_east: Coordinates,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    pub tiles: TileLayer,
    pub center: Coordinates,
    pub zoom: u8,
    pub bounds: Option<Bounds>,
    pub markers: Vec<Marker>,
    pub polylines: Vec<Polyline>,
}

impl MapView {
    pub fn from_session(session: &PlannerSession, settings: &MapSettings) -> Self {
        let markers: Vec<Marker> = [Slot::Origin, Slot::Destination]
            .into_iter()
            .filter_map(|slot| {
                session.point(slot).map(|point| Marker {
                    slot,
                    position: point.coordinates,
                    label: point.name.clone(),
                })
            })
            .collect();

        let (center, bounds) = match markers.as_slice() {
            [] => (settings.default_center, None),
            [only] => (only.position, None),
            [first, second, ..] => {
                let rect = Rect::new(
                    Coord::from(first.position),
                    Coord::from(second.position),
                );
                let bounds = Bounds {
                    south_west: rect.min().into(),
                    north_east: rect.max().into(),
                };
                (rect.center().into(), Some(bounds))
            }
        };

        Self {
            tiles: TileLayer {
                url: settings.tile_url.clone(),
                attribution: settings.attribution.clone(),
                max_zoom: settings.max_zoom,
            },
            center,
            zoom: settings.default_zoom,
            bounds,
            markers,
            polylines: polylines(session),
        }
    }
}

// Alternatives first so the selected route is drawn on top.
fn polylines(session: &PlannerSession) -> Vec<Polyline> {
    let selected = session.routes.selected;

    let mut polylines: Vec<Polyline> = session
        .routes
        .candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| {
            let is_selected = index == selected;
            Polyline {
                index,
                points: candidate
                    .geometry
                    .iter()
                    .map(|c| [c.latitude, c.longitude])
                    .collect(),
                color: PALETTE[index % PALETTE.len()].into(),
                weight: if is_selected {
                    SELECTED_WEIGHT
                } else {
                    ALTERNATIVE_WEIGHT
                },
                opacity: if is_selected {
                    SELECTED_OPACITY
                } else {
                    ALTERNATIVE_OPACITY
                },
                selected: is_selected,
            }
        })
        .collect();

    polylines.sort_by_key(|polyline| polyline.selected);
    polylines
}

#[cfg(test)]
fn session_with_routes(selected: usize) -> PlannerSession {
    use crate::entities::{NamedPoint, RouteCandidate, RouteSet, Status};

    let origin = Coordinates::new(51.50, -0.10);
    let destination = Coordinates::new(51.52, -0.06);
    let geometry = vec![origin, destination];

    let mut routes = RouteSet::new(vec![
        RouteCandidate::new(geometry.clone(), 5000.0, 600.0),
        RouteCandidate::new(geometry.clone(), 4800.0, 650.0),
        RouteCandidate::new(geometry, 5300.0, 700.0),
    ]);
    routes.select(selected).unwrap();

    PlannerSession {
        status: Status::RouteReady,
        origin: Some(NamedPoint::named(origin, "Westminster")),
        destination: Some(NamedPoint::named(destination, "Shoreditch")),
        routes,
        ..PlannerSession::new()
    }
}

#[test]
fn empty_session_uses_default_view() {
    let settings = MapSettings::default();
    let view = MapView::from_session(&PlannerSession::new(), &settings);

    assert_eq!(view.center, settings.default_center);
    assert_eq!(view.zoom, settings.default_zoom);
    assert_eq!(view.tiles.url, settings.tile_url);
    assert!(view.bounds.is_none());
    assert!(view.markers.is_empty());
    assert!(view.polylines.is_empty());
}

#[test]
fn view_recenters_on_points() {
    let session = session_with_routes(0);
    let view = MapView::from_session(&session, &MapSettings::default());

    assert_eq!(view.markers.len(), 2);
    assert_eq!(view.markers[0].slot, Slot::Origin);
    assert_eq!(view.markers[0].label, "Westminster");
    assert_eq!(view.markers[1].label, "Shoreditch");

    assert!((view.center.latitude - 51.51).abs() < 1e-9);
    assert!((view.center.longitude + 0.08).abs() < 1e-9);

    let bounds = view.bounds.unwrap();
    assert_eq!(bounds.south_west, Coordinates::new(51.50, -0.10));
    assert_eq!(bounds.north_east, Coordinates::new(51.52, -0.06));

    let single = PlannerSession {
        destination: None,
        ..session
    };
    let view = MapView::from_session(&single, &MapSettings::default());
    assert_eq!(view.center, Coordinates::new(51.50, -0.10));
    assert!(view.bounds.is_none());
}

#[test]
fn selected_route_is_emphasized() {
    let view = MapView::from_session(&session_with_routes(1), &MapSettings::default());

    assert_eq!(view.polylines.len(), 3);

    let last = view.polylines.last().unwrap();
    assert_eq!(last.index, 1);
    assert!(last.selected);
    assert_eq!(last.weight, SELECTED_WEIGHT);
    assert_eq!(last.opacity, SELECTED_OPACITY);
    assert_eq!(last.color, PALETTE[1]);
    assert_eq!(last.points[0], [51.50, -0.10]);

    for polyline in &view.polylines[..2] {
        assert!(!polyline.selected);
        assert_eq!(polyline.weight, ALTERNATIVE_WEIGHT);
        assert_eq!(polyline.opacity, ALTERNATIVE_OPACITY);
        assert_eq!(polyline.color, PALETTE[polyline.index]);
    }
}
