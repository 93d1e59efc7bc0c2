use serde::{Deserialize, Serialize};

use crate::entities::{Coordinates, PlaceSuggestions, RouteRequest, RouteSet, Slot, TravelMode};

/// Input coming from the user through the browser.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Action {
    MapClicked { coordinates: Coordinates },
    SuggestionSelected { index: usize },
    SearchChanged { query: String },
    ModeChanged { mode: TravelMode },
    CandidateSelected { index: usize },
    GeolocationResolved { coordinates: Coordinates },
    GeolocationFailed { reason: String },
    Retry,
    Reset,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Action(Action),
    RoutesFetched {
        request: RouteRequest,
        result: Result<RouteSet, String>,
    },
    NameResolved {
        slot: Slot,
        coordinates: Coordinates,
        name: String,
    },
    SearchResolved {
        query: String,
        suggestions: PlaceSuggestions,
    },
}

impl From<Action> for Event {
    fn from(action: Action) -> Self {
        Self::Action(action)
    }
}

/// Work requested by a transition. The session never performs it itself.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    ResolveName { slot: Slot, coordinates: Coordinates },
    FetchRoutes(RouteRequest),
    Search(String),
    Alert(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondClickPolicy {
    /// Clicks after both points are set do nothing until a reset.
    #[default]
    Ignore,
    ReplaceDestination,
}
