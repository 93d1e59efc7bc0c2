mod event;
mod location;
mod place;
mod route;
mod session;

pub use event::{Action, Effect, Event, SecondClickPolicy};
pub use location::{Coordinates, NamedPoint, Slot, FALLBACK_NAME, PLACEHOLDER_NAME};
pub use place::{PlaceSuggestion, PlaceSuggestions};
pub use route::{RouteCandidate, RouteRequest, RouteSet, TravelMode, MAX_CANDIDATES};
pub use session::{PlannerSession, Status, MIN_QUERY_LEN};
