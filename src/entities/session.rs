use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{
    Action, Coordinates, Effect, Event, NamedPoint, PlaceSuggestions, RouteRequest, RouteSet,
    SecondClickPolicy, Slot, TravelMode,
};
use crate::error::{
    empty_result_error, incomplete_route_error, invalid_input_error, invalid_state_error, Error,
};

/// Shortest query that is worth sending to the search service.
pub const MIN_QUERY_LEN: usize = 3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Empty,
    OriginSet,
    Ready,
    RouteLoading,
    RouteReady,
    RouteFailed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlannerSession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Last time a user action or read reached this session.
    pub touched_at: DateTime<Utc>,
    pub status: Status,
    pub origin: Option<NamedPoint>,
    pub destination: Option<NamedPoint>,
    pub mode: TravelMode,
    pub routes: RouteSet,
    pub distance: Option<String>,
    pub duration: Option<String>,
    pub query: String,
    pub suggestions: PlaceSuggestions,
    pub error: Option<String>,
    pub pending: Option<RouteRequest>,
}

impl Default for PlannerSession {
    fn default() -> Self {
        Self::new()
    }
}

impl PlannerSession {
    pub fn new() -> Self {
        Self::blank(Uuid::new_v4(), Utc::now())
    }

    fn blank(id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at,
            touched_at: created_at,
            status: Status::Empty,
            origin: None,
            destination: None,
            mode: TravelMode::default(),
            routes: RouteSet::default(),
            distance: None,
            duration: None,
            query: String::new(),
            suggestions: Vec::new(),
            error: None,
            pending: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == Status::RouteLoading
    }

    pub fn point(&self, slot: Slot) -> Option<&NamedPoint> {
        match slot {
            Slot::Origin => self.origin.as_ref(),
            Slot::Destination => self.destination.as_ref(),
        }
    }

    fn point_mut(&mut self, slot: Slot) -> &mut Option<NamedPoint> {
        match slot {
            Slot::Origin => &mut self.origin,
            Slot::Destination => &mut self.destination,
        }
    }

    /// The request a fetch would be issued for right now.
    pub fn route_request(&self) -> Result<RouteRequest, Error> {
        match (&self.origin, &self.destination) {
            (Some(origin), Some(destination)) => Ok(RouteRequest {
                origin: origin.coordinates,
                destination: destination.coordinates,
                mode: self.mode,
            }),
            _ => Err(incomplete_route_error()),
        }
    }

    /// Applies one event and returns the effects it requires.
    ///
    /// The session performs no I/O; an `Err` leaves it untouched.
    #[tracing::instrument(skip(self), fields(session = %self.id, status = ?self.status))]
    pub fn handle(
        &mut self,
        event: Event,
        policy: SecondClickPolicy,
    ) -> Result<Vec<Effect>, Error> {
        match event {
            Event::Action(action) => self.perform(action, policy),
            Event::RoutesFetched { request, result } => {
                self.routes_fetched(request, result);
                Ok(vec![])
            }
            Event::NameResolved {
                slot,
                coordinates,
                name,
            } => {
                self.name_resolved(slot, coordinates, name);
                Ok(vec![])
            }
            Event::SearchResolved { query, suggestions } => {
                if query == self.query {
                    self.suggestions = suggestions;
                } else {
                    tracing::debug!("discarding search results for an outdated query");
                }
                Ok(vec![])
            }
        }
    }

    fn perform(&mut self, action: Action, policy: SecondClickPolicy) -> Result<Vec<Effect>, Error> {
        match action {
            Action::MapClicked { coordinates } => {
                Ok(self.place(NamedPoint::unresolved(coordinates), policy))
            }
            Action::SuggestionSelected { index } => {
                let suggestion = self
                    .suggestions
                    .get(index)
                    .cloned()
                    .ok_or_else(invalid_input_error)?;

                let slot = match self.free_slot(policy) {
                    Some(slot) => slot,
                    None => return Ok(vec![]),
                };

                let effects =
                    self.set_point(slot, NamedPoint::named(suggestion.coordinates, suggestion.name));
                self.query.clear();
                self.suggestions.clear();

                Ok(effects)
            }
            Action::SearchChanged { query } => {
                self.query = query;

                if self.query.trim().chars().count() < MIN_QUERY_LEN {
                    self.suggestions.clear();
                    return Ok(vec![]);
                }

                Ok(vec![Effect::Search(self.query.clone())])
            }
            Action::ModeChanged { mode } => {
                self.mode = mode;

                match self.route_request() {
                    Ok(request) => Ok(vec![self.fetch(request)]),
                    Err(_) => Ok(vec![]),
                }
            }
            Action::CandidateSelected { index } => {
                if self.status != Status::RouteReady {
                    return Err(invalid_state_error());
                }

                self.routes.select(index)?;
                self.derive_labels();

                Ok(vec![])
            }
            Action::GeolocationResolved { coordinates } => {
                Ok(self.set_point(Slot::Origin, NamedPoint::unresolved(coordinates)))
            }
            Action::GeolocationFailed { reason } => Ok(vec![Effect::Alert(format!(
                "Unable to retrieve your location: {}",
                reason
            ))]),
            Action::Retry => match self.route_request() {
                Ok(request) => Ok(vec![self.fetch(request)]),
                Err(err) => {
                    self.error = Some(err.message);
                    Ok(vec![])
                }
            },
            Action::Reset => {
                *self = Self::blank(self.id, self.created_at);
                Ok(vec![])
            }
        }
    }

    /// The slot the next placed point goes to, if any.
    fn free_slot(&self, policy: SecondClickPolicy) -> Option<Slot> {
        match (&self.origin, &self.destination) {
            (None, _) => Some(Slot::Origin),
            (Some(_), None) => Some(Slot::Destination),
            (Some(_), Some(_)) => match policy {
                SecondClickPolicy::Ignore => {
                    tracing::debug!("both points already set, ignoring");
                    None
                }
                SecondClickPolicy::ReplaceDestination => Some(Slot::Destination),
            },
        }
    }

    fn place(&mut self, point: NamedPoint, policy: SecondClickPolicy) -> Vec<Effect> {
        match self.free_slot(policy) {
            Some(slot) => self.set_point(slot, point),
            None => vec![],
        }
    }

    fn set_point(&mut self, slot: Slot, point: NamedPoint) -> Vec<Effect> {
        let mut effects = Vec::new();

        if !point.is_resolved() {
            effects.push(Effect::ResolveName {
                slot,
                coordinates: point.coordinates,
            });
        }

        *self.point_mut(slot) = Some(point);
        self.clear_routes();

        match self.route_request() {
            Ok(request) => {
                self.status = Status::Ready;
                effects.push(self.fetch(request));
            }
            Err(_) => self.status = Status::OriginSet,
        }

        effects
    }

    fn fetch(&mut self, request: RouteRequest) -> Effect {
        self.clear_routes();
        self.status = Status::RouteLoading;
        self.pending = Some(request);

        Effect::FetchRoutes(request)
    }

    fn routes_fetched(&mut self, request: RouteRequest, result: Result<RouteSet, String>) {
        if self.status != Status::RouteLoading || self.pending != Some(request) {
            tracing::debug!(?request, "discarding stale route response");
            return;
        }

        self.pending = None;

        match result {
            Ok(routes) if !routes.is_empty() => {
                self.routes = RouteSet {
                    selected: 0,
                    ..routes
                };
                self.status = Status::RouteReady;
                self.error = None;
                self.derive_labels();
            }
            Ok(_) => self.fail(empty_result_error().message),
            Err(message) => self.fail(message),
        }
    }

    fn name_resolved(&mut self, slot: Slot, coordinates: Coordinates, name: String) {
        match self.point_mut(slot) {
            Some(point) if point.coordinates == coordinates => point.name = name,
            _ => tracing::debug!(?slot, "discarding name for a point that has moved"),
        }
    }

    fn fail(&mut self, message: String) {
        self.clear_routes();
        self.status = Status::RouteFailed;
        self.error = Some(message);
    }

    fn clear_routes(&mut self) {
        self.routes = RouteSet::default();
        self.distance = None;
        self.duration = None;
        self.error = None;
        self.pending = None;
    }

    fn derive_labels(&mut self) {
        let selected = self.routes.selected();
        self.distance = selected.map(|candidate| candidate.distance_label());
        self.duration = selected.map(|candidate| candidate.duration_label());
    }
}

#[cfg(test)]
fn act(session: &mut PlannerSession, action: Action) -> Vec<Effect> {
    session
        .handle(action.into(), SecondClickPolicy::Ignore)
        .unwrap()
}

#[cfg(test)]
fn click(session: &mut PlannerSession, latitude: f64, longitude: f64) -> Vec<Effect> {
    act(
        session,
        Action::MapClicked {
            coordinates: Coordinates::new(latitude, longitude),
        },
    )
}

#[cfg(test)]
fn fetched(session: &mut PlannerSession, request: RouteRequest, result: Result<RouteSet, String>) {
    let effects = session
        .handle(
            Event::RoutesFetched { request, result },
            SecondClickPolicy::Ignore,
        )
        .unwrap();
    assert!(effects.is_empty());
}

#[cfg(test)]
fn two_routes() -> RouteSet {
    use crate::entities::RouteCandidate;

    RouteSet::new(vec![
        RouteCandidate::new(vec![], 5000.0, 600.0),
        RouteCandidate::new(vec![], 4800.0, 650.0),
    ])
}

#[test]
fn two_clicks_fetch_routes() {
    let mut session = PlannerSession::new();

    let effects = click(&mut session, 51.50, -0.10);
    assert_eq!(session.status, Status::OriginSet);
    assert_eq!(
        effects,
        vec![Effect::ResolveName {
            slot: Slot::Origin,
            coordinates: Coordinates::new(51.50, -0.10),
        }]
    );
    assert!(!session.origin.as_ref().unwrap().is_resolved());

    let effects = click(&mut session, 51.51, -0.08);
    let request = RouteRequest {
        origin: Coordinates::new(51.50, -0.10),
        destination: Coordinates::new(51.51, -0.08),
        mode: TravelMode::Driving,
    };
    assert_eq!(session.status, Status::RouteLoading);
    assert!(session.is_loading());
    assert_eq!(
        effects,
        vec![
            Effect::ResolveName {
                slot: Slot::Destination,
                coordinates: Coordinates::new(51.51, -0.08),
            },
            Effect::FetchRoutes(request),
        ]
    );

    fetched(&mut session, request, Ok(two_routes()));
    assert_eq!(session.status, Status::RouteReady);
    assert_eq!(session.routes.len(), 2);
    assert_eq!(session.routes.selected, 0);
    assert_eq!(session.distance.as_deref(), Some("5.00 km"));
    assert_eq!(session.duration.as_deref(), Some("10.00 min"));
    assert!(session.pending.is_none());
}

#[test]
fn no_fetch_without_both_points() {
    let mut session = PlannerSession::new();

    let before = session.clone();
    let effects = act(&mut session, Action::Retry);
    assert!(effects.is_empty());
    assert_eq!(
        session.error.as_deref(),
        Some("origin and destination are required")
    );
    assert_eq!(
        PlannerSession {
            error: None,
            ..session.clone()
        },
        before
    );

    click(&mut session, 51.50, -0.10);
    let effects = act(
        &mut session,
        Action::ModeChanged {
            mode: TravelMode::Walking,
        },
    );
    assert!(effects.is_empty());
    assert_eq!(session.mode, TravelMode::Walking);
    assert_eq!(session.status, Status::OriginSet);

    let effects = act(&mut session, Action::Retry);
    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, Effect::FetchRoutes(_))));
    assert_eq!(session.status, Status::OriginSet);
}

#[test]
fn selecting_a_candidate_does_not_refetch() {
    let mut session = PlannerSession::new();
    click(&mut session, 51.50, -0.10);
    click(&mut session, 51.51, -0.08);
    let request = session.pending.unwrap();
    fetched(&mut session, request, Ok(two_routes()));

    let effects = act(&mut session, Action::CandidateSelected { index: 1 });
    assert!(effects.is_empty());
    assert_eq!(session.status, Status::RouteReady);
    assert_eq!(session.routes.selected, 1);
    assert_eq!(session.distance.as_deref(), Some("4.80 km"));
    assert_eq!(session.duration.as_deref(), Some("10.83 min"));

    let err = session
        .handle(
            Action::CandidateSelected { index: 2 }.into(),
            SecondClickPolicy::Ignore,
        )
        .unwrap_err();
    assert_eq!(err, invalid_input_error());
    assert_eq!(session.routes.selected, 1);
}

#[test]
fn candidate_selection_requires_ready_routes() {
    let mut session = PlannerSession::new();
    click(&mut session, 51.50, -0.10);
    click(&mut session, 51.51, -0.08);

    let err = session
        .handle(
            Action::CandidateSelected { index: 0 }.into(),
            SecondClickPolicy::Ignore,
        )
        .unwrap_err();
    assert_eq!(err, invalid_state_error());
    assert_eq!(session.status, Status::RouteLoading);
}

#[test]
fn stale_route_responses_are_discarded() {
    let mut session = PlannerSession::new();
    click(&mut session, 51.50, -0.10);
    click(&mut session, 51.51, -0.08);
    let driving = session.pending.unwrap();

    let effects = act(
        &mut session,
        Action::ModeChanged {
            mode: TravelMode::Walking,
        },
    );
    let walking = session.pending.unwrap();
    assert_eq!(effects, vec![Effect::FetchRoutes(walking)]);
    assert_eq!(walking.mode, TravelMode::Walking);

    fetched(&mut session, driving, Ok(two_routes()));
    assert_eq!(session.status, Status::RouteLoading);
    assert!(session.routes.is_empty());

    fetched(&mut session, walking, Err("route request failed: timeout".into()));
    assert_eq!(session.status, Status::RouteFailed);

    // a late success for the same triple must not resurrect routes
    fetched(&mut session, walking, Ok(two_routes()));
    assert_eq!(session.status, Status::RouteFailed);
    assert!(session.routes.is_empty());
}

#[test]
fn failures_clear_routes_and_keep_message() {
    let mut session = PlannerSession::new();
    click(&mut session, 51.50, -0.10);
    click(&mut session, 51.51, -0.08);
    let request = session.pending.unwrap();

    fetched(&mut session, request, Ok(RouteSet::default()));
    assert_eq!(session.status, Status::RouteFailed);
    assert_eq!(session.error.as_deref(), Some("no routes found"));
    assert!(session.distance.is_none());

    let effects = act(&mut session, Action::Retry);
    assert_eq!(effects, vec![Effect::FetchRoutes(request)]);
    assert!(session.error.is_none());

    fetched(&mut session, request, Err("directions service responded with 502".into()));
    assert_eq!(session.status, Status::RouteFailed);
    assert_eq!(
        session.error.as_deref(),
        Some("directions service responded with 502")
    );
    assert!(session.routes.is_empty());
}

#[test]
fn reset_restores_initial_state() {
    let mut session = PlannerSession::new();
    let initial = session.clone();

    click(&mut session, 51.50, -0.10);
    click(&mut session, 51.51, -0.08);
    act(
        &mut session,
        Action::ModeChanged {
            mode: TravelMode::Cycling,
        },
    );
    act(
        &mut session,
        Action::SearchChanged {
            query: "Baker Street".into(),
        },
    );
    let request = session.pending.unwrap();
    fetched(&mut session, request, Ok(two_routes()));

    let effects = act(&mut session, Action::Reset);
    assert!(effects.is_empty());
    assert_eq!(session, initial);
}

#[test]
fn second_click_is_ignored_by_default() {
    let mut session = PlannerSession::new();
    click(&mut session, 51.50, -0.10);
    click(&mut session, 51.51, -0.08);
    let request = session.pending.unwrap();
    fetched(&mut session, request, Ok(two_routes()));
    let before = session.clone();

    let effects = click(&mut session, 51.52, -0.07);
    assert!(effects.is_empty());
    assert_eq!(session, before);
}

#[test]
fn second_click_can_replace_destination() {
    let mut session = PlannerSession::new();
    click(&mut session, 51.50, -0.10);
    click(&mut session, 51.51, -0.08);
    let first = session.pending.unwrap();
    fetched(&mut session, first, Ok(two_routes()));

    let effects = session
        .handle(
            Action::MapClicked {
                coordinates: Coordinates::new(51.52, -0.07),
            }
            .into(),
            SecondClickPolicy::ReplaceDestination,
        )
        .unwrap();

    let second = session.pending.unwrap();
    assert_eq!(second.destination, Coordinates::new(51.52, -0.07));
    assert_eq!(second.origin, first.origin);
    assert_eq!(effects.len(), 2);
    assert_eq!(effects[1], Effect::FetchRoutes(second));
    assert!(session.routes.is_empty());
    assert_eq!(session.status, Status::RouteLoading);
}

#[test]
fn names_apply_only_to_current_points() {
    let mut session = PlannerSession::new();
    click(&mut session, 51.50, -0.10);

    let policy = SecondClickPolicy::Ignore;
    session
        .handle(
            Event::NameResolved {
                slot: Slot::Origin,
                coordinates: Coordinates::new(40.0, 0.0),
                name: "Elsewhere".into(),
            },
            policy,
        )
        .unwrap();
    assert!(!session.origin.as_ref().unwrap().is_resolved());

    session
        .handle(
            Event::NameResolved {
                slot: Slot::Origin,
                coordinates: Coordinates::new(51.50, -0.10),
                name: "Westminster".into(),
            },
            policy,
        )
        .unwrap();
    assert_eq!(session.origin.as_ref().unwrap().name, "Westminster");

    session
        .handle(
            Event::NameResolved {
                slot: Slot::Destination,
                coordinates: Coordinates::new(51.50, -0.10),
                name: "Nowhere".into(),
            },
            policy,
        )
        .unwrap();
    assert!(session.destination.is_none());
}

#[test]
fn short_queries_do_not_search() {
    let mut session = PlannerSession::new();

    let effects = act(&mut session, Action::SearchChanged { query: "ba".into() });
    assert!(effects.is_empty());
    assert!(session.suggestions.is_empty());

    let effects = act(&mut session, Action::SearchChanged { query: "  ba ".into() });
    assert!(effects.is_empty());

    let effects = act(&mut session, Action::SearchChanged { query: "bak".into() });
    assert_eq!(effects, vec![Effect::Search("bak".into())]);
}

#[test]
fn suggestions_set_named_points() {
    use crate::entities::PlaceSuggestion;

    let mut session = PlannerSession::new();
    act(
        &mut session,
        Action::SearchChanged {
            query: "Baker".into(),
        },
    );

    let suggestion = PlaceSuggestion {
        name: "Baker Street, London".into(),
        coordinates: Coordinates::new(51.5226, -0.1571),
    };
    session
        .handle(
            Event::SearchResolved {
                query: "Bak".into(),
                suggestions: vec![],
            },
            SecondClickPolicy::Ignore,
        )
        .unwrap();
    session
        .handle(
            Event::SearchResolved {
                query: "Baker".into(),
                suggestions: vec![suggestion.clone()],
            },
            SecondClickPolicy::Ignore,
        )
        .unwrap();
    assert_eq!(session.suggestions, vec![suggestion.clone()]);

    let effects = act(&mut session, Action::SuggestionSelected { index: 0 });
    assert!(effects.is_empty());
    assert_eq!(session.status, Status::OriginSet);
    assert_eq!(
        session.origin,
        Some(NamedPoint::named(suggestion.coordinates, suggestion.name))
    );
    assert!(session.query.is_empty());
    assert!(session.suggestions.is_empty());

    let err = session
        .handle(
            Action::SuggestionSelected { index: 0 }.into(),
            SecondClickPolicy::Ignore,
        )
        .unwrap_err();
    assert_eq!(err, invalid_input_error());
}

#[test]
fn ignored_suggestion_keeps_the_search() {
    use crate::entities::PlaceSuggestion;

    let mut session = PlannerSession::new();
    click(&mut session, 51.50, -0.10);
    click(&mut session, 51.51, -0.08);

    act(
        &mut session,
        Action::SearchChanged {
            query: "Baker".into(),
        },
    );
    let suggestions = vec![PlaceSuggestion {
        name: "Baker Street, London".into(),
        coordinates: Coordinates::new(51.5226, -0.1571),
    }];
    session
        .handle(
            Event::SearchResolved {
                query: "Baker".into(),
                suggestions: suggestions.clone(),
            },
            SecondClickPolicy::Ignore,
        )
        .unwrap();
    let before = session.clone();

    let effects = act(&mut session, Action::SuggestionSelected { index: 0 });
    assert!(effects.is_empty());
    assert_eq!(session, before);
    assert_eq!(session.query, "Baker");
    assert_eq!(session.suggestions, suggestions);
}

#[test]
fn geolocation_sets_origin_or_alerts() {
    let mut session = PlannerSession::new();
    let before = session.clone();

    let effects = act(
        &mut session,
        Action::GeolocationFailed {
            reason: "permission denied".into(),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::Alert(
            "Unable to retrieve your location: permission denied".into()
        )]
    );
    assert_eq!(session, before);

    click(&mut session, 51.50, -0.10);
    click(&mut session, 51.51, -0.08);

    let effects = act(
        &mut session,
        Action::GeolocationResolved {
            coordinates: Coordinates::new(51.49, -0.12),
        },
    );
    let request = session.pending.unwrap();
    assert_eq!(request.origin, Coordinates::new(51.49, -0.12));
    assert_eq!(
        effects,
        vec![
            Effect::ResolveName {
                slot: Slot::Origin,
                coordinates: Coordinates::new(51.49, -0.12),
            },
            Effect::FetchRoutes(request),
        ]
    );
}
