mod planner_api;

use async_channel::{Receiver, Sender};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    api::{DynDirections, DynNaming, DynSearch, Outcome},
    config::{Config, MapSettings},
    entities::{Effect, Event, PlannerSession, SecondClickPolicy},
    error::{configuration_error, not_found_error, Error},
    external::{Nominatim, OpenRouteService},
};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct Envelope {
    session_id: Uuid,
    event: Event,
}

/// Owns every planner session and runs the effects their transitions ask for.
///
/// Transitions happen one at a time under the session lock. Adapter calls run
/// as background tasks and report back through a channel drained by a single
/// event loop, so a completion is just another event for the session.
#[derive(Clone)]
pub struct Engine {
    sessions: Arc<Mutex<HashMap<Uuid, PlannerSession>>>,
    directions: DynDirections,
    naming: DynNaming,
    search: DynSearch,
    map: MapSettings,
    policy: SecondClickPolicy,
    session_ttl: chrono::Duration,
    events: Sender<Envelope>,
}

impl Engine {
    #[tracing::instrument(name = "Engine::new", skip_all)]
    pub fn new(config: &Config) -> Result<Self, Error> {
        let directions = Arc::new(OpenRouteService::new(
            &config.directions,
            config.request_timeout,
        )?);
        let geocoder = Arc::new(Nominatim::new(&config.geocoding, config.request_timeout)?);
        let session_ttl = chrono::Duration::from_std(config.session_ttl)
            .map_err(|err| configuration_error(format!("invalid session ttl: {}", err)))?;

        Ok(Self::with_adapters(
            directions,
            geocoder.clone(),
            geocoder,
            config.map.clone(),
            config.second_click,
            session_ttl,
        ))
    }

    /// Must be called from within a Tokio runtime; the event loop and the
    /// idle session sweep are spawned here.
    pub fn with_adapters(
        directions: DynDirections,
        naming: DynNaming,
        search: DynSearch,
        map: MapSettings,
        policy: SecondClickPolicy,
        session_ttl: chrono::Duration,
    ) -> Self {
        let (events, inbox) = async_channel::unbounded();

        let engine = Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            directions,
            naming,
            search,
            map,
            policy,
            session_ttl,
            events,
        };

        tokio::spawn(engine.clone().run(inbox));
        tokio::spawn(engine.clone().sweep());

        engine
    }

    async fn run(self, mut inbox: Receiver<Envelope>) {
        while let Some(Envelope { session_id, event }) = inbox.next().await {
            if let Err(err) = self.apply(session_id, event).await {
                tracing::debug!(%session_id, %err, "dropping adapter completion");
            }
        }
    }

    async fn sweep(self) {
        let mut ticks = tokio::time::interval(SWEEP_INTERVAL);

        loop {
            ticks.tick().await;
            self.evict_idle(Utc::now()).await;
        }
    }

    /// Drops every session whose last touch is older than the ttl at `now`.
    pub async fn evict_idle(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();

        sessions.retain(|_, session| now - session.touched_at <= self.session_ttl);

        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::info!(evicted, remaining = sessions.len(), "evicted idle sessions");
        }

        evicted
    }

    #[tracing::instrument(skip(self, event))]
    async fn apply(&self, session_id: Uuid, event: Event) -> Result<Outcome, Error> {
        let from_user = matches!(event, Event::Action(_));

        let (session, effects) = {
            let mut sessions = self.sessions.lock().await;
            let session = sessions
                .get_mut(&session_id)
                .ok_or_else(not_found_error)?;
            let effects = session.handle(event, self.policy)?;
            if from_user {
                session.touched_at = Utc::now();
            }
            (session.clone(), effects)
        };

        let mut alerts = Vec::new();

        for effect in effects {
            match effect {
                Effect::Alert(message) => alerts.push(message),
                effect => self.execute(session_id, effect),
            }
        }

        Ok(Outcome { session, alerts })
    }

    fn execute(&self, session_id: Uuid, effect: Effect) {
        let events = self.events.clone();

        match effect {
            Effect::FetchRoutes(request) => {
                let directions = self.directions.clone();
                tracing::info!(%session_id, ?request, "fetching routes");

                tokio::spawn(async move {
                    let result = directions
                        .request_routes(&request)
                        .await
                        .map_err(|err| err.message);
                    notify(&events, session_id, Event::RoutesFetched { request, result }).await;
                });
            }
            Effect::ResolveName { slot, coordinates } => {
                let naming = self.naming.clone();

                tokio::spawn(async move {
                    let name = naming.resolve_name(coordinates).await;
                    let event = Event::NameResolved {
                        slot,
                        coordinates,
                        name,
                    };
                    notify(&events, session_id, event).await;
                });
            }
            Effect::Search(query) => {
                let search = self.search.clone();

                tokio::spawn(async move {
                    let suggestions = search.search(&query).await;
                    notify(&events, session_id, Event::SearchResolved { query, suggestions })
                        .await;
                });
            }
            Effect::Alert(message) => {
                tracing::warn!(%session_id, %message, "alert raised outside of a user action");
            }
        }
    }
}

async fn notify(events: &Sender<Envelope>, session_id: Uuid, event: Event) {
    if events.send(Envelope { session_id, event }).await.is_err() {
        tracing::warn!(%session_id, "event loop has stopped");
    }
}

#[cfg(test)]
mod fakes {
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::api::{DirectionsAPI, NamingAPI, SearchAPI};
    use crate::entities::{
        Coordinates, PlaceSuggestion, PlaceSuggestions, RouteCandidate, RouteRequest, RouteSet,
        TravelMode,
    };
    use crate::error::Error;

    #[derive(Default)]
    pub struct Directions {
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl DirectionsAPI for Directions {
        async fn request_routes(&self, request: &RouteRequest) -> Result<RouteSet, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            let geometry = vec![request.origin, request.destination];

            match request.mode {
                TravelMode::Driving => {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok(RouteSet::new(vec![
                        RouteCandidate::new(geometry.clone(), 5000.0, 600.0),
                        RouteCandidate::new(geometry, 4800.0, 650.0),
                    ]))
                }
                TravelMode::Walking => Ok(RouteSet::new(vec![RouteCandidate::new(
                    geometry, 4500.0, 3300.0,
                )])),
                TravelMode::Cycling => Err(crate::error::empty_result_error()),
            }
        }
    }

    pub struct Geocoder;

    #[async_trait]
    impl NamingAPI for Geocoder {
        async fn resolve_name(&self, coordinates: Coordinates) -> String {
            format!("{:.2}, {:.2}", coordinates.latitude, coordinates.longitude)
        }
    }

    #[async_trait]
    impl SearchAPI for Geocoder {
        async fn search(&self, query: &str) -> PlaceSuggestions {
            match query {
                "baker street" => vec![PlaceSuggestion {
                    name: "Baker Street, London".into(),
                    coordinates: Coordinates::new(51.5226, -0.1571),
                }],
                _ => vec![],
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn test_engine() -> (Engine, Arc<fakes::Directions>) {
    let directions = Arc::new(fakes::Directions::default());
    let geocoder = Arc::new(fakes::Geocoder);

    let engine = Engine::with_adapters(
        directions.clone(),
        geocoder.clone(),
        geocoder,
        MapSettings::default(),
        SecondClickPolicy::Ignore,
        chrono::Duration::minutes(30),
    );

    (engine, directions)
}

#[cfg(test)]
async fn settle<F>(engine: &Engine, id: Uuid, done: F) -> PlannerSession
where
    F: Fn(&PlannerSession) -> bool,
{
    use crate::api::PlannerAPI;

    for _ in 0..200 {
        let session = engine.find_session(id).await.unwrap();
        if done(&session) {
            return session;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    panic!("session {} never settled", id);
}

#[cfg(test)]
fn click_at(latitude: f64, longitude: f64) -> crate::entities::Action {
    crate::entities::Action::MapClicked {
        coordinates: crate::entities::Coordinates::new(latitude, longitude),
    }
}

#[tokio::test]
async fn clicks_drive_a_full_route_fetch() {
    use crate::api::PlannerAPI;
    use crate::entities::Status;
    use std::sync::atomic::Ordering;

    let (engine, directions) = test_engine();
    let id = engine.create_session().await.unwrap().id;

    let outcome = engine.perform(id, click_at(51.50, -0.10)).await.unwrap();
    assert_eq!(outcome.session.status, Status::OriginSet);
    assert!(outcome.alerts.is_empty());

    let outcome = engine.perform(id, click_at(51.51, -0.08)).await.unwrap();
    assert_eq!(outcome.session.status, Status::RouteLoading);

    let session = settle(&engine, id, |s| {
        s.status == Status::RouteReady
            && s.origin.as_ref().map_or(false, |p| p.is_resolved())
            && s.destination.as_ref().map_or(false, |p| p.is_resolved())
    })
    .await;

    assert_eq!(session.routes.len(), 2);
    assert_eq!(session.routes.selected, 0);
    assert_eq!(session.distance.as_deref(), Some("5.00 km"));
    assert_eq!(session.duration.as_deref(), Some("10.00 min"));
    assert_eq!(session.origin.unwrap().name, "51.50, -0.10");
    assert_eq!(session.destination.unwrap().name, "51.51, -0.08");
    assert_eq!(directions.calls.load(Ordering::SeqCst), 1);

    let outcome = engine
        .perform(id, crate::entities::Action::CandidateSelected { index: 1 })
        .await
        .unwrap();
    assert_eq!(outcome.session.distance.as_deref(), Some("4.80 km"));
    assert_eq!(directions.calls.load(Ordering::SeqCst), 1);

    let view = engine.map_view(id).await.unwrap();
    assert_eq!(view.polylines.len(), 2);
    assert_eq!(view.markers.len(), 2);
}

#[tokio::test]
async fn slow_stale_responses_do_not_win() {
    use crate::api::PlannerAPI;
    use crate::entities::{Action, Status, TravelMode};
    use std::sync::atomic::Ordering;

    let (engine, directions) = test_engine();
    let id = engine.create_session().await.unwrap().id;

    engine.perform(id, click_at(51.50, -0.10)).await.unwrap();
    engine.perform(id, click_at(51.51, -0.08)).await.unwrap();
    engine
        .perform(
            id,
            Action::ModeChanged {
                mode: TravelMode::Walking,
            },
        )
        .await
        .unwrap();

    let session = settle(&engine, id, |s| s.status == Status::RouteReady).await;
    assert_eq!(session.mode, TravelMode::Walking);
    assert_eq!(session.distance.as_deref(), Some("4.50 km"));

    // let the slow driving response arrive
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    let session = engine.find_session(id).await.unwrap();
    assert_eq!(session.routes.len(), 1);
    assert_eq!(session.distance.as_deref(), Some("4.50 km"));
    assert_eq!(directions.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failed_fetches_surface_on_the_session() {
    use crate::api::PlannerAPI;
    use crate::entities::{Action, Status, TravelMode};

    let (engine, _) = test_engine();
    let id = engine.create_session().await.unwrap().id;

    engine
        .perform(
            id,
            Action::ModeChanged {
                mode: TravelMode::Cycling,
            },
        )
        .await
        .unwrap();
    engine.perform(id, click_at(51.50, -0.10)).await.unwrap();
    engine.perform(id, click_at(51.51, -0.08)).await.unwrap();

    let session = settle(&engine, id, |s| s.status == Status::RouteFailed).await;
    assert_eq!(session.error.as_deref(), Some("no routes found"));
    assert!(session.routes.is_empty());
}

#[tokio::test]
async fn retry_without_destination_skips_the_network() {
    use crate::api::PlannerAPI;
    use crate::entities::{Action, Status};
    use std::sync::atomic::Ordering;

    let (engine, directions) = test_engine();
    let id = engine.create_session().await.unwrap().id;
    engine.perform(id, click_at(51.50, -0.10)).await.unwrap();

    let outcome = engine.perform(id, Action::Retry).await.unwrap();
    assert_eq!(outcome.session.status, Status::OriginSet);
    assert_eq!(
        outcome.session.error.as_deref(),
        Some("origin and destination are required")
    );

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(directions.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn geolocation_denial_is_an_alert() {
    use crate::api::PlannerAPI;
    use crate::entities::Action;

    let (engine, _) = test_engine();
    let session = engine.create_session().await.unwrap();

    let outcome = engine
        .perform(
            session.id,
            Action::GeolocationFailed {
                reason: "User denied Geolocation".into(),
            },
        )
        .await
        .unwrap();

    assert_eq!(
        outcome.alerts,
        vec!["Unable to retrieve your location: User denied Geolocation".to_string()]
    );
    let mut expected = session;
    expected.touched_at = outcome.session.touched_at;
    assert_eq!(outcome.session, expected);
}

#[tokio::test]
async fn search_suggestions_flow_back() {
    use crate::api::PlannerAPI;
    use crate::entities::{Action, Status};

    let (engine, _) = test_engine();
    let id = engine.create_session().await.unwrap().id;

    engine
        .perform(
            id,
            Action::SearchChanged {
                query: "baker street".into(),
            },
        )
        .await
        .unwrap();

    settle(&engine, id, |s| !s.suggestions.is_empty()).await;

    let outcome = engine
        .perform(id, Action::SuggestionSelected { index: 0 })
        .await
        .unwrap();
    assert_eq!(outcome.session.status, Status::OriginSet);
    assert_eq!(outcome.session.origin.unwrap().name, "Baker Street, London");
}

#[tokio::test]
async fn unknown_and_deleted_sessions() {
    use crate::api::PlannerAPI;
    use crate::error::NOT_FOUND_ERROR;

    let (engine, _) = test_engine();

    let err = engine.find_session(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.code, NOT_FOUND_ERROR);

    let id = engine.create_session().await.unwrap().id;
    engine.perform(id, click_at(51.50, -0.10)).await.unwrap();
    engine.perform(id, click_at(51.51, -0.08)).await.unwrap();
    engine.delete_session(id).await.unwrap();

    // completions for the deleted session are dropped by the loop
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    let err = engine.perform(id, click_at(51.52, -0.07)).await.unwrap_err();
    assert_eq!(err.code, NOT_FOUND_ERROR);
    assert_eq!(
        engine.delete_session(id).await.unwrap_err().code,
        NOT_FOUND_ERROR
    );
}

#[tokio::test]
async fn idle_sessions_expire() {
    use crate::api::PlannerAPI;
    use crate::error::NOT_FOUND_ERROR;

    let (engine, _) = test_engine();
    let id = engine.create_session().await.unwrap().id;

    assert_eq!(engine.evict_idle(Utc::now()).await, 0);
    engine.find_session(id).await.unwrap();

    let later = Utc::now() + chrono::Duration::minutes(31);
    assert_eq!(engine.evict_idle(later).await, 1);

    let err = engine.find_session(id).await.unwrap_err();
    assert_eq!(err.code, NOT_FOUND_ERROR);
    let err = engine.perform(id, click_at(51.50, -0.10)).await.unwrap_err();
    assert_eq!(err.code, NOT_FOUND_ERROR);
}

#[tokio::test]
async fn activity_keeps_sessions_alive() {
    use crate::api::PlannerAPI;

    let (engine, _) = test_engine();
    let created = engine.create_session().await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let outcome = engine.perform(created.id, click_at(51.50, -0.10)).await.unwrap();
    assert!(outcome.session.touched_at > created.touched_at);

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let polled = engine.find_session(created.id).await.unwrap();
    assert!(polled.touched_at > outcome.session.touched_at);

    let just_past_creation = created.touched_at + chrono::Duration::minutes(30)
        + chrono::Duration::milliseconds(10);
    assert_eq!(engine.evict_idle(just_past_creation).await, 0);
    engine.find_session(created.id).await.unwrap();
}
