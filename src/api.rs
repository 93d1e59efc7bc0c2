use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{Action, Coordinates, PlaceSuggestions, PlannerSession, RouteRequest, RouteSet};
use crate::error::Error;
use crate::presentation::MapView;

#[async_trait]
pub trait DirectionsAPI {
    async fn request_routes(&self, request: &RouteRequest) -> Result<RouteSet, Error>;
}

/// Reverse geocoding. Never fails; a fallback name stands in for errors.
#[async_trait]
pub trait NamingAPI {
    async fn resolve_name(&self, coordinates: Coordinates) -> String;
}

/// Forward geocoding. Never fails; errors yield no suggestions.
#[async_trait]
pub trait SearchAPI {
    async fn search(&self, query: &str) -> PlaceSuggestions;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Outcome {
    pub session: PlannerSession,
    pub alerts: Vec<String>,
}

#[async_trait]
pub trait PlannerAPI {
    async fn create_session(&self) -> Result<PlannerSession, Error>;
    async fn find_session(&self, id: Uuid) -> Result<PlannerSession, Error>;
    async fn delete_session(&self, id: Uuid) -> Result<(), Error>;
    async fn perform(&self, id: Uuid, action: Action) -> Result<Outcome, Error>;
    async fn map_view(&self, id: Uuid) -> Result<MapView, Error>;
}

pub type DynAPI = Arc<dyn PlannerAPI + Send + Sync>;
pub type DynDirections = Arc<dyn DirectionsAPI + Send + Sync>;
pub type DynNaming = Arc<dyn NamingAPI + Send + Sync>;
pub type DynSearch = Arc<dyn SearchAPI + Send + Sync>;
