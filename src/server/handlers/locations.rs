use axum::extract::{Extension, Json, Path};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{DynAPI, Outcome};
use crate::entities::{Action, Coordinates};
use crate::error::Error;

/// What the browser geolocation capability reported.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeolocationParams {
    Position(Coordinates),
    Error(String),
}

pub async fn click(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
    Json(coordinates): Json<Coordinates>,
) -> Result<Json<Outcome>, Error> {
    super::perform(&api, id, Action::MapClicked { coordinates }).await
}

pub async fn geolocation(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
    Json(params): Json<GeolocationParams>,
) -> Result<Json<Outcome>, Error> {
    let action = match params {
        GeolocationParams::Position(coordinates) => Action::GeolocationResolved { coordinates },
        GeolocationParams::Error(reason) => Action::GeolocationFailed { reason },
    };

    super::perform(&api, id, action).await
}
