use axum::extract::{Extension, Json, Path};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{DynAPI, Outcome};
use crate::entities::{Action, TravelMode};
use crate::error::Error;

#[derive(Serialize, Deserialize)]
pub struct ModeParams {
    mode: TravelMode,
}

#[derive(Serialize, Deserialize)]
pub struct SelectParams {
    index: usize,
}

pub async fn change_mode(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
    Json(params): Json<ModeParams>,
) -> Result<Json<Outcome>, Error> {
    super::perform(&api, id, Action::ModeChanged { mode: params.mode }).await
}

pub async fn select(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
    Json(params): Json<SelectParams>,
) -> Result<Json<Outcome>, Error> {
    super::perform(&api, id, Action::CandidateSelected { index: params.index }).await
}

pub async fn retry(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<Outcome>, Error> {
    super::perform(&api, id, Action::Retry).await
}
