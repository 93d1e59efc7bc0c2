use axum::extract::{Extension, Json, Path};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{DynAPI, Outcome};
use crate::entities::Action;
use crate::error::Error;

#[derive(Serialize, Deserialize)]
pub struct QueryParams {
    query: String,
}

#[derive(Serialize, Deserialize)]
pub struct SelectParams {
    index: usize,
}

pub async fn query(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
    Json(params): Json<QueryParams>,
) -> Result<Json<Outcome>, Error> {
    super::perform(&api, id, Action::SearchChanged { query: params.query }).await
}

pub async fn select(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
    Json(params): Json<SelectParams>,
) -> Result<Json<Outcome>, Error> {
    super::perform(&api, id, Action::SuggestionSelected { index: params.index }).await
}
