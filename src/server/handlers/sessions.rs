use axum::extract::{Extension, Json, Path};
use uuid::Uuid;

use crate::api::{DynAPI, Outcome};
use crate::entities::{Action, PlannerSession};
use crate::error::Error;
use crate::presentation::MapView;

pub async fn create(Extension(api): Extension<DynAPI>) -> Result<Json<PlannerSession>, Error> {
    let session = api.create_session().await?;

    Ok(session.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<PlannerSession>, Error> {
    let session = api.find_session(id).await?;

    Ok(session.into())
}

pub async fn delete(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<()>, Error> {
    api.delete_session(id).await?;

    Ok(().into())
}

pub async fn map(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<MapView>, Error> {
    let view = api.map_view(id).await?;

    Ok(view.into())
}

pub async fn reset(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<Outcome>, Error> {
    super::perform(&api, id, Action::Reset).await
}
