pub mod locations;
pub mod routes;
pub mod search;
pub mod sessions;

use axum::extract::Json;
use uuid::Uuid;

use crate::api::{DynAPI, Outcome};
use crate::entities::Action;
use crate::error::Error;

async fn perform(api: &DynAPI, id: Uuid, action: Action) -> Result<Json<Outcome>, Error> {
    let outcome = api.perform(id, action).await?;

    Ok(outcome.into())
}
