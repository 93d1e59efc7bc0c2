use super::Engine;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    api::{Outcome, PlannerAPI},
    entities::{Action, PlannerSession},
    error::{not_found_error, Error},
    presentation::MapView,
};

#[async_trait]
impl PlannerAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn create_session(&self) -> Result<PlannerSession, Error> {
        let session = PlannerSession::new();

        self.sessions
            .lock()
            .await
            .insert(session.id, session.clone());

        tracing::info!(session = %session.id, "session created");

        Ok(session)
    }

    #[tracing::instrument(skip(self))]
    async fn find_session(&self, id: Uuid) -> Result<PlannerSession, Error> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(&id).ok_or_else(not_found_error)?;

        session.touched_at = Utc::now();

        Ok(session.clone())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_session(&self, id: Uuid) -> Result<(), Error> {
        let mut sessions = self.sessions.lock().await;

        sessions.remove(&id).ok_or_else(not_found_error)?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn perform(&self, id: Uuid, action: Action) -> Result<Outcome, Error> {
        self.apply(id, action.into()).await
    }

    #[tracing::instrument(skip(self))]
    async fn map_view(&self, id: Uuid) -> Result<MapView, Error> {
        let session = self.find_session(id).await?;

        Ok(MapView::from_session(&session, &self.map))
    }
}
