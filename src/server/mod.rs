mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::Extension,
    response::Html,
    routing::{get, patch, post},
    Router,
};

use crate::api::{DynAPI, PlannerAPI};
use crate::error::{unexpected_error, Error};
use crate::server::handlers::{locations, routes, search, sessions};

pub fn router(api: DynAPI) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/sessions", post(sessions::create))
        .route("/sessions/:id", get(sessions::find).delete(sessions::delete))
        .route("/sessions/:id/map", get(sessions::map))
        .route("/sessions/:id/reset", post(sessions::reset))
        .route("/sessions/:id/clicks", post(locations::click))
        .route("/sessions/:id/geolocation", post(locations::geolocation))
        .route("/sessions/:id/mode", patch(routes::change_mode))
        .route("/sessions/:id/routes/selected", patch(routes::select))
        .route("/sessions/:id/routes/retry", post(routes::retry))
        .route("/sessions/:id/search", post(search::query))
        .route("/sessions/:id/search/select", post(search::select))
        .layer(Extension(api))
}

pub async fn serve<T: PlannerAPI + Sync + Send + 'static>(
    api: T,
    addr: SocketAddr,
) -> Result<(), Error> {
    let api = Arc::new(api) as DynAPI;

    let app = router(api);

    tracing::info!("listening on {}", addr);

    axum::Server::try_bind(&addr)
        .map_err(unexpected_error)?
        .serve(app.into_make_service())
        .await
        .map_err(unexpected_error)
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../../static/index.html"))
}

#[tokio::test]
async fn http_round_trip() {
    use crate::api::Outcome;
    use crate::entities::{PlannerSession, Status};
    use crate::presentation::MapView;
    use reqwest::StatusCode;
    use serde_json::json;

    let (engine, _) = crate::engine::test_engine();
    let base = crate::testing::spawn_upstream(router(Arc::new(engine)));
    let client = reqwest::Client::new();

    let page = client.get(&base).send().await.unwrap().text().await.unwrap();
    assert!(page.contains("<html"));

    let session: PlannerSession = client
        .post(format!("{}/sessions", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let url = format!("{}/sessions/{}", base, session.id);

    let outcome: Outcome = client
        .post(format!("{}/clicks", url))
        .json(&json!({ "latitude": 51.50, "longitude": -0.10 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(outcome.session.status, Status::OriginSet);

    let outcome: Outcome = client
        .post(format!("{}/clicks", url))
        .json(&json!({ "latitude": 51.51, "longitude": -0.08 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(outcome.session.status, Status::RouteLoading);

    let mut ready = false;
    for _ in 0..100 {
        let session: PlannerSession = client.get(&url).send().await.unwrap().json().await.unwrap();
        if session.status == Status::RouteReady {
            assert_eq!(session.distance.as_deref(), Some("5.00 km"));
            ready = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(ready);

    let view: MapView = client
        .get(format!("{}/map", url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view.polylines.len(), 2);

    let res = client
        .patch(format!("{}/routes/selected", url))
        .json(&json!({ "index": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let outcome: Outcome = client
        .post(format!("{}/geolocation", url))
        .json(&json!({ "error": "permission denied" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(outcome.alerts.len(), 1);
    assert_eq!(outcome.session.status, Status::RouteReady);

    let outcome: Outcome = client
        .post(format!("{}/reset", url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(outcome.session.status, Status::Empty);
    assert!(outcome.session.origin.is_none());

    let res = client.delete(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
