use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{
    api::DirectionsAPI,
    config::DirectionsConfig,
    entities::{Coordinates, RouteCandidate, RouteRequest, RouteSet, MAX_CANDIDATES},
    error::{empty_result_error, missing_credential_error, route_fetch_error, Error},
};

const TARGET_COUNT: usize = MAX_CANDIDATES;
const WEIGHT_FACTOR: f64 = 1.4;
const SHARE_FACTOR: f64 = 0.6;

#[derive(Debug, Serialize)]
struct DirectionsBody {
    coordinates: [[f64; 2]; 2],
    alternative_routes: AlternativeRoutes,
    instructions: bool,
}

#[derive(Debug, Serialize)]
struct AlternativeRoutes {
    target_count: usize,
    weight_factor: f64,
    share_factor: f64,
}

impl From<&RouteRequest> for DirectionsBody {
    fn from(request: &RouteRequest) -> Self {
        Self {
            coordinates: [request.origin.to_lon_lat(), request.destination.to_lon_lat()],
            alternative_routes: AlternativeRoutes {
                target_count: TARGET_COUNT,
                weight_factor: WEIGHT_FACTOR,
                share_factor: SHARE_FACTOR,
            },
            instructions: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: LineString,
    #[serde(default)]
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct LineString {
    coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    #[serde(default)]
    summary: Summary,
}

// The service leaves out zero-valued fields.
#[derive(Debug, Default, Deserialize)]
struct Summary {
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
}

impl From<Feature> for RouteCandidate {
    fn from(feature: Feature) -> Self {
        let geometry = feature
            .geometry
            .coordinates
            .into_iter()
            .map(Coordinates::from_lon_lat)
            .collect();
        let Summary { distance, duration } = feature.properties.summary;

        RouteCandidate::new(geometry, distance, duration)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Structured { message: String },
    Plain(String),
}

impl ErrorDetail {
    fn into_message(self) -> String {
        match self {
            Self::Structured { message } | Self::Plain(message) => message,
        }
    }
}

#[derive(Debug)]
pub struct OpenRouteService {
    client: Client,
    api_base: String,
    api_key: Option<String>,
}

impl OpenRouteService {
    pub fn new(config: &DirectionsConfig, timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl DirectionsAPI for OpenRouteService {
    #[tracing::instrument(skip(self))]
    async fn request_routes(&self, request: &RouteRequest) -> Result<RouteSet, Error> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(missing_credential_error)?;

        let url = format!(
            "{}/v2/directions/{}/geojson",
            self.api_base,
            request.mode.profile()
        );

        let res = self
            .client
            .post(url)
            .header(AUTHORIZATION, key)
            .json(&DirectionsBody::from(request))
            .send()
            .await?;

        let status = res.status();

        if !status.is_success() {
            let message = match res.json::<ErrorBody>().await {
                Ok(body) => format!("directions service error: {}", body.error.into_message()),
                Err(_) => format!("directions service responded with {}", status.as_u16()),
            };
            tracing::warn!(status = status.as_u16(), %message, "route request rejected");
            return Err(route_fetch_error(message));
        }

        let data: FeatureCollection = res.json().await?;

        let candidates: Vec<RouteCandidate> = data
            .features
            .into_iter()
            .take(MAX_CANDIDATES)
            .map(RouteCandidate::from)
            .collect();

        if candidates.is_empty() {
            return Err(empty_result_error());
        }

        tracing::info!(count = candidates.len(), "routes received");

        Ok(RouteSet::new(candidates))
    }
}

#[cfg(test)]
#[derive(Debug)]
struct Recorded {
    profile: String,
    authorization: Option<String>,
    body: serde_json::Value,
}

#[cfg(test)]
fn fake_directions(
    status: axum::http::StatusCode,
    response: serde_json::Value,
) -> (
    axum::Router,
    std::sync::Arc<std::sync::Mutex<Vec<Recorded>>>,
) {
    use axum::extract::{Json, Path};
    use axum::http::HeaderMap;
    use axum::routing::post;
    use std::sync::{Arc, Mutex};

    let recorded = Arc::new(Mutex::new(Vec::new()));
    let log = recorded.clone();

    let app = axum::Router::new().route(
        "/v2/directions/:profile/geojson",
        post(
            move |Path(profile): Path<String>,
                  headers: HeaderMap,
                  Json(body): Json<serde_json::Value>| {
                let log = log.clone();
                let response = response.clone();
                async move {
                    let authorization = headers
                        .get("authorization")
                        .and_then(|value| value.to_str().ok())
                        .map(String::from);
                    log.lock().unwrap().push(Recorded {
                        profile,
                        authorization,
                        body,
                    });
                    (status, Json(response))
                }
            },
        ),
    );

    (app, recorded)
}

#[cfg(test)]
fn client(api_base: String, api_key: Option<&str>) -> OpenRouteService {
    client_with_timeout(api_base, api_key, Duration::from_secs(5))
}

#[cfg(test)]
fn client_with_timeout(
    api_base: String,
    api_key: Option<&str>,
    timeout: Duration,
) -> OpenRouteService {
    let config = DirectionsConfig {
        api_base,
        api_key: api_key.map(String::from),
    };
    OpenRouteService::new(&config, timeout).unwrap()
}

#[cfg(test)]
fn london_request(mode: crate::entities::TravelMode) -> RouteRequest {
    RouteRequest {
        origin: Coordinates::new(51.50, -0.10),
        destination: Coordinates::new(51.51, -0.08),
        mode,
    }
}

#[tokio::test]
async fn routes_are_requested_and_normalized() {
    use crate::entities::TravelMode;
    use axum::http::StatusCode;
    use serde_json::json;

    let response = json!({
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": { "type": "LineString", "coordinates": [[-0.10, 51.50], [-0.09, 51.505], [-0.08, 51.51]] },
                "properties": { "summary": { "distance": 5000.0, "duration": 600.0 } }
            },
            {
                "type": "Feature",
                "geometry": { "type": "LineString", "coordinates": [[-0.10, 51.50], [-0.08, 51.51]] },
                "properties": { "summary": { "distance": 4800.0, "duration": 650.0 } }
            }
        ]
    });
    let (app, recorded) = fake_directions(StatusCode::OK, response);
    let base = crate::testing::spawn_upstream(app);

    let routes = client(base, Some("test-key"))
        .request_routes(&london_request(TravelMode::Walking))
        .await
        .unwrap();

    assert_eq!(routes.len(), 2);
    assert_eq!(routes.selected, 0);
    let first = routes.selected().unwrap();
    assert_eq!(first.geometry.len(), 3);
    assert_eq!(first.geometry[0], Coordinates::new(51.50, -0.10));
    assert_eq!(first.geometry[2], Coordinates::new(51.51, -0.08));
    assert_eq!(first.distance_label(), "5.00 km");
    assert_eq!(first.duration_label(), "10.00 min");
    assert_eq!(routes.candidates[1].distance_label(), "4.80 km");

    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].profile, "foot-walking");
    assert_eq!(recorded[0].authorization.as_deref(), Some("test-key"));
    assert_eq!(
        recorded[0].body["coordinates"],
        json!([[-0.10, 51.50], [-0.08, 51.51]])
    );
    assert_eq!(
        recorded[0].body["alternative_routes"],
        json!({ "target_count": 3, "weight_factor": 1.4, "share_factor": 0.6 })
    );
}

#[tokio::test]
async fn missing_credential_skips_the_network() {
    use crate::entities::TravelMode;
    use crate::error::CONFIGURATION_ERROR;
    use axum::http::StatusCode;

    let (app, recorded) = fake_directions(StatusCode::OK, serde_json::json!({ "features": [] }));
    let base = crate::testing::spawn_upstream(app);

    let err = client(base, None)
        .request_routes(&london_request(TravelMode::Driving))
        .await
        .unwrap_err();

    assert_eq!(err.code, CONFIGURATION_ERROR);
    assert!(recorded.lock().unwrap().is_empty());
}

#[tokio::test]
async fn empty_collections_are_errors() {
    use crate::entities::TravelMode;
    use axum::http::StatusCode;

    let (app, _) = fake_directions(
        StatusCode::OK,
        serde_json::json!({ "type": "FeatureCollection", "features": [] }),
    );
    let base = crate::testing::spawn_upstream(app);

    let err = client(base, Some("test-key"))
        .request_routes(&london_request(TravelMode::Cycling))
        .await
        .unwrap_err();

    assert_eq!(err, empty_result_error());
}

#[tokio::test]
async fn service_errors_carry_their_message() {
    use crate::entities::TravelMode;
    use crate::error::ROUTE_FETCH_ERROR;
    use axum::http::StatusCode;

    let (app, _) = fake_directions(
        StatusCode::FORBIDDEN,
        serde_json::json!({ "error": "Access to this API has been disallowed" }),
    );
    let base = crate::testing::spawn_upstream(app);

    let err = client(base, Some("bad-key"))
        .request_routes(&london_request(TravelMode::Driving))
        .await
        .unwrap_err();

    assert_eq!(err.code, ROUTE_FETCH_ERROR);
    assert_eq!(
        err.message,
        "directions service error: Access to this API has been disallowed"
    );

    let (app, _) = fake_directions(
        StatusCode::BAD_REQUEST,
        serde_json::json!({ "error": { "code": 2010, "message": "Could not find routable point" } }),
    );
    let base = crate::testing::spawn_upstream(app);

    let err = client(base, Some("test-key"))
        .request_routes(&london_request(TravelMode::Driving))
        .await
        .unwrap_err();

    assert_eq!(
        err.message,
        "directions service error: Could not find routable point"
    );
}

#[tokio::test]
async fn unreachable_service_is_a_fetch_error() {
    use crate::entities::TravelMode;
    use crate::error::ROUTE_FETCH_ERROR;

    let err = client("http://127.0.0.1:1".into(), Some("test-key"))
        .request_routes(&london_request(TravelMode::Driving))
        .await
        .unwrap_err();

    assert_eq!(err.code, ROUTE_FETCH_ERROR);
    assert!(err.message.starts_with("route request"));
}

#[tokio::test]
async fn slow_service_times_out() {
    use crate::entities::TravelMode;
    use crate::error::ROUTE_FETCH_ERROR;
    use axum::routing::post;

    let app = axum::Router::new().route(
        "/v2/directions/:profile/geojson",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            "{}"
        }),
    );
    let base = crate::testing::spawn_upstream(app);

    let err = client_with_timeout(base, Some("test-key"), Duration::from_millis(100))
        .request_routes(&london_request(TravelMode::Driving))
        .await
        .unwrap_err();

    assert_eq!(err.code, ROUTE_FETCH_ERROR);
    assert_eq!(err.message, "route request timed out");
}
