use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::{
    api::{NamingAPI, SearchAPI},
    config::GeocodingConfig,
    entities::{Coordinates, PlaceSuggestion, PlaceSuggestions, FALLBACK_NAME, MIN_QUERY_LEN},
    error::{unexpected_error, Error},
};

const SEARCH_LIMIT: usize = 5;

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
    error: Option<String>,
}

// Coordinates come back as strings.
#[derive(Debug, Deserialize)]
struct SearchResult {
    display_name: String,
    lat: String,
    lon: String,
}

impl TryFrom<SearchResult> for PlaceSuggestion {
    type Error = Error;

    fn try_from(result: SearchResult) -> Result<Self, Error> {
        let latitude = result.lat.parse::<f64>().map_err(unexpected_error)?;
        let longitude = result.lon.parse::<f64>().map_err(unexpected_error)?;

        Ok(Self {
            name: result.display_name,
            coordinates: Coordinates::new(latitude, longitude),
        })
    }
}

#[derive(Debug)]
pub struct Nominatim {
    client: Client,
    api_base: String,
}

impl Nominatim {
    pub fn new(config: &GeocodingConfig, timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(unexpected_error)?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn reverse(&self, coordinates: Coordinates) -> Result<String, Error> {
        let url = format!("{}/reverse", self.api_base);

        let res = self
            .client
            .get(url)
            .query(&[("format", "jsonv2")])
            .query(&[("lat", coordinates.latitude), ("lon", coordinates.longitude)])
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(unexpected_error)?;

        let data: ReverseResponse = res.json().await.map_err(unexpected_error)?;

        match (data.display_name, data.error) {
            (Some(name), _) if !name.trim().is_empty() => Ok(name),
            (_, Some(error)) => Err(unexpected_error(error)),
            _ => Err(unexpected_error("reverse geocoding returned no name")),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn lookup(&self, query: &str) -> Result<PlaceSuggestions, Error> {
        let url = format!("{}/search", self.api_base);

        let res = self
            .client
            .get(url)
            .query(&[("format", "jsonv2"), ("q", query)])
            .query(&[("limit", SEARCH_LIMIT)])
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(unexpected_error)?;

        let data: Vec<SearchResult> = res.json().await.map_err(unexpected_error)?;

        data.into_iter().map(PlaceSuggestion::try_from).collect()
    }
}

#[async_trait]
impl NamingAPI for Nominatim {
    async fn resolve_name(&self, coordinates: Coordinates) -> String {
        match self.reverse(coordinates).await {
            Ok(name) => name,
            Err(err) => {
                tracing::warn!(%err, "reverse geocoding failed, using fallback name");
                FALLBACK_NAME.into()
            }
        }
    }
}

#[async_trait]
impl SearchAPI for Nominatim {
    async fn search(&self, query: &str) -> PlaceSuggestions {
        let query = query.trim();

        if query.chars().count() < MIN_QUERY_LEN {
            return Vec::new();
        }

        match self.lookup(query).await {
            Ok(suggestions) => suggestions,
            Err(err) => {
                tracing::warn!(%err, "address search failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
fn fake_geocoder(
    hits: std::sync::Arc<std::sync::atomic::AtomicUsize>,
) -> axum::Router {
    use axum::extract::{Json, Query};
    use axum::http::StatusCode;
    use axum::routing::get;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;

    let reverse_hits = hits.clone();
    let search_hits = hits;

    axum::Router::new()
        .route(
            "/reverse",
            get(move |Query(params): Query<HashMap<String, String>>| {
                let hits = reverse_hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    match params.get("lat").map(String::as_str) {
                        Some("51.5") => (
                            StatusCode::OK,
                            Json(json!({ "display_name": "Westminster, London" })),
                        ),
                        Some("0") | Some("0.0") => (
                            StatusCode::OK,
                            Json(json!({ "error": "Unable to geocode" })),
                        ),
                        _ => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))),
                    }
                }
            }),
        )
        .route(
            "/search",
            get(move |Query(params): Query<HashMap<String, String>>| {
                let hits = search_hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    match params.get("q").map(String::as_str) {
                        Some("baker street") => (
                            StatusCode::OK,
                            Json(json!([
                                { "display_name": "Baker Street, London", "lat": "51.5226", "lon": "-0.1571" },
                                { "display_name": "Baker Street, Enfield", "lat": "51.6612", "lon": "-0.0741" }
                            ])),
                        ),
                        _ => (StatusCode::SERVICE_UNAVAILABLE, Json(json!([]))),
                    }
                }
            }),
        )
}

#[cfg(test)]
fn geocoder(api_base: String) -> Nominatim {
    geocoder_with_timeout(api_base, Duration::from_secs(5))
}

#[cfg(test)]
fn geocoder_with_timeout(api_base: String, timeout: Duration) -> Nominatim {
    let config = GeocodingConfig {
        api_base,
        user_agent: "waymark-tests".into(),
    };
    Nominatim::new(&config, timeout).unwrap()
}

#[tokio::test]
async fn names_resolve_or_fall_back() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let hits = Arc::new(AtomicUsize::new(0));
    let nominatim = geocoder(crate::testing::spawn_upstream(fake_geocoder(hits.clone())));

    let name = nominatim.resolve_name(Coordinates::new(51.5, -0.1)).await;
    assert_eq!(name, "Westminster, London");

    let name = nominatim.resolve_name(Coordinates::new(0.0, 0.0)).await;
    assert_eq!(name, FALLBACK_NAME);

    let name = nominatim.resolve_name(Coordinates::new(12.0, 0.0)).await;
    assert_eq!(name, FALLBACK_NAME);

    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn search_returns_ranked_suggestions() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let hits = Arc::new(AtomicUsize::new(0));
    let nominatim = geocoder(crate::testing::spawn_upstream(fake_geocoder(hits.clone())));

    let suggestions = nominatim.search("  baker street ").await;
    assert_eq!(suggestions.len(), 2);
    assert_eq!(suggestions[0].name, "Baker Street, London");
    assert_eq!(suggestions[0].coordinates, Coordinates::new(51.5226, -0.1571));

    let suggestions = nominatim.search("nowhere at all").await;
    assert!(suggestions.is_empty());

    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn short_queries_never_hit_the_network() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let hits = Arc::new(AtomicUsize::new(0));
    let nominatim = geocoder(crate::testing::spawn_upstream(fake_geocoder(hits.clone())));

    assert!(nominatim.search("").await.is_empty());
    assert!(nominatim.search("ba").await.is_empty());
    assert!(nominatim.search("  b  ").await.is_empty());

    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn unreachable_geocoder_degrades_quietly() {
    use tokio_test::block_on;

    block_on(async {
        let nominatim = geocoder("http://127.0.0.1:1".into());

        assert_eq!(
            nominatim.resolve_name(Coordinates::new(51.5, -0.1)).await,
            FALLBACK_NAME
        );
        assert!(nominatim.search("baker street").await.is_empty());
    });
}

#[tokio::test]
async fn slow_geocoder_times_out_to_fallbacks() {
    use crate::error::UNEXPECTED_ERROR;
    use axum::routing::get;

    async fn stall() -> &'static str {
        tokio::time::sleep(Duration::from_secs(2)).await;
        "[]"
    }

    let app = axum::Router::new()
        .route("/reverse", get(stall))
        .route("/search", get(stall));
    let nominatim = geocoder_with_timeout(
        crate::testing::spawn_upstream(app),
        Duration::from_millis(100),
    );

    assert_eq!(
        nominatim.resolve_name(Coordinates::new(51.5, -0.1)).await,
        FALLBACK_NAME
    );
    assert!(nominatim.search("baker street").await.is_empty());

    let err = nominatim
        .reverse(Coordinates::new(51.5, -0.1))
        .await
        .unwrap_err();
    assert_eq!(err.code, UNEXPECTED_ERROR);
    assert!(!err.message.contains("route"));
}
