//! HTTP surface: `/api/traffic/*` plus `/health`.
//!
//! Every body uses the `{ success, data?, error? }` envelope.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use common::{
    ApiResponse, Error, IncidentReport, PlaceSearchData, RouteData, TrafficDashboard,
    TrafficFlowSample,
};
use dashboard::DashboardService;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if !self.0.is_caller_error() {
            warn!("Request failed with {}: {}", status, self.0);
        }
        (status, Json(ApiResponse::<()>::err(self.0.to_string()))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Serialize)]
pub struct CitiesPayload {
    pub cities: Vec<String>,
    pub total: usize,
}

/// Dashboard fields plus cache freshness.
#[derive(Debug, Serialize)]
pub struct DashboardPayload {
    #[serde(flatten)]
    pub dashboard: TrafficDashboard,
    pub stale: bool,
    pub age_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthPayload {
    pub status: &'static str,
    pub provider: String,
    pub cities: usize,
}

#[derive(Debug, Deserialize)]
pub struct RouteParams {
    origin: Option<String>,
    destination: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    query: Option<String>,
    city: Option<String>,
}

fn required(value: Option<String>, name: &str) -> Result<String, Error> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::InvalidQuery(format!("missing query parameter: {name}")))
}

pub fn router(service: DashboardService) -> Router {
    let api = Router::new()
        .route("/cities", get(cities))
        .route("/flow/:city", get(flow))
        .route("/incidents/:city", get(incidents))
        .route("/route", get(route))
        .route("/search", get(search))
        .route("/dashboard/:city", get(dashboard));

    Router::new()
        .route("/health", get(health))
        .nest("/api/traffic", api)
        .with_state(service)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health(State(svc): State<DashboardService>) -> Json<HealthPayload> {
    Json(HealthPayload {
        status: "ok",
        provider: svc.provider_name().to_string(),
        cities: svc.cities().len(),
    })
}

async fn cities(State(svc): State<DashboardService>) -> ApiResult<CitiesPayload> {
    let cities = svc.cities();
    Ok(Json(ApiResponse::ok(CitiesPayload {
        total: cities.len(),
        cities,
    })))
}

async fn flow(
    State(svc): State<DashboardService>,
    Path(city): Path<String>,
) -> ApiResult<TrafficFlowSample> {
    Ok(Json(ApiResponse::ok(svc.get_flow(&city).await?)))
}

async fn incidents(
    State(svc): State<DashboardService>,
    Path(city): Path<String>,
) -> ApiResult<IncidentReport> {
    Ok(Json(ApiResponse::ok(svc.get_incidents(&city).await?)))
}

async fn route(
    State(svc): State<DashboardService>,
    Query(params): Query<RouteParams>,
) -> ApiResult<RouteData> {
    let origin = required(params.origin, "origin")?;
    let destination = required(params.destination, "destination")?;
    Ok(Json(ApiResponse::ok(svc.get_route(&origin, &destination).await?)))
}

async fn search(
    State(svc): State<DashboardService>,
    Query(params): Query<SearchParams>,
) -> ApiResult<PlaceSearchData> {
    let city = required(params.city, "city")?;
    let query = required(params.query, "query")?;
    Ok(Json(ApiResponse::ok(svc.search_places(&query, &city).await?)))
}

async fn dashboard(
    State(svc): State<DashboardService>,
    Path(city): Path<String>,
) -> ApiResult<DashboardPayload> {
    let entry = svc.get_dashboard(&city).await?;
    Ok(Json(ApiResponse::ok(DashboardPayload {
        age_secs: entry.age().as_secs(),
        stale: entry.stale,
        dashboard: entry.dashboard,
    })))
}
