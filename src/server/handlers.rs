use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::birth::{BirthError, BirthInput, ResolvedBirth};
use crate::facts::{extract_facts, ChartFacts};
use crate::period::PeriodSelector;

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

#[derive(Debug)]
pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

impl From<BirthError> for ApiError {
    fn from(e: BirthError) -> Self {
        match e {
            BirthError::NotFound(_) => api_error(StatusCode::NOT_FOUND, "no_match"),
            BirthError::IncompleteBirthData("offset") => api_error(StatusCode::BAD_REQUEST, "timezone_unresolved"),
            BirthError::IncompleteBirthData(_) | BirthError::InvalidBirthInput(_) => {
                api_error(StatusCode::BAD_REQUEST, e.to_string())
            }
        }
    }
}

/// Run blocking resolver work off the async executor.
async fn blocking<T, F>(state: Arc<AppState>, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppState) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!(error = %e, "resolver task failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        })?
}

// ─── GET /api/geo/resolve ────────────────────────────────────────

#[derive(Deserialize)]
pub struct GeoQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GeoResolution {
    pub display_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub offset: String,
    #[serde(rename = "timeZone")]
    pub time_zone: String,
    /// The offset is a last-resort `+00:00` guess.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

pub async fn geo_resolve(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GeoQuery>,
) -> Result<Json<GeoResolution>, ApiError> {
    let start = Instant::now();
    let query = params.q.as_deref().unwrap_or("").trim().to_string();
    if query.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "missing 'q' parameter"));
    }

    let resolved = blocking(state, move |s| {
        let place = s
            .births
            .geocoder()
            .resolve(&query)
            .map_err(|_| api_error(StatusCode::NOT_FOUND, "no_match"))?;
        let zone = s
            .births
            .timezones()
            .resolve(place.latitude, place.longitude)
            .map_err(|_| api_error(StatusCode::BAD_REQUEST, "timezone_unresolved"))?;
        let display_name = if place.display_name.is_empty() { query } else { place.display_name };
        Ok(GeoResolution {
            display_name,
            latitude: place.latitude,
            longitude: place.longitude,
            offset: zone.offset,
            time_zone: zone.timezone_id,
            degraded: zone.degraded,
        })
    })
    .await?;

    info!(
        place = %resolved.display_name,
        offset = %resolved.offset,
        degraded = resolved.degraded,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "GET /api/geo/resolve"
    );
    Ok(Json(resolved))
}

// ─── POST /api/birth/resolve ─────────────────────────────────────

pub async fn resolve_birth(
    State(state): State<Arc<AppState>>,
    Json(input): Json<BirthInput>,
) -> Result<Json<ResolvedBirth>, ApiError> {
    let birth = blocking(state, move |s| s.births.resolve(&input).map_err(ApiError::from)).await?;
    Ok(Json(birth))
}

// ─── POST /api/facts ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct FactsQuery {
    /// Reference instant for period selection; defaults to now.
    pub at: Option<String>,
}

pub async fn facts(Query(params): Query<FactsQuery>, Json(chart): Json<Value>) -> Result<Json<ChartFacts>, ApiError> {
    let reference = match params.at.as_deref() {
        Some(at) => PeriodSelector::utc()
            .normalize(at)
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?,
        None => Utc::now(),
    };
    Ok(Json(extract_facts(&chart, reference)))
}
