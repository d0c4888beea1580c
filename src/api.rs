use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{FRAME_COUNT, GRID_HEIGHT, GRID_WIDTH};
use crate::error::LookupError;
use crate::projection::unproject;
use crate::types::{AppState, LatLng, PointForecast, RouteForecast};

#[derive(Debug, Deserialize)]
pub(crate) struct PointQuery {
    lat: f64,
    lng: f64,
    #[serde(default)]
    interpolate: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RouteQuery {
    nodes: String,
    #[serde(default)]
    interpolate: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct GridCorners {
    #[serde(rename = "topLeft")]
    top_left: LatLng,
    #[serde(rename = "topRight")]
    top_right: LatLng,
    #[serde(rename = "bottomLeft")]
    bottom_left: LatLng,
    #[serde(rename = "bottomRight")]
    bottom_right: LatLng,
}

#[derive(Debug, Serialize)]
pub(crate) struct MetaResponse {
    ready: bool,
    filename: Option<String>,
    #[serde(rename = "referenceTime")]
    reference_time: Option<DateTime<Utc>>,
    #[serde(rename = "frameTimes")]
    frame_times: Vec<DateTime<Utc>>,
    width: usize,
    height: usize,
    #[serde(rename = "frameCount")]
    frame_count: usize,
    corners: GridCorners,
    #[serde(rename = "acquisitionEnabled")]
    acquisition_enabled: bool,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    BadRequest(String),
    Lookup(LookupError),
}

impl From<LookupError> for ApiError {
    fn from(error: LookupError) -> Self {
        Self::Lookup(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Lookup(error) => {
                let status = match &error {
                    LookupError::DatasetNotReady => StatusCode::SERVICE_UNAVAILABLE,
                    LookupError::OutOfBounds { .. }
                    | LookupError::NonIntegerCoordinate { .. }
                    | LookupError::RouteNodeOutOfBounds { .. } => StatusCode::BAD_REQUEST,
                    LookupError::FrameOutOfRange { .. } => {
                        warn!("Lookup hit a malformed dataset: {error}");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, error.to_string())
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn meta(State(state): State<AppState>) -> Json<MetaResponse> {
    let snapshot = state.grid.current_snapshot().ok();
    let corner = |x: usize, y: usize| {
        let (lat, lng) = unproject(x as f64, y as f64);
        LatLng::new(lat, lng)
    };

    Json(MetaResponse {
        ready: snapshot.is_some(),
        filename: snapshot.as_ref().map(|dataset| dataset.info().filename.clone()),
        reference_time: snapshot.as_ref().map(|dataset| dataset.info().reference_time),
        frame_times: snapshot
            .as_ref()
            .map(|dataset| dataset.frames().iter().map(|frame| frame.time).collect())
            .unwrap_or_default(),
        width: GRID_WIDTH,
        height: GRID_HEIGHT,
        frame_count: FRAME_COUNT,
        corners: GridCorners {
            top_left: corner(0, 0),
            top_right: corner(GRID_WIDTH - 1, 0),
            bottom_left: corner(0, GRID_HEIGHT - 1),
            bottom_right: corner(GRID_WIDTH - 1, GRID_HEIGHT - 1),
        },
        acquisition_enabled: state.cfg.knmi_api_key.is_some(),
    })
}

pub async fn point(
    State(state): State<AppState>,
    Query(query): Query<PointQuery>,
) -> Result<Json<PointForecast>, ApiError> {
    let node = validate_node(query.lat, query.lng)?;
    let forecast = state
        .engine
        .point_forecast(node.lat, node.lng, query.interpolate)?;
    Ok(Json(forecast))
}

pub async fn route(
    State(state): State<AppState>,
    Query(query): Query<RouteQuery>,
) -> Result<Json<RouteForecast>, ApiError> {
    let nodes = parse_route_nodes(&query.nodes)?;
    if nodes.len() > state.cfg.max_route_nodes {
        return Err(ApiError::BadRequest(format!(
            "Route has {} nodes, at most {} are allowed.",
            nodes.len(),
            state.cfg.max_route_nodes
        )));
    }

    let forecast = state.engine.route_forecast(&nodes, query.interpolate)?;
    Ok(Json(forecast))
}

fn validate_node(lat: f64, lng: f64) -> Result<LatLng, ApiError> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(ApiError::BadRequest(
            "Invalid lat/lng query parameters.".to_string(),
        ));
    }
    Ok(LatLng::new(lat, lng))
}

fn parse_route_nodes(raw: &str) -> Result<Vec<LatLng>, ApiError> {
    raw.split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let invalid = || ApiError::BadRequest(format!("Invalid route node '{pair}'."));
            let (lat, lng) = pair.split_once(',').ok_or_else(invalid)?;
            let lat = lat.trim().parse::<f64>().map_err(|_| invalid())?;
            let lng = lng.trim().parse::<f64>().map_err(|_| invalid())?;
            validate_node(lat, lng)
        })
        .collect()
}
