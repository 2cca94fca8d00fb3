//! Flight relay HTTP API

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use skyrelay_link::{CommandReport, FlightSession, LinkError, SessionState, VehicleIdentity};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::{error, warn};

#[derive(Clone)]
pub struct ApiState {
    pub session: Arc<FlightSession>,
}

impl ApiState {
    pub fn new(session: Arc<FlightSession>) -> Self {
        Self { session }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub state: &'static str,
    pub vehicle: Option<VehicleIdentity>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Session failure rendered as a JSON error body
pub struct ApiError(pub LinkError);

impl From<LinkError> for ApiError {
    fn from(err: LinkError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            LinkError::NotConnected | LinkError::SessionClosed => StatusCode::CONFLICT,
            LinkError::Rejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            LinkError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            LinkError::Transport(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::BAD_GATEWAY {
            error!("Autopilot link failure: {}", self.0);
        }
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
            code: self.0.code().to_string(),
        });
        (status, body).into_response()
    }
}

/// CORS policy for the browser front end: listed origins only, credentials
/// allowed, any method and header the preflight asks for.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Create the relay router
pub fn create_router(state: ApiState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/connect", post(connect_handler))
        .route("/arm", post(arm_handler))
        .route("/takeoff", post(takeoff_handler))
        .route("/land", post(land_handler))
        .route("/disconnect", post(disconnect_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

type ApiResult = Result<Json<CommandReport>, ApiError>;

async fn connect_handler(State(state): State<ApiState>) -> ApiResult {
    Ok(Json(state.session.connect().await?))
}

async fn arm_handler(State(state): State<ApiState>) -> ApiResult {
    Ok(Json(state.session.arm().await?))
}

async fn takeoff_handler(State(state): State<ApiState>) -> ApiResult {
    Ok(Json(state.session.takeoff().await?))
}

async fn land_handler(State(state): State<ApiState>) -> ApiResult {
    Ok(Json(state.session.land().await?))
}

async fn disconnect_handler(State(state): State<ApiState>) -> ApiResult {
    Ok(Json(state.session.disconnect().await?))
}

async fn status_handler(State(state): State<ApiState>) -> Json<StatusResponse> {
    let current = state.session.state();
    let vehicle = match &current {
        SessionState::Connected(vehicle) => Some(vehicle.clone()),
        _ => None,
    };
    Json(StatusResponse {
        state: current.name(),
        vehicle,
    })
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
