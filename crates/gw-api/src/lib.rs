//! HTTP surface of the remote gateway bridge
//!
//! Exposes the bridged accessories and their characteristics over a small
//! REST API, and accepts position samples from the transport.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use gw_core::{
    AccessoryId, Characteristic, CharacteristicError, CharacteristicValue, ServiceType,
};
use gw_gate::GateSnapshot;
use gw_platform::{AccessoryInformation, BridgedAccessory, Platform, PlatformError};
use gw_position_feed::SharedPositionFeed;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub platform: Arc<Platform>,
    pub feed: SharedPositionFeed,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<T, ApiError>;

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            message: message.into(),
        }),
    )
}

/// One bridged accessory
#[derive(Serialize)]
pub struct AccessoryResponse {
    pub id: AccessoryId,
    pub display_name: String,
    pub service: ServiceType,
    pub information: AccessoryInformation,
    pub characteristics: Vec<Characteristic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate: Option<GateSnapshot>,
}

impl From<&BridgedAccessory> for AccessoryResponse {
    fn from(bridged: &BridgedAccessory) -> Self {
        let handler = bridged.handler();
        Self {
            id: bridged.id(),
            display_name: bridged.accessory().display_name.clone(),
            service: handler.service(),
            information: bridged.accessory().information(),
            characteristics: handler.characteristics().to_vec(),
            gate: handler.gate_snapshot(),
        }
    }
}

#[derive(Serialize)]
pub struct CharacteristicResponse {
    pub characteristic: Characteristic,
    pub value: CharacteristicValue,
}

#[derive(Deserialize)]
pub struct SetCharacteristicRequest {
    pub value: CharacteristicValue,
}

#[derive(Serialize)]
pub struct PositionResponse {
    pub key: String,
    pub position: i64,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/accessories", get(get_accessories))
        .route(
            "/api/accessories/:id/characteristics/:name",
            get(get_characteristic).put(set_characteristic),
        )
        .route("/api/positions/:key", post(post_position))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the API until `shutdown` resolves
pub async fn start_server(
    state: AppState,
    addr: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API server listening on {}", addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

// ==================== Handlers ====================

/// GET /api/health
async fn health_check() -> &'static str {
    "OK"
}

/// GET /api/accessories
async fn get_accessories(State(state): State<AppState>) -> Json<Vec<AccessoryResponse>> {
    Json(
        state
            .platform
            .accessories()
            .iter()
            .map(|bridged| AccessoryResponse::from(&**bridged))
            .collect(),
    )
}

/// GET /api/accessories/{id}/characteristics/{name}
///
/// Same semantics as a host read, including the target sync on
/// CurrentDoorState.
async fn get_characteristic(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
) -> ApiResult<Json<CharacteristicResponse>> {
    let (id, characteristic) = parse_target(&id, &name)?;
    let value = state
        .platform
        .get_characteristic(&id, characteristic)
        .map_err(platform_error)?;

    Ok(Json(CharacteristicResponse {
        characteristic,
        value,
    }))
}

/// PUT /api/accessories/{id}/characteristics/{name}
async fn set_characteristic(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
    Json(request): Json<SetCharacteristicRequest>,
) -> ApiResult<StatusCode> {
    let (id, characteristic) = parse_target(&id, &name)?;
    state
        .platform
        .set_characteristic(&id, characteristic, request.value)
        .map_err(platform_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/positions/{key} - raw text body holding one integer sample
async fn post_position(
    State(state): State<AppState>,
    Path(key): Path<String>,
    body: String,
) -> ApiResult<Json<PositionResponse>> {
    let position = state
        .feed
        .publish_raw(&key, &body)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    Ok(Json(PositionResponse { key, position }))
}

fn parse_target(id: &str, name: &str) -> ApiResult<(AccessoryId, Characteristic)> {
    let id = id
        .parse::<AccessoryId>()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid accessory id: {}", e)))?;
    let characteristic = name
        .parse::<Characteristic>()
        .map_err(|e| api_error(StatusCode::NOT_FOUND, e.to_string()))?;
    Ok((id, characteristic))
}

fn platform_error(error: PlatformError) -> ApiError {
    let status = match &error {
        PlatformError::AccessoryNotFound(_) => StatusCode::NOT_FOUND,
        PlatformError::Characteristic(CharacteristicError::Unknown(_))
        | PlatformError::Characteristic(CharacteristicError::Unsupported { .. }) => {
            StatusCode::NOT_FOUND
        }
        PlatformError::Characteristic(CharacteristicError::ReadOnly(_)) => {
            StatusCode::METHOD_NOT_ALLOWED
        }
        PlatformError::Characteristic(CharacteristicError::InvalidValue { .. }) => {
            StatusCode::BAD_REQUEST
        }
        PlatformError::NoRuntime => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, error.to_string())
}
