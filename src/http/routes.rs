//! HTTP route definitions

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::economy::RepairTarget;
use crate::game::{GameError, MatchOptions, MatchSnapshot, Player};
use crate::service::ServiceError;
use crate::util::time::uptime_secs;
use crate::world::Position;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - comma-separated CLIENT_ORIGIN, any origin when unset
    let allowed_origins: Vec<HeaderValue> = state
        .config
        .client_origin
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);
    let cors = if allowed_origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(allowed_origins)
    };

    let player_routes = Router::new()
        .route("/", delete(exit_handler))
        .route("/move", post(move_handler))
        .route("/sell", post(sell_handler))
        .route("/refuel", post(refuel_handler))
        .route("/repair", post(repair_handler))
        .route("/buy-item", post(buy_item_handler))
        .route("/buy-upgrade", post(buy_upgrade_handler))
        .route("/use-item", post(use_item_handler));

    Router::new()
        .route("/health", get(health_handler))
        .route("/matches", get(list_matches_handler).post(create_match_handler))
        .route(
            "/matches/:match_id",
            get(get_match_handler).delete(delete_match_handler),
        )
        .route("/matches/:match_id/players", post(join_handler))
        .route("/matches/:match_id/ws", get(ws_handler))
        .nest("/matches/:match_id/players/:player_id", player_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_matches: usize,
    active_players: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_matches: state.matches.active_matches(),
        active_players: state.matches.total_players(),
    })
}

// ============================================================================
// Match endpoints
// ============================================================================

#[derive(Deserialize)]
struct CreateMatchRequest {
    name: String,
    #[serde(default)]
    options: MatchOptions,
}

async fn create_match_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateMatchRequest>,
) -> Result<(StatusCode, Json<MatchSnapshot>), AppError> {
    let snapshot = state.matches.create_match(req.name, req.options).await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

async fn list_matches_handler(State(state): State<AppState>) -> Json<Vec<Uuid>> {
    Json(state.matches.match_ids())
}

async fn get_match_handler(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
) -> Result<Json<MatchSnapshot>, AppError> {
    Ok(Json(state.matches.get_match(match_id).await?))
}

async fn delete_match_handler(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.matches.delete_match(match_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Player endpoints
// ============================================================================

#[derive(Deserialize)]
struct JoinRequest {
    name: String,
}

async fn join_handler(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
    Json(req): Json<JoinRequest>,
) -> Result<(StatusCode, Json<Player>), AppError> {
    let player = state.matches.join_match(match_id, req.name).await?;
    Ok((StatusCode::CREATED, Json(player)))
}

async fn exit_handler(
    State(state): State<AppState>,
    Path((match_id, player_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state.matches.exit_match(match_id, player_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct MoveRequest {
    path: Vec<Position>,
}

async fn move_handler(
    State(state): State<AppState>,
    Path((match_id, player_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<MoveRequest>,
) -> Result<Json<Player>, AppError> {
    let player = state
        .matches
        .move_player(match_id, player_id, req.path)
        .await?;
    Ok(Json(player))
}

async fn sell_handler(
    State(state): State<AppState>,
    Path((match_id, player_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Player>, AppError> {
    Ok(Json(state.matches.sell(match_id, player_id).await?))
}

#[derive(Deserialize, Default)]
struct AmountRequest {
    #[serde(default)]
    amount: Option<f64>,
    #[serde(default, rename = "type")]
    target: RepairTarget,
}

async fn refuel_handler(
    State(state): State<AppState>,
    Path((match_id, player_id)): Path<(Uuid, Uuid)>,
    req: Option<Json<AmountRequest>>,
) -> Result<Json<Player>, AppError> {
    let req = req.map(|Json(r)| r).unwrap_or_default();
    Ok(Json(
        state.matches.refuel(match_id, player_id, req.amount).await?,
    ))
}

async fn repair_handler(
    State(state): State<AppState>,
    Path((match_id, player_id)): Path<(Uuid, Uuid)>,
    req: Option<Json<AmountRequest>>,
) -> Result<Json<Player>, AppError> {
    let req = req.map(|Json(r)| r).unwrap_or_default();
    let player = state
        .matches
        .repair(match_id, player_id, req.amount, req.target)
        .await?;
    Ok(Json(player))
}

#[derive(Deserialize)]
struct ItemRequest {
    name: String,
}

async fn buy_item_handler(
    State(state): State<AppState>,
    Path((match_id, player_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<ItemRequest>,
) -> Result<Json<Player>, AppError> {
    Ok(Json(
        state.matches.buy_item(match_id, player_id, req.name).await?,
    ))
}

async fn use_item_handler(
    State(state): State<AppState>,
    Path((match_id, player_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<ItemRequest>,
) -> Result<Json<Player>, AppError> {
    Ok(Json(
        state.matches.use_item(match_id, player_id, req.name).await?,
    ))
}

#[derive(Deserialize)]
struct UpgradeRequest {
    part: String,
}

async fn buy_upgrade_handler(
    State(state): State<AppState>,
    Path((match_id, player_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpgradeRequest>,
) -> Result<Json<Player>, AppError> {
    let player = state
        .matches
        .buy_upgrade(match_id, player_id, req.part)
        .await?;
    Ok(Json(player))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    BadRequest { code: &'static str, message: String },

    #[error("{message}")]
    NotFound { code: &'static str, message: String },

    #[error("Service unavailable")]
    Unavailable,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<GameError> for AppError {
    fn from(err: GameError) -> Self {
        let code = err.code();
        let message = err.to_string();
        match err {
            e if e.is_not_found() => AppError::NotFound { code, message },
            GameError::Unavailable => AppError::Unavailable,
            _ => AppError::BadRequest { code, message },
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Game(e) => e.into(),
            ServiceError::WorldGen(e) => AppError::BadRequest {
                code: "invalid_options",
                message: e.to_string(),
            },
            ServiceError::Store(e) => AppError::Internal(e.to_string()),
            ServiceError::Generation(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self {
            AppError::BadRequest { code, .. } => (StatusCode::BAD_REQUEST, *code),
            AppError::NotFound { code, .. } => (StatusCode::NOT_FOUND, *code),
            AppError::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}
