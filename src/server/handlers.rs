//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        DefaultBodyLimit, Json, Path, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::skill;
use super::state::AppState;
use crate::engine::{GameInfo, PersuasionRequest};
use crate::error::{MarketError, RejectionCode};
use crate::history::{HistoryQuery, DEFAULT_PAGE_SIZE};
use crate::npc::{NpcFilter, NpcId};
use crate::round::{Phase, Transition};

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let game = Router::new()
        .route("/info", get(game_info))
        .route("/start", post(start_game))
        .route("/advance", post(advance_round))
        .route("/npcs", get(list_npcs))
        .route("/npcs/:id", get(get_npc))
        .route("/persuade", post(persuade))
        .route("/history", get(history))
        .route("/conversation", get(conversation))
        .route("/leaderboard", get(leaderboard));

    let mut router = Router::new()
        .route("/", get(service_info))
        .route("/health", get(health_check))
        .route("/skill.md", get(skill_md))
        .route("/api/v1/beliefs", get(list_beliefs))
        .nest("/api/v1/game", game)
        .layer(DefaultBodyLimit::max(state.config.max_body_size))
        .with_state(state.clone());

    if state.config.cors_enabled {
        router = router.layer(CorsLayer::permissive());
    }
    if state.config.logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    router
}

/// Error body: `{"error": {"code", "message"}}`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Error details
    pub error: ErrorDetail,
}

/// Error code and message
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Machine-readable code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

/// Handler error
#[derive(Debug)]
pub enum ApiError {
    /// Engine rejection or failure
    Market(MarketError),
    /// Query parameters that parse but make no sense together
    BadRequest(String),
    /// Body, path or query string the extractors refused
    Malformed(StatusCode, String),
}

impl From<MarketError> for ApiError {
    fn from(e: MarketError) -> Self {
        ApiError::Market(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Malformed(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Malformed(rejection.status(), rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Malformed(rejection.status(), rejection.body_text())
    }
}

fn code_name(code: RejectionCode) -> String {
    serde_json::to_value(code)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "internal".to_string())
}

fn status_for(code: RejectionCode) -> StatusCode {
    match code {
        RejectionCode::UnknownTarget | RejectionCode::UnknownBelief | RejectionCode::UnknownAgent => {
            StatusCode::NOT_FOUND
        },
        RejectionCode::BeliefNotOwned => StatusCode::FORBIDDEN,
        RejectionCode::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
        RejectionCode::GameNotStarted | RejectionCode::GameEnded | RejectionCode::InvalidTransition => {
            StatusCode::CONFLICT
        },
        RejectionCode::InternalInconsistency | RejectionCode::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Market(e) => {
                let code = e.rejection_code();
                if e.is_fatal() {
                    tracing::error!("Invariant violation: {e}");
                }
                (status_for(code), code_name(code), e.to_string())
            },
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, "invalidQuery".to_string(), message)
            },
            ApiError::Malformed(status, message) => {
                (status, "invalidRequest".to_string(), message)
            },
        };
        (
            status,
            Json(ErrorBody {
                error: ErrorDetail { code, message },
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always `ok`
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Service descriptor
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResponse {
    /// Service name
    pub name: &'static str,
    /// Crate version
    pub version: &'static str,
    /// Current phase
    pub phase: Phase,
    /// Seconds since the server started
    pub uptime_secs: u64,
    /// Agent guide location
    pub skill: &'static str,
    /// Route list
    pub endpoints: Vec<&'static str>,
}

async fn service_info(State(state): State<Arc<AppState>>) -> ApiResult<ServiceResponse> {
    let info = state.engine.info()?;
    Ok(Json(ServiceResponse {
        name: "belief-market",
        version: env!("CARGO_PKG_VERSION"),
        phase: info.phase,
        uptime_secs: state.uptime().as_secs(),
        skill: "/skill.md",
        endpoints: vec![
            "GET /health",
            "GET /api/v1/beliefs",
            "GET /api/v1/game/info",
            "POST /api/v1/game/start",
            "POST /api/v1/game/advance",
            "GET /api/v1/game/npcs",
            "GET /api/v1/game/npcs/:id",
            "POST /api/v1/game/persuade",
            "GET /api/v1/game/history",
            "GET /api/v1/game/conversation",
            "GET /api/v1/game/leaderboard",
        ],
    }))
}

async fn skill_md(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        skill::render(&state.market),
    )
}

async fn list_beliefs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.beliefs())
}

async fn game_info(State(state): State<Arc<AppState>>) -> ApiResult<GameInfo> {
    Ok(Json(state.engine.info()?))
}

/// Start/advance response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResponse {
    /// What changed
    pub transition: Transition,
    /// Status after the change
    pub info: GameInfo,
}

async fn start_game(State(state): State<Arc<AppState>>) -> ApiResult<TransitionResponse> {
    let transition = state.engine.start()?;
    Ok(Json(TransitionResponse {
        transition,
        info: state.engine.info()?,
    }))
}

/// `POST /advance` query
#[derive(Debug, Deserialize)]
pub struct AdvanceQuery {
    /// Only advance if still in this phase
    pub expected: Option<Phase>,
}

async fn advance_round(
    State(state): State<Arc<AppState>>,
    query: Result<Query<AdvanceQuery>, QueryRejection>,
) -> ApiResult<TransitionResponse> {
    let Query(query) = query?;
    let transition = state.engine.advance(query.expected)?;
    Ok(Json(TransitionResponse {
        transition,
        info: state.engine.info()?,
    }))
}

/// `GET /npcs` query
#[derive(Debug, Default, Deserialize)]
pub struct NpcQuery {
    /// `all`, `neutral`, `affiliated` or `belief`
    pub filter: Option<String>,
    /// Belief id for the `belief` filter
    pub belief: Option<String>,
    /// Only this cohort
    pub round: Option<u8>,
}

impl NpcQuery {
    fn to_filter(&self) -> Result<NpcFilter, ApiError> {
        match (self.filter.as_deref(), &self.belief) {
            (None, None) => Ok(self.round.map_or(NpcFilter::All, NpcFilter::Cohort)),
            (None | Some("belief"), Some(belief)) => Ok(NpcFilter::Belief(belief.clone())),
            (Some("belief"), None) => Err(ApiError::BadRequest(
                "filter=belief requires a belief parameter".to_string(),
            )),
            (Some("all"), _) => Ok(NpcFilter::All),
            (Some("neutral"), _) => Ok(NpcFilter::Neutral),
            (Some("affiliated"), _) => Ok(NpcFilter::Affiliated),
            (Some(other), _) => Err(ApiError::BadRequest(format!("Unknown filter: {other}"))),
        }
    }
}

async fn list_npcs(
    State(state): State<Arc<AppState>>,
    query: Result<Query<NpcQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let filter = query.to_filter()?;
    let mut npcs = state.engine.npcs(&filter);
    if let Some(round) = query.round {
        npcs.retain(|n| n.spawn_round == round);
    }
    Ok(Json(npcs))
}

async fn get_npc(
    State(state): State<Arc<AppState>>,
    id: Result<Path<NpcId>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.engine.npc(id)?))
}

async fn persuade(
    State(state): State<Arc<AppState>>,
    request: Result<Json<PersuasionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = request?;
    let receipt = state.engine.persuade(&request)?;
    Ok((StatusCode::OK, Json(receipt)))
}

async fn history(
    State(state): State<Arc<AppState>>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    Ok(Json(state.engine.history(&query)?))
}

/// `GET /conversation` query
#[derive(Debug, Deserialize)]
pub struct ConversationQuery {
    /// Maximum entries
    pub limit: Option<usize>,
}

async fn conversation(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ConversationQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    Ok(Json(state.engine.conversation(limit)?))
}

async fn leaderboard(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.engine.leaderboard()?))
}
