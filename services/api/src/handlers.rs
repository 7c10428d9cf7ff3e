//! Axum Handlers for the REST API
//!
//! Chat-style training endpoints plus views over sessions, profiles, training
//! history and the product knowledge base. It uses `utoipa` doc comments to generate OpenAPI
//! documentation.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{error, info};

use crate::{
    delivery::{WECOM_CHANNEL, deliver_in_background},
    models::{
        ChatPayload, ChatResponse, ErrorResponse, FaqEntry, FaqQuery, HistoryQuery,
        HistoryResponse, ObjectionQuery, ObjectionReply, ProfileResponse, ReminderResponse,
        ServiceInfo, SessionSnapshot, StartTrainingPayload, TeamDashboard, UpdateProfilePayload,
    },
    state::AppState,
};

const DEFAULT_CHANNEL: &str = "web";
const DEFAULT_HISTORY_DAYS: i64 = 7;
const MAX_HISTORY_DAYS: i64 = 365;
const DEFAULT_FAQ_RESULTS: usize = 5;

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// Rejects blank values; returns the trimmed value.
fn require<'a>(field: &str, value: &'a str) -> Result<&'a str, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(value)
}

/// Runs one utterance through the coach and mirrors the reply to WeCom
/// when the message arrived on that channel.
async fn respond(
    state: &AppState,
    trainee_id: &str,
    message: &str,
    channel: Option<&str>,
) -> ChatResponse {
    let channel = channel.unwrap_or(DEFAULT_CHANNEL);
    let reply = state.coach.handle_message(trainee_id, message, channel).await;

    if channel == WECOM_CHANNEL {
        if let Some(notifier) = &state.notifier {
            deliver_in_background(notifier.clone(), trainee_id.to_string(), reply.text.clone());
        }
    }
    ChatResponse::from_reply(trainee_id, reply)
}

/// Send one chat message to the coach.
///
/// The coach classifies the message and either starts a training session,
/// continues the active dialogue, or answers a report, team or help request.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatPayload,
    responses(
        (status = 200, description = "Coach reply", body = ChatResponse),
        (status = 400, description = "Bad request", body = ErrorResponse)
    ),
    tag = "Training"
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatPayload>,
) -> Result<Json<ChatResponse>, ApiError> {
    let trainee_id = require("trainee_id", &payload.trainee_id)?;
    // Only checked for blankness; stop tokens must see the message as sent.
    require("message", &payload.message)?;
    Ok(Json(
        respond(&state, trainee_id, &payload.message, payload.channel.as_deref()).await,
    ))
}

/// Start a training session, optionally on a given topic.
///
/// Without a topic the trainee's weak area, or the default topic, is used.
/// Any active session of the trainee is abandoned.
#[utoipa::path(
    post,
    path = "/api/training/start",
    request_body = StartTrainingPayload,
    responses(
        (status = 200, description = "Scenario introduction", body = ChatResponse),
        (status = 400, description = "Bad request", body = ErrorResponse)
    ),
    tag = "Training"
)]
pub async fn start_training(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<StartTrainingPayload>,
) -> Result<Json<ChatResponse>, ApiError> {
    let trainee_id = require("trainee_id", &payload.trainee_id)?;
    let utterance = match payload.topic.as_deref().map(str::trim) {
        Some(topic) if !topic.is_empty() => format!("我想练习{topic}"),
        _ => "开始训练".to_string(),
    };
    info!(trainee_id, "Training start requested");
    Ok(Json(
        respond(&state, trainee_id, &utterance, payload.channel.as_deref()).await,
    ))
}

/// Send a trainee turn in the active dialogue.
#[utoipa::path(
    post,
    path = "/api/training/dialogue",
    request_body = ChatPayload,
    responses(
        (status = 200, description = "Patient reply or evaluation report", body = ChatResponse),
        (status = 400, description = "Bad request", body = ErrorResponse)
    ),
    tag = "Training"
)]
pub async fn dialogue(
    state: State<Arc<AppState>>,
    payload: Json<ChatPayload>,
) -> Result<Json<ChatResponse>, ApiError> {
    chat(state, payload).await
}

/// Get the trainee's active session.
#[utoipa::path(
    get,
    path = "/api/sessions/{trainee_id}",
    responses(
        (status = 200, description = "Active session", body = SessionSnapshot),
        (status = 404, description = "No active session", body = ErrorResponse)
    ),
    params(
        ("trainee_id" = String, Path, description = "Trainee ID")
    ),
    tag = "Training"
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(trainee_id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = state.coach.session(&trainee_id).ok_or_else(|| {
        ApiError::NotFound(format!("No active session for trainee '{}'", trainee_id))
    })?;
    Ok(Json(SessionSnapshot::from(&session)))
}

/// Get a trainee's profile. Unknown trainees get a default profile.
#[utoipa::path(
    get,
    path = "/api/trainees/{trainee_id}/profile",
    responses(
        (status = 200, description = "Trainee profile", body = ProfileResponse)
    ),
    params(
        ("trainee_id" = String, Path, description = "Trainee ID")
    ),
    tag = "Trainees"
)]
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(trainee_id): Path<String>,
) -> Json<ProfileResponse> {
    Json(state.coach.profiles().profile(&trainee_id).into())
}

/// Create or replace a trainee's profile.
#[utoipa::path(
    put,
    path = "/api/trainees/{trainee_id}/profile",
    request_body = UpdateProfilePayload,
    responses(
        (status = 200, description = "Profile saved", body = ProfileResponse),
        (status = 400, description = "Bad request", body = ErrorResponse)
    ),
    params(
        ("trainee_id" = String, Path, description = "Trainee ID")
    ),
    tag = "Trainees"
)]
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Path(trainee_id): Path<String>,
    Json(payload): Json<UpdateProfilePayload>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let trainee_id = require("trainee_id", &trainee_id)?;
    let profile = payload.into_profile(trainee_id);
    state.coach.profiles().upsert(profile.clone());
    info!(trainee_id, "Profile updated");
    Ok(Json(profile.into()))
}

/// List a trainee's training records over a look-back window.
#[utoipa::path(
    get,
    path = "/api/trainees/{trainee_id}/history",
    responses(
        (status = 200, description = "Training history", body = HistoryResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("trainee_id" = String, Path, description = "Trainee ID"),
        HistoryQuery
    ),
    tag = "Trainees"
)]
pub async fn history(
    State(state): State<Arc<AppState>>,
    Path(trainee_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let days = query.days.unwrap_or(DEFAULT_HISTORY_DAYS);
    if !(1..=MAX_HISTORY_DAYS).contains(&days) {
        return Err(ApiError::BadRequest(format!(
            "days must be between 1 and {MAX_HISTORY_DAYS}"
        )));
    }
    let records = state.coach.history(&trainee_id, days).await?;
    Ok(Json(HistoryResponse::new(&trainee_id, days, &records)))
}

/// Team dashboard over the last seven days.
#[utoipa::path(
    get,
    path = "/api/teams/{team}/dashboard",
    responses(
        (status = 200, description = "Team overview", body = TeamDashboard),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("team" = String, Path, description = "Team name")
    ),
    tag = "Trainees"
)]
pub async fn team_dashboard(
    State(state): State<Arc<AppState>>,
    Path(team): Path<String>,
) -> Result<Json<TeamDashboard>, ApiError> {
    let overview = state.coach.team_overview(&team).await?;
    Ok(Json(overview.into()))
}

/// Build a practice reminder and push it to WeCom when a robot is configured.
#[utoipa::path(
    post,
    path = "/api/trainees/{trainee_id}/remind",
    responses(
        (status = 200, description = "Reminder text", body = ReminderResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("trainee_id" = String, Path, description = "Trainee ID")
    ),
    tag = "Trainees"
)]
pub async fn remind(
    State(state): State<Arc<AppState>>,
    Path(trainee_id): Path<String>,
) -> Result<Json<ReminderResponse>, ApiError> {
    let message = state.coach.reminder(&trainee_id).await?;
    let queued = match &state.notifier {
        Some(notifier) => {
            deliver_in_background(notifier.clone(), trainee_id.clone(), message.clone());
            true
        }
        None => false,
    };
    Ok(Json(ReminderResponse {
        trainee_id,
        message,
        queued,
    }))
}

/// Search FAQ entries across the knowledge base.
#[utoipa::path(
    get,
    path = "/api/knowledge/faq",
    responses(
        (status = 200, description = "Matching FAQ entries", body = [FaqEntry]),
        (status = 400, description = "Bad request", body = ErrorResponse)
    ),
    params(FaqQuery),
    tag = "Knowledge"
)]
pub async fn search_faq(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FaqQuery>,
) -> Result<Json<Vec<FaqEntry>>, ApiError> {
    let q = require("q", &query.q)?;
    let entries = state
        .knowledge
        .search_faq(q, query.top_k.unwrap_or(DEFAULT_FAQ_RESULTS))
        .into_iter()
        .map(FaqEntry::from)
        .collect();
    Ok(Json(entries))
}

/// Suggested responses to one kind of patient objection.
#[utoipa::path(
    get,
    path = "/api/knowledge/objections",
    responses(
        (status = 200, description = "Objection responses", body = [ObjectionReply]),
        (status = 400, description = "Bad request", body = ErrorResponse)
    ),
    params(ObjectionQuery),
    tag = "Knowledge"
)]
pub async fn objection_responses(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ObjectionQuery>,
) -> Result<Json<Vec<ObjectionReply>>, ApiError> {
    let kind = require("kind", &query.kind)?;
    let replies = state
        .knowledge
        .objection_responses(kind)
        .into_iter()
        .map(ObjectionReply::from)
        .collect();
    Ok(Json(replies))
}

/// Service name, version and the available endpoints.
#[utoipa::path(
    get,
    path = "/api",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "Service"
)]
pub async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: "sales-training-coach".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: [
            "POST /api/chat",
            "POST /api/training/start",
            "POST /api/training/dialogue",
            "GET /api/sessions/{trainee_id}",
            "GET /api/trainees/{trainee_id}/profile",
            "PUT /api/trainees/{trainee_id}/profile",
            "GET /api/trainees/{trainee_id}/history",
            "POST /api/trainees/{trainee_id}/remind",
            "GET /api/teams/{team}/dashboard",
            "GET /api/knowledge/faq",
            "GET /api/knowledge/objections",
        ]
        .into_iter()
        .map(String::from)
        .collect(),
    })
}
