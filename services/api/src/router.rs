//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        ChatPayload, ChatResponse, DimensionBreakdown, ErrorResponse, FaqEntry, HistoryEntry,
        HistoryResponse, ObjectionReply, ProfileResponse, ReminderResponse, ServiceInfo,
        SessionSnapshot, StartTrainingPayload, TeamDashboard, TranscriptLine,
        UpdateProfilePayload,
    },
    state::AppState,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::service_info,
        handlers::chat,
        handlers::start_training,
        handlers::dialogue,
        handlers::get_session,
        handlers::get_profile,
        handlers::update_profile,
        handlers::history,
        handlers::remind,
        handlers::team_dashboard,
        handlers::search_faq,
        handlers::objection_responses,
    ),
    components(
        schemas(
            ChatPayload, StartTrainingPayload, ChatResponse, SessionSnapshot, TranscriptLine,
            ProfileResponse, UpdateProfilePayload, HistoryResponse, HistoryEntry,
            DimensionBreakdown, TeamDashboard, ReminderResponse, FaqEntry, ObjectionReply,
            ServiceInfo, ErrorResponse
        )
    ),
    tags(
        (name = "Training", description = "Role-play sessions with a simulated patient"),
        (name = "Trainees", description = "Profiles, history and team dashboards"),
        (name = "Knowledge", description = "Product FAQ and objection handling references"),
        (name = "Service", description = "Service metadata")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/api", get(handlers::service_info))
        .route("/api/chat", post(handlers::chat))
        .route("/api/training/start", post(handlers::start_training))
        .route("/api/training/dialogue", post(handlers::dialogue))
        .route("/api/sessions/{trainee_id}", get(handlers::get_session))
        .route(
            "/api/trainees/{trainee_id}/profile",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        .route("/api/trainees/{trainee_id}/history", get(handlers::history))
        .route("/api/trainees/{trainee_id}/remind", post(handlers::remind))
        .route("/api/teams/{team}/dashboard", get(handlers::team_dashboard))
        .route("/api/knowledge/faq", get(handlers::search_faq))
        .route("/api/knowledge/objections", get(handlers::objection_responses))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use coach_core::{
        Coach, CoachConfig, catalog::Catalog, knowledge::KnowledgeBase,
        profile::InMemoryProfiles, recorder::MemoryRecorder,
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn test_app() -> Router {
        let knowledge = Arc::new(KnowledgeBase::builtin());
        let coach = Coach::new(
            CoachConfig::default(),
            Arc::new(Catalog::builtin().unwrap()),
            knowledge.clone(),
            Arc::new(InMemoryProfiles::new()),
            Arc::new(MemoryRecorder::new()),
        )
        .with_seed(11);
        create_router(Arc::new(AppState {
            coach: Arc::new(coach),
            knowledge,
            notifier: None,
        }))
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_chat_training_round_trip() {
        let app = test_app();

        let (status, body) = send(
            &app,
            json_request("POST", "/api/chat", json!({"trainee_id": "zhang", "message": "我想练习玻尿酸"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["intent"], "start_training");
        assert_eq!(body["session_ended"], false);

        let (status, session) = send(&app, get("/api/sessions/zhang")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(session["topic"], "玻尿酸");
        assert_eq!(session["turn_count"], 0);

        let (status, body) = send(
            &app,
            json_request("POST", "/api/training/dialogue", json!({"trainee_id": "zhang", "message": "结束"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session_ended"], true);
        assert!(body["response"].as_str().unwrap().contains("训练完成"));

        let (status, _) = send(&app, get("/api/sessions/zhang")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, history) = send(&app, get("/api/trainees/zhang/history")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history["days"], 7);
        assert_eq!(history["count"], 1);
        assert_eq!(history["records"][0]["topic"], "玻尿酸");
    }

    #[tokio::test]
    async fn test_padded_stop_token_keeps_dialogue_open() {
        let app = test_app();
        send(
            &app,
            json_request("POST", "/api/chat", json!({"trainee_id": "wang", "message": "我想练习玻尿酸"})),
        )
        .await;

        let (status, body) = send(
            &app,
            json_request("POST", "/api/training/dialogue", json!({"trainee_id": "wang", "message": " 结束 "})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["intent"], "continue_dialogue");
        assert_eq!(body["session_ended"], false);

        let (status, session) = send(&app, get("/api/sessions/wang")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(session["turn_count"], 1);
        assert_eq!(session["transcript"][1]["text"], " 结束 ");
    }

    #[tokio::test]
    async fn test_start_training_with_topic() {
        let app = test_app();
        let (status, body) = send(
            &app,
            json_request("POST", "/api/training/start", json!({"trainee_id": "li", "topic": "种植牙"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["intent"], "start_training");

        let (_, session) = send(&app, get("/api/sessions/li")).await;
        assert_eq!(session["topic"], "种植牙");
    }

    #[tokio::test]
    async fn test_blank_fields_are_rejected() {
        let app = test_app();
        let (status, body) = send(
            &app,
            json_request("POST", "/api/chat", json!({"trainee_id": "  ", "message": "帮助"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "trainee_id is required");

        let (status, _) = send(
            &app,
            json_request("POST", "/api/chat", json!({"trainee_id": "zhang", "message": ""})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_session_is_404() {
        let (status, body) = send(&test_app(), get("/api/sessions/nobody")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["message"].as_str().unwrap().contains("nobody"));
    }

    #[tokio::test]
    async fn test_profile_put_then_get() {
        let app = test_app();
        let (status, saved) = send(
            &app,
            json_request(
                "PUT",
                "/api/trainees/zhang/profile",
                json!({"display_name": "张三", "team": "derm", "is_manager": true}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["trainee_id"], "zhang");

        let (status, profile) = send(&app, get("/api/trainees/zhang/profile")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["display_name"], "张三");
        assert_eq!(profile["team"], "derm");
        assert_eq!(profile["is_manager"], true);

        let (_, dashboard) = send(&app, get("/api/teams/derm/dashboard")).await;
        assert_eq!(dashboard["total_count"], 1);
        assert_eq!(dashboard["active_count"], 0);
    }

    #[tokio::test]
    async fn test_history_window_is_validated() {
        let app = test_app();
        let (status, _) = send(&app, get("/api/trainees/zhang/history?days=0")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, history) = send(&app, get("/api/trainees/zhang/history?days=30")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history["days"], 30);
        assert_eq!(history["count"], 0);
        assert_eq!(history["average_score"], Value::Null);
    }

    #[tokio::test]
    async fn test_remind_without_notifier_is_not_queued() {
        let (status, body) = send(
            &test_app(),
            Request::builder()
                .method("POST")
                .uri("/api/trainees/zhang/remind")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["queued"], false);
        assert!(!body["message"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_knowledge_faq_and_objections() {
        let app = test_app();
        // q=安全&top_k=2
        let (status, faq) = send(&app, get("/api/knowledge/faq?q=%E5%AE%89%E5%85%A8&top_k=2")).await;
        assert_eq!(status, StatusCode::OK);
        let faq = faq.as_array().unwrap();
        assert_eq!(faq.len(), 2);
        assert!(faq[0]["question"].as_str().unwrap().contains("安全"));

        let (status, _) = send(&app, get("/api/knowledge/faq?q=%20")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // kind=价格
        let (status, replies) =
            send(&app, get("/api/knowledge/objections?kind=%E4%BB%B7%E6%A0%BC")).await;
        assert_eq!(status, StatusCode::OK);
        let replies = replies.as_array().unwrap();
        assert!(!replies.is_empty());
        assert!(replies.iter().all(|r| r["kind"] == "价格"));
    }

    #[tokio::test]
    async fn test_service_info_and_openapi() {
        let app = test_app();
        let (status, info) = send(&app, get("/api")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(
            info["endpoints"]
                .as_array()
                .unwrap()
                .iter()
                .any(|e| e == "POST /api/chat")
        );

        let (status, doc) = send(&app, get("/api-docs/openapi.json")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(doc["paths"].get("/api/chat").is_some());
        assert!(doc["paths"].get("/api/trainees/{trainee_id}/history").is_some());
    }
}
