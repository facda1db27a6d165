//! REST API Server for the voice task assistant
//!
//! Lets a speech front end (or curl) drive assistant sessions over HTTP.
//! Sessions are keyed by a UUID derived from the path id and share one store.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::assistant::Assistant;
use crate::config::AssistantConfig;
use crate::session::SessionOrchestrator;
use crate::store::Store;
use crate::tools::create_default_registry;
use crate::transcript::InMemorySession;

type Orchestrator = SessionOrchestrator<InMemorySession>;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct UtteranceRequest {
    pub text: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn Store>,
    pub config: AssistantConfig,
    sessions: Arc<RwLock<HashMap<Uuid, Arc<Orchestrator>>>>,
}

impl ApiState {
    pub fn new(store: Arc<dyn Store>, config: AssistantConfig) -> Self {
        Self {
            store,
            config,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Existing session, or a new greeted one
    async fn session(&self, session_id: Uuid) -> crate::Result<Arc<Orchestrator>> {
        if let Some(existing) = self.sessions.read().await.get(&session_id) {
            return Ok(existing.clone());
        }

        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(&session_id) {
            return Ok(existing.clone());
        }

        let assistant = Assistant::new(
            create_default_registry(),
            self.store.clone(),
            self.config.clone(),
        );
        let orchestrator = Arc::new(SessionOrchestrator::new(
            Arc::new(assistant),
            InMemorySession::new(),
        ));
        orchestrator.start().await?;

        info!(%session_id, "Session started");
        sessions.insert(session_id, orchestrator.clone());
        Ok(orchestrator)
    }

    /// Drop a session and its transcript. `false` if it was not open.
    async fn end_session(&self, session_id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&session_id).is_some();
        if removed {
            info!(%session_id, "Session ended");
        }
        removed
    }
}

fn stable_uuid_from_string(input: &str) -> Uuid {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    Uuid::from_bytes(bytes)
}

fn session_uuid(raw: &str) -> Uuid {
    Uuid::parse_str(raw).unwrap_or_else(|_| stable_uuid_from_string(raw.trim()))
}

fn internal_error(e: crate::error::AssistantError) -> (StatusCode, Json<ApiResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::error(e.to_string())),
    )
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Function Catalog
/// =============================

async fn list_functions() -> Json<ApiResponse> {
    Json(ApiResponse::success(create_default_registry().specs()))
}

/// =============================
/// Session Endpoints
/// =============================

async fn post_utterance(
    State(state): State<ApiState>,
    Path(raw_id): Path<String>,
    Json(req): Json<UtteranceRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let session_id = session_uuid(&raw_id);
    let orchestrator = match state.session(session_id).await {
        Ok(orchestrator) => orchestrator,
        Err(e) => return internal_error(e),
    };

    let offset = orchestrator.realtime().len().await;
    match orchestrator.on_user_message(&req.text).await {
        Ok(route) => {
            let items = orchestrator.realtime().items_since(offset).await;
            (
                StatusCode::OK,
                Json(ApiResponse::success(serde_json::json!({
                    "session_id": session_id,
                    "route": route,
                    "items": items,
                }))),
            )
        }
        Err(e) => internal_error(e),
    }
}

async fn invoke_function(
    State(state): State<ApiState>,
    Path((raw_id, name)): Path<(String, String)>,
    body: Option<Json<Value>>,
) -> (StatusCode, Json<ApiResponse>) {
    let session_id = session_uuid(&raw_id);
    let orchestrator = match state.session(session_id).await {
        Ok(orchestrator) => orchestrator,
        Err(e) => return internal_error(e),
    };

    let args = body
        .map(|Json(v)| v)
        .unwrap_or_else(|| serde_json::json!({}));
    let output = orchestrator.assistant().call(&name, args).await;

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "session_id": session_id,
            "function": name,
            "success": output.success,
            "result": output.message,
        }))),
    )
}

async fn get_transcript(
    State(state): State<ApiState>,
    Path(raw_id): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    let session_id = session_uuid(&raw_id);
    match state.session(session_id).await {
        Ok(orchestrator) => {
            let transcript = orchestrator.realtime().snapshot().await;
            (StatusCode::OK, Json(ApiResponse::success(transcript)))
        }
        Err(e) => internal_error(e),
    }
}

async fn delete_session(
    State(state): State<ApiState>,
    Path(raw_id): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    let session_id = session_uuid(&raw_id);
    let closed = state.end_session(session_id).await;
    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "session_id": session_id,
            "closed": closed,
        }))),
    )
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/functions", get(list_functions))
        .route("/api/sessions/:id/utterance", post(post_utterance))
        .route("/api/sessions/:id/functions/:name", post(invoke_function))
        .route("/api/sessions/:id", delete(delete_session))
        .route("/api/sessions/:id/transcript", get(get_transcript))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    store: Arc<dyn Store>,
    config: AssistantConfig,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let port = config.port;
    let router = create_router(ApiState::new(store, config));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use axum::body::Body;
    use axum::http::Request;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn test_router() -> (TempDir, Router) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path().join("assistant.sqlite"))
            .await
            .unwrap();
        let state = ApiState::new(Arc::new(store), AssistantConfig::default());
        (dir, create_router(state))
    }

    async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> Value {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_delete_session_releases_transcript() {
        let (_dir, router) = test_router().await;

        send(
            &router,
            "POST",
            "/api/sessions/driver-2/utterance",
            Some(serde_json::json!({ "text": "hello" })),
        )
        .await;

        let reply = send(&router, "DELETE", "/api/sessions/driver-2", None).await;
        assert_eq!(reply["data"]["closed"], true);

        let reply = send(&router, "DELETE", "/api/sessions/driver-2", None).await;
        assert_eq!(reply["data"]["closed"], false);

        // A later request starts over with only the greeting
        let transcript = send(&router, "GET", "/api/sessions/driver-2/transcript", None).await;
        assert_eq!(transcript["data"]["items"].as_array().unwrap().len(), 1);
        assert_eq!(transcript["data"]["responses_requested"], 1);
    }

    #[test]
    fn test_stable_session_ids() {
        assert_eq!(session_uuid("driver-1"), session_uuid("driver-1"));
        assert_ne!(session_uuid("driver-1"), session_uuid("driver-2"));

        let explicit = Uuid::new_v4();
        assert_eq!(session_uuid(&explicit.to_string()), explicit);
    }

    #[tokio::test]
    async fn test_health_and_functions() {
        let (_dir, router) = test_router().await;

        let health = send(&router, "GET", "/health", None).await;
        assert_eq!(health["status"], "healthy");

        let functions = send(&router, "GET", "/api/functions", None).await;
        assert_eq!(functions["data"].as_array().unwrap().len(), 24);
    }

    #[tokio::test]
    async fn test_session_flow_over_http() {
        let (_dir, router) = test_router().await;

        let reply = send(
            &router,
            "POST",
            "/api/sessions/driver-1/utterance",
            Some(serde_json::json!({ "text": "hi there" })),
        )
        .await;
        assert_eq!(reply["data"]["route"]["route"], "profile_lookup");
        assert_eq!(reply["data"]["items"][0]["role"], "system");

        let reply = send(
            &router,
            "POST",
            "/api/sessions/driver-1/functions/create_car",
            Some(serde_json::json!({ "vin": "VIN-HTTP", "make": "Audi", "model": "A4", "year": 2019 })),
        )
        .await;
        assert_eq!(reply["data"]["success"], true);

        let reply = send(
            &router,
            "POST",
            "/api/sessions/driver-1/utterance",
            Some(serde_json::json!({ "text": "show my payment history" })),
        )
        .await;
        assert_eq!(reply["data"]["route"]["task_type"], "transactions");

        let transcript = send(&router, "GET", "/api/sessions/driver-1/transcript", None).await;
        // welcome + lookup prompt + task prompt + user item
        assert_eq!(transcript["data"]["items"].as_array().unwrap().len(), 4);
        assert_eq!(transcript["data"]["responses_requested"], 3);
    }
}
