//! Axum handler functions.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::AppState;
use crate::error::{ExecError, LlmError, PreviewError};
use crate::extract::{MalformedSegment, Segment, extract_with_diagnostics};
use crate::llm::{ChatMessage, generate_chat_reply, generate_preview_bundle, generate_project};
use crate::preview::{
    DependencyMap, FileSet, FrameId, PreviewState, SandboxPolicy, SessionId,
};

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub segments: Vec<Segment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub malformed: Vec<MalformedSegment>,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub command: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PythonRequest {
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ComposeRequest {
    #[serde(default)]
    pub files: FileSet,
    #[serde(default)]
    pub dependencies: DependencyMap,
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub language: String,
}

#[derive(Debug, Serialize)]
pub struct FrameResponse {
    pub session_id: SessionId,
    pub frame_id: FrameId,
    pub src: String,
    pub sandbox: String,
}

#[derive(Debug, Deserialize)]
pub struct FrameMessageRequest {
    pub frame_id: FrameId,
    #[serde(default)]
    pub message: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Option<Vec<ChatMessage>>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Map an execution failure to a status code and JSON body.
fn exec_error_response(err: ExecError) -> Response {
    match err {
        ExecError::InvalidRequest { reason } => error_response(StatusCode::BAD_REQUEST, reason),
        ExecError::RejectedCommand { .. } => {
            error_response(StatusCode::FORBIDDEN, "Command not allowed")
        }
        ExecError::Timeout(_) => error_response(StatusCode::GATEWAY_TIMEOUT, err.to_string()),
        ExecError::ScriptError { ref result } => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            result.stderr.clone(),
        ),
        ExecError::ExecutionFailure { ref result, .. } => {
            let body = match result {
                Some(result) => json!({
                    "error": err.display_text(),
                    "output": result.output(),
                }),
                None => json!({ "error": err.display_text() }),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

/// An untrusted document, served so the browser sandboxes it.
fn sandboxed_html(policy: &SandboxPolicy, document: String) -> Response {
    let mut response = (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        document,
    )
        .into_response();
    if let Ok(csp) = HeaderValue::from_str(&policy.csp_header()) {
        response
            .headers_mut()
            .insert(header::CONTENT_SECURITY_POLICY, csp);
    }
    response
}

/// POST /api/extract - Split a message into text and code segments.
pub async fn extract(Json(req): Json<ExtractRequest>) -> impl IntoResponse {
    let (segments, malformed) = extract_with_diagnostics(&req.content);
    Json(ExtractResponse {
        segments,
        malformed,
    })
}

/// POST /api/execute - Run an allow-listed command.
pub async fn execute(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExecuteRequest>,
) -> Response {
    let command = req.command.unwrap_or_default();
    match state.gateway.execute(&command).await {
        Ok(result) => Json(json!({ "output": result.output() })).into_response(),
        Err(e) => exec_error_response(e),
    }
}

/// POST /api/python - Run a script in a scratch workspace.
pub async fn python(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PythonRequest>,
) -> Response {
    let Some(code) = req.code else {
        return error_response(StatusCode::BAD_REQUEST, "Code is required");
    };
    match state.runner.run(&code).await {
        Ok(result) => Json(json!({ "output": result.stdout })).into_response(),
        Err(e) => exec_error_response(e),
    }
}

/// POST /api/compose - Compose a preview document.
pub async fn compose(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ComposeRequest>,
) -> Response {
    let document = state.composer.compose(&req.files, &req.dependencies);
    sandboxed_html(&state.policy, document.into_string())
}

/// POST /api/chat - Answer the last chat message.
pub async fn chat(State(state): State<Arc<AppState>>, Json(req): Json<ChatRequest>) -> Response {
    let Some(ref generator) = state.generator else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "No text generator configured",
        );
    };
    let Some(messages) = req.messages else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Invalid request: messages array is required",
        );
    };

    match generate_chat_reply(generator.as_ref(), &messages).await {
        Ok(reply) => Json(reply).into_response(),
        Err(LlmError::InvalidRequest { reason }) => {
            error_response(StatusCode::BAD_REQUEST, reason)
        }
        Err(e) => {
            tracing::error!(error = %e, "Chat generation failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// POST /api/generate - Generate a multi-file project scaffold.
pub async fn generate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> Response {
    let Some(ref generator) = state.generator else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "No text generator configured",
        );
    };

    match generate_project(generator.as_ref(), &req.prompt).await {
        Ok(tree) => Json(tree).into_response(),
        Err(LlmError::InvalidRequest { reason }) => {
            error_response(StatusCode::BAD_REQUEST, reason)
        }
        Err(e) => {
            tracing::error!(error = %e, "Project generation failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate code")
        }
    }
}

/// POST /api/preview - Ask the text generator for a preview bundle.
pub async fn preview(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PreviewRequest>,
) -> Response {
    let Some(ref generator) = state.generator else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "No text generator configured",
        );
    };

    match generate_preview_bundle(generator.as_ref(), &req.code, &req.language).await {
        Ok(bundle) => Json(bundle).into_response(),
        Err(LlmError::InvalidRequest { reason }) => {
            error_response(StatusCode::BAD_REQUEST, reason)
        }
        Err(e) => {
            tracing::error!(error = %e, "Preview generation failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate preview",
            )
        }
    }
}

fn preview_error_response(err: PreviewError) -> Response {
    match err {
        PreviewError::SessionNotFound { .. } => {
            error_response(StatusCode::NOT_FOUND, err.to_string())
        }
        other => error_response(StatusCode::UNPROCESSABLE_ENTITY, other.to_string()),
    }
}

/// Report a refreshed session once its new frame has settled.
async fn settled_frame(
    state: &AppState,
    session_id: SessionId,
    frame_id: FrameId,
    success: StatusCode,
) -> Response {
    let status = match state.previews.settle(session_id, frame_id).await {
        Ok(status) => status,
        Err(e) => return preview_error_response(e),
    };
    if let PreviewState::Failed { reason, .. } = status.state {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": reason,
                "session_id": session_id,
                "frame_id": frame_id,
            })),
        )
            .into_response();
    }
    (
        success,
        Json(FrameResponse {
            session_id,
            frame_id,
            src: format!("/frames/{}", frame_id),
            sandbox: state.previews.policy().attribute_value(),
        }),
    )
        .into_response()
}

/// POST /api/previews - Start a preview session.
pub async fn create_preview(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ComposeRequest>,
) -> Response {
    let (session_id, frame_id) = state.previews.create(req.files, req.dependencies).await;
    settled_frame(&state, session_id, frame_id, StatusCode::CREATED).await
}

/// PUT /api/previews/{id} - Replace a session's preview.
pub async fn refresh_preview(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SessionId>,
    Json(req): Json<ComposeRequest>,
) -> Response {
    match state.previews.refresh(id, req.files, req.dependencies).await {
        Ok(frame_id) => settled_frame(&state, id, frame_id, StatusCode::OK).await,
        Err(e) => preview_error_response(e),
    }
}

/// POST /api/previews/{id}/retry - Reload with the last inputs.
pub async fn retry_preview(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SessionId>,
) -> Response {
    match state.previews.retry(id).await {
        Ok(Some(frame_id)) => settled_frame(&state, id, frame_id, StatusCode::OK).await,
        Ok(None) => error_response(StatusCode::CONFLICT, "Nothing to retry"),
        Err(e) => preview_error_response(e),
    }
}

/// GET /api/previews/{id} - Session state, current frame and height.
pub async fn preview_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SessionId>,
) -> Response {
    match state.previews.status(id).await {
        Ok(status) => Json(status).into_response(),
        Err(e) => preview_error_response(e),
    }
}

/// POST /api/previews/{id}/messages - Relay a message posted by a frame.
pub async fn preview_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SessionId>,
    Json(req): Json<FrameMessageRequest>,
) -> Response {
    match state.previews.deliver(id, req.frame_id, &req.message).await {
        Ok(applied) => Json(json!({ "applied": applied })).into_response(),
        Err(e) => preview_error_response(e),
    }
}

/// DELETE /api/previews/{id} - End a session and unpublish its frame.
pub async fn close_preview(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SessionId>,
) -> Response {
    match state.previews.close(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => preview_error_response(e),
    }
}

/// GET /frames/{id} - Serve a published frame document.
pub async fn serve_frame(State(state): State<Arc<AppState>>, Path(id): Path<FrameId>) -> Response {
    match state.previews.frames().get(id).await {
        Some(frame) => sandboxed_html(&frame.policy, frame.document.as_str().to_string()),
        None => error_response(StatusCode::NOT_FOUND, format!("Frame '{}' not found", id)),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::exec::{CommandGateway, Interpreter, ScriptRunner};
    use crate::llm::TextGenerator;
    use crate::preview::{Composer, FrameRegistry, PreviewSessions};
    use crate::server::router;

    struct CannedGenerator(&'static str);

    #[async_trait::async_trait]
    impl TextGenerator for CannedGenerator {
        fn name(&self) -> &str {
            "canned"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    fn state(generator: Option<Arc<dyn TextGenerator>>) -> Arc<AppState> {
        Arc::new(AppState {
            gateway: CommandGateway::default(),
            runner: ScriptRunner::new(Interpreter::new("sh", "script.sh")),
            composer: Composer::new(),
            previews: PreviewSessions::new(FrameRegistry::new(), SandboxPolicy::strict()),
            policy: SandboxPolicy::strict(),
            generator,
        })
    }

    async fn send(
        state: Arc<AppState>,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = router(state)
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, bytes.to_vec())
    }

    async fn send_json(
        state: Arc<AppState>,
        uri: &str,
        body: Value,
    ) -> (StatusCode, Value) {
        let (status, _, bytes) = send(state, "POST", uri, Some(body)).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_extract_endpoint() {
        let (status, body) = send_json(
            state(None),
            "/api/extract",
            json!({"content": "Run:\n```bash\nls -la\n```"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["segments"][0]["kind"], "text");
        assert_eq!(body["segments"][1]["language"], "bash");
        assert_eq!(body["segments"][1]["content"], "ls -la");
        assert!(body.get("malformed").is_none());
    }

    #[tokio::test]
    async fn test_extract_reports_unterminated_fence() {
        let (_, body) = send_json(
            state(None),
            "/api/extract",
            json!({"content": "a ```js\nnever closed"}),
        )
        .await;
        assert_eq!(body["malformed"][0]["offset"], 2);
    }

    #[tokio::test]
    async fn test_execute_success() {
        let (status, body) =
            send_json(state(None), "/api/execute", json!({"command": "pwd"})).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body["output"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_execute_missing_command() {
        let (status, body) = send_json(state(None), "/api/execute", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Command is required");
    }

    #[tokio::test]
    async fn test_execute_rejected() {
        let (status, body) =
            send_json(state(None), "/api/execute", json!({"command": "rm -rf /"})).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Command not allowed");
    }

    #[tokio::test]
    async fn test_execute_failure_carries_output() {
        let (status, body) = send_json(
            state(None),
            "/api/execute",
            json!({"command": "ls /sandpane-definitely-missing"}),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["output"].as_str().unwrap().contains("sandpane-definitely-missing"));
    }

    #[tokio::test]
    async fn test_python_endpoint() {
        let (status, body) =
            send_json(state(None), "/api/python", json!({"code": "echo hi"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["output"], "hi\n");

        let (status, body) =
            send_json(state(None), "/api/python", json!({"code": "echo oops 1>&2"})).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "oops\n");

        let (status, _) = send_json(state(None), "/api/python", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_compose_endpoint_is_sandboxed() {
        let (status, headers, bytes) = send(
            state(None),
            "POST",
            "/api/compose",
            Some(json!({"files": {"index.html": "<p>x</p>", "index.js": "go()"}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_SECURITY_POLICY], "sandbox allow-scripts");
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        let html = String::from_utf8(bytes).unwrap();
        assert!(html.contains("<p>x</p>"));
        assert!(html.contains("<script type=\"module\">go()</script>"));
    }

    async fn send_with(
        state: Arc<AppState>,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, _, bytes) = send(state, method, uri, body).await;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn test_preview_session_lifecycle() {
        let state = state(None);
        let (status, body) = send_json(
            state.clone(),
            "/api/previews",
            json!({"files": {"index.js": "tick()"}}),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["sandbox"], "allow-scripts");
        let session = body["session_id"].as_str().unwrap().to_string();
        let first_src = body["src"].as_str().unwrap().to_string();

        let (status, headers, bytes) = send(state.clone(), "GET", &first_src, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_SECURITY_POLICY], "sandbox allow-scripts");
        assert!(String::from_utf8(bytes).unwrap().contains("tick()"));

        let uri = format!("/api/previews/{}", session);
        let (status, body) = send_with(
            state.clone(),
            "PUT",
            &uri,
            Some(json!({"files": {"index.js": "tock()"}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let second_src = body["src"].as_str().unwrap().to_string();
        assert_ne!(first_src, second_src);

        // The previous frame is gone once the session refreshes.
        let (status, _, _) = send(state.clone(), "GET", &first_src, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _, bytes) = send(state.clone(), "GET", &second_src, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(bytes).unwrap().contains("tock()"));

        let (status, body) = send_with(state.clone(), "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["state"], "ready");
        assert_eq!(body["height"], 300);

        let (status, _) = send_with(state.clone(), "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _, _) = send(state.clone(), "GET", &second_src, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send_with(state, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_many_refreshes_do_not_exhaust_frames() {
        let state = state(None);
        let (_, body) = send_json(
            state.clone(),
            "/api/previews",
            json!({"files": {"index.js": "0"}}),
        )
        .await;
        let uri = format!("/api/previews/{}", body["session_id"].as_str().unwrap());

        for i in 1..=80 {
            let (status, _) = send_with(
                state.clone(),
                "PUT",
                &uri,
                Some(json!({"files": {"index.js": i.to_string()}})),
            )
            .await;
            assert_eq!(status, StatusCode::OK, "refresh {}", i);
        }
        assert_eq!(state.previews.frames().len().await, 1);
    }

    #[tokio::test]
    async fn test_many_sessions_evict_instead_of_failing() {
        let state = state(None);
        for i in 0..80 {
            let (status, _) = send_json(
                state.clone(),
                "/api/previews",
                json!({"files": {"index.js": i.to_string()}}),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED, "session {}", i);
        }
        assert!(state.previews.frames().len().await <= state.previews.len().await);
    }

    #[tokio::test]
    async fn test_preview_messages_resize_current_frame() {
        let state = state(None);
        let (_, body) = send_json(state.clone(), "/api/previews", json!({"files": {}})).await;
        let session = body["session_id"].as_str().unwrap().to_string();
        let frame = body["frame_id"].clone();

        let uri = format!("/api/previews/{}/messages", session);
        let (status, body) = send_json(
            state.clone(),
            &uri,
            json!({"frame_id": frame, "message": {"type": "resize", "height": 420}}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["applied"], true);

        let (_, body) = send_json(
            state.clone(),
            &uri,
            json!({"frame_id": Uuid::new_v4(), "message": {"type": "resize", "height": 10}}),
        )
        .await;
        assert_eq!(body["applied"], false);

        let (_, body) = send_json(
            state.clone(),
            &uri,
            json!({"frame_id": frame, "message": {"type": "resize", "height": "10"}}),
        )
        .await;
        assert_eq!(body["applied"], false);

        let (_, body) = send_with(state, "GET", &format!("/api/previews/{}", session), None).await;
        assert_eq!(body["height"], 420);
    }

    #[tokio::test]
    async fn test_unknown_preview_session() {
        let uri = format!("/api/previews/{}", Uuid::new_v4());
        let (status, _) = send_with(
            state(None),
            "PUT",
            &uri,
            Some(json!({"files": {}})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send_with(state(None), "POST", &format!("{}/retry", uri), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_oversized_preview_is_unprocessable() {
        let mut state = state(None);
        Arc::get_mut(&mut state).unwrap().previews =
            PreviewSessions::new(FrameRegistry::with_limits(4, 64), SandboxPolicy::strict());
        let (status, body) = send_json(
            state.clone(),
            "/api/previews",
            json!({"files": {"index.js": "x".repeat(200)}}),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("exceeds maximum"));

        let uri = format!("/api/previews/{}/retry", body["session_id"].as_str().unwrap());
        let (status, _) = send_with(state, "POST", &uri, None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_chat_endpoint() {
        let generator: Arc<dyn TextGenerator> =
            Arc::new(CannedGenerator("Run this:\n```bash\nls -la\n```"));
        let state = state(Some(generator));

        let (status, body) = send_json(
            state.clone(),
            "/api/chat",
            json!({"messages": [{"role": "user", "content": "list files"}]}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["content"], "Run this:\n```bash\nls -la\n```");
        assert_eq!(body["segments"][1]["language"], "bash");

        let (status, body) = send_json(state.clone(), "/api/chat", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request: messages array is required");

        let (status, _) = send_json(state.clone(), "/api/chat", json!({"messages": []})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) =
            send_json(state, "/api/chat", json!({"messages": [{"role": "user"}]})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_without_generator() {
        let (status, _) = send_json(
            state(None),
            "/api/chat",
            json!({"messages": [{"content": "hi"}]}),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_generate_endpoint() {
        let generator: Arc<dyn TextGenerator> = Arc::new(CannedGenerator(
            r#"{"files": [{"name": "app.py", "type": "file", "content": "print(1)"}]}"#,
        ));
        let state = state(Some(generator));

        let (status, body) =
            send_json(state.clone(), "/api/generate", json!({"prompt": "hello app"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["files"][0]["name"], "app.py");
        assert_eq!(body["files"][0]["type"], "file");

        let (status, _) = send_json(state, "/api/generate", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_generate_bad_response() {
        let generator: Arc<dyn TextGenerator> = Arc::new(CannedGenerator("no json"));
        let (status, body) =
            send_json(state(Some(generator)), "/api/generate", json!({"prompt": "x"})).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to generate code");
    }

    #[tokio::test]
    async fn test_unknown_frame_is_not_found() {
        let uri = format!("/frames/{}", Uuid::new_v4());
        let (status, _, _) = send(state(None), "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_preview_without_generator() {
        let (status, _) = send_json(
            state(None),
            "/api/preview",
            json!({"code": "x", "language": "js"}),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_preview_with_generator() {
        let generator: Arc<dyn TextGenerator> = Arc::new(CannedGenerator(
            r#"Here: {"files": {"index.js": "a()"}, "dependencies": {"d3": "7"}}"#,
        ));
        let state = state(Some(generator));

        let (status, body) = send_json(
            state.clone(),
            "/api/preview",
            json!({"code": "a()", "language": "javascript"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["files"]["index.js"], "a()");
        assert_eq!(body["dependencies"]["d3"], "7");

        let (status, _) = send_json(state, "/api/preview", json!({"code": "a()"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
