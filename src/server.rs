//! HTTP inference service.
//!
//! `POST /api/voice-command` takes the candidate elements gathered by a
//! client plus the raw utterance and answers with a [`ResolvedCommand`]
//! produced by a server-side [`CommandResolver`].

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::errors::{VoiceNavError, VoiceNavResult};
use crate::perception::types::ElementSnapshot;
use crate::resolver::inference::VoiceCommandRequest;
use crate::resolver::types::{FailureKind, ResolvedCommand};
use crate::resolver::CommandResolver;

const SERVER_ERROR_MESSAGE: &str = "Error del servidor";

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<CommandResolver>,
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/voice-command", post(voice_command))
        .route("/api/metrics", get(metrics).delete(clear_metrics))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn server_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ResolvedCommand::failed(SERVER_ERROR_MESSAGE)),
    )
        .into_response()
}

// The body is taken raw so a malformed payload maps to the documented 500
// reply instead of axum's extractor rejection.
async fn voice_command(State(state): State<AppState>, body: Bytes) -> Response {
    let request: VoiceCommandRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "malformed voice command request");
            return server_error();
        }
    };

    let Some(command) = request.command.filter(|c| !c.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Command is required" })),
        )
            .into_response();
    };

    let snapshot = ElementSnapshot::new(request.dom_elements);
    match state.resolver.resolve(&command, &snapshot).await {
        Ok(resolution) => match resolution.failure {
            Some(FailureKind::Timeout | FailureKind::Transport) => server_error(),
            _ => Json(resolution.command).into_response(),
        },
        Err(VoiceNavError::Validation(message)) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "voice command failed");
            server_error()
        }
    }
}

async fn metrics(State(state): State<AppState>) -> Json<Value> {
    let monitor = state.resolver.monitor();
    Json(json!({
        "metrics": monitor.metrics(),
        "stats": monitor.detailed_stats(),
        "cacheEntries": state.resolver.cache().len(),
    }))
}

async fn clear_metrics(State(state): State<AppState>) -> StatusCode {
    state.resolver.monitor().clear();
    StatusCode::NO_CONTENT
}

/// Binds `bind` and serves until SIGINT/SIGTERM.
pub async fn serve(bind: &str, state: AppState) -> VoiceNavResult<()> {
    let listener = TcpListener::bind(bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "starting voice command server");
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("voice command server shut down");
    Ok(())
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::config::{CommandsConfig, ResolverConfig};
    use crate::perception::types::CandidateElement;
    use crate::resolver::inference::Inference;

    struct Unreachable;

    #[async_trait]
    impl Inference for Unreachable {
        fn name(&self) -> &str {
            "unreachable"
        }

        async fn infer(
            &self,
            _command: &str,
            _elements: &[CandidateElement],
        ) -> VoiceNavResult<Option<ResolvedCommand>> {
            Err(VoiceNavError::Transport("connection refused".into()))
        }
    }

    fn test_app() -> Router {
        let resolver = CommandResolver::from_config(
            &ResolverConfig::default(),
            &CommandsConfig::default(),
            Arc::new(Unreachable),
        );
        app(AppState {
            resolver: Arc::new(resolver),
        })
    }

    async fn call(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/voice-command")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = call(test_app(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn unreachable_backend_is_500() {
        let (status, body) = call(test_app(), post_json(r#"{"command":"algo nuevo"}"#)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], SERVER_ERROR_MESSAGE);
        assert_eq!(body["action"], "none");
    }

    #[tokio::test]
    async fn metrics_reflect_resolutions() {
        let app = test_app();
        call(app.clone(), post_json(r#"{"command":"ver turnos"}"#)).await;
        let req = Request::builder().uri("/api/metrics").body(Body::empty()).unwrap();
        let (status, body) = call(app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["metrics"]["totalRequests"], 1);
        assert_eq!(body["stats"]["directCommands"], 1);
    }
}
