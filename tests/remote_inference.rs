mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;

use common::{resolver_with, FakeInference, Reply, SITE};
use voicenav_lib::config::{RemoteInferenceConfig, SnapshotConfig};
use voicenav_lib::errors::VoiceNavError;
use voicenav_lib::perception::html_page::HtmlPage;
use voicenav_lib::perception::pipeline::SnapshotExtractor;
use voicenav_lib::perception::types::CandidateElement;
use voicenav_lib::resolver::inference::{Inference, RemoteInference};
use voicenav_lib::resolver::types::{Action, ResolvedCommand};
use voicenav_lib::server::{app, AppState};

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/api/voice-command")
}

fn client(endpoint: String, timeout_ms: u64) -> RemoteInference {
    RemoteInference::new(&RemoteInferenceConfig {
        enabled: true,
        endpoint,
        timeout_ms,
    })
}

fn site_elements() -> Vec<CandidateElement> {
    let page = HtmlPage::new(SITE);
    SnapshotExtractor::new(SnapshotConfig::default())
        .extract(&page)
        .head(20)
        .to_vec()
}

#[tokio::test]
async fn remote_client_round_trips_through_the_service() {
    let inference = FakeInference::new(vec![Reply::Command(ResolvedCommand::new(
        Action::Click,
        "#toggle-voz",
        "Activando voz",
    ))]);
    let state = AppState {
        resolver: Arc::new(resolver_with(inference.clone())),
    };
    let endpoint = spawn(app(state)).await;
    let remote = client(endpoint, 2_000);

    let elements = site_elements();
    let reply = remote
        .infer("activar la voz por favor", &elements)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply.action, Action::Click);
    assert_eq!(reply.target, "#toggle-voz");
    assert!(reply.success);

    let seen = inference.seen.lock().unwrap().clone();
    assert_eq!(seen, vec![("activar la voz por favor".to_string(), elements.len())]);
}

#[tokio::test]
async fn service_failure_status_is_transport_error() {
    let inference = FakeInference::new(vec![Reply::Transport]);
    let state = AppState {
        resolver: Arc::new(resolver_with(inference)),
    };
    let endpoint = spawn(app(state)).await;

    let err = client(endpoint, 2_000)
        .infer("algo que nadie entiende", &[])
        .await
        .unwrap_err();
    match err {
        VoiceNavError::Transport(msg) => assert!(msg.contains("500"), "{msg}"),
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn parse_failures_come_back_as_failed_commands() {
    let inference = FakeInference::new(vec![Reply::Malformed]);
    let state = AppState {
        resolver: Arc::new(resolver_with(inference)),
    };
    let endpoint = spawn(app(state)).await;

    let reply = client(endpoint, 2_000)
        .infer("abrir algo", &[])
        .await
        .unwrap()
        .unwrap();
    assert!(!reply.success);
    assert_eq!(reply.action, Action::None);
    assert_eq!(reply.message, "Error al interpretar comando");
}

#[tokio::test]
async fn missing_command_and_malformed_body_statuses() {
    let state = AppState {
        resolver: Arc::new(resolver_with(FakeInference::new(vec![Reply::Empty]))),
    };
    let endpoint = spawn(app(state)).await;
    let http = reqwest::Client::new();

    let res = http
        .post(&endpoint)
        .json(&serde_json::json!({ "domElements": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Command is required");

    let res = http
        .post(&endpoint)
        .header("content-type", "application/json")
        .body("{\"command\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Error del servidor");
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn garbage_reply_is_parse_error() {
    let router = Router::new().route("/api/voice-command", post(|| async { "<html>oops</html>" }));
    let endpoint = spawn(router).await;

    let err = client(endpoint, 2_000).infer("ir", &[]).await.unwrap_err();
    assert!(matches!(err, VoiceNavError::Parse(_)), "{err:?}");
}

#[tokio::test]
async fn slow_service_is_timeout() {
    let router = Router::new().route(
        "/api/voice-command",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "{}"
        }),
    );
    let endpoint = spawn(router).await;

    let err = client(endpoint, 100).infer("ir", &[]).await.unwrap_err();
    assert!(matches!(err, VoiceNavError::Timeout(100)), "{err:?}");
}

#[tokio::test]
async fn unreachable_service_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(format!("http://{addr}/api/voice-command"), 2_000)
        .infer("ir", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, VoiceNavError::Transport(_)), "{err:?}");
}
