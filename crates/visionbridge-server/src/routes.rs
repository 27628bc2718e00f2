//! HTTP routes and handlers
//!
//! Commands arrive as `POST /commands/{name}` with the arguments as the JSON
//! body. Each event stream is served as a WebSocket that becomes the stream's
//! single subscriber while it is open.

use axum::{
    body::Bytes,
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};
use visionbridge_core::Error;
use visionbridge_dispatch::{error_value, StreamBroadcaster, StreamKind};

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/commands/:name", post(command))
        .route("/streams/:stream", get(stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let model = state.bridge.slot().load().map(|backend| {
        json!({
            "name": backend.name(),
            "task": backend.task().as_str(),
        })
    });

    Json(json!({
        "status": "ok",
        "model": model,
        "camera_running": !state.bridge.dispatcher().is_stopped(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}

async fn metrics(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

async fn command(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Response {
    let args = if body.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice(&body) {
            Ok(args) => args,
            Err(e) => {
                let err = Error::invalid_arguments(&name, format!("malformed JSON body: {}", e));
                return error_response(&err);
            }
        }
    };

    match state.bridge.router().handle(&name, &args).await {
        None => {
            debug!("Ignoring unknown command '{}'", name);
            StatusCode::NO_CONTENT.into_response()
        }
        Some(Ok(response)) => Json(response.to_value()).into_response(),
        Some(Err(err)) => {
            if status_for(&err).is_server_error() {
                warn!("Command '{}' failed: {}", name, err);
            } else {
                debug!("Command '{}' rejected: {}", name, err);
            }
            error_response(&err)
        }
    }
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::InvalidArguments { .. } => StatusCode::BAD_REQUEST,
        Error::Predictor(_) | Error::InvalidImage(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::NoActiveBackend => StatusCode::CONFLICT,
        Error::FrameUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &Error) -> Response {
    (status_for(err), Json(error_value(err))).into_response()
}

async fn stream(
    State(state): State<AppState>,
    Path(stream): Path<String>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let kind: StreamKind = match stream.parse() {
        Ok(kind) => kind,
        Err(message) => {
            return (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response();
        }
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, kind))
}

async fn handle_socket(socket: WebSocket, state: AppState, kind: StreamKind) {
    let streams = state.bridge.streams();
    match kind {
        StreamKind::PredictionResults => forward(socket, &streams.predictions).await,
        StreamKind::InferenceTime => forward(socket, &streams.inference_time).await,
        StreamKind::FpsRate => forward(socket, &streams.fps_rate).await,
    }
}

/// Attach as the stream's subscriber and relay values until either side goes away
async fn forward<T>(socket: WebSocket, stream: &StreamBroadcaster<T>)
where
    T: Serialize + Send + 'static,
{
    let mut subscription = stream.attach();
    let id = subscription.id();
    let (mut sender, mut receiver) = socket.split();
    debug!("Subscriber {} attached to {}", id, stream.kind());

    loop {
        tokio::select! {
            value = subscription.recv() => {
                // None once another subscriber replaced this one
                let Some(value) = value else { break };
                match serde_json::to_string(&value) {
                    Ok(text) => {
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("Failed to serialize {} value: {}", stream.kind(), e);
                    }
                }
            }
            message = receiver.next() => match message {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(other)) => tracing::trace!("Ignoring client message: {:?}", other),
            }
        }
    }

    if stream.detach_if_current(id) {
        debug!("Subscriber {} detached from {}", id, stream.kind());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::SyntheticCamera;
    use crate::config::CameraConfig;
    use crate::demo_model::DemoModelLoader;
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::Arc;
    use tower::ServiceExt;
    use visionbridge_dispatch::{DispatchConfig, VisionBridge};

    fn app(models_dir: &std::path::Path) -> Router {
        let camera = Arc::new(SyntheticCamera::new(CameraConfig::default()));
        let loader = Arc::new(DemoModelLoader::new(models_dir));
        let bridge = VisionBridge::new(DispatchConfig::default(), loader, camera).unwrap();
        let handle = PrometheusBuilder::new().build_recorder().handle();
        create_router(AppState::new(bridge, handle))
    }

    async fn post(app: &Router, name: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(format!("/commands/{}", name))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_load_model_responses() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("people.model"), b"weights").unwrap();
        let app = app(dir.path());

        let args = r#"{"model": {"type": "local", "task": "detect", "modelPath": "people.model"}}"#;
        let (status, value) = post(&app, "loadModel", args).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value, json!("Success"));

        let args = r#"{"model": {"type": "local", "task": "detect", "modelPath": "gone.model"}}"#;
        let (status, value) = post(&app, "loadModel", args).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(value["code"], "PredictorError");
        assert_eq!(value["message"], "Invalid model");
        assert_eq!(value["details"], Value::Null);
    }

    #[tokio::test]
    async fn test_unknown_command_has_no_body() {
        let dir = tempfile::tempdir().unwrap();
        let (status, value) = post(&app(dir.path()), "startRecording", "{}").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn test_command_errors_map_to_status() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let (status, value) = post(&app, "setConfidenceThreshold", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["code"], "InvalidArguments");

        let (status, value) = post(&app, "takeSnapshot", "").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(value["code"], "FrameUnavailable");

        let (status, value) = post(&app, "captureOutput", "").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(value["code"], "NoActiveBackend");

        let (status, value) = post(&app, "setIouThreshold", r#"{"iou": 0.3}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn test_health_and_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let health: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["model"], Value::Null);

        let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stream_name_checked_before_upgrade() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let request = Request::builder().uri("/streams/depth_map").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // Known stream, but a plain GET cannot be upgraded
        let request = Request::builder().uri("/streams/fps_rate").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert!(response.status().is_client_error());
        assert_ne!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_argument_error_payload_names_command() {
        let dir = tempfile::tempdir().unwrap();
        let (status, value) = post(&app(dir.path()), "setIouThreshold", "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["details"]["command"], "setIouThreshold");
    }
}
