use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use gaze_session::config::BackendConfig;
use gaze_session::services::gaze_backend::{
    BackendError, CalibrationFitter, CalibrationFrame, CalibrationRequest, FrameQualityOracle,
    GazePredictor, LayoutProvider,
};
use gaze_session::services::http_backend::HttpGazeBackend;
use gaze_session::types::{EncodedFrame, Viewport};

#[derive(Clone, Default)]
struct Seen {
    bodies: Arc<Mutex<Vec<(String, Value)>>>,
    auth: Arc<Mutex<Vec<Option<String>>>>,
    queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

impl Seen {
    fn record(&self, path: &str, headers: &HeaderMap, body: Value) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.auth.lock().unwrap().push(auth);
        self.bodies.lock().unwrap().push((path.to_string(), body));
    }
}

async fn check(State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    let blink = body["frame"] == "blink";
    seen.record("check", &headers, body);
    Json(json!({ "face_detected": true, "blink_detected": blink }))
}

async fn predict(
    State(seen): State<Seen>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let failed = body["frame"] == "noface";
    seen.record("predict", &headers, body);
    if failed {
        Json(json!({ "x": 0.0, "y": 0.0, "prediction_failed": true }))
    } else {
        Json(json!({ "x": 0.3, "y": 0.6, "calibrated": true }))
    }
}

async fn calibrate(
    State(seen): State<Seen>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let frames = body["frames"].as_array().map(Vec::len).unwrap_or(0);
    seen.record("calibrate", &headers, body);
    if frames == 0 {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": "no frames" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({ "status": "calibrated", "message": format!("{frames} frames") })),
    )
}

async fn layout(
    State(seen): State<Seen>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    seen.queries.lock().unwrap().push(query);
    Json(json!({ "points": [{ "x": 0.2, "y": 0.2 }, { "x": 0.8, "y": 0.8 }] }))
}

async fn status() -> Json<Value> {
    Json(json!({ "calibrated": false, "model_path": null }))
}

async fn spawn_fake_service() -> (SocketAddr, Seen) {
    let seen = Seen::default();
    let app = Router::new()
        .route("/api/gaze/check", post(check))
        .route("/api/gaze/predict", post(predict))
        .route("/api/gaze/calibrate", post(calibrate))
        .route("/api/gaze/calibration-points", get(layout))
        .route("/api/gaze/status", get(status))
        .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, seen)
}

fn client(addr: SocketAddr, api_key: &str) -> HttpGazeBackend {
    HttpGazeBackend::new(&BackendConfig {
        base_url: format!("http://{addr}/api"),
        api_key: api_key.to_string(),
        timeout_secs: 5,
    })
    .unwrap()
}

fn frame(text: &str) -> EncodedFrame {
    EncodedFrame::new(text.to_string())
}

#[tokio::test]
async fn quality_check_round_trip() {
    let (addr, seen) = spawn_fake_service().await;
    let backend = client(addr, "");

    let good = backend.check_frame(&frame("abc")).await.unwrap();
    assert!(good.face_detected && !good.blink_detected);
    let blink = backend.check_frame(&frame("blink")).await.unwrap();
    assert!(blink.face_detected && blink.blink_detected);

    let bodies = seen.bodies.lock().unwrap();
    assert_eq!(bodies[0], ("check".to_string(), json!({ "frame": "abc" })));
    assert!(seen.auth.lock().unwrap().iter().all(Option::is_none));
}

#[tokio::test]
async fn prediction_failure_flag_becomes_an_error() {
    let (addr, _) = spawn_fake_service().await;
    let backend = client(addr, "");

    let p = backend.predict_gaze(&frame("face")).await.unwrap();
    assert_eq!((p.x, p.y, p.calibrated), (0.3, 0.6, true));

    let err = backend.predict_gaze(&frame("noface")).await.unwrap_err();
    assert!(matches!(err, BackendError::PredictionFailed));
}

#[tokio::test]
async fn calibration_batch_is_posted_as_json() {
    let (addr, seen) = spawn_fake_service().await;
    let backend = client(addr, "secret-key");

    let request = CalibrationRequest {
        frames: vec![CalibrationFrame {
            frame: frame("f0"),
            target_x: 0.1,
            target_y: 0.9,
            point_index: 6,
        }],
        screen_width: 1920,
        screen_height: 1080,
    };
    let verdict = backend.submit_calibration(&request).await.unwrap();
    assert!(verdict.is_calibrated());
    assert_eq!(verdict.message.as_deref(), Some("1 frames"));

    let bodies = seen.bodies.lock().unwrap();
    let (_, body) = &bodies[0];
    assert_eq!(body["screen_width"], 1920);
    assert_eq!(body["frames"][0]["point_index"], 6);
    assert_eq!(body["frames"][0]["frame"], "f0");
    assert_eq!(
        seen.auth.lock().unwrap()[0].as_deref(),
        Some("Bearer secret-key")
    );
}

#[tokio::test]
async fn server_errors_surface_status_and_body() {
    let (addr, _) = spawn_fake_service().await;
    let backend = client(addr, "");

    let request = CalibrationRequest {
        frames: Vec::new(),
        screen_width: 800,
        screen_height: 600,
    };
    match backend.submit_calibration(&request).await.unwrap_err() {
        BackendError::ApiError { status, message } => {
            assert_eq!(status, 500);
            assert!(message.contains("no frames"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn layout_request_carries_screen_size() {
    let (addr, seen) = spawn_fake_service().await;
    let backend = client(addr, "");

    let points = backend
        .calibration_layout(Viewport::new(1280, 720))
        .await
        .unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!((points[1].x, points[1].y), (0.8, 0.8));

    let queries = seen.queries.lock().unwrap();
    assert_eq!(queries[0]["screen_width"], "1280");
    assert_eq!(queries[0]["screen_height"], "720");
}

#[tokio::test]
async fn status_probe_and_missing_routes() {
    let (addr, _) = spawn_fake_service().await;
    let backend = client(addr, "");

    let status = backend.model_status().await.unwrap();
    assert!(!status.calibrated);
    assert!(status.model_path.is_none());

    let moved = HttpGazeBackend::new(&BackendConfig {
        base_url: format!("http://{addr}/v2"),
        api_key: String::new(),
        timeout_secs: 5,
    })
    .unwrap();
    let err = moved.model_status().await.unwrap_err();
    assert!(matches!(err, BackendError::ApiError { status: 404, .. }));
}
