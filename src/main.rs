use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header;
use gaze_session::capture::snapshot::SnapshotCamera;
use gaze_session::capture::CaptureConstraints;
use gaze_session::config::Config;
use gaze_session::logging::{init_tracing, LogConfig};
use gaze_session::presentation::HeadlessPresentation;
use gaze_session::routes::build_router;
use gaze_session::services::http_backend::HttpGazeBackend;
use gaze_session::session::runner::{ReportSink, SessionHandle};
use gaze_session::session::{GazeSession, SessionDeps};
use gaze_session::state::AppState;
use gaze_session::stimulus::ClockPlayer;
use tokio::sync::broadcast;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    init_tracing(&LogConfig::from(&config));
    tracing::info!(?config, "Starting gaze-session");

    let backend = match HttpGazeBackend::new(&config.backend) {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            tracing::error!(error = %e, "Invalid gaze service configuration");
            std::process::exit(1);
        }
    };
    match backend.model_status().await {
        Ok(status) => tracing::info!(
            base_url = %backend.base_url(),
            calibrated = status.calibrated,
            model_path = ?status.model_path,
            "Gaze service reachable"
        ),
        Err(e) => tracing::warn!(error = %e, "Gaze service status probe failed"),
    }

    let camera = Arc::new(SnapshotCamera::new(&config.camera));
    let presentation = Arc::new(HeadlessPresentation::new(config.viewport));
    let player = Arc::new(ClockPlayer::new(
        config.stimulus.src.clone(),
        Duration::from_secs(config.stimulus.duration_secs),
    ));
    tracing::info!(src = player.src(), duration = ?player.duration(), "Stimulus loaded");
    let sink = Arc::new(ReportSink::new(config.stimulus.duration_secs as f64));
    let reports = sink.store();

    let deps = SessionDeps::new(camera, presentation, backend, player, sink);
    let constraints = CaptureConstraints {
        ideal_width: config.camera.ideal_width,
        ideal_height: config.camera.ideal_height,
        ..CaptureConstraints::default()
    };
    let session = GazeSession::with_constraints(config.session.clone(), deps, constraints);
    let (handle, runner) = SessionHandle::spawn(session, reports);

    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let state = AppState::new(handle.clone(), &config, shutdown_tx.clone());

    let app = build_router(state)
        .layer(build_cors_layer(&config))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new());

    let addr = SocketAddr::new(config.host, config.port);
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind TCP listener");
            std::process::exit(1);
        }
    };
    tracing::info!(%addr, "Listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(shutdown_tx));
    if let Err(e) = server.await {
        tracing::error!(error = %e, "HTTP server crashed");
    }

    if let Err(e) = handle.abort().await {
        tracing::debug!(error = %e, "Session runner already stopped");
    }
    drop(handle);
    match tokio::time::timeout(Duration::from_secs(5), runner).await {
        Ok(Err(e)) => tracing::error!(error = %e, "Session runner panicked"),
        Ok(Ok(())) => {}
        Err(_) => tracing::warn!("Session runner did not stop in time"),
    }
    tracing::info!("Shutdown complete");
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_methods(Any);
    if config.cors_origin.trim() == "*" {
        return base.allow_origin(Any);
    }
    match config.cors_origin.parse::<axum::http::HeaderValue>() {
        Ok(origin) => base.allow_origin(origin),
        Err(e) => {
            tracing::warn!(origin = %config.cors_origin, error = %e, "Invalid CORS_ORIGIN, allowing any origin");
            base.allow_origin(Any)
        }
    }
}

async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable, waiting for ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
}
