use std::time::Duration;

use async_trait::async_trait;
use image::imageops::FilterType;
use reqwest::StatusCode;
use tokio::task::JoinHandle;

use super::{CameraDevice, CameraError, CaptureConstraints, CaptureStream, RawFrame, SurfaceBinding};
use crate::config::CameraConfig;

/// Camera exposed as a JPEG snapshot endpoint (IP webcams, capture bridges).
/// Frames are pulled at a fixed rate and published into the bound surface.
#[derive(Debug, Clone)]
pub struct SnapshotCamera {
    url: String,
    frame_interval: Duration,
    client: reqwest::Client,
}

impl SnapshotCamera {
    pub fn new(config: &CameraConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let fps = config.fps.max(1);
        Self {
            url: config.snapshot_url.clone(),
            frame_interval: Duration::from_millis(1_000 / u64::from(fps)),
            client,
        }
    }

    async fn probe(&self) -> Result<(), CameraError> {
        if self.url.trim().is_empty() {
            return Err(CameraError::NoDevice("no snapshot url configured".to_string()));
        }
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CameraError::NoDevice(e.to_string()))?;
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(
                CameraError::PermissionDenied(format!("snapshot endpoint returned {}", response.status())),
            ),
            status if status.is_success() => Ok(()),
            status => Err(CameraError::NoDevice(format!("snapshot endpoint returned {status}"))),
        }
    }
}

#[async_trait]
impl CameraDevice for SnapshotCamera {
    async fn open(
        &self,
        constraints: &CaptureConstraints,
        surface: SurfaceBinding,
    ) -> Result<Box<dyn CaptureStream>, CameraError> {
        self.probe().await?;

        let client = self.client.clone();
        let url = self.url.clone();
        let interval = self.frame_interval;
        let constraints = *constraints;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match fetch_frame(&client, &url, &constraints).await {
                    Ok(frame) => {
                        if !surface.publish(frame) {
                            break;
                        }
                    }
                    Err(e) => tracing::debug!(error = %e, "Snapshot frame dropped"),
                }
            }
        });

        tracing::info!(url = %self.url, "Snapshot camera stream opened");
        Ok(Box::new(SnapshotStream {
            label: self.url.clone(),
            handle: Some(handle),
        }))
    }
}

async fn fetch_frame(
    client: &reqwest::Client,
    url: &str,
    constraints: &CaptureConstraints,
) -> Result<RawFrame, String> {
    let bytes = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| e.to_string())?
        .bytes()
        .await
        .map_err(|e| e.to_string())?;
    let decoded = image::load_from_memory(&bytes).map_err(|e| e.to_string())?;

    let decoded = if decoded.width() > constraints.ideal_width
        || decoded.height() > constraints.ideal_height
    {
        decoded.resize(
            constraints.ideal_width,
            constraints.ideal_height,
            FilterType::Triangle,
        )
    } else {
        decoded
    };

    let rgb = decoded.to_rgb8();
    Ok(RawFrame::new(rgb.width(), rgb.height(), rgb.into_raw()))
}

struct SnapshotStream {
    label: String,
    handle: Option<JoinHandle<()>>,
}

impl CaptureStream for SnapshotStream {
    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::info!(camera = %self.label, "Snapshot camera stream stopped");
        }
    }

    fn is_live(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn label(&self) -> String {
        self.label.clone()
    }
}

impl Drop for SnapshotStream {
    fn drop(&mut self) {
        self.stop();
    }
}
