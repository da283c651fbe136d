use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::gaze_backend::*;
use crate::config::BackendConfig;
use crate::types::{CalibrationTarget, EncodedFrame, FrameQuality, GazePrediction, Viewport};

const LAYOUT_PATH: &str = "gaze/calibration-points";
const CHECK_PATH: &str = "gaze/check";
const CALIBRATE_PATH: &str = "gaze/calibrate";
const PREDICT_PATH: &str = "gaze/predict";
const STATUS_PATH: &str = "gaze/status";

/// reqwest client for the remote gaze service.
#[derive(Debug, Clone)]
pub struct HttpGazeBackend {
    base_url: Url,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct FrameBody<'a> {
    frame: &'a EncodedFrame,
}

#[derive(Deserialize)]
struct LayoutResponse {
    points: Vec<CalibrationTarget>,
}

#[derive(Deserialize)]
struct PredictResponse {
    x: f64,
    y: f64,
    #[serde(default)]
    calibrated: bool,
    #[serde(default)]
    prediction_failed: bool,
}

impl HttpGazeBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let mut raw = config.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url = Url::parse(&raw).map_err(|e| BackendError::InvalidUrl(format!("{raw}: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Ok(Self {
            base_url,
            api_key: (!config.api_key.is_empty()).then(|| config.api_key.clone()),
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(path)
            .map_err(|e| BackendError::InvalidUrl(e.to_string()))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BackendError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BackendError::ApiError {
                status: status.as_u16(),
                message,
            });
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, BackendError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let response = self
            .authorize(self.client.post(url))
            .json(body)
            .send()
            .await?;
        Self::read_json(response).await
    }

    /// Whether the remote model currently holds a fitted calibration.
    pub async fn model_status(&self) -> Result<ModelStatus, BackendError> {
        let url = self.endpoint(STATUS_PATH)?;
        let response = self.authorize(self.client.get(url)).send().await?;
        Self::read_json(response).await
    }
}

#[async_trait]
impl FrameQualityOracle for HttpGazeBackend {
    async fn check_frame(&self, frame: &EncodedFrame) -> Result<FrameQuality, BackendError> {
        self.post_json(CHECK_PATH, &FrameBody { frame }).await
    }
}

#[async_trait]
impl CalibrationFitter for HttpGazeBackend {
    async fn submit_calibration(
        &self,
        request: &CalibrationRequest,
    ) -> Result<CalibrationVerdict, BackendError> {
        tracing::info!(
            frames = request.frames.len(),
            screen_width = request.screen_width,
            screen_height = request.screen_height,
            "Submitting calibration batch"
        );
        self.post_json(CALIBRATE_PATH, request).await
    }
}

#[async_trait]
impl GazePredictor for HttpGazeBackend {
    async fn predict_gaze(&self, frame: &EncodedFrame) -> Result<GazePrediction, BackendError> {
        let raw: PredictResponse = self.post_json(PREDICT_PATH, &FrameBody { frame }).await?;
        if raw.prediction_failed {
            return Err(BackendError::PredictionFailed);
        }
        Ok(GazePrediction {
            x: raw.x,
            y: raw.y,
            calibrated: raw.calibrated,
        })
    }
}

#[async_trait]
impl LayoutProvider for HttpGazeBackend {
    async fn calibration_layout(
        &self,
        screen: Viewport,
    ) -> Result<Vec<CalibrationTarget>, BackendError> {
        let url = self.endpoint(LAYOUT_PATH)?;
        let response = self
            .authorize(self.client.get(url))
            .query(&[
                ("screen_width", screen.width),
                ("screen_height", screen.height),
            ])
            .send()
            .await?;
        let layout: LayoutResponse = Self::read_json(response).await?;
        Ok(layout.points)
    }
}
