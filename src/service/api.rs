//! Blocking HTTP client for the delay-prediction service.

use url::Url;

use crate::config::{ConfigError, DashboardConfig, HttpTimeouts};
use crate::error::DashboardError;
use crate::http_client::{self, MultipartForm};
use crate::model_status::ModelInfo;
use crate::prediction::{PredictionRequest, PredictionResponse};
use crate::training::{MetricsSnapshot, TrainingMode, TrainingResult};

use super::wire::{
    self, FeatureImportanceWire, HealthWire, MetricsWire, ModelInfoWire, PredictResponseWire,
    TrainResponseWire,
};
use super::{DelayService, FeatureImportance, HealthStatus, TrainingUpload};

/// Cap on any response body read from the service.
pub const MAX_RESPONSE_BYTES: usize = 1024 * 1024;

const HEALTH: &str = "/api/health";
const MODEL_INFO: &str = "/api/model/info";
const PREDICT: &str = "/api/predict";
const METRICS: &str = "/api/metrics";
const FEATURE_IMPORTANCE: &str = "/api/features/importance";

/// [`DelayService`] over HTTP+JSON.
#[derive(Clone, Debug)]
pub struct HttpDelayService {
    agent: ureq::Agent,
    base_url: Url,
}

impl HttpDelayService {
    /// Endpoints resolve relative to `base_url`, so a path prefix such as
    /// `https://host/backend` is kept.
    pub fn new(mut base_url: Url, timeouts: &HttpTimeouts) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            agent: http_client::build_agent(timeouts),
            base_url,
        }
    }

    pub fn from_config(config: &DashboardConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.base_url()?, &config.http))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url, DashboardError> {
        self.base_url
            .join(endpoint.trim_start_matches('/'))
            .map_err(|err| DashboardError::Network(format!("invalid URL for {endpoint}: {err}")))
    }

    fn request(&self, method: &str, endpoint: &str) -> Result<ureq::Request, DashboardError> {
        let url = self.endpoint_url(endpoint)?;
        tracing::debug!("{method} {url}");
        Ok(self
            .agent
            .request_url(method, &url)
            .set("Accept", "application/json"))
    }

    fn get(&self, endpoint: &str) -> Result<String, DashboardError> {
        let result = self.request("GET", endpoint)?.call();
        response_text(endpoint, result)
    }
}

impl DelayService for HttpDelayService {
    fn health(&self) -> Result<HealthStatus, DashboardError> {
        let body = self.get(HEALTH)?;
        let wire = wire::decode::<HealthWire>(HEALTH, &body).unwrap_or_else(|err| {
            tracing::warn!("Unreadable health body, assuming defaults: {err}");
            HealthWire::default()
        });
        Ok(wire.into())
    }

    fn model_info(&self) -> Result<ModelInfo, DashboardError> {
        let body = match self.request("GET", MODEL_INFO)?.call() {
            Err(ureq::Error::Status(404, response)) => {
                let body = read_text(MODEL_INFO, response)?;
                return untrained_from_not_found(&body).ok_or_else(|| service_error(404, &body));
            }
            other => response_text(MODEL_INFO, other)?,
        };
        Ok(wire::decode::<ModelInfoWire>(MODEL_INFO, &body)?.into())
    }

    fn train(
        &self,
        mode: TrainingMode,
        upload: &TrainingUpload,
    ) -> Result<TrainingResult, DashboardError> {
        let endpoint = mode.endpoint();
        let (content_type, body) = MultipartForm::new()
            .file("file", &upload.file_name, &upload.media_type, &upload.bytes)
            .text("test_size", &upload.test_split.to_string())
            .finish();
        tracing::info!(
            "Uploading {} ({} bytes) to {endpoint}",
            upload.file_name,
            upload.bytes.len()
        );
        let result = self
            .request("POST", endpoint)?
            .set("Content-Type", &content_type)
            .send_bytes(&body);
        let text = response_text(endpoint, result)?;
        Ok(wire::decode::<TrainResponseWire>(endpoint, &text)?.into())
    }

    fn predict(&self, request: &PredictionRequest) -> Result<PredictionResponse, DashboardError> {
        let result = self.request("POST", PREDICT)?.send_json(request);
        let text = response_text(PREDICT, result)?;
        Ok(wire::decode::<PredictResponseWire>(PREDICT, &text)?.into())
    }

    fn metrics(&self) -> Result<MetricsSnapshot, DashboardError> {
        let text = self.get(METRICS)?;
        Ok(wire::decode::<MetricsWire>(METRICS, &text)?.into())
    }

    fn feature_importance(&self) -> Result<Vec<FeatureImportance>, DashboardError> {
        let text = self.get(FEATURE_IMPORTANCE)?;
        Ok(wire::decode::<FeatureImportanceWire>(FEATURE_IMPORTANCE, &text)?.into())
    }
}

fn response_text(
    endpoint: &str,
    result: Result<ureq::Response, ureq::Error>,
) -> Result<String, DashboardError> {
    match result {
        Ok(response) => read_text(endpoint, response),
        Err(ureq::Error::Status(code, response)) => {
            let body = http_client::read_response_text(response, MAX_RESPONSE_BYTES)
                .unwrap_or_default();
            let err = service_error(code, &body);
            tracing::error!("{endpoint} failed: {err}");
            Err(err)
        }
        Err(ureq::Error::Transport(err)) => {
            tracing::error!("{endpoint} unreachable: {err}");
            Err(DashboardError::Network(err.to_string()))
        }
    }
}

fn read_text(endpoint: &str, response: ureq::Response) -> Result<String, DashboardError> {
    http_client::read_response_text(response, MAX_RESPONSE_BYTES).map_err(|err| {
        if err.kind() == std::io::ErrorKind::InvalidData {
            DashboardError::InvalidResponse {
                endpoint: endpoint.to_string(),
                reason: err.to_string(),
            }
        } else {
            DashboardError::Network(err.to_string())
        }
    })
}

fn service_error(status: u16, body: &str) -> DashboardError {
    DashboardError::Service {
        status,
        detail: wire::error_detail(body),
    }
}

/// A 404 from the model-info endpoint carrying `is_trained: false` means the
/// model simply has not been trained yet.
fn untrained_from_not_found(body: &str) -> Option<ModelInfo> {
    let parsed: ModelInfoWire = serde_json::from_str(body.trim()).ok()?;
    match parsed.is_trained {
        Some(false) => {
            tracing::info!("Model info reports an untrained model");
            Some(parsed.into())
        }
        _ => None,
    }
}
