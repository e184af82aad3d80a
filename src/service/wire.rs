//! Lenient wire shapes for the service's JSON bodies.
//!
//! Every field is optional; missing or `null` values fall back to defaults
//! when converted into domain types.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::DashboardError;
use crate::model_status::{ModelInfo, UNTRAINED_VERSION};
use crate::prediction::PredictionResponse;
use crate::training::{ConfusionMatrix, MetricsSnapshot, TrainingResult};

use super::{FeatureImportance, HealthStatus};

/// Parse a JSON body; an empty body decodes to the type's default.
pub(super) fn decode<T>(endpoint: &str, body: &str) -> Result<T, DashboardError>
where
    T: DeserializeOwned + Default,
{
    let trimmed = body.trim();
    if trimmed.is_empty() {
        tracing::warn!("Empty response body from {endpoint}; using defaults");
        return Ok(T::default());
    }
    serde_json::from_str(trimmed).map_err(|err| DashboardError::InvalidResponse {
        endpoint: endpoint.to_string(),
        reason: err.to_string(),
    })
}

/// Pull the operator-facing message out of an error body.
///
/// FastAPI puts it in `detail`, either a string or a list of validation
/// objects; some handlers use `message` instead.
pub(super) fn error_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let Ok(parsed) = serde_json::from_str::<ErrorWire>(trimmed) else {
        return None;
    };
    match parsed.detail {
        Some(serde_json::Value::String(detail)) => Some(detail),
        Some(serde_json::Value::Null) | None => parsed.message,
        Some(other) => Some(other.to_string()),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorWire {
    detail: Option<serde_json::Value>,
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct HealthWire {
    status: Option<String>,
    model_loaded: Option<bool>,
    model_version: Option<String>,
}

impl From<HealthWire> for HealthStatus {
    fn from(wire: HealthWire) -> Self {
        Self {
            status: wire.status.unwrap_or_else(|| "unknown".to_string()),
            model_loaded: wire.model_loaded.unwrap_or(false),
            model_version: wire.model_version,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct MetricsWire {
    accuracy: Option<f64>,
    auc: Option<f64>,
    train_size: Option<u64>,
    test_size: Option<u64>,
    confusion_matrix: Option<serde_json::Value>,
}

impl From<MetricsWire> for MetricsSnapshot {
    fn from(wire: MetricsWire) -> Self {
        let confusion_matrix = wire.confusion_matrix.and_then(|value| {
            let rows: Vec<Vec<u64>> = serde_json::from_value(value).ok()?;
            ConfusionMatrix::from_rows(&rows)
        });
        Self {
            accuracy: wire.accuracy.unwrap_or_default(),
            auc: wire.auc.unwrap_or_default(),
            train_size: wire.train_size.unwrap_or_default(),
            test_size: wire.test_size.unwrap_or_default(),
            confusion_matrix,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct ModelInfoWire {
    pub(super) is_trained: Option<bool>,
    version: Option<String>,
    training_date: Option<String>,
    categorical_features: Option<Vec<String>>,
    numerical_features: Option<Vec<String>>,
    last_metrics: Option<MetricsWire>,
}

impl From<ModelInfoWire> for ModelInfo {
    fn from(wire: ModelInfoWire) -> Self {
        Self {
            is_trained: wire.is_trained.unwrap_or(false),
            version: wire
                .version
                .unwrap_or_else(|| UNTRAINED_VERSION.to_string()),
            training_date: wire.training_date,
            categorical_features: wire
                .categorical_features
                .unwrap_or_default()
                .into_iter()
                .collect(),
            numerical_features: wire
                .numerical_features
                .unwrap_or_default()
                .into_iter()
                .collect(),
            last_metrics: wire.last_metrics.map(MetricsSnapshot::from),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct TrainResponseWire {
    version: Option<String>,
    training_date: Option<String>,
    metrics: Option<MetricsWire>,
    warnings: Option<Vec<String>>,
}

impl From<TrainResponseWire> for TrainingResult {
    fn from(wire: TrainResponseWire) -> Self {
        Self {
            version: wire
                .version
                .unwrap_or_else(|| UNTRAINED_VERSION.to_string()),
            training_date: wire.training_date.unwrap_or_default(),
            metrics: wire.metrics.map(MetricsSnapshot::from).unwrap_or_default(),
            warnings: wire.warnings.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct PredictResponseWire {
    probability: Option<f64>,
    probability_percent: Option<f64>,
    prediction: Option<String>,
    risk_level: Option<String>,
    risk_color: Option<String>,
}

impl From<PredictResponseWire> for PredictionResponse {
    fn from(wire: PredictResponseWire) -> Self {
        if wire.probability.is_none() {
            tracing::warn!("Prediction response has no probability; using 0");
        }
        Self {
            probability: wire.probability.unwrap_or_default(),
            probability_percent: wire.probability_percent,
            prediction: wire.prediction,
            risk_level: wire.risk_level,
            risk_color: wire.risk_color,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct FeatureEntryWire {
    feature: Option<String>,
    importance: Option<f64>,
}

/// Either a bare list or the `{"features": [...], "total_features": n}` wrapper.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum FeatureImportanceWire {
    List(Vec<FeatureEntryWire>),
    Wrapped {
        #[serde(default)]
        features: Option<Vec<FeatureEntryWire>>,
    },
}

impl Default for FeatureImportanceWire {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl From<FeatureImportanceWire> for Vec<FeatureImportance> {
    fn from(wire: FeatureImportanceWire) -> Self {
        let entries = match wire {
            FeatureImportanceWire::List(entries) => entries,
            FeatureImportanceWire::Wrapped { features } => features.unwrap_or_default(),
        };
        entries
            .into_iter()
            .map(|entry| {
                let feature = entry.feature.unwrap_or_default();
                let importance = entry.importance.unwrap_or_default();
                if importance < 0.0 {
                    tracing::warn!("Feature `{feature}` has negative importance {importance}");
                }
                FeatureImportance {
                    feature,
                    importance,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_info_missing_fields_default() {
        let wire: ModelInfoWire = decode("/api/model/info", r#"{"message": "not trained"}"#).unwrap();
        let info = ModelInfo::from(wire);
        assert!(!info.is_trained);
        assert_eq!(info.version, "0.0.0");
        assert!(info.categorical_features.is_empty());
        assert!(info.training_date.is_none());
    }

    #[test]
    fn model_info_nulls_default() {
        let body = r#"{"is_trained": true, "version": "1.0.2", "training_date": null,
            "categorical_features": null, "numerical_features": ["cargo_weight_kg"],
            "last_metrics": {"accuracy": 0.8, "auc": 0.9, "confusion_matrix": [[5, 1], [2, 8]]}}"#;
        let info = ModelInfo::from(decode::<ModelInfoWire>("/api/model/info", body).unwrap());
        assert!(info.is_trained);
        assert_eq!(info.version, "1.0.2");
        assert!(info.numerical_features.contains("cargo_weight_kg"));
        let metrics = info.last_metrics.unwrap();
        assert_eq!(metrics.confusion_matrix, Some(ConfusionMatrix([[5, 1], [2, 8]])));
        assert_eq!(metrics.train_size, 0);
    }

    #[test]
    fn malformed_confusion_matrix_is_dropped() {
        let body = r#"{"accuracy": 0.8, "confusion_matrix": [[1.5, "x"]]}"#;
        let metrics = MetricsSnapshot::from(decode::<MetricsWire>("/api/metrics", body).unwrap());
        assert_eq!(metrics.accuracy, 0.8);
        assert!(metrics.confusion_matrix.is_none());
    }

    #[test]
    fn train_response_without_warnings() {
        let body = r#"{"version": "1.0.1", "training_date": "2024-05-01 10:00:00",
            "metrics": {"accuracy": 0.87, "auc": 0.91, "train_size": 64, "test_size": 16}}"#;
        let result = TrainingResult::from(decode::<TrainResponseWire>("/api/retrain", body).unwrap());
        assert_eq!(result.version, "1.0.1");
        assert_eq!(result.metrics.test_size, 16);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn non_json_body_is_invalid_response() {
        let err = decode::<TrainResponseWire>("/api/train", "<html>oops</html>").unwrap_err();
        assert!(matches!(err, DashboardError::InvalidResponse { .. }));
    }

    #[test]
    fn empty_body_decodes_to_defaults() {
        let health = HealthStatus::from(decode::<HealthWire>("/api/health", "").unwrap());
        assert_eq!(health.status, "unknown");
        assert!(!health.model_loaded);
    }

    #[test]
    fn feature_importance_accepts_both_shapes() {
        let list = r#"[{"feature": "rain_forecast_mm", "importance": 0.4},
                       {"feature": "cargo_weight_kg", "importance": 0.1}]"#;
        let wrapped = r#"{"features": [{"feature": "rain_forecast_mm", "importance": 0.4},
                       {"feature": "cargo_weight_kg", "importance": 0.1}], "total_features": 2}"#;
        let from_list: Vec<FeatureImportance> =
            decode::<FeatureImportanceWire>("/api/features/importance", list)
                .unwrap()
                .into();
        let from_wrapped: Vec<FeatureImportance> =
            decode::<FeatureImportanceWire>("/api/features/importance", wrapped)
                .unwrap()
                .into();
        assert_eq!(from_list, from_wrapped);
        assert_eq!(from_list[0].feature, "rain_forecast_mm");
    }

    #[test]
    fn error_detail_handles_string_list_and_message() {
        assert_eq!(
            error_detail(r#"{"detail": "Modelo precisa ser treinado primeiro"}"#).as_deref(),
            Some("Modelo precisa ser treinado primeiro")
        );
        let structured = error_detail(r#"{"detail": [{"loc": ["body"], "msg": "field required"}]}"#)
            .unwrap();
        assert!(structured.contains("field required"));
        assert_eq!(
            error_detail(r#"{"message": "Modelo ainda não foi treinado"}"#).as_deref(),
            Some("Modelo ainda não foi treinado")
        );
        assert_eq!(error_detail("Internal Server Error"), None);
        assert_eq!(error_detail(""), None);
    }
}
