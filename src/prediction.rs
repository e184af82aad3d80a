//! Shipment prediction requests and the locally-derived prediction result.

use serde::{Deserialize, Serialize};

use crate::error::{DashboardError, ValidationError};
use crate::risk::{self, RiskColor, RiskLevel};

/// Forecast traffic on the route.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficLevel {
    Baixo,
    Medio,
    Alto,
}

impl TrafficLevel {
    pub const ALL: [Self; 3] = [Self::Baixo, Self::Medio, Self::Alto];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Baixo => "baixo",
            Self::Medio => "medio",
            Self::Alto => "alto",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

/// Vehicle categories known to the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleType {
    #[serde(rename = "Caminhão Baú")]
    CaminhaoBau,
    #[serde(rename = "Caminhão Truck")]
    CaminhaoTruck,
    #[serde(rename = "Caminhão Bitrem")]
    CaminhaoBitrem,
    #[serde(rename = "Vanqua")]
    Vanqua,
}

impl VehicleType {
    pub const ALL: [Self; 4] = [
        Self::CaminhaoBau,
        Self::CaminhaoTruck,
        Self::CaminhaoBitrem,
        Self::Vanqua,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CaminhaoBau => "Caminhão Baú",
            Self::CaminhaoTruck => "Caminhão Truck",
            Self::CaminhaoBitrem => "Caminhão Bitrem",
            Self::Vanqua => "Vanqua",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|vehicle| vehicle.as_str().eq_ignore_ascii_case(value))
    }
}

/// Loosely-typed form input; every field may be missing.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PredictionInput {
    pub route_variant_id: Option<String>,
    pub planned_departure_hour: Option<f64>,
    pub traffic_level_forecast: Option<String>,
    pub rain_forecast_mm: Option<f64>,
    pub cargo_weight_kg: Option<f64>,
    pub vehicle_type: Option<String>,
    pub historical_avg_route_time_min: Option<f64>,
    pub historical_delay_rate_route: Option<f64>,
    pub distance_km: Option<f64>,
}

/// A fully validated prediction request, ready to send.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PredictionRequest {
    route_variant_id: String,
    planned_departure_hour: u8,
    traffic_level_forecast: TrafficLevel,
    rain_forecast_mm: f64,
    cargo_weight_kg: f64,
    vehicle_type: VehicleType,
    historical_avg_route_time_min: f64,
    historical_delay_rate_route: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    distance_km: Option<f64>,
}

impl PredictionRequest {
    pub fn route_variant_id(&self) -> &str {
        &self.route_variant_id
    }

    pub fn planned_departure_hour(&self) -> u8 {
        self.planned_departure_hour
    }

    pub fn traffic_level_forecast(&self) -> TrafficLevel {
        self.traffic_level_forecast
    }

    pub fn vehicle_type(&self) -> VehicleType {
        self.vehicle_type
    }
}

impl TryFrom<PredictionInput> for PredictionRequest {
    type Error = ValidationError;

    fn try_from(input: PredictionInput) -> Result<Self, Self::Error> {
        let route_variant_id = input
            .route_variant_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ValidationError::field("route_variant_id", "is required"))?;
        let hour = required("planned_departure_hour", input.planned_departure_hour)?;
        if hour.fract() != 0.0 || !(0.0..=23.0).contains(&hour) {
            return Err(ValidationError::field(
                "planned_departure_hour",
                format!("must be a whole hour between 0 and 23, got {hour}"),
            ));
        }
        let traffic = input
            .traffic_level_forecast
            .ok_or_else(|| ValidationError::field("traffic_level_forecast", "is required"))?;
        let traffic_level_forecast = TrafficLevel::parse(&traffic).ok_or_else(|| {
            ValidationError::field(
                "traffic_level_forecast",
                format!("must be one of baixo, medio, alto; got `{traffic}`"),
            )
        })?;
        let vehicle = input
            .vehicle_type
            .ok_or_else(|| ValidationError::field("vehicle_type", "is required"))?;
        let vehicle_type = VehicleType::parse(&vehicle).ok_or_else(|| {
            ValidationError::field("vehicle_type", format!("unknown vehicle type `{vehicle}`"))
        })?;
        let delay_rate = required("historical_delay_rate_route", input.historical_delay_rate_route)?;
        if !(0.0..=1.0).contains(&delay_rate) {
            return Err(ValidationError::field(
                "historical_delay_rate_route",
                format!("must be between 0 and 1, got {delay_rate}"),
            ));
        }
        let distance_km = input
            .distance_km
            .map(|value| non_negative("distance_km", value))
            .transpose()?;

        Ok(Self {
            route_variant_id,
            planned_departure_hour: hour as u8,
            traffic_level_forecast,
            rain_forecast_mm: non_negative(
                "rain_forecast_mm",
                required("rain_forecast_mm", input.rain_forecast_mm)?,
            )?,
            cargo_weight_kg: non_negative(
                "cargo_weight_kg",
                required("cargo_weight_kg", input.cargo_weight_kg)?,
            )?,
            vehicle_type,
            historical_avg_route_time_min: non_negative(
                "historical_avg_route_time_min",
                required(
                    "historical_avg_route_time_min",
                    input.historical_avg_route_time_min,
                )?,
            )?,
            historical_delay_rate_route: delay_rate,
            distance_km,
        })
    }
}

fn required(field: &'static str, value: Option<f64>) -> Result<f64, ValidationError> {
    let value = value.ok_or_else(|| ValidationError::field(field, "is required"))?;
    if !value.is_finite() {
        return Err(ValidationError::field(field, "must be a finite number"));
    }
    Ok(value)
}

fn non_negative(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::field(
            field,
            format!("must be zero or greater, got {value}"),
        ));
    }
    Ok(value)
}

/// The service's binary decision for a shipment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayLabel {
    #[default]
    OnTime,
    Delayed,
}

impl DelayLabel {
    pub fn from_wire(value: &str) -> Option<Self> {
        match value.trim() {
            "atrasado" | "delayed" => Some(Self::Delayed),
            "em_tempo" | "on_time" => Some(Self::OnTime),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OnTime => "on_time",
            Self::Delayed => "delayed",
        }
    }
}

/// Prediction payload as returned by the service, with wire defaults applied.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PredictionResponse {
    pub probability: f64,
    pub probability_percent: Option<f64>,
    pub prediction: Option<String>,
    pub risk_level: Option<String>,
    pub risk_color: Option<String>,
}

/// What the operator sees for one shipment.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PredictionResult {
    pub probability: f64,
    pub probability_percent: u8,
    pub predicted_label: DelayLabel,
    pub risk_level: RiskLevel,
    pub risk_color: RiskColor,
}

impl PredictionResult {
    /// Derive the displayed result. Band and color always come from the
    /// local classifier; the server's own band is only cross-checked.
    pub fn from_response(response: &PredictionResponse) -> Result<Self, DashboardError> {
        let invalid = |reason: String| DashboardError::InvalidResponse {
            endpoint: "/api/predict".to_string(),
            reason,
        };
        let assessment = risk::classify(response.probability).map_err(|err| invalid(err.to_string()))?;
        let probability_percent =
            risk::probability_percent(response.probability).map_err(|err| invalid(err.to_string()))?;
        let predicted_label = match response.prediction.as_deref() {
            Some(label) => DelayLabel::from_wire(label).ok_or_else(|| {
                invalid(format!("unknown prediction label `{label}`"))
            })?,
            None => {
                tracing::warn!("Prediction response has no label; assuming on time");
                DelayLabel::default()
            }
        };
        if let Some(server_level) = response.risk_level.as_deref().and_then(RiskLevel::from_wire)
            && server_level != assessment.level
        {
            tracing::warn!(
                "Service reported risk {:?} for p={}, local band is {:?}",
                server_level,
                response.probability,
                assessment.level
            );
        }
        if let Some(server_color) = response.risk_color.as_deref().and_then(RiskColor::from_wire)
            && server_color != assessment.color
        {
            tracing::warn!(
                "Service reported color {} for p={}, local color is {}",
                server_color.as_str(),
                response.probability,
                assessment.color.as_str()
            );
        }
        Ok(Self {
            probability: response.probability,
            probability_percent,
            predicted_label,
            risk_level: assessment.level,
            risk_color: assessment.color,
        })
    }
}
