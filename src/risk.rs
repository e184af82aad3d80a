//! Deterministic banding of a delay probability into a risk level and color.
//!
//! Bands are half-open on the raw probability: `[0, 0.30)` low, `[0.30, 0.70)`
//! medium, `[0.70, 1.0]` high. The displayed percentage is `round(p * 100)`.
//! The on-time/delayed label is not decided here; it comes from the service.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const MEDIUM_FROM: f64 = 0.30;
const HIGH_FROM: f64 = 0.70;

/// Risk band for a shipment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Parse the service's band names (`baixo`/`medio`/`alto`) or the English ones.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "baixo" | "low" => Some(Self::Low),
            "medio" | "médio" | "medium" => Some(Self::Medium),
            "alto" | "high" => Some(Self::High),
            _ => None,
        }
    }

    pub fn color(self) -> RiskColor {
        match self {
            Self::Low => RiskColor::Green,
            Self::Medium => RiskColor::Yellow,
            Self::High => RiskColor::Red,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "LOW RISK",
            Self::Medium => "MEDIUM RISK",
            Self::High => "HIGH RISK",
        }
    }
}

/// Display color paired with a [`RiskLevel`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskColor {
    Green,
    Yellow,
    Red,
}

impl RiskColor {
    pub fn from_wire(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "green" => Some(Self::Green),
            "yellow" => Some(Self::Yellow),
            "red" => Some(Self::Red),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
        }
    }
}

/// Outcome of [`classify`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub color: RiskColor,
}

#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum RiskError {
    #[error("Probability {0} is outside [0, 1]")]
    InvalidProbability(f64),
}

/// Map a probability in `[0, 1]` to its risk band. Out-of-range input is an error.
pub fn classify(probability: f64) -> Result<RiskAssessment, RiskError> {
    if !(0.0..=1.0).contains(&probability) {
        return Err(RiskError::InvalidProbability(probability));
    }
    let level = if probability < MEDIUM_FROM {
        RiskLevel::Low
    } else if probability < HIGH_FROM {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    };
    Ok(RiskAssessment {
        level,
        color: level.color(),
    })
}

/// Whole-number percentage shown next to the band.
pub fn probability_percent(probability: f64) -> Result<u8, RiskError> {
    if !(0.0..=1.0).contains(&probability) {
        return Err(RiskError::InvalidProbability(probability));
    }
    Ok((probability * 100.0).round() as u8)
}
