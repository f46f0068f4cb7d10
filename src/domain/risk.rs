use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString};

use super::GeoPoint;

/// Uniform multiplier applied to every risk computation
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskSensitivity(f64);

impl RiskSensitivity {
    pub const MIN: f64 = 0.7;
    pub const MAX: f64 = 1.3;
    pub const DEFAULT: f64 = 1.0;

    /// Clamps into `[MIN, MAX]`; non-finite input falls back to the default
    pub fn new(value: f64) -> Self {
        if !value.is_finite() {
            return Self(Self::DEFAULT);
        }
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for RiskSensitivity {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl fmt::Display for RiskSensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}x", self.0)
    }
}

/// Facility category understood by the risk service
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FacilityType {
    Hospital,
    Ems,
    Emergency,
    School,
    Shelter,
    /// Area-wide score rather than a specific site
    Community,
}

/// A tracked emergency-area facility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyArea {
    pub name: String,
    pub facility_type: FacilityType,
    pub lat: f64,
    pub lon: f64,
}

impl EmergencyArea {
    pub fn new(name: impl Into<String>, facility_type: FacilityType, lat: f64, lon: f64) -> Self {
        Self {
            name: name.into(),
            facility_type,
            lat,
            lon,
        }
    }

    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }

    /// The four San Francisco sites scored when nothing else is configured
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("UCSF Medical Center", FacilityType::Hospital, 37.7631, -122.4586),
            Self::new("SF EMS Station 1", FacilityType::Ems, 37.7946, -122.3999),
            Self::new("Lowell High School", FacilityType::School, 37.7325, -122.4856),
            Self::new("SOMA Shelter", FacilityType::Shelter, 37.7786, -122.4062),
        ]
    }
}

/// Blackout risk and its components as returned by the risk service
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskBreakdown {
    pub overall: f64,
    pub weather: f64,
    pub outage: f64,
    pub anomaly: f64,
    pub ml: f64,
    pub svi: f64,
}

impl RiskBreakdown {
    /// Summary line for a facility check
    pub fn facility_summary(&self) -> String {
        format!(
            "Overall risk {} · Weather {} · Outage {} · Anomaly {} · ML {} · SVI {}",
            percent(self.overall),
            percent(self.weather),
            percent(self.outage),
            percent(self.anomaly),
            percent(self.ml),
            percent(self.svi),
        )
    }

    /// Summary line for the area around the focal point
    pub fn area_summary(&self) -> String {
        format!(
            "Risk {} · Weather {} · Outage {} · ML {} · SVI {}",
            percent(self.overall),
            percent(self.weather),
            percent(self.outage),
            percent(self.ml),
            percent(self.svi),
        )
    }

    pub fn band(&self) -> RiskBand {
        RiskBand::classify(self.overall)
    }
}

/// Legend bucket for a risk value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Minimal,
    Low,
    Moderate,
    High,
    Severe,
}

impl RiskBand {
    pub fn classify(risk: f64) -> Self {
        match risk {
            r if r < 0.15 => Self::Minimal,
            r if r < 0.30 => Self::Low,
            r if r < 0.50 => Self::Moderate,
            r if r < 0.70 => Self::High,
            _ => Self::Severe,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Minimal => "0-15%",
            Self::Low => "15-30%",
            Self::Moderate => "30-50%",
            Self::High => "50-70%",
            Self::Severe => "70%+",
        }
    }
}

/// Risk outcome for one facility in a batch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "risk", rename_all = "snake_case")]
pub enum RowRisk {
    Scored(f64),
    Unavailable,
}

impl RowRisk {
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Scored(v) => Some(*v),
            Self::Unavailable => None,
        }
    }
}

impl fmt::Display for RowRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scored(v) => f.write_str(&percent(*v)),
            Self::Unavailable => f.write_str("unavailable"),
        }
    }
}

/// One row of an emergency-area batch score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityRow {
    pub name: String,
    pub facility_type: FacilityType,
    pub risk: RowRisk,
}

/// Percentage with one decimal, the way every summary line renders risk
pub fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}
