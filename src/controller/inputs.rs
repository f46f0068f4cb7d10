use serde::Serialize;
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::domain::{FocalPoint, RiskSensitivity};

/// Values that location- and sensitivity-scoped queries depend on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskInputs {
    pub focal: FocalPoint,
    pub sensitivity: RiskSensitivity,
    pub anomaly_density: f64,
}

impl RiskInputs {
    pub fn new(focal: FocalPoint, sensitivity: RiskSensitivity) -> Self {
        Self {
            focal,
            sensitivity,
            anomaly_density: 0.0,
        }
    }
}

impl Default for RiskInputs {
    fn default() -> Self {
        Self::new(FocalPoint::default(), RiskSensitivity::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dependency {
    FocalPoint,
    Sensitivity,
    AnomalyDensity,
}

/// Which inputs differ between two observations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub focal_point: bool,
    pub sensitivity: bool,
    pub anomaly_density: bool,
}

impl ChangeSet {
    /// Only the coordinate counts; relabelling the same point is not a change
    pub fn between(old: &RiskInputs, new: &RiskInputs) -> Self {
        Self {
            focal_point: old.focal.point != new.focal.point,
            sensitivity: old.sensitivity != new.sensitivity,
            anomaly_density: old.anomaly_density != new.anomaly_density,
        }
    }

    pub fn only(dependency: Dependency) -> Self {
        let mut changes = Self::default();
        match dependency {
            Dependency::FocalPoint => changes.focal_point = true,
            Dependency::Sensitivity => changes.sensitivity = true,
            Dependency::AnomalyDensity => changes.anomaly_density = true,
        }
        changes
    }

    pub fn contains(&self, dependency: Dependency) -> bool {
        match dependency {
            Dependency::FocalPoint => self.focal_point,
            Dependency::Sensitivity => self.sensitivity,
            Dependency::AnomalyDensity => self.anomaly_density,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.focal_point || self.sensitivity || self.anomaly_density)
    }
}

/// Every outbound query the scheduler issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QueryKind {
    FacilityRisk,
    AreaRisk,
    WeatherAlerts,
    EmergencyAreas,
    CountyChoropleth,
    ModelMetrics,
    ModelEvaluation,
    AnomalyScoring,
    Geocode,
    CountyGuidance,
    TestAlert,
}

impl QueryKind {
    /// Inputs whose change re-runs this query. Empty for queries that only
    /// run on explicit request.
    pub fn dependencies(&self) -> &'static [Dependency] {
        match self {
            QueryKind::FacilityRisk | QueryKind::AreaRisk => &[
                Dependency::FocalPoint,
                Dependency::Sensitivity,
                Dependency::AnomalyDensity,
            ],
            QueryKind::WeatherAlerts => &[Dependency::FocalPoint, Dependency::Sensitivity],
            QueryKind::EmergencyAreas => &[Dependency::Sensitivity, Dependency::AnomalyDensity],
            _ => &[],
        }
    }

    pub fn affected_by(changes: ChangeSet) -> Vec<QueryKind> {
        QueryKind::iter()
            .filter(|kind| kind.dependencies().iter().any(|d| changes.contains(*d)))
            .collect()
    }
}
