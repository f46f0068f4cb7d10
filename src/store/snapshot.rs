use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use super::{EmergencyAreaScores, RiskModelStore};
use crate::controller::inputs::RiskInputs;
use crate::controller::scheduler::TaskStatus;
use crate::domain::{
    AlertSet, AnomalySample, CountyRisk, Fips, ModelEvaluation, RiskBand, RiskBreakdown,
};

/// Everything a presentation consumer renders, captured at one instant.
///
/// Boundary geometry is left out; it is large and only changes on a
/// choropleth reload.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub generated_at: DateTime<Utc>,
    pub inputs: RiskInputs,
    pub polling_enabled: bool,

    pub facility_risk: FieldView<RiskBreakdown>,
    pub area_risk: FieldView<RiskBreakdown>,
    pub alerts: FieldView<AlertSet>,
    pub anomaly_summary: String,
    pub anomaly_samples: Vec<AnomalySample>,
    pub model_metrics: String,
    pub model_evaluation: Option<ModelEvaluation>,

    pub emergency_areas: EmergencyAreaScores,
    pub county_details: HashMap<Fips, CountyRisk>,
    pub boundary_features: usize,
    pub selected_county: Option<CountyRisk>,
    pub guidance: String,
    pub test_alert: String,

    pub tasks: BTreeMap<String, TaskStatus>,
}

/// Summary line plus structured value when loaded
#[derive(Debug, Clone, Serialize)]
pub struct FieldView<T> {
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub band: Option<RiskBand>,
}

impl DashboardSnapshot {
    pub fn capture(
        store: &RiskModelStore,
        inputs: RiskInputs,
        polling_enabled: bool,
        tasks: BTreeMap<String, TaskStatus>,
    ) -> Self {
        let facility = store.facility_risk();
        let area = store.area_risk();
        let registry = store.geo_registry();
        let anomaly = store.anomaly();

        Self {
            generated_at: Utc::now(),
            inputs,
            polling_enabled,
            facility_risk: FieldView {
                summary: store.facility_risk_summary(),
                value: facility.ready().copied(),
                band: facility.ready().map(RiskBreakdown::band),
            },
            area_risk: FieldView {
                summary: store.area_summary(),
                value: area.ready().copied(),
                band: area.ready().map(RiskBreakdown::band),
            },
            alerts: FieldView {
                summary: store.alert_summary(),
                value: store.alerts(),
                band: None,
            },
            anomaly_summary: anomaly.summary(),
            anomaly_samples: anomaly
                .report
                .as_ref()
                .map(|r| r.sample_anomalies.clone())
                .unwrap_or_default(),
            model_metrics: store.model_metrics_summary(),
            model_evaluation: (*store.model_evaluation()).clone(),
            emergency_areas: (*store.emergency_areas()).clone(),
            county_details: registry.county_details.clone(),
            boundary_features: registry.boundaries.feature_count(),
            selected_county: store.selected_county(),
            guidance: store.guidance(),
            test_alert: store.test_alert_status(),
            tasks,
        }
    }
}
