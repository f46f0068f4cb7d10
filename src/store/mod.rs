//! Merged in-memory risk model read by presentation consumers.
//!
//! Every entity sits in its own [`Slot`]: writes replace the whole value and
//! are generation-tagged, reads hand out an `Arc` snapshot. Mutation is
//! crate-private and driven by the orchestrator.

mod slot;
mod snapshot;
pub mod status;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{
    AlertSet, AnomalyReport, CountyRisk, FacilityRow, GeoRegistry, ModelEvaluation, ModelMetrics,
    RiskBreakdown,
};

pub use slot::{Slot, Ticket};
pub use snapshot::DashboardSnapshot;
pub use status::{Status, SummaryText};
use status::{
    ALERTS_TEXT, ANOMALY_UPLOAD_TEXT, AREA_SUMMARY_TEXT, FACILITY_RISK_TEXT, GUIDANCE_PROMPT,
    GUIDANCE_TEXT, MODEL_METRICS_TEXT, TEST_ALERT_TEXT,
};

/// Result of one emergency-area batch invocation
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmergencyAreaScores {
    /// Exactly one row per configured facility
    pub rows: Vec<FacilityRow>,
    /// Scored facilities only; unavailable rows have no entry
    pub risk_by_facility: HashMap<String, f64>,
    pub scored_at: Option<DateTime<Utc>>,
}

impl EmergencyAreaScores {
    pub fn from_rows(rows: Vec<FacilityRow>, scored_at: DateTime<Utc>) -> Self {
        let risk_by_facility = rows
            .iter()
            .filter_map(|row| row.risk.value().map(|risk| (row.name.clone(), risk)))
            .collect();
        Self {
            rows,
            risk_by_facility,
            scored_at: Some(scored_at),
        }
    }

    pub fn risk_for(&self, facility: &str) -> Option<f64> {
        self.risk_by_facility.get(facility).copied()
    }
}

/// Latest anomaly report plus the outcome of the most recent scoring attempt.
///
/// A failed attempt replaces the summary but keeps the last good report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnomalyState {
    pub report: Option<AnomalyReport>,
    pub last_error: Option<String>,
}

impl AnomalyState {
    pub fn summary(&self) -> String {
        if let Some(err) = &self.last_error {
            return err.clone();
        }
        self.report
            .as_ref()
            .map(AnomalyReport::summary)
            .unwrap_or_else(|| ANOMALY_UPLOAD_TEXT.not_loaded.to_string())
    }
}

#[derive(Default)]
pub struct RiskModelStore {
    pub(crate) geo: Slot<GeoRegistry>,
    pub(crate) emergency_areas: Slot<EmergencyAreaScores>,
    pub(crate) facility_risk: Slot<Status<RiskBreakdown>>,
    pub(crate) area_risk: Slot<Status<RiskBreakdown>>,
    pub(crate) alerts: Slot<Status<AlertSet>>,
    pub(crate) anomaly: Slot<AnomalyState>,
    pub(crate) model_metrics: Slot<Status<ModelMetrics>>,
    pub(crate) model_evaluation: Slot<Option<ModelEvaluation>>,
    pub(crate) selected_county: Slot<Option<CountyRisk>>,
    pub(crate) guidance: Slot<Status<String>>,
    pub(crate) test_alert: Slot<Status<String>>,
}

impl RiskModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn geo_registry(&self) -> Arc<GeoRegistry> {
        self.geo.get()
    }

    pub fn emergency_areas(&self) -> Arc<EmergencyAreaScores> {
        self.emergency_areas.get()
    }

    pub fn facility_risk(&self) -> Arc<Status<RiskBreakdown>> {
        self.facility_risk.get()
    }

    pub fn area_risk(&self) -> Arc<Status<RiskBreakdown>> {
        self.area_risk.get()
    }

    /// Active alerts; absent unless the latest fetch succeeded
    pub fn alerts(&self) -> Option<AlertSet> {
        self.alerts.get().ready().cloned()
    }

    pub fn anomaly(&self) -> Arc<AnomalyState> {
        self.anomaly.get()
    }

    pub fn model_metrics(&self) -> Arc<Status<ModelMetrics>> {
        self.model_metrics.get()
    }

    pub fn model_evaluation(&self) -> Arc<Option<ModelEvaluation>> {
        self.model_evaluation.get()
    }

    pub fn selected_county(&self) -> Option<CountyRisk> {
        (*self.selected_county.get()).clone()
    }

    pub fn facility_risk_summary(&self) -> String {
        self.facility_risk
            .get()
            .summary(&FACILITY_RISK_TEXT, RiskBreakdown::facility_summary)
    }

    pub fn area_summary(&self) -> String {
        self.area_risk
            .get()
            .summary(&AREA_SUMMARY_TEXT, RiskBreakdown::area_summary)
    }

    pub fn alert_summary(&self) -> String {
        self.alerts.get().summary(&ALERTS_TEXT, AlertSet::summary)
    }

    pub fn anomaly_summary(&self) -> String {
        self.anomaly.get().summary()
    }

    pub fn model_metrics_summary(&self) -> String {
        self.model_metrics
            .get()
            .summary(&MODEL_METRICS_TEXT, ModelMetrics::summary)
    }

    pub fn guidance(&self) -> String {
        let guidance = self.guidance.get();
        if matches!(*guidance, Status::NotLoaded) && self.selected_county.get().is_some() {
            return GUIDANCE_PROMPT.to_string();
        }
        guidance.summary(&GUIDANCE_TEXT, |text| text.clone())
    }

    pub fn test_alert_status(&self) -> String {
        self.test_alert
            .get()
            .summary(&TEST_ALERT_TEXT, |status| format!("Sent. Delivery status: {status}"))
    }
}
