//! Quality figures for the risk service's ML model

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    #[serde(default)]
    pub auc: Option<f64>,
    #[serde(default)]
    pub accuracy: Option<f64>,
}

impl ModelMetrics {
    pub fn summary(&self) -> String {
        format!(
            "Model AUC {} · Accuracy {}",
            metric_percent(self.auc),
            metric_percent(self.accuracy)
        )
    }
}

// A zero metric is treated as missing, matching what the service reports
// for models that were never evaluated.
fn metric_percent(value: Option<f64>) -> String {
    match value {
        Some(v) if v != 0.0 => format!("{:.1}%", v * 100.0),
        _ => "N/A".to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    #[serde(default)]
    pub fpr: Vec<f64>,
    #[serde(default)]
    pub tpr: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    #[serde(default)]
    pub predicted: Vec<f64>,
    #[serde(default)]
    pub observed: Vec<f64>,
}

/// Chart-ready evaluation data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelEvaluation {
    #[serde(default)]
    pub roc_curve: RocCurve,
    #[serde(default)]
    pub calibration: Calibration,
    /// Per-period stability rows, shape owned by the service
    #[serde(default)]
    pub stability: Vec<serde_json::Value>,
}
