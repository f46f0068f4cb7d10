use serde::{Deserialize, Serialize};

/// One flagged inverter reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalySample {
    #[serde(rename = "TIME_STAMP")]
    pub timestamp: String,
    #[serde(rename = "Value")]
    pub value: f64,
}

/// Result of scoring an inverter telemetry file or the sample dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub rows: u64,
    pub anomaly_count: u64,
    /// Fraction of readings flagged anomalous, fed into every later risk query
    pub anomaly_density: f64,
    #[serde(default)]
    pub sample_anomalies: Vec<AnomalySample>,
    /// Dataset name, only present for the sample dataset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl AnomalyReport {
    pub fn summary(&self) -> String {
        let stats = format!(
            "{} rows · {} anomalies · density {:.2}%",
            self.rows,
            self.anomaly_count,
            self.anomaly_density * 100.0
        );
        match &self.source {
            Some(source) => format!("Sample {source}: {stats}"),
            None => format!("Analyzed {stats}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_deserializes_service_payload() {
        let report: AnomalyReport = serde_json::from_value(serde_json::json!({
            "rows": 1200,
            "anomaly_count": 60,
            "anomaly_density": 0.05,
            "sample_anomalies": [
                { "TIME_STAMP": "2024-06-01 10:00:00", "Value": 412.5 }
            ]
        }))
        .unwrap();

        assert_eq!(report.rows, 1200);
        assert_eq!(report.sample_anomalies[0].value, 412.5);
        assert_eq!(report.source, None);
        assert_eq!(
            report.summary(),
            "Analyzed 1200 rows · 60 anomalies · density 5.00%"
        );
    }

    #[test]
    fn test_sample_summary_names_source() {
        let report = AnomalyReport {
            rows: 10,
            anomaly_count: 1,
            anomaly_density: 0.1,
            sample_anomalies: Vec::new(),
            source: Some("plant_1.csv".to_string()),
        };
        assert_eq!(
            report.summary(),
            "Sample plant_1.csv: 10 rows · 1 anomalies · density 10.00%"
        );
    }
}
