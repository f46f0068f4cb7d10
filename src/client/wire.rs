//! Response and request bodies of the risk service

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{CountyRisk, Fips, ModelEvaluation, ModelMetrics, RiskBreakdown};

/// Values the service sends either as JSON numbers or as strings
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum Loose {
    Number(f64),
    Text(String),
}

impl Loose {
    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Loose::Number(n) => Some(*n),
            Loose::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Integer-valued numbers render without a fraction so `6037.0` reads as `6037`
    pub(crate) fn as_text(&self) -> String {
        match self {
            Loose::Number(n) if n.fract() == 0.0 && *n >= 0.0 => format!("{}", *n as u64),
            Loose::Number(n) => n.to_string(),
            Loose::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeocodeResponse {
    #[serde(default)]
    pub results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeocodeResult {
    pub lat: Loose,
    pub lon: Loose,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChoroplethResponse {
    #[serde(default)]
    pub counties: Vec<RawCounty>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCounty {
    pub fips: Loose,
    pub risk: f64,
    #[serde(default)]
    pub county: Option<String>,
    #[serde(default)]
    pub state_abbr: Option<String>,
    #[serde(default)]
    pub state_name: Option<String>,
}

impl ChoroplethResponse {
    /// Normalizes every fips; rows with unusable ids are dropped
    pub(crate) fn into_counties(self) -> Vec<CountyRisk> {
        self.counties
            .into_iter()
            .filter_map(|row| {
                let raw = row.fips.as_text();
                match Fips::parse(&raw) {
                    Ok(fips) => Some(CountyRisk {
                        fips,
                        risk: row.risk,
                        county: row.county,
                        state_abbr: row.state_abbr,
                        state_name: row.state_name,
                    }),
                    Err(e) => {
                        warn!(fips = %raw, error = %e, "dropping county row");
                        None
                    }
                }
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RiskResponse {
    pub risk: RiskBody,
    #[serde(default)]
    pub svi_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RiskBody {
    pub blackout_risk: f64,
    pub components: RiskComponents,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RiskComponents {
    #[serde(default)]
    pub weather_risk: f64,
    #[serde(default)]
    pub outage_risk: f64,
    #[serde(default)]
    pub anomaly_risk: f64,
    #[serde(default)]
    pub ml_risk: f64,
}

impl From<RiskResponse> for RiskBreakdown {
    fn from(r: RiskResponse) -> Self {
        RiskBreakdown {
            overall: r.risk.blackout_risk,
            weather: r.risk.components.weather_risk,
            outage: r.risk.components.outage_risk,
            anomaly: r.risk.components.anomaly_risk,
            ml: r.risk.components.ml_risk,
            svi: r.svi_score.unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MetricsResponse {
    #[serde(default)]
    pub metrics: Option<ModelMetrics>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EvaluationResponse {
    #[serde(default)]
    pub evaluation: Option<ModelEvaluation>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TestAlertRequest<'a> {
    pub message: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TestAlertResponse {
    #[serde(default)]
    pub details: Option<AlertDetails>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AlertDetails {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CountyChatRequest<'a> {
    pub county: CountyChatContext<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CountyChatContext<'a> {
    pub fips: &'a str,
    pub county: Option<&'a str>,
    pub state: Option<&'a str>,
    pub risk: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CountyChatResponse {
    #[serde(default)]
    pub response: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_fips_are_padded() {
        let payload: ChoroplethResponse = serde_json::from_value(json!({
            "counties": [
                { "fips": 6037, "risk": 0.3, "county": "Los Angeles" },
                { "fips": "1001", "risk": 0.1 },
                { "fips": "not-a-fips", "risk": 0.9 }
            ]
        }))
        .unwrap();

        let counties = payload.into_counties();
        assert_eq!(counties.len(), 2);
        assert_eq!(counties[0].fips.as_str(), "06037");
        assert_eq!(counties[1].fips.as_str(), "01001");
    }

    #[test]
    fn test_risk_response_maps_components() {
        let payload: RiskResponse = serde_json::from_value(json!({
            "risk": {
                "blackout_risk": 0.41,
                "components": {
                    "weather_risk": 0.5,
                    "outage_risk": 0.3,
                    "anomaly_risk": 0.02,
                    "ml_risk": 0.6,
                    "facility_weight": 1.1
                }
            },
            "svi_score": 0.7
        }))
        .unwrap();

        let breakdown = RiskBreakdown::from(payload);
        assert_eq!(breakdown.overall, 0.41);
        assert_eq!(breakdown.anomaly, 0.02);
        assert_eq!(breakdown.svi, 0.7);
    }

    #[test]
    fn test_loose_values() {
        assert_eq!(Loose::Text("37.77".into()).as_f64(), Some(37.77));
        assert_eq!(Loose::Text("north".into()).as_f64(), None);
        assert_eq!(Loose::Number(6037.0).as_text(), "6037");
    }
}
