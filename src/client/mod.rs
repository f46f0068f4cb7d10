//! Outbound queries against the risk service.
//!
//! [`RiskApi`] is the seam the orchestrator talks through; [`HttpRiskClient`]
//! is the production implementation.

pub mod http;
mod wire;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    AlertSet, AnomalyReport, CountyRisk, FacilityType, GeoBoundaries, GeoPoint, ModelEvaluation,
    ModelMetrics, RiskBreakdown, RiskSensitivity,
};

pub use http::HttpRiskClient;

/// Failure of a single logical query
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no match found")]
    NotFound,

    #[error("{part} fetch failed: {source}")]
    PartialFailure {
        part: &'static str,
        #[source]
        source: Box<FetchError>,
    },

    #[error("request failed with HTTP {status}")]
    RequestFailed {
        status: u16,
        /// Error text supplied by the service, if any
        message: Option<String>,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl FetchError {
    /// Text shown to consumers: the service's own message verbatim when it
    /// sent one, the caller's fallback otherwise.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            FetchError::RequestFailed {
                message: Some(message),
                ..
            } => message.clone(),
            FetchError::PartialFailure { source, .. } => source.user_message(fallback),
            _ => fallback.to_string(),
        }
    }
}

/// Best geocoding match
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeMatch {
    pub point: GeoPoint,
    pub label: String,
}

/// Inputs of a point risk query. The result is a pure function of these.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskQuery {
    pub point: GeoPoint,
    pub facility_type: FacilityType,
    pub anomaly_density: f64,
    pub sensitivity: RiskSensitivity,
}

/// Inverter telemetry file handed over for anomaly scoring
#[derive(Debug, Clone, PartialEq)]
pub struct InverterUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RiskApi: Send + Sync {
    /// Empty queries resolve to [`FetchError::NotFound`] without a request
    async fn geocode(&self, query: String) -> Result<GeocodeMatch, FetchError>;

    /// County risk rows and boundary geometry, both or neither
    async fn fetch_county_choropleth(
        &self,
        state_filter: Option<String>,
    ) -> Result<(Vec<CountyRisk>, GeoBoundaries), FetchError>;

    async fn fetch_facility_risk(&self, query: RiskQuery) -> Result<RiskBreakdown, FetchError>;

    async fn fetch_weather_alerts(&self, point: GeoPoint) -> Result<AlertSet, FetchError>;

    async fn score_anomaly_file(&self, upload: InverterUpload)
        -> Result<AnomalyReport, FetchError>;

    async fn score_sample_anomalies(&self) -> Result<AnomalyReport, FetchError>;

    async fn fetch_model_metrics(&self) -> Result<ModelMetrics, FetchError>;

    async fn fetch_model_evaluation(&self) -> Result<ModelEvaluation, FetchError>;

    /// Returns the delivery status reported by the alerting service
    async fn send_test_alert(&self, message: String) -> Result<String, FetchError>;

    async fn request_county_guidance(
        &self,
        county: CountyRisk,
        prompt: Option<String>,
    ) -> Result<String, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_prefers_service_text() {
        let err = FetchError::RequestFailed {
            status: 400,
            message: Some("Latitude out of range".to_string()),
        };
        assert_eq!(err.user_message("Risk check failed."), "Latitude out of range");

        let err = FetchError::RequestFailed {
            status: 502,
            message: None,
        };
        assert_eq!(err.user_message("Risk check failed."), "Risk check failed.");
        assert_eq!(
            FetchError::Decode("eof".into()).user_message("Could not load alerts."),
            "Could not load alerts."
        );
    }

    #[test]
    fn test_partial_failure_unwraps_inner_message() {
        let err = FetchError::PartialFailure {
            part: "boundary",
            source: Box::new(FetchError::RequestFailed {
                status: 404,
                message: Some("gone".to_string()),
            }),
        };
        assert_eq!(err.user_message("fallback"), "gone");
        assert_eq!(err.to_string(), "boundary fetch failed: request failed with HTTP 404");
    }
}
