use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

use super::wire::{
    ChoroplethResponse, CountyChatContext, CountyChatRequest, CountyChatResponse, ErrorBody,
    EvaluationResponse, GeocodeResponse, MetricsResponse, RiskResponse, TestAlertRequest,
    TestAlertResponse,
};
use super::{FetchError, GeocodeMatch, InverterUpload, RiskApi, RiskQuery};
use crate::config::ApiConfig;
use crate::domain::{
    AlertSet, AnomalyReport, CountyRisk, GeoBoundaries, GeoPoint, ModelEvaluation, ModelMetrics,
    RiskBreakdown,
};

/// reqwest-backed client for the risk service and the boundary dataset
#[derive(Clone)]
pub struct HttpRiskClient {
    base_url: String,
    boundaries_url: String,
    client: reqwest::Client,
}

impl HttpRiskClient {
    pub fn new(base_url: String, boundaries_url: String, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("blackout-risk/0.1"));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            boundaries_url,
            client,
        })
    }

    pub fn from_config(cfg: &ApiConfig) -> Result<Self> {
        Self::new(
            cfg.base_url.clone(),
            cfg.boundaries_url.clone(),
            Duration::from_secs(cfg.http_timeout_seconds),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn fetch_choropleth_rows(
        &self,
        state_filter: Option<&str>,
    ) -> Result<Vec<CountyRisk>, FetchError> {
        let mut request = self.client.get(self.url("blackout/choropleth"));
        if let Some(state) = state_filter.filter(|s| !s.is_empty()) {
            request = request.query(&[("state", state)]);
        }
        let payload: ChoroplethResponse = read_json(request.send().await?).await?;
        Ok(payload.into_counties())
    }

    async fn fetch_boundaries(&self) -> Result<GeoBoundaries, FetchError> {
        let resp = self.client.get(&self.boundaries_url).send().await?;
        read_json(resp).await
    }
}

/// Decodes a success body, or turns a non-success status into
/// [`FetchError::RequestFailed`] carrying the service's `error` text.
async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, FetchError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.error)
            .filter(|m| !m.is_empty());
        debug!(%status, ?message, "risk service returned error status");
        return Err(FetchError::RequestFailed {
            status: status.as_u16(),
            message,
        });
    }
    serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))
}

#[async_trait]
impl RiskApi for HttpRiskClient {
    async fn geocode(&self, query: String) -> Result<GeocodeMatch, FetchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(FetchError::NotFound);
        }
        let resp = self
            .client
            .get(self.url("geocode"))
            .query(&[("query", query)])
            .send()
            .await?;
        let payload: GeocodeResponse = read_json(resp).await?;
        let first = payload.results.into_iter().next().ok_or(FetchError::NotFound)?;
        let (Some(lat), Some(lon)) = (first.lat.as_f64(), first.lon.as_f64()) else {
            return Err(FetchError::Decode("geocode result without coordinates".into()));
        };
        Ok(GeocodeMatch {
            point: GeoPoint::new(lat, lon),
            label: first.display_name.unwrap_or_else(|| query.to_string()),
        })
    }

    async fn fetch_county_choropleth(
        &self,
        state_filter: Option<String>,
    ) -> Result<(Vec<CountyRisk>, GeoBoundaries), FetchError> {
        let (rows, boundaries) = tokio::join!(
            self.fetch_choropleth_rows(state_filter.as_deref()),
            self.fetch_boundaries()
        );
        let rows = rows.map_err(|e| FetchError::PartialFailure {
            part: "county risk",
            source: Box::new(e),
        })?;
        let boundaries = boundaries.map_err(|e| FetchError::PartialFailure {
            part: "boundary",
            source: Box::new(e),
        })?;
        info!(
            counties = rows.len(),
            features = boundaries.feature_count(),
            "fetched county choropleth"
        );
        Ok((rows, boundaries))
    }

    async fn fetch_facility_risk(&self, query: RiskQuery) -> Result<RiskBreakdown, FetchError> {
        let resp = self
            .client
            .get(self.url("blackout/risk"))
            .query(&[
                ("lat", query.point.latitude.to_string()),
                ("lon", query.point.longitude.to_string()),
                ("facilityType", query.facility_type.to_string()),
                ("anomalyDensity", query.anomaly_density.to_string()),
                ("sensitivity", query.sensitivity.value().to_string()),
            ])
            .send()
            .await?;
        let payload: RiskResponse = read_json(resp).await?;
        Ok(payload.into())
    }

    async fn fetch_weather_alerts(&self, point: GeoPoint) -> Result<AlertSet, FetchError> {
        let resp = self
            .client
            .get(self.url("weather/alerts"))
            .query(&[
                ("lat", point.latitude.to_string()),
                ("lon", point.longitude.to_string()),
            ])
            .send()
            .await?;
        read_json(resp).await
    }

    async fn score_anomaly_file(
        &self,
        upload: InverterUpload,
    ) -> Result<AnomalyReport, FetchError> {
        let part = Part::bytes(upload.bytes).file_name(upload.file_name);
        let form = Form::new().part("file", part);
        let resp = self
            .client
            .post(self.url("anomalies/score"))
            .multipart(form)
            .send()
            .await?;
        read_json(resp).await
    }

    async fn score_sample_anomalies(&self) -> Result<AnomalyReport, FetchError> {
        let resp = self.client.post(self.url("anomalies/sample")).send().await?;
        read_json(resp).await
    }

    async fn fetch_model_metrics(&self) -> Result<ModelMetrics, FetchError> {
        let resp = self.client.get(self.url("model/metrics")).send().await?;
        let payload: MetricsResponse = read_json(resp).await?;
        payload
            .metrics
            .ok_or_else(|| FetchError::Decode("response has no metrics".into()))
    }

    async fn fetch_model_evaluation(&self) -> Result<ModelEvaluation, FetchError> {
        let resp = self.client.get(self.url("model/evaluation")).send().await?;
        let payload: EvaluationResponse = read_json(resp).await?;
        payload
            .evaluation
            .ok_or_else(|| FetchError::Decode("response has no evaluation".into()))
    }

    async fn send_test_alert(&self, message: String) -> Result<String, FetchError> {
        let resp = self
            .client
            .post(self.url("alerts/test"))
            .json(&TestAlertRequest { message: &message })
            .send()
            .await?;
        let payload: TestAlertResponse = read_json(resp).await?;
        Ok(payload
            .details
            .and_then(|d| d.status)
            .unwrap_or_else(|| "queued".to_string()))
    }

    async fn request_county_guidance(
        &self,
        county: CountyRisk,
        prompt: Option<String>,
    ) -> Result<String, FetchError> {
        let body = CountyChatRequest {
            county: CountyChatContext {
                fips: county.fips.as_str(),
                county: county.county.as_deref(),
                state: county.state(),
                risk: county.risk,
                prompt: prompt.as_deref(),
            },
        };
        let resp = self
            .client
            .post(self.url("chat/county"))
            .json(&body)
            .send()
            .await?;
        let payload: CountyChatResponse = read_json(resp).await?;
        Ok(payload
            .response
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| "No response.".to_string()))
    }
}
