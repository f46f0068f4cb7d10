//! In-memory risk service for orchestration tests.
//!
//! Every call is recorded and resolves after a short simulated latency, so
//! tests run under paused time can reason about ordering.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::sleep;

use crate::client::{FetchError, GeocodeMatch, InverterUpload, RiskApi, RiskQuery};
use crate::domain::{
    AlertSet, AnomalyReport, CountyRisk, FacilityType, Fips, GeoBoundaries, GeoPoint,
    ModelEvaluation, ModelMetrics, RiskBreakdown, RiskSensitivity,
};

const LATENCY: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Geocode(String),
    Choropleth(Option<String>),
    Risk(RiskQuery),
    Alerts(GeoPoint),
    AnomalyFile(String),
    AnomalySample,
    Metrics,
    Evaluation,
    TestAlert(String),
    Guidance(Fips, Option<String>),
}

#[derive(Default)]
pub(crate) struct FakeRiskApi {
    calls: Mutex<Vec<Call>>,
    risk_delays: Mutex<VecDeque<Duration>>,
    failing_points: Mutex<Vec<GeoPoint>>,
    geocode: Mutex<Option<GeocodeMatch>>,
    counties: Mutex<Vec<CountyRisk>>,
    anomaly_density: Mutex<f64>,
    boundaries_fail: AtomicBool,
    anomalies_fail: AtomicBool,
}

impl FakeRiskApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Overall risk the fake reports for a query with these inputs
    pub(crate) fn overall_for(sensitivity: RiskSensitivity, anomaly_density: f64) -> f64 {
        0.1 * sensitivity.value() + anomaly_density
    }

    /// Per-call latencies for risk queries, consumed in call order
    pub(crate) fn with_risk_delays(self, delays: impl IntoIterator<Item = Duration>) -> Self {
        self.risk_delays.lock().extend(delays);
        self
    }

    pub(crate) fn failing_at(self, point: GeoPoint) -> Self {
        self.failing_points.lock().push(point);
        self
    }

    pub(crate) fn with_geocode(self, found: GeocodeMatch) -> Self {
        *self.geocode.lock() = Some(found);
        self
    }

    pub(crate) fn with_counties(self, counties: Vec<CountyRisk>) -> Self {
        *self.counties.lock() = counties;
        self
    }

    pub(crate) fn with_anomaly_density(self, density: f64) -> Self {
        *self.anomaly_density.lock() = density;
        self
    }

    pub(crate) fn fail_boundaries(&self, fail: bool) {
        self.boundaries_fail.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_anomalies(&self, fail: bool) {
        self.anomalies_fail.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub(crate) fn clear(&self) {
        self.calls.lock().clear();
    }

    pub(crate) fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| matches(c)).count()
    }

    pub(crate) fn risk_calls_at(&self, point: GeoPoint, facility_type: FacilityType) -> Vec<RiskQuery> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Risk(q) if q.point == point && q.facility_type == facility_type => Some(*q),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn report(&self, source: Option<String>) -> Result<AnomalyReport, FetchError> {
        if self.anomalies_fail.load(Ordering::SeqCst) {
            return Err(FetchError::RequestFailed {
                status: 500,
                message: None,
            });
        }
        let density = *self.anomaly_density.lock();
        Ok(AnomalyReport {
            rows: 100,
            anomaly_count: (density * 100.0).round() as u64,
            anomaly_density: density,
            sample_anomalies: Vec::new(),
            source,
        })
    }
}

#[async_trait]
impl RiskApi for FakeRiskApi {
    async fn geocode(&self, query: String) -> Result<GeocodeMatch, FetchError> {
        self.record(Call::Geocode(query));
        sleep(LATENCY).await;
        self.geocode.lock().clone().ok_or(FetchError::NotFound)
    }

    async fn fetch_county_choropleth(
        &self,
        state_filter: Option<String>,
    ) -> Result<(Vec<CountyRisk>, GeoBoundaries), FetchError> {
        self.record(Call::Choropleth(state_filter));
        sleep(LATENCY).await;
        if self.boundaries_fail.load(Ordering::SeqCst) {
            return Err(FetchError::PartialFailure {
                part: "boundary",
                source: Box::new(FetchError::RequestFailed {
                    status: 503,
                    message: None,
                }),
            });
        }
        Ok((self.counties.lock().clone(), GeoBoundaries::default()))
    }

    async fn fetch_facility_risk(&self, query: RiskQuery) -> Result<RiskBreakdown, FetchError> {
        self.record(Call::Risk(query));
        let delay = self.risk_delays.lock().pop_front().unwrap_or(LATENCY);
        sleep(delay).await;
        if self.failing_points.lock().contains(&query.point) {
            return Err(FetchError::RequestFailed {
                status: 502,
                message: Some("upstream unavailable".to_string()),
            });
        }
        let overall = Self::overall_for(query.sensitivity, query.anomaly_density);
        Ok(RiskBreakdown {
            overall,
            weather: 0.2,
            outage: 0.1,
            anomaly: query.anomaly_density,
            ml: 0.3,
            svi: 0.5,
        })
    }

    async fn fetch_weather_alerts(&self, point: GeoPoint) -> Result<AlertSet, FetchError> {
        self.record(Call::Alerts(point));
        sleep(LATENCY).await;
        Ok(AlertSet::default())
    }

    async fn score_anomaly_file(&self, upload: InverterUpload) -> Result<AnomalyReport, FetchError> {
        self.record(Call::AnomalyFile(upload.file_name));
        sleep(LATENCY).await;
        self.report(None)
    }

    async fn score_sample_anomalies(&self) -> Result<AnomalyReport, FetchError> {
        self.record(Call::AnomalySample);
        sleep(LATENCY).await;
        self.report(Some("sample_inverter.csv".to_string()))
    }

    async fn fetch_model_metrics(&self) -> Result<ModelMetrics, FetchError> {
        self.record(Call::Metrics);
        sleep(LATENCY).await;
        Ok(ModelMetrics {
            auc: Some(0.91),
            accuracy: Some(0.87),
        })
    }

    async fn fetch_model_evaluation(&self) -> Result<ModelEvaluation, FetchError> {
        self.record(Call::Evaluation);
        sleep(LATENCY).await;
        Ok(ModelEvaluation::default())
    }

    async fn send_test_alert(&self, message: String) -> Result<String, FetchError> {
        self.record(Call::TestAlert(message));
        sleep(LATENCY).await;
        Ok("queued".to_string())
    }

    async fn request_county_guidance(
        &self,
        county: CountyRisk,
        prompt: Option<String>,
    ) -> Result<String, FetchError> {
        let fips = county.fips.clone();
        self.record(Call::Guidance(fips.clone(), prompt));
        sleep(LATENCY).await;
        Ok(format!("Guidance for County {fips}"))
    }
}
