use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::error::ApiError;
use crate::{
    client::InverterUpload,
    controller::AppState,
    domain::{
        AnomalyReport, CountyRisk, Fips, FocalPoint, GeoBoundaries, GeoPoint, RiskBand,
        RiskBreakdown, RiskSensitivity,
    },
    store::{DashboardSnapshot, EmergencyAreaScores},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/dashboard", get(get_dashboard))
        .route("/counties/boundaries", get(get_boundaries))
        .route("/counties/refresh", post(refresh_counties))
        .route("/counties/select", post(select_county))
        .route("/counties/:fips", get(get_county))
        .route("/location/search", post(search_location))
        .route("/location", post(set_location))
        .route("/sensitivity", post(set_sensitivity))
        .route("/facility-risk/check", post(check_facility_risk))
        .route("/emergency-areas/score", post(score_emergency_areas))
        .route("/polling", post(set_polling))
        .route("/anomalies/upload", post(upload_anomalies))
        .route("/anomalies/sample", post(sample_anomalies))
        .route("/alerts/test", post(send_test_alert))
        .route("/guidance", post(request_guidance))
        .with_state(state)
}

pub async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

pub async fn get_dashboard(State(st): State<AppState>) -> Json<DashboardSnapshot> {
    Json(st.snapshot())
}

pub async fn get_boundaries(State(st): State<AppState>) -> Json<GeoBoundaries> {
    Json(st.scheduler.store().geo_registry().boundaries.clone())
}

#[derive(Debug, Serialize)]
pub struct CountyResponse {
    #[serde(flatten)]
    pub county: CountyRisk,
    pub display_name: String,
    pub band: RiskBand,
    pub band_label: &'static str,
}

impl From<CountyRisk> for CountyResponse {
    fn from(county: CountyRisk) -> Self {
        let band = RiskBand::classify(county.risk);
        Self {
            display_name: county.display_name(),
            band,
            band_label: band.label(),
            county,
        }
    }
}

pub async fn get_county(
    State(st): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<CountyResponse>, ApiError> {
    let fips = Fips::parse(&raw).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let registry = st.scheduler.store().geo_registry();
    let county = registry
        .county_details
        .get(&fips)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("county {fips}")))?;
    Ok(Json(county.into()))
}

#[derive(Debug, Deserialize)]
pub struct RefreshQuery {
    /// Replaces the state filter when present; an empty value clears it
    pub state: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CountiesRefreshed {
    pub counties: usize,
    pub boundary_features: usize,
    pub state_filter: Option<String>,
}

pub async fn refresh_counties(
    State(st): State<AppState>,
    Query(q): Query<RefreshQuery>,
) -> Json<CountiesRefreshed> {
    if q.state.is_some() {
        st.scheduler.set_state_filter(q.state);
    }
    st.scheduler.refresh_county_risk().await;

    let registry = st.scheduler.store().geo_registry();
    Json(CountiesRefreshed {
        counties: registry.len(),
        boundary_features: registry.boundaries.feature_count(),
        state_filter: st.scheduler.state_filter(),
    })
}

#[derive(Debug, Deserialize)]
pub struct SelectCountyRequest {
    pub fips: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

pub async fn select_county(
    State(st): State<AppState>,
    Json(req): Json<SelectCountyRequest>,
) -> Result<Json<CountyResponse>, ApiError> {
    let at = req
        .latitude
        .zip(req.longitude)
        .map(|(lat, lon)| GeoPoint::new(lat, lon));
    let county = st
        .scheduler
        .select_county(&req.fips, at)
        .ok_or_else(|| ApiError::NotFound(format!("county {}", req.fips)))?;
    Ok(Json(county.into()))
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct LocationResponse {
    pub found: bool,
    pub focal: FocalPoint,
}

pub async fn search_location(
    State(st): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Json<LocationResponse> {
    let found = st.scheduler.search_location(&req.query).await.is_some();
    Json(LocationResponse {
        found,
        focal: st.scheduler.inputs().focal,
    })
}

#[derive(Debug, Deserialize, Validate)]
pub struct LocationRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    pub label: Option<String>,
}

pub async fn set_location(
    State(st): State<AppState>,
    Json(req): Json<LocationRequest>,
) -> Result<Json<LocationResponse>, ApiError> {
    req.validate()?;
    let point = GeoPoint::new(req.latitude, req.longitude);
    let label = req
        .label
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| point.coordinate_label());
    st.scheduler.set_focal_point(point, label);
    Ok(Json(LocationResponse {
        found: true,
        focal: st.scheduler.inputs().focal,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SensitivityRequest {
    pub value: f64,
}

#[derive(Debug, Serialize)]
pub struct SensitivityResponse {
    pub applied: RiskSensitivity,
}

pub async fn set_sensitivity(
    State(st): State<AppState>,
    Json(req): Json<SensitivityRequest>,
) -> Json<SensitivityResponse> {
    Json(SensitivityResponse {
        applied: st.scheduler.set_sensitivity(req.value),
    })
}

#[derive(Debug, Serialize)]
pub struct RiskCheckResponse {
    pub summary: String,
    pub value: Option<RiskBreakdown>,
    pub band: Option<RiskBand>,
}

pub async fn check_facility_risk(State(st): State<AppState>) -> Json<RiskCheckResponse> {
    st.scheduler.check_facility_risk().await;

    let store = st.scheduler.store();
    let status = store.facility_risk();
    Json(RiskCheckResponse {
        summary: store.facility_risk_summary(),
        value: status.ready().copied(),
        band: status.ready().map(RiskBreakdown::band),
    })
}

pub async fn score_emergency_areas(State(st): State<AppState>) -> Json<EmergencyAreaScores> {
    st.scheduler.score_emergency_areas().await;
    Json((*st.scheduler.store().emergency_areas()).clone())
}

#[derive(Debug, Deserialize)]
pub struct PollingRequest {
    /// Omitted toggles the current state
    pub enabled: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct PollingResponse {
    pub enabled: bool,
    pub period_seconds: u64,
}

pub async fn set_polling(
    State(st): State<AppState>,
    Json(req): Json<PollingRequest>,
) -> Json<PollingResponse> {
    match req.enabled {
        Some(true) => {
            st.polling.enable();
        }
        Some(false) => {
            st.polling.disable();
        }
        None => {
            st.polling.toggle();
        }
    }
    Json(PollingResponse {
        enabled: st.polling.is_enabled(),
        period_seconds: st.polling.period().as_secs(),
    })
}

#[derive(Debug, Serialize)]
pub struct AnomalyResponse {
    pub summary: String,
    pub anomaly_density: f64,
    pub report: Option<AnomalyReport>,
}

fn anomaly_response(st: &AppState) -> Json<AnomalyResponse> {
    let anomaly = st.scheduler.store().anomaly();
    Json(AnomalyResponse {
        summary: anomaly.summary(),
        anomaly_density: st.scheduler.inputs().anomaly_density,
        report: anomaly.report.clone(),
    })
}

pub async fn upload_anomalies(
    State(st): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnomalyResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("inverter.csv").to_string();
        let bytes = field.bytes().await?.to_vec();
        upload = Some(InverterUpload { file_name, bytes });
        break;
    }
    let upload = upload.ok_or_else(|| ApiError::BadRequest("missing file field".to_string()))?;

    st.scheduler.score_anomaly_file(upload).await;
    Ok(anomaly_response(&st))
}

pub async fn sample_anomalies(State(st): State<AppState>) -> Json<AnomalyResponse> {
    st.scheduler.load_sample_anomalies().await;
    anomaly_response(&st)
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TestAlertRequest {
    #[serde(default)]
    pub message: Option<String>,
}

pub async fn send_test_alert(
    State(st): State<AppState>,
    Json(req): Json<TestAlertRequest>,
) -> Json<SummaryResponse> {
    st.scheduler.send_test_alert(req.message).await;
    Json(SummaryResponse {
        summary: st.scheduler.store().test_alert_status(),
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct GuidanceRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

pub async fn request_guidance(
    State(st): State<AppState>,
    Json(req): Json<GuidanceRequest>,
) -> Json<SummaryResponse> {
    st.scheduler.request_county_guidance(req.prompt).await;
    Json(SummaryResponse {
        summary: st.scheduler.store().guidance(),
    })
}
