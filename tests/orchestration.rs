//! End-to-end orchestration against a mock risk service.

use std::sync::Arc;
use std::time::Duration;

use blackout_risk::client::InverterUpload;
use blackout_risk::config::Config;
use blackout_risk::controller::{spawn_controller_tasks, AppState};
use blackout_risk::domain::RowRisk;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn config(server: &MockServer) -> Config {
    let mut cfg = Config::default();
    cfg.api.base_url = format!("{}/api/v1", server.uri());
    cfg.api.boundaries_url = format!("{}/counties.json", server.uri());
    cfg.api.http_timeout_seconds = 5;
    cfg
}

fn risk_body(overall: f64) -> serde_json::Value {
    json!({
        "risk": {
            "blackout_risk": overall,
            "components": { "weather_risk": 0.2, "outage_risk": 0.1, "anomaly_risk": 0.0, "ml_risk": 0.3 }
        },
        "svi_score": 0.5
    })
}

async fn mount_session_mocks(server: &MockServer) {
    Mock::given(path("/api/v1/blackout/risk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(risk_body(0.35)))
        .mount(server)
        .await;
    Mock::given(path("/api/v1/weather/alerts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "features": [] })))
        .mount(server)
        .await;
    Mock::given(path("/api/v1/blackout/choropleth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "counties": [
                { "fips": 6037, "risk": 0.42, "county": "Los Angeles", "state_abbr": "CA" }
            ]
        })))
        .mount(server)
        .await;
    Mock::given(path("/api/v1/model/metrics"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "metrics": { "auc": 0.9, "accuracy": 0.8 } })),
        )
        .mount(server)
        .await;
    Mock::given(path("/api/v1/model/evaluation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "evaluation": {} })))
        .mount(server)
        .await;
}

fn query_value(request: &Request, key: &str) -> Option<String> {
    request
        .url
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

async fn risk_requests(server: &MockServer) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == "/api/v1/blackout/risk")
        .collect()
}

async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..300 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn session_start_fills_the_dashboard() {
    let server = MockServer::start().await;
    mount_session_mocks(&server).await;
    Mock::given(path("/counties.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "type": "FeatureCollection", "features": [{ "id": "06037" }] })),
        )
        .mount(&server)
        .await;

    let state = AppState::new(config(&server)).unwrap();
    spawn_controller_tasks(&state);

    eventually(|| {
        let state = state.clone();
        async move {
            let snapshot = state.snapshot();
            snapshot.emergency_areas.rows.len() == 4
                && snapshot.boundary_features == 1
                && snapshot.area_risk.value.is_some()
                && snapshot.model_evaluation.is_some()
        }
    })
    .await;

    let snapshot = state.snapshot();
    assert_eq!(
        snapshot.area_risk.summary,
        "Risk 35.0% · Weather 20.0% · Outage 10.0% · ML 30.0% · SVI 50.0%"
    );
    assert_eq!(snapshot.alerts.summary, "No active alerts near this location.");
    assert_eq!(snapshot.model_metrics, "Model AUC 90.0% · Accuracy 80.0%");
    assert!(snapshot
        .emergency_areas
        .rows
        .iter()
        .all(|row| row.risk == RowRisk::Scored(0.35)));

    let county = state.scheduler.select_county("6037", None).unwrap();
    assert_eq!(county.display_name(), "Los Angeles, CA");

    state.shutdown().await;
}

#[tokio::test]
async fn upload_density_reaches_the_next_area_query() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/anomalies/score"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rows": 100,
            "anomaly_count": 5,
            "anomaly_density": 0.05,
            "sample_anomalies": []
        })))
        .mount(&server)
        .await;
    mount_session_mocks(&server).await;

    let state = AppState::new(config(&server)).unwrap();
    state.scheduler.spawn_dependency_driver();

    eventually(|| {
        let server = &server;
        async move { risk_requests(server).await.len() >= 2 }
    })
    .await;

    state
        .scheduler
        .score_anomaly_file(InverterUpload {
            file_name: "inverter.csv".to_string(),
            bytes: b"TIME_STAMP,Value\n2024-06-01 10:00,980.0\n".to_vec(),
        })
        .await;

    eventually(|| {
        let server = &server;
        async move {
            risk_requests(server).await.iter().any(|r| {
                query_value(r, "facilityType").as_deref() == Some("community")
                    && query_value(r, "anomalyDensity").as_deref() == Some("0.05")
            })
        }
    })
    .await;

    assert_eq!(state.scheduler.inputs().anomaly_density, 0.05);
    assert_eq!(
        state.scheduler.store().anomaly_summary(),
        "Analyzed 100 rows · 5 anomalies · density 5.00%"
    );
    state.shutdown().await;
}

#[tokio::test]
async fn boundary_outage_keeps_previous_registry() {
    let server = MockServer::start().await;
    mount_session_mocks(&server).await;
    Mock::given(path("/counties.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "features": [] })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(path("/counties.json"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let state = AppState::new(config(&server)).unwrap();

    state.scheduler.refresh_county_risk().await;
    assert_eq!(state.scheduler.store().geo_registry().risk_for("06037"), Some(0.42));

    state.scheduler.refresh_county_risk().await;
    let registry = state.scheduler.store().geo_registry();
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.risk_for("6037"), Some(0.42));
}

#[tokio::test]
async fn county_risk_outage_keeps_previous_registry() {
    let server = MockServer::start().await;
    Mock::given(path("/api/v1/blackout/choropleth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "counties": [
                { "fips": 6037, "risk": 0.42, "county": "Los Angeles", "state_abbr": "CA" }
            ]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(path("/api/v1/blackout/choropleth"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(path("/counties.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "type": "FeatureCollection", "features": [{ "id": "06037" }] })),
        )
        .mount(&server)
        .await;

    let state = AppState::new(config(&server)).unwrap();

    state.scheduler.refresh_county_risk().await;
    let before = state.scheduler.store().geo_registry();
    assert_eq!(before.risk_for("06037"), Some(0.42));

    state.scheduler.refresh_county_risk().await;
    let after = state.scheduler.store().geo_registry();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(after.boundaries.feature_count(), 1);
}

#[tokio::test]
async fn failed_facility_check_shows_service_message() {
    let server = MockServer::start().await;
    Mock::given(path("/api/v1/blackout/risk"))
        .and(query_param("facilityType", "hospital"))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(json!({ "error": "Sensitivity must be between 0.7 and 1.3" })),
        )
        .mount(&server)
        .await;

    let state = AppState::new(config(&server)).unwrap();
    state.scheduler.check_facility_risk().await;

    assert_eq!(
        state.scheduler.store().facility_risk_summary(),
        "Sensitivity must be between 0.7 and 1.3"
    );
}
