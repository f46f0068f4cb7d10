//! Dependency-driven dispatch of outbound risk queries.
//!
//! The scheduler owns [`RiskInputs`] behind a `watch` channel. A single driver
//! task observes every change, diffs it against the last values it acted on
//! and spawns each affected query once. Every job claims its store slot
//! (a [`Ticket`]) at the moment it is created, so the order in which jobs are
//! issued decides which result survives, not the order in which they finish.

use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::inputs::{ChangeSet, Dependency, QueryKind, RiskInputs};
use crate::client::{FetchError, GeocodeMatch, InverterUpload, RiskApi, RiskQuery};
use crate::domain::{
    CountyRisk, EmergencyArea, FacilityRow, FacilityType, FocalPoint, GeoPoint, GeoRegistry,
    RiskBreakdown, RiskSensitivity, RowRisk,
};
use crate::store::status::{
    ALERTS_TEXT, ANOMALY_SAMPLE_TEXT, ANOMALY_UPLOAD_TEXT, AREA_SUMMARY_TEXT, FACILITY_RISK_TEXT,
    GUIDANCE_TEXT, MODEL_METRICS_TEXT, TEST_ALERT_TEXT,
};
use crate::store::{
    AnomalyState, DashboardSnapshot, EmergencyAreaScores, RiskModelStore, Slot, Status, Ticket,
};

/// Message sent by a test alert when the caller supplies none
pub const DEFAULT_ALERT_MESSAGE: &str =
    "Blackout risk alert: elevated outage risk near your location. Check backup power and emergency plans.";

/// A query whose store slot is already claimed. Nothing is sent until polled.
pub type Job = BoxFuture<'static, ()>;

/// Task status tracking
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskStatus {
    pub last_run: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub run_count: u64,
    pub success_count: u64,
    pub error_count: u64,
}

#[derive(Clone)]
pub struct RiskScheduler {
    api: Arc<dyn RiskApi>,
    store: Arc<RiskModelStore>,
    inputs: Arc<watch::Sender<RiskInputs>>,
    facilities: Arc<[EmergencyArea]>,
    state_filter: Arc<RwLock<Option<String>>>,
    status: Arc<RwLock<HashMap<QueryKind, TaskStatus>>>,
    tasks: TaskTracker,
    shutdown: CancellationToken,
}

impl RiskScheduler {
    pub fn new(
        api: Arc<dyn RiskApi>,
        store: Arc<RiskModelStore>,
        facilities: Vec<EmergencyArea>,
        initial: RiskInputs,
    ) -> Self {
        let (inputs, _) = watch::channel(initial);
        Self {
            api,
            store,
            inputs: Arc::new(inputs),
            facilities: facilities.into(),
            state_filter: Arc::new(RwLock::new(None)),
            status: Arc::new(RwLock::new(HashMap::new())),
            tasks: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_state_filter(self, filter: Option<String>) -> Self {
        self.set_state_filter(filter);
        self
    }

    pub fn store(&self) -> &Arc<RiskModelStore> {
        &self.store
    }

    pub fn facilities(&self) -> &[EmergencyArea] {
        &self.facilities
    }

    /// Current inputs as last written
    pub fn inputs(&self) -> RiskInputs {
        self.inputs.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RiskInputs> {
        self.inputs.subscribe()
    }

    pub fn state_filter(&self) -> Option<String> {
        self.state_filter.read().clone()
    }

    pub fn task_status(&self, kind: QueryKind) -> TaskStatus {
        self.status.read().get(&kind).cloned().unwrap_or_default()
    }

    pub fn task_statuses(&self) -> BTreeMap<String, TaskStatus> {
        self.status
            .read()
            .iter()
            .map(|(kind, status)| (kind.to_string(), status.clone()))
            .collect()
    }

    pub fn snapshot(&self, polling_enabled: bool) -> DashboardSnapshot {
        DashboardSnapshot::capture(
            &self.store,
            self.inputs(),
            polling_enabled,
            self.task_statuses(),
        )
    }

    // ---------------------------------------------------------------------
    // Inputs
    // ---------------------------------------------------------------------

    /// Applies `update` as one change. Returns whether anything differed.
    pub fn update_inputs(&self, update: impl FnOnce(&mut RiskInputs)) -> bool {
        self.inputs.send_if_modified(|inputs| {
            let before = inputs.clone();
            update(inputs);
            *inputs != before
        })
    }

    pub fn set_focal_point(&self, point: GeoPoint, label: impl Into<String>) -> bool {
        let focal = FocalPoint::new(point, label);
        self.update_inputs(|inputs| inputs.focal = focal)
    }

    /// Clamps into the supported range and returns the value applied
    pub fn set_sensitivity(&self, value: f64) -> RiskSensitivity {
        let sensitivity = RiskSensitivity::new(value);
        self.update_inputs(|inputs| inputs.sensitivity = sensitivity);
        sensitivity
    }

    pub(crate) fn set_anomaly_density(&self, density: f64) -> bool {
        self.update_inputs(|inputs| inputs.anomaly_density = density)
    }

    /// Affects the next choropleth load only
    pub fn set_state_filter(&self, filter: Option<String>) {
        let normalized = filter
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty());
        *self.state_filter.write() = normalized;
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Spawns the task that turns input changes into queries.
    ///
    /// The location-scoped queries run once immediately for the initial focal
    /// point.
    pub fn spawn_dependency_driver(&self) -> JoinHandle<()> {
        let this = self.clone();
        let mut rx = self.inputs.subscribe();
        let shutdown = self.shutdown.clone();

        self.tasks.spawn(async move {
            let mut last = rx.borrow_and_update().clone();
            this.dispatch(ChangeSet::only(Dependency::FocalPoint), &last);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }

                let current = rx.borrow_and_update().clone();
                let changes = ChangeSet::between(&last, &current);
                last = current;
                if changes.is_empty() {
                    continue;
                }
                debug!(?changes, "risk inputs changed");
                this.dispatch(changes, &last);
            }
            debug!("dependency driver stopped");
        })
    }

    /// Initial loads that do not depend on the focal point
    pub fn load_session(&self) {
        let inputs = self.inputs();
        self.tasks.spawn(self.emergency_job(&inputs));
        self.tasks.spawn(self.choropleth_job());
        self.tasks.spawn(self.model_metrics_job());
        self.tasks.spawn(self.model_evaluation_job());
    }

    /// Stops the driver and waits for every spawned query to settle
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tasks.close();
        self.tasks.wait().await;
        info!("risk scheduler stopped");
    }

    fn dispatch(&self, changes: ChangeSet, inputs: &RiskInputs) {
        for kind in QueryKind::affected_by(changes) {
            let job = match kind {
                QueryKind::FacilityRisk | QueryKind::AreaRisk => self.point_risk_job(kind, inputs),
                QueryKind::WeatherAlerts => self.alerts_job(inputs),
                QueryKind::EmergencyAreas => self.emergency_job(inputs),
                other => {
                    warn!(query = %other, "query has no input dependencies");
                    continue;
                }
            };
            self.tasks.spawn(job);
        }
    }

    // ---------------------------------------------------------------------
    // Explicit triggers
    // ---------------------------------------------------------------------

    /// Geocodes `query` and moves the focal point to the match.
    ///
    /// Blank queries send nothing. No match leaves the focal point unchanged.
    pub async fn search_location(&self, query: &str) -> Option<GeocodeMatch> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        let found = self
            .tracked(QueryKind::Geocode, async {
                match self.api.geocode(query.to_string()).await {
                    Ok(found) => Ok(Some(found)),
                    Err(FetchError::NotFound) => {
                        debug!(query, "no geocode match");
                        Ok(None)
                    }
                    Err(err) => Err(err),
                }
            })
            .await
            .flatten()?;

        self.set_focal_point(found.point, found.label.clone());
        info!(label = %found.label, "focal point moved to search result");
        Some(found)
    }

    /// Records `fips` as the selected county and, when the selection came from
    /// a map interaction, moves the focal point there.
    pub fn select_county(&self, raw_fips: &str, at: Option<GeoPoint>) -> Option<CountyRisk> {
        let registry = self.store.geo_registry();
        let Some(county) = registry.county(raw_fips).cloned() else {
            debug!(fips = raw_fips, "county not in registry");
            return None;
        };

        let ticket = self.store.selected_county.begin();
        self.store.selected_county.commit(&ticket, Some(county.clone()));
        // Guidance belongs to the previous county; any in-flight request goes stale
        let guidance = self.store.guidance.begin();
        self.store.guidance.commit(&guidance, Status::NotLoaded);
        if let Some(point) = at {
            self.set_focal_point(point, county.display_name());
        }
        info!(fips = %county.fips, "county selected");
        Some(county)
    }

    pub fn check_facility_risk(&self) -> Job {
        self.point_risk_job(QueryKind::FacilityRisk, &self.inputs())
    }

    pub fn refresh_county_risk(&self) -> Job {
        self.choropleth_job()
    }

    /// Scores every configured facility with the inputs current right now
    pub fn score_emergency_areas(&self) -> Job {
        self.emergency_job(&self.inputs())
    }

    pub fn score_anomaly_file(&self, upload: InverterUpload) -> Job {
        self.anomaly_job(Some(upload))
    }

    pub fn load_sample_anomalies(&self) -> Job {
        self.anomaly_job(None)
    }

    pub fn load_model_metrics(&self) -> Job {
        self.model_metrics_job()
    }

    pub fn load_model_evaluation(&self) -> Job {
        self.model_evaluation_job()
    }

    pub fn send_test_alert(&self, message: Option<String>) -> Job {
        let message = message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_ALERT_MESSAGE.to_string());

        let slot = &self.store.test_alert;
        let ticket = slot.begin();
        slot.commit(&ticket, Status::Pending);

        let this = self.clone();
        Box::pin(async move {
            this.tracked(QueryKind::TestAlert, async {
                let slot = &this.store.test_alert;
                match this.api.send_test_alert(message).await {
                    Ok(status) => {
                        this.land(QueryKind::TestAlert, slot, &ticket, Status::Ready(status));
                        Ok(())
                    }
                    Err(err) => {
                        let text = err.user_message(TEST_ALERT_TEXT.failed);
                        this.land(QueryKind::TestAlert, slot, &ticket, Status::Failed(text));
                        Err(err)
                    }
                }
            })
            .await;
        })
    }

    /// Asks for guidance on the selected county; does nothing without one
    pub fn request_county_guidance(&self, prompt: Option<String>) -> Job {
        let Some(county) = self.store.selected_county() else {
            debug!("guidance requested without a selected county");
            return Box::pin(async {});
        };
        let prompt = prompt.filter(|p| !p.trim().is_empty());

        let slot = &self.store.guidance;
        let ticket = slot.begin();
        slot.commit(&ticket, Status::Pending);

        let this = self.clone();
        Box::pin(async move {
            this.tracked(QueryKind::CountyGuidance, async {
                let slot = &this.store.guidance;
                match this.api.request_county_guidance(county, prompt).await {
                    Ok(text) => {
                        this.land(QueryKind::CountyGuidance, slot, &ticket, Status::Ready(text));
                        Ok(())
                    }
                    Err(err) => {
                        let text = err.user_message(GUIDANCE_TEXT.failed);
                        this.land(QueryKind::CountyGuidance, slot, &ticket, Status::Failed(text));
                        Err(err)
                    }
                }
            })
            .await;
        })
    }

    // ---------------------------------------------------------------------
    // Jobs
    // ---------------------------------------------------------------------

    fn point_slot(&self, kind: QueryKind) -> &Slot<Status<RiskBreakdown>> {
        match kind {
            QueryKind::AreaRisk => &self.store.area_risk,
            _ => &self.store.facility_risk,
        }
    }

    /// Facility check (hospital) or area summary (community) at the focal point
    fn point_risk_job(&self, kind: QueryKind, inputs: &RiskInputs) -> Job {
        let (facility_type, text) = match kind {
            QueryKind::AreaRisk => (FacilityType::Community, AREA_SUMMARY_TEXT),
            _ => (FacilityType::Hospital, FACILITY_RISK_TEXT),
        };
        let query = RiskQuery {
            point: inputs.focal.point,
            facility_type,
            anomaly_density: inputs.anomaly_density,
            sensitivity: inputs.sensitivity,
        };

        let slot = self.point_slot(kind);
        let ticket = slot.begin();
        slot.commit(&ticket, Status::Pending);

        let this = self.clone();
        Box::pin(async move {
            this.tracked(kind, async {
                let result = this.api.fetch_facility_risk(query).await;
                let slot = this.point_slot(kind);
                match result {
                    Ok(breakdown) => {
                        this.land(kind, slot, &ticket, Status::Ready(breakdown));
                        Ok(())
                    }
                    Err(err) => {
                        let text = err.user_message(text.failed);
                        this.land(kind, slot, &ticket, Status::Failed(text));
                        Err(err)
                    }
                }
            })
            .await;
        })
    }

    fn alerts_job(&self, inputs: &RiskInputs) -> Job {
        let point = inputs.focal.point;
        let slot = &self.store.alerts;
        let ticket = slot.begin();
        slot.commit(&ticket, Status::Pending);

        let this = self.clone();
        Box::pin(async move {
            this.tracked(QueryKind::WeatherAlerts, async {
                let slot = &this.store.alerts;
                match this.api.fetch_weather_alerts(point).await {
                    Ok(alerts) => {
                        this.land(QueryKind::WeatherAlerts, slot, &ticket, Status::Ready(alerts));
                        Ok(())
                    }
                    Err(err) => {
                        // Stale alerts are never shown after a failed fetch
                        let text = err.user_message(ALERTS_TEXT.failed);
                        this.land(QueryKind::WeatherAlerts, slot, &ticket, Status::Failed(text));
                        Err(err)
                    }
                }
            })
            .await;
        })
    }

    fn emergency_job(&self, inputs: &RiskInputs) -> Job {
        let ticket = self.store.emergency_areas.begin();
        let sensitivity = inputs.sensitivity;
        let anomaly_density = inputs.anomaly_density;

        let this = self.clone();
        Box::pin(async move {
            this.tracked(
                QueryKind::EmergencyAreas,
                this.run_emergency_areas(ticket, sensitivity, anomaly_density),
            )
            .await;
        })
    }

    async fn run_emergency_areas(
        &self,
        ticket: Ticket,
        sensitivity: RiskSensitivity,
        anomaly_density: f64,
    ) -> Result<(), FetchError> {
        let scoring = self.facilities.iter().map(|area| {
            let query = RiskQuery {
                point: area.location(),
                facility_type: area.facility_type,
                anomaly_density,
                sensitivity,
            };
            async move {
                let risk = match self.api.fetch_facility_risk(query).await {
                    Ok(breakdown) => RowRisk::Scored(breakdown.overall),
                    Err(e) => {
                        warn!(error = %e, facility = %area.name, "facility scoring failed");
                        RowRisk::Unavailable
                    }
                };
                FacilityRow {
                    name: area.name.clone(),
                    facility_type: area.facility_type,
                    risk,
                }
            }
        });
        let rows = join_all(scoring).await;

        let total = rows.len();
        let unavailable = rows
            .iter()
            .filter(|row| row.risk == RowRisk::Unavailable)
            .count();
        let scores = EmergencyAreaScores::from_rows(rows, Utc::now());
        if self.land(
            QueryKind::EmergencyAreas,
            &self.store.emergency_areas,
            &ticket,
            scores,
        ) {
            info!(facilities = total, unavailable, %sensitivity, "emergency areas scored");
        }
        Ok(())
    }

    fn choropleth_job(&self) -> Job {
        let ticket = self.store.geo.begin();
        let filter = self.state_filter();

        let this = self.clone();
        Box::pin(async move {
            this.tracked(
                QueryKind::CountyChoropleth,
                this.run_choropleth(ticket, filter),
            )
            .await;
        })
    }

    async fn run_choropleth(
        &self,
        ticket: Ticket,
        state_filter: Option<String>,
    ) -> Result<(), FetchError> {
        // Either half failing leaves the current registry in place
        let (counties, boundaries) = self
            .api
            .fetch_county_choropleth(state_filter.clone())
            .await?;
        let registry = GeoRegistry::assemble(counties, boundaries);
        let counties = registry.len();
        let features = registry.boundaries.feature_count();
        if self.land(QueryKind::CountyChoropleth, &self.store.geo, &ticket, registry) {
            info!(counties, features, state = ?state_filter, "county risk loaded");
        }
        Ok(())
    }

    fn anomaly_job(&self, upload: Option<InverterUpload>) -> Job {
        let ticket = self.store.anomaly.begin();

        let this = self.clone();
        Box::pin(async move {
            this.tracked(QueryKind::AnomalyScoring, this.run_anomaly_scoring(ticket, upload))
                .await;
        })
    }

    async fn run_anomaly_scoring(
        &self,
        ticket: Ticket,
        upload: Option<InverterUpload>,
    ) -> Result<(), FetchError> {
        let (result, text) = match upload {
            Some(upload) => {
                debug!(file = %upload.file_name, bytes = upload.bytes.len(), "scoring inverter upload");
                (self.api.score_anomaly_file(upload).await, ANOMALY_UPLOAD_TEXT)
            }
            None => (self.api.score_sample_anomalies().await, ANOMALY_SAMPLE_TEXT),
        };

        match result {
            Ok(report) => {
                let density = report.anomaly_density;
                let state = AnomalyState {
                    report: Some(report),
                    last_error: None,
                };
                if self.land(QueryKind::AnomalyScoring, &self.store.anomaly, &ticket, state) {
                    info!(anomaly_density = density, "anomaly density updated");
                    self.set_anomaly_density(density);
                }
                Ok(())
            }
            Err(err) => {
                let state = AnomalyState {
                    report: self.store.anomaly().report.clone(),
                    last_error: Some(err.user_message(text.failed)),
                };
                self.land(QueryKind::AnomalyScoring, &self.store.anomaly, &ticket, state);
                Err(err)
            }
        }
    }

    fn model_metrics_job(&self) -> Job {
        let ticket = self.store.model_metrics.begin();

        let this = self.clone();
        Box::pin(async move {
            this.tracked(QueryKind::ModelMetrics, async {
                let slot = &this.store.model_metrics;
                match this.api.fetch_model_metrics().await {
                    Ok(metrics) => {
                        this.land(QueryKind::ModelMetrics, slot, &ticket, Status::Ready(metrics));
                        Ok(())
                    }
                    Err(err) => {
                        let text = err.user_message(MODEL_METRICS_TEXT.failed);
                        this.land(QueryKind::ModelMetrics, slot, &ticket, Status::Failed(text));
                        Err(err)
                    }
                }
            })
            .await;
        })
    }

    fn model_evaluation_job(&self) -> Job {
        let ticket = self.store.model_evaluation.begin();

        let this = self.clone();
        Box::pin(async move {
            this.tracked(QueryKind::ModelEvaluation, async {
                let evaluation = this.api.fetch_model_evaluation().await?;
                this.land(
                    QueryKind::ModelEvaluation,
                    &this.store.model_evaluation,
                    &ticket,
                    Some(evaluation),
                );
                Ok(())
            })
            .await;
        })
    }

    // ---------------------------------------------------------------------
    // Bookkeeping
    // ---------------------------------------------------------------------

    /// Commits `value` if `ticket` is still the newest for `slot`
    fn land<T>(&self, kind: QueryKind, slot: &Slot<T>, ticket: &Ticket, value: T) -> bool {
        let landed = slot.commit(ticket, value);
        if !landed {
            debug!(
                query = %kind,
                generation = ticket.generation(),
                "discarding superseded result"
            );
        }
        landed
    }

    async fn tracked<T, F>(&self, kind: QueryKind, work: F) -> Option<T>
    where
        F: Future<Output = Result<T, FetchError>>,
    {
        self.record(kind, |status| {
            status.last_run = Some(Utc::now());
            status.run_count += 1;
        });

        match work.await {
            Ok(value) => {
                self.record(kind, |status| {
                    status.last_success = Some(Utc::now());
                    status.success_count += 1;
                    status.last_error = None;
                });
                Some(value)
            }
            Err(e) => {
                warn!(query = %kind, error = %e, "query failed");
                self.record(kind, |status| {
                    status.error_count += 1;
                    status.last_error = Some(e.to_string());
                });
                None
            }
        }
    }

    fn record(&self, kind: QueryKind, update: impl FnOnce(&mut TaskStatus)) {
        let mut status = self.status.write();
        update(status.entry(kind).or_default());
    }
}
