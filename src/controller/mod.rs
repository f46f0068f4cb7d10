pub mod inputs;
pub mod polling;
pub mod scheduler;
#[cfg(test)]
pub(crate) mod testing;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::client::{HttpRiskClient, RiskApi};
use crate::config::Config;
use crate::store::{DashboardSnapshot, RiskModelStore};

pub use inputs::{ChangeSet, Dependency, QueryKind, RiskInputs};
pub use polling::PollingController;
pub use scheduler::{Job, RiskScheduler, TaskStatus, DEFAULT_ALERT_MESSAGE};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub scheduler: RiskScheduler,
    pub polling: Arc<PollingController>,
}

impl AppState {
    pub fn new(cfg: Config) -> Result<Self> {
        let api = Arc::new(HttpRiskClient::from_config(&cfg.api)?);
        Ok(Self::with_api(cfg, api))
    }

    /// Wires the scheduler and polling around any risk service implementation
    pub fn with_api(cfg: Config, api: Arc<dyn RiskApi>) -> Self {
        let store = Arc::new(RiskModelStore::new());
        let inputs = RiskInputs::new(cfg.session.focal_point(), cfg.session.sensitivity());
        let scheduler = RiskScheduler::new(api, store, cfg.facilities.clone(), inputs)
            .with_state_filter(cfg.session.state_filter.clone());
        let polling = Arc::new(PollingController::new(
            scheduler.clone(),
            cfg.polling.period(),
        ));

        Self {
            cfg,
            scheduler,
            polling,
        }
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.scheduler.snapshot(self.polling.is_enabled())
    }

    pub async fn shutdown(&self) {
        self.polling.shutdown().await;
        self.scheduler.shutdown().await;
    }
}

/// Starts the dependency driver, the session loads and, if configured, polling
pub fn spawn_controller_tasks(state: &AppState) {
    state.scheduler.spawn_dependency_driver();
    state.scheduler.load_session();
    if state.cfg.polling.enabled_on_start {
        state.polling.enable();
    }
    info!(
        facilities = state.scheduler.facilities().len(),
        polling = state.polling.is_enabled(),
        "controller tasks started"
    );
}
