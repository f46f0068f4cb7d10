use parking_lot::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::scheduler::RiskScheduler;

struct PollHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Periodic re-scoring of the emergency areas.
///
/// Enabling runs one cycle straight away and then one per period. Disabling
/// cancels the timer before returning, so no new cycle starts afterwards. A
/// cycle already in flight is allowed to finish.
pub struct PollingController {
    scheduler: RiskScheduler,
    period: Duration,
    handle: Mutex<Option<PollHandle>>,
}

impl PollingController {
    pub fn new(scheduler: RiskScheduler, period: Duration) -> Self {
        Self {
            scheduler,
            period,
            handle: Mutex::new(None),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_enabled(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// Returns false if polling was already running
    pub fn enable(&self) -> bool {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            debug!("polling already enabled");
            return false;
        }

        let token = CancellationToken::new();
        let task = tokio::spawn(run_cycles(
            self.scheduler.clone(),
            self.period,
            token.clone(),
        ));
        *handle = Some(PollHandle { token, task });
        info!(period_secs = self.period.as_secs(), "polling enabled");
        true
    }

    /// Returns false if polling was already off
    pub fn disable(&self) -> bool {
        let Some(handle) = self.handle.lock().take() else {
            return false;
        };
        handle.token.cancel();
        info!("polling disabled");
        true
    }

    /// Flips the state and returns the new one
    pub fn toggle(&self) -> bool {
        if self.is_enabled() {
            self.disable();
            false
        } else {
            self.enable();
            true
        }
    }

    /// Disables polling and waits for a running cycle to finish
    pub async fn shutdown(&self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        handle.token.cancel();
        if let Err(e) = handle.task.await {
            tracing::error!(error = %e, "polling task panicked");
        }
    }
}

async fn run_cycles(scheduler: RiskScheduler, period: Duration, token: CancellationToken) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut cycle: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        cycle += 1;
        debug!(cycle, "polling cycle");
        scheduler.score_emergency_areas().await;
    }
    debug!(cycles = cycle, "polling loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::inputs::RiskInputs;
    use crate::controller::testing::{Call, FakeRiskApi};
    use crate::domain::EmergencyArea;
    use crate::store::RiskModelStore;
    use std::sync::Arc;
    use tokio::time::sleep;

    const PERIOD: Duration = Duration::from_secs(300);

    fn polling() -> (Arc<FakeRiskApi>, RiskScheduler, PollingController) {
        let api = Arc::new(FakeRiskApi::new());
        let scheduler = RiskScheduler::new(
            api.clone(),
            Arc::new(RiskModelStore::new()),
            EmergencyArea::defaults(),
            RiskInputs::default(),
        );
        let controller = PollingController::new(scheduler.clone(), PERIOD);
        (api, scheduler, controller)
    }

    fn risk_calls(api: &FakeRiskApi) -> usize {
        api.count(|c| matches!(c, Call::Risk(_)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_enable_fires_immediately_then_every_period() {
        let (api, scheduler, polling) = polling();
        assert!(!polling.is_enabled());

        assert!(polling.enable());
        sleep(Duration::from_secs(1)).await;
        assert_eq!(risk_calls(&api), 4);
        assert_eq!(scheduler.store().emergency_areas().rows.len(), 4);

        sleep(PERIOD).await;
        assert_eq!(risk_calls(&api), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_stops_further_cycles() {
        let (api, _scheduler, polling) = polling();
        polling.enable();
        sleep(Duration::from_secs(1)).await;

        assert!(polling.disable());
        assert!(!polling.disable());
        sleep(PERIOD * 10).await;

        assert_eq!(risk_calls(&api), 4);
        assert!(!polling.is_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_enable_is_noop() {
        let (api, _scheduler, polling) = polling();
        assert!(polling.enable());
        assert!(!polling.enable());
        sleep(Duration::from_secs(1)).await;

        assert_eq!(risk_calls(&api), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reenable_uses_current_inputs() {
        let (api, scheduler, polling) = polling();
        polling.enable();
        sleep(Duration::from_secs(1)).await;
        polling.disable();

        scheduler.set_sensitivity(1.2);
        api.clear();
        polling.enable();
        sleep(Duration::from_secs(1)).await;

        let calls = api.calls();
        assert_eq!(calls.len(), 4);
        assert!(calls
            .iter()
            .all(|c| matches!(c, Call::Risk(q) if q.sensitivity.value() == 1.2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_and_shutdown() {
        let (_api, _scheduler, polling) = polling();
        assert!(polling.toggle());
        assert!(polling.is_enabled());
        assert!(!polling.toggle());
        assert!(!polling.is_enabled());

        polling.enable();
        polling.shutdown().await;
        assert!(!polling.is_enabled());
    }
}
