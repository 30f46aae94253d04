use chrono::Local;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use crate::analysis::periods::next_weekend;
use crate::analysis::service::AnalysisService;
use crate::analysis::types::AnalysisRequest;
use crate::config::ListingConfig;

#[derive(Debug, Error, PartialEq)]
pub enum MonitorError {
    #[error("monitoring is already running")]
    AlreadyRunning,

    #[error("monitoring is not running")]
    NotRunning,

    #[error("monitoring interval must be greater than zero")]
    InvalidInterval,
}

struct RunningMonitor {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Background task that re-prices the next weekend on a fixed interval.
pub struct Monitor {
    service: Arc<AnalysisService>,
    listing: ListingConfig,
    period: Duration,
    running: Mutex<Option<RunningMonitor>>,
}

impl Monitor {
    pub fn new(service: Arc<AnalysisService>, listing: ListingConfig, period: Duration) -> Self {
        Self {
            service,
            listing,
            period,
            running: Mutex::new(None),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<RunningMonitor>> {
        // the slot holds no invariant a panicking holder could break
        self.running.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_active(&self) -> bool {
        self.slot().as_ref().map_or(false, |running| !running.handle.is_finished())
    }

    /// Spawn the loop. The first run starts immediately.
    pub fn start(&self) -> Result<(), MonitorError> {
        if self.period.is_zero() {
            return Err(MonitorError::InvalidInterval);
        }

        let mut slot = self.slot();
        if slot.as_ref().map_or(false, |running| !running.handle.is_finished()) {
            return Err(MonitorError::AlreadyRunning);
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            self.service.clone(),
            self.listing.clone(),
            self.period,
            token.clone(),
        ));

        info!("🔄 Monitoring started (every {:?})", self.period);
        *slot = Some(RunningMonitor { token, handle });
        Ok(())
    }

    /// Cancel the loop, interrupting a run in progress.
    pub fn stop(&self) -> Result<(), MonitorError> {
        let running = self.slot().take().ok_or(MonitorError::NotRunning)?;
        if running.handle.is_finished() {
            return Err(MonitorError::NotRunning);
        }

        running.token.cancel();
        info!("⏹️ Monitoring stopped");
        Ok(())
    }
}

async fn run_loop(service: Arc<AnalysisService>, listing: ListingConfig, period: Duration, token: CancellationToken) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let weekend = next_weekend(Local::now().date_naive());
        let request = match weekend.stay() {
            Ok(stay) => AnalysisRequest::for_stay(stay, listing.adults, listing.is_beachfront, listing.url.clone())
                .auto_generated(),
            Err(e) => {
                error!("Invalid monitoring period: {}", e);
                continue;
            }
        };

        info!("🔄 Scheduled analysis for {}", weekend.label);

        tokio::select! {
            _ = token.cancelled() => break,
            result = service.analyze(request) => {
                if let Err(e) = result {
                    error!("Scheduled analysis failed: {:#}", e);
                }
            }
        }
    }

    info!("Monitoring loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::pipeline::testing::{pipeline, StubCompetitors};
    use crate::analysis::state::AppState;
    use crate::data::types::FetchOutcome;
    use std::sync::atomic::Ordering;

    fn monitor(stub: Arc<StubCompetitors>, state: Arc<AppState>, period: Duration) -> Monitor {
        let service = AnalysisService::new(
            pipeline(stub, FetchOutcome::Unavailable("down".into())),
            state,
            None,
            None,
        );
        Monitor::new(Arc::new(service), ListingConfig::default(), period)
    }

    #[tokio::test]
    async fn test_start_stop_transitions() {
        let stub = Arc::new(StubCompetitors::new(FetchOutcome::Available(vec![])));
        let monitor = monitor(stub, Arc::new(AppState::new(10)), Duration::from_secs(3600));

        assert_eq!(monitor.stop(), Err(MonitorError::NotRunning));
        monitor.start().unwrap();
        assert!(monitor.is_active());
        assert_eq!(monitor.start(), Err(MonitorError::AlreadyRunning));

        monitor.stop().unwrap();
        assert!(!monitor.is_active());
        assert_eq!(monitor.stop(), Err(MonitorError::NotRunning));

        // can be restarted
        monitor.start().unwrap();
        monitor.stop().unwrap();
    }

    #[tokio::test]
    async fn test_zero_interval_is_rejected() {
        let stub = Arc::new(StubCompetitors::new(FetchOutcome::Available(vec![])));
        let monitor = monitor(stub.clone(), Arc::new(AppState::new(10)), Duration::ZERO);

        assert_eq!(monitor.start(), Err(MonitorError::InvalidInterval));
        assert!(!monitor.is_active());
        assert_eq!(monitor.stop(), Err(MonitorError::NotRunning));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_first_run_is_immediate_and_auto_generated() {
        let stub = Arc::new(StubCompetitors::new(FetchOutcome::Available(vec![])));
        let state = Arc::new(AppState::new(10));
        let monitor = monitor(stub.clone(), state.clone(), Duration::from_secs(3600));

        monitor.start().unwrap();
        for _ in 0..50 {
            if state.latest().await.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        monitor.stop().unwrap();

        let latest = state.latest().await.unwrap();
        assert!(latest.request.auto_generated);
        assert_eq!(latest.nights, 2);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_interrupts_run_in_progress() {
        let mut stub = StubCompetitors::new(FetchOutcome::Available(vec![]));
        stub.delay = Duration::from_secs(30);
        let stub = Arc::new(stub);
        let state = Arc::new(AppState::new(10));
        let monitor = monitor(stub.clone(), state.clone(), Duration::from_secs(3600));

        monitor.start().unwrap();
        for _ in 0..50 {
            if stub.calls.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let started = std::time::Instant::now();
        monitor.stop().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(state.latest().await.is_none());
        assert!(!monitor.is_active());
    }
}
