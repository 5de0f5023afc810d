//! Poll scheduler
//!
//! One repeating task per resource, each on its own interval. A tick's
//! request runs detached from the timer, so a slow backend never delays the
//! next tick; out-of-order completions are absorbed by the cache's merge
//! semantics. Failures are logged and recorded, and the next tick runs
//! regardless. Cancelling the [`PollHandle`] stops every timer, and any
//! response landing afterwards is discarded.

use actix_rt::task::JoinHandle;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::{AlertQuery, Backend, Resource};
use crate::config::PollSettings;
use crate::error::ClientError;
use crate::state::AppState;

/// Vitals history points fetched for the detail panel
pub const DETAIL_VITALS_LIMIT: u32 = 100;

type SharedState = Arc<RwLock<AppState>>;

/// Owner of the running poll tasks. Dropping it cancels them.
pub struct PollHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl PollHandle {
    /// Cancel and wait for every timer loop to exit.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        for task in std::mem::take(&mut self.tasks) {
            let _ = task.await;
        }
        info!("Poll scheduler stopped");
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

pub struct PollScheduler<B> {
    backend: Arc<B>,
    state: SharedState,
    settings: PollSettings,
}

impl<B: Backend> PollScheduler<B> {
    pub fn new(backend: Arc<B>, state: SharedState, settings: PollSettings) -> Self {
        Self {
            backend,
            state,
            settings,
        }
    }

    /// Spawn every poll task on the current actix runtime.
    pub fn start(self) -> PollHandle {
        let token = CancellationToken::new();
        let ms = Duration::from_millis;

        info!(
            firefighters_ms = self.settings.firefighters_ms,
            alerts_ms = self.settings.alerts_ms,
            beacons_ms = self.settings.beacons_ms,
            details_ms = self.settings.details_ms,
            building_ms = self.settings.building_ms,
            "Starting poll scheduler"
        );

        let tasks = vec![
            self.every(&token, "firefighters", ms(self.settings.firefighters_ms), poll_firefighters::<B>),
            self.every(&token, "alerts", ms(self.settings.alerts_ms), poll_alerts::<B>),
            self.every(&token, "beacons", ms(self.settings.beacons_ms), poll_beacons::<B>),
            self.every(&token, "details", ms(self.settings.details_ms), poll_details::<B>),
            self.every(&token, "building", ms(self.settings.building_ms), poll_building::<B>),
        ];

        PollHandle { token, tasks }
    }

    fn every<F, Fut>(&self, token: &CancellationToken, name: &'static str, period: Duration, cycle: F) -> JoinHandle<()>
    where
        F: Fn(Arc<B>, SharedState, CancellationToken) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        let token = token.clone();
        let backend = self.backend.clone();
        let state = self.state.clone();

        actix_rt::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!(task = name, period_ms = period.as_millis() as u64, "Poll task started");

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let tick = cycle(backend.clone(), state.clone(), token.clone());
                let guard = token.clone();
                actix_rt::spawn(async move {
                    tokio::select! {
                        biased;
                        _ = guard.cancelled() => {}
                        _ = tick => {}
                    }
                });
            }

            debug!(task = name, "Poll task stopped");
        })
    }
}

/// Success or failure bookkeeping for one response; `None` on failure.
fn settle<T>(state: &mut AppState, resource: Resource, result: Result<T, ClientError>) -> Option<T> {
    let now = Utc::now();
    match result {
        Ok(value) => {
            state.record_success(resource, now);
            Some(value)
        }
        Err(e) => {
            state.record_failure(&e, now);
            None
        }
    }
}

async fn poll_firefighters<B: Backend>(backend: Arc<B>, state: SharedState, token: CancellationToken) {
    let result = backend.firefighters().await;
    let mut state = state.write().await;
    if token.is_cancelled() {
        return;
    }
    match result {
        Ok(batch) => state.apply_firefighters(batch, Utc::now()),
        Err(e) => state.record_failure(&e, Utc::now()),
    }
}

async fn poll_alerts<B: Backend>(backend: Arc<B>, state: SharedState, token: CancellationToken) {
    let result = backend.alerts(AlertQuery::active()).await;
    let mut state = state.write().await;
    if token.is_cancelled() {
        return;
    }
    match result {
        Ok(alerts) => {
            state.apply_alerts(alerts, Utc::now(), Instant::now());
        }
        Err(e) => state.record_failure(&e, Utc::now()),
    }
}

async fn poll_beacons<B: Backend>(backend: Arc<B>, state: SharedState, token: CancellationToken) {
    let result = backend.beacons(None).await;
    let mut state = state.write().await;
    if token.is_cancelled() {
        return;
    }
    match result {
        Ok(beacons) => state.apply_beacons(beacons, Utc::now()),
        Err(e) => state.record_failure(&e, Utc::now()),
    }
}

async fn poll_building<B: Backend>(backend: Arc<B>, state: SharedState, token: CancellationToken) {
    let result = backend.building().await;
    let mut state = state.write().await;
    if token.is_cancelled() {
        return;
    }
    match result {
        Ok(building) => state.apply_building(building, Utc::now()),
        Err(e) => state.record_failure(&e, Utc::now()),
    }
}

/// Refresh the panels of whatever is selected right now.
async fn poll_details<B: Backend>(backend: Arc<B>, state: SharedState, token: CancellationToken) {
    let (firefighter, beacon) = {
        let state = state.read().await;
        let selection = state.selection();
        (selection.firefighter.clone(), selection.beacon.clone())
    };

    if let Some(id) = firefighter {
        let (vitals, proximity) = futures::join!(
            backend.firefighter_vitals(&id, DETAIL_VITALS_LIMIT),
            backend.firefighter_beacon(&id)
        );

        let mut state = state.write().await;
        if token.is_cancelled() {
            return;
        }
        let vitals = settle(&mut state, Resource::Vitals, vitals);
        let proximity = settle(&mut state, Resource::FirefighterBeacon, proximity);
        if vitals.is_some() || proximity.is_some() {
            state.apply_firefighter_detail(&id, vitals, proximity, Utc::now());
        }
    }

    if let Some(id) = beacon {
        let (record, occupants) = futures::join!(backend.beacon(&id), backend.beacon_firefighters(&id));

        let mut state = state.write().await;
        if token.is_cancelled() {
            return;
        }
        let record = settle(&mut state, Resource::Beacon, record);
        let occupants = settle(&mut state, Resource::BeaconFirefighters, occupants);
        if record.is_some() || occupants.is_some() {
            state.apply_beacon_detail(&id, record, occupants, Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Alert, Beacon, BeaconOccupant, Building, EntityId, FirefighterBeacon, FirefighterRecord, Vitals,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory backend with call counters and scripted failures
    #[derive(Default)]
    struct FakeBackend {
        firefighter_calls: AtomicUsize,
        vitals_calls: AtomicUsize,
        fail_first: usize,
        delay: Option<Duration>,
    }

    impl FakeBackend {
        fn calls(&self) -> usize {
            self.firefighter_calls.load(Ordering::SeqCst)
        }
    }

    impl Backend for FakeBackend {
        async fn firefighters(&self) -> Result<Vec<FirefighterRecord>, ClientError> {
            let call = self.firefighter_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if call < self.fail_first {
                return Err(ClientError::RequestFailed {
                    resource: Resource::Firefighters,
                    status: 503,
                });
            }
            Ok(serde_json::from_value(json!([
                {"id": 1, "name": "Jan", "on_mission": true,
                 "position": {"latitude": 52.0, "longitude": 21.0, "floor": 1},
                 "vitals": {"heart_rate": 90}}
            ]))
            .unwrap())
        }

        async fn alerts(&self, _query: AlertQuery) -> Result<Vec<Alert>, ClientError> {
            Ok(serde_json::from_value(json!([
                {"id": 1, "alert_type": "low_battery", "firefighter_id": 1,
                 "timestamp": "2024-05-01T10:00:00"}
            ]))
            .unwrap())
        }

        async fn beacons(&self, _floor: Option<i32>) -> Result<Vec<Beacon>, ClientError> {
            Err(ClientError::MalformedResponse {
                resource: Resource::Beacons,
            })
        }

        async fn building(&self) -> Result<Building, ClientError> {
            Ok(serde_json::from_value(json!({"floors": [{"index": 0, "name": "Parter"}]})).unwrap())
        }

        async fn firefighter_vitals(&self, _id: &EntityId, _limit: u32) -> Result<Vec<Vitals>, ClientError> {
            self.vitals_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Vitals {
                heart_rate: Some(88.0),
                ..Default::default()
            }])
        }

        async fn firefighter_beacon(&self, _id: &EntityId) -> Result<FirefighterBeacon, ClientError> {
            Err(ClientError::Timeout {
                resource: Resource::FirefighterBeacon,
            })
        }

        async fn beacon(&self, _id: &EntityId) -> Result<Beacon, ClientError> {
            Err(ClientError::RequestFailed {
                resource: Resource::Beacon,
                status: 404,
            })
        }

        async fn beacon_firefighters(&self, _id: &EntityId) -> Result<Vec<BeaconOccupant>, ClientError> {
            Ok(Vec::new())
        }
    }

    fn fast_settings() -> PollSettings {
        PollSettings {
            firefighters_ms: 20,
            alerts_ms: 20,
            beacons_ms: 20,
            details_ms: 20,
            building_ms: 1000,
        }
    }

    fn shared_state() -> SharedState {
        Arc::new(RwLock::new(AppState::default()))
    }

    #[actix_web::test]
    async fn test_poll_results_reach_state() {
        let backend = Arc::new(FakeBackend::default());
        let state = shared_state();

        let handle = PollScheduler::new(backend.clone(), state.clone(), fast_settings()).start();
        actix_rt::time::sleep(Duration::from_millis(120)).await;
        handle.shutdown().await;

        let state = state.read().await;
        assert_eq!(state.store().len(), 1);
        assert_eq!(state.alerts().len(), 1);
        assert!(state.building().is_some());
        assert!(backend.calls() >= 3);
    }

    #[actix_web::test]
    async fn test_failures_do_not_stop_polling() {
        let backend = Arc::new(FakeBackend {
            fail_first: 2,
            ..Default::default()
        });
        let state = shared_state();

        let handle = PollScheduler::new(backend.clone(), state.clone(), fast_settings()).start();
        actix_rt::time::sleep(Duration::from_millis(150)).await;
        handle.shutdown().await;

        assert!(backend.calls() > 2);
        let state = state.read().await;
        assert_eq!(state.store().len(), 1);

        let beacons = state
            .sync_reports()
            .into_iter()
            .find(|r| r.resource == Resource::Beacons)
            .unwrap();
        assert!(beacons.consecutive_failures >= 2);
        assert_eq!(beacons.error_kind, Some("malformed_response"));
    }

    #[actix_web::test]
    async fn test_cancel_stops_timers() {
        let backend = Arc::new(FakeBackend::default());
        let state = shared_state();

        let handle = PollScheduler::new(backend.clone(), state.clone(), fast_settings()).start();
        actix_rt::time::sleep(Duration::from_millis(60)).await;
        handle.shutdown().await;

        let calls = backend.calls();
        actix_rt::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(backend.calls(), calls);
    }

    #[actix_web::test]
    async fn test_late_response_after_cancel_is_discarded() {
        let backend = Arc::new(FakeBackend {
            delay: Some(Duration::from_millis(80)),
            ..Default::default()
        });
        let state = shared_state();

        let handle = PollScheduler::new(backend.clone(), state.clone(), fast_settings()).start();
        actix_rt::time::sleep(Duration::from_millis(30)).await;
        assert!(backend.calls() >= 1);
        drop(handle);

        actix_rt::time::sleep(Duration::from_millis(150)).await;
        assert!(state.read().await.store().is_empty());
    }

    #[actix_web::test]
    async fn test_details_follow_selection() {
        let backend = Arc::new(FakeBackend::default());
        let state = shared_state();

        let handle = PollScheduler::new(backend.clone(), state.clone(), fast_settings()).start();
        actix_rt::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(backend.vitals_calls.load(Ordering::SeqCst), 0);

        state.write().await.select_firefighter(Some(EntityId::from(1)));
        actix_rt::time::sleep(Duration::from_millis(80)).await;
        handle.shutdown().await;

        let state = state.read().await;
        let detail = state.firefighter_detail().unwrap();
        assert_eq!(detail.vitals_history.len(), 1);
        assert!(detail.proximity.is_none());
        assert_eq!(state.selection().floor, 1);
    }
}
