//! Application state management
//!
//! Central state container for the dashboard: the entity cache, the latest
//! alert and beacon sets, building, operator selection, detail panels, the
//! speech announcer and per-resource sync status. Shared as
//! `Arc<RwLock<AppState>>` between HTTP handlers, poll tasks and WebSocket
//! sessions.

use actix::Recipient;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::alerts::{AlertAnnouncer, SpeechChannel, SpeechCommand, SpeechEvent};
use crate::client::Resource;
use crate::config::SpeechSettings;
use crate::error::ClientError;
use crate::models::{
    Alert, Beacon, BeaconOccupant, Building, EntityId, FirefighterBeacon, FirefighterRecord, Vitals,
};
use crate::store::EntityStore;
use crate::views::{Selection, TeamFilter};

/// Sync health of one polled resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub resource: Resource,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub error_kind: Option<&'static str>,
    pub consecutive_failures: u32,
}

impl SyncReport {
    fn new(resource: Resource) -> Self {
        Self {
            resource,
            last_success: None,
            last_failure: None,
            last_error: None,
            error_kind: None,
            consecutive_failures: 0,
        }
    }
}

/// Detail panel for the selected firefighter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirefighterDetail {
    pub firefighter_id: EntityId,
    pub vitals_history: Vec<Vitals>,
    pub proximity: Option<FirefighterBeacon>,
    pub fetched_at: DateTime<Utc>,
}

/// Detail panel for the selected beacon
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeaconDetail {
    pub beacon_id: EntityId,
    pub beacon: Option<Beacon>,
    pub occupants: Vec<BeaconOccupant>,
    pub fetched_at: DateTime<Utc>,
}

/// Operator toggles; absent fields are left unchanged
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Toggles {
    pub show_beacons: Option<bool>,
    pub show_history: Option<bool>,
    pub tts_enabled: Option<bool>,
}

/// Central application state
pub struct AppState {
    store: EntityStore,
    alerts: Vec<Alert>,
    beacons: Vec<Beacon>,
    building: Option<Building>,
    selection: Selection,
    firefighter_detail: Option<FirefighterDetail>,
    beacon_detail: Option<BeaconDetail>,
    announcer: AlertAnnouncer<SpeechChannel>,
    sync: BTreeMap<Resource, SyncReport>,
    /// Bumped on every observable change; sessions push a snapshot when it moves
    revision: u64,
    start_time: DateTime<Utc>,
    connected_clients: Vec<String>,
}

impl AppState {
    /// Create new application state
    pub fn new(speech: &SpeechSettings) -> Self {
        info!(
            tts_enabled = speech.enabled,
            cooldown_ms = speech.cooldown_ms,
            "Initializing application state"
        );
        Self {
            store: EntityStore::new(),
            alerts: Vec::new(),
            beacons: Vec::new(),
            building: None,
            selection: Selection::default(),
            firefighter_detail: None,
            beacon_detail: None,
            announcer: AlertAnnouncer::new(
                SpeechChannel::new(),
                speech.enabled,
                Duration::from_millis(speech.cooldown_ms),
                speech.lang.clone(),
            ),
            sync: BTreeMap::new(),
            revision: 0,
            start_time: Utc::now(),
            connected_clients: Vec::new(),
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    // -----------------------------------------------------------------------
    // Poll results
    // -----------------------------------------------------------------------

    /// Merge a firefighter batch and feed the trend and trail caches.
    pub fn apply_firefighters(&mut self, batch: Vec<FirefighterRecord>, now: DateTime<Utc>) {
        let ids: Vec<EntityId> = batch.iter().map(|r| r.id.clone()).collect();
        self.store.merge_firefighters(batch, now);

        for id in &ids {
            let Some(firefighter) = self.store.firefighter(id) else {
                continue;
            };
            let position = firefighter.position.clone();
            let heart_rate = firefighter
                .vitals
                .as_ref()
                .and_then(|v| v.heart_rate.map(|hr| (hr, v.timestamp.unwrap_or(now))));

            if let Some(position) = position {
                self.store.record_position(id, position);
            }
            if let Some((value, timestamp)) = heart_rate {
                self.store.record_heart_rate(id, value, timestamp);
            }
        }

        self.record_success(Resource::Firefighters, now);
        self.touch();
    }

    /// Replace the active alert set and re-run the announcer.
    pub fn apply_alerts(&mut self, alerts: Vec<Alert>, now: DateTime<Utc>, clock: Instant) -> Option<SpeechCommand> {
        self.alerts = alerts;
        let store = &self.store;
        let spoken = self
            .announcer
            .evaluate(&self.alerts, |id| Some(store.display_name(id)), clock);

        self.record_success(Resource::Alerts, now);
        self.touch();
        spoken
    }

    pub fn apply_beacons(&mut self, beacons: Vec<Beacon>, now: DateTime<Utc>) {
        self.beacons = beacons;
        self.record_success(Resource::Beacons, now);
        self.touch();
    }

    /// Store the building; the current floor snaps to a known floor.
    pub fn apply_building(&mut self, building: Building, now: DateTime<Utc>) {
        if !building.floors.is_empty() && !building.has_floor(self.selection.floor) {
            if let Some(lowest) = building.floors.iter().map(|f| f.index).min() {
                debug!(floor = lowest, "Current floor not in building, switching");
                self.selection.floor = lowest;
            }
        }
        self.building = Some(building);
        self.record_success(Resource::Building, now);
        self.touch();
    }

    /// Apply detail results only if the same firefighter is still selected.
    pub fn apply_firefighter_detail(
        &mut self,
        id: &EntityId,
        vitals_history: Option<Vec<Vitals>>,
        proximity: Option<FirefighterBeacon>,
        now: DateTime<Utc>,
    ) -> bool {
        if self.selection.firefighter.as_ref() != Some(id) {
            debug!(firefighter_id = %id, "Selection changed, dropping detail response");
            return false;
        }

        let detail = self.firefighter_detail.get_or_insert_with(|| FirefighterDetail {
            firefighter_id: id.clone(),
            vitals_history: Vec::new(),
            proximity: None,
            fetched_at: now,
        });
        if let Some(history) = vitals_history {
            detail.vitals_history = history;
        }
        if proximity.is_some() {
            detail.proximity = proximity;
        }
        detail.fetched_at = now;

        self.touch();
        true
    }

    /// Apply beacon detail only if the same beacon is still selected.
    pub fn apply_beacon_detail(
        &mut self,
        id: &EntityId,
        beacon: Option<Beacon>,
        occupants: Option<Vec<BeaconOccupant>>,
        now: DateTime<Utc>,
    ) -> bool {
        if self.selection.beacon.as_ref() != Some(id) {
            debug!(beacon_id = %id, "Selection changed, dropping detail response");
            return false;
        }

        let detail = self.beacon_detail.get_or_insert_with(|| BeaconDetail {
            beacon_id: id.clone(),
            beacon: None,
            occupants: Vec::new(),
            fetched_at: now,
        });
        if beacon.is_some() {
            detail.beacon = beacon;
        }
        if let Some(occupants) = occupants {
            detail.occupants = occupants;
        }
        detail.fetched_at = now;

        self.touch();
        true
    }

    pub fn record_success(&mut self, resource: Resource, now: DateTime<Utc>) {
        let report = self
            .sync
            .entry(resource)
            .or_insert_with(|| SyncReport::new(resource));
        report.last_success = Some(now);
        report.consecutive_failures = 0;
    }

    /// Note a failed cycle; cached data stays as it is.
    pub fn record_failure(&mut self, error: &ClientError, now: DateTime<Utc>) {
        let resource = error.resource();
        let report = self
            .sync
            .entry(resource)
            .or_insert_with(|| SyncReport::new(resource));
        report.last_failure = Some(now);
        report.last_error = Some(error.to_string());
        report.error_kind = Some(error.kind());
        report.consecutive_failures += 1;

        warn!(
            resource = %resource,
            error = %error,
            consecutive_failures = report.consecutive_failures,
            "Poll cycle failed"
        );
    }

    // -----------------------------------------------------------------------
    // Operator actions
    // -----------------------------------------------------------------------

    /// Select or clear a firefighter; returns whether the floor changed.
    pub fn select_firefighter(&mut self, id: Option<EntityId>) -> bool {
        if self.selection.firefighter != id {
            self.firefighter_detail = None;
        }
        let floor_changed = self.selection.select_firefighter(id, &self.store);
        self.touch();
        floor_changed
    }

    pub fn select_beacon(&mut self, id: Option<EntityId>) {
        if self.selection.beacon != id {
            self.beacon_detail = None;
        }
        self.selection.beacon = id;
        self.touch();
    }

    pub fn set_floor(&mut self, floor: i32) {
        self.selection.floor = floor;
        self.touch();
    }

    pub fn set_team_filter(&mut self, team: TeamFilter) {
        self.selection.team = team;
        self.touch();
    }

    pub fn apply_toggles(&mut self, toggles: Toggles) {
        if let Some(show) = toggles.show_beacons {
            self.selection.show_beacons = show;
        }
        if let Some(show) = toggles.show_history {
            self.selection.show_history = show;
        }
        if let Some(enabled) = toggles.tts_enabled {
            info!(enabled, "Speech announcements toggled");
            self.announcer.set_enabled(enabled);
        }
        self.touch();
    }

    /// Explicit full-session reset
    pub fn reset_session(&mut self) {
        info!("Resetting dashboard session");
        self.store.reset();
        self.alerts.clear();
        self.firefighter_detail = None;
        self.beacon_detail = None;
        self.selection = Selection::default();
        self.announcer.reset();
        self.touch();
    }

    // -----------------------------------------------------------------------
    // Speech
    // -----------------------------------------------------------------------

    pub fn subscribe_speech(&mut self, client_id: String, recipient: Recipient<SpeechEvent>) {
        self.announcer.synthesizer_mut().subscribe(client_id, recipient);
    }

    pub fn speech_finished(&mut self, key: &str) {
        self.announcer.on_finished(key);
        self.touch();
    }

    pub fn speech_failed(&mut self, key: &str, reason: &str) {
        self.announcer.on_failed(key, reason);
        self.touch();
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn beacons(&self) -> &[Beacon] {
        &self.beacons
    }

    pub fn building(&self) -> Option<&Building> {
        self.building.as_ref()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn firefighter_detail(&self) -> Option<&FirefighterDetail> {
        self.firefighter_detail.as_ref()
    }

    pub fn beacon_detail(&self) -> Option<&BeaconDetail> {
        self.beacon_detail.as_ref()
    }

    pub fn announcer(&self) -> &AlertAnnouncer<SpeechChannel> {
        &self.announcer
    }

    pub fn sync_reports(&self) -> Vec<SyncReport> {
        self.sync.values().cloned().collect()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        (Utc::now() - self.start_time).num_seconds().max(0) as u64
    }

    /// Register a new WebSocket client
    pub fn add_client(&mut self, client_id: String) {
        info!(client_id = %client_id, "WebSocket client connected");
        self.connected_clients.push(client_id);
    }

    /// Remove a WebSocket client and its speech subscription
    pub fn remove_client(&mut self, client_id: &str) {
        info!(client_id = %client_id, "WebSocket client disconnected");
        self.connected_clients.retain(|id| id != client_id);
        self.announcer.synthesizer_mut().unsubscribe(client_id);
    }

    /// Get count of connected clients
    pub fn client_count(&self) -> usize {
        self.connected_clients.len()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(&SpeechSettings::default())
    }
}
