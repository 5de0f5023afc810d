//! Data models for firefighters, beacons, alerts and the building
//!
//! Wire records are validated here at the client boundary (schema v1).
//! Partial firefighter records keep "absent" and "explicit null" apart:
//! an absent key leaves the cached field unchanged, an explicit `null`
//! clears it to unknown.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;

use crate::alerts::SpeechCommand;
use crate::coords::{GpsReference, LatLon, LocalBounds, LocalPoint};
use crate::views::DashboardSnapshot;

/// Display radius drawn around every beacon on the map, in meters
pub const BEACON_RADIUS_M: f64 = 50.0;

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

/// `absent -> None`, `null -> Some(None)`, `value -> Some(Some(value))`.
/// Use together with `#[serde(default)]`.
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    // The backend emits naive UTC ISO strings
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn de_timestamp<'de, D>(de: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(de)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}

fn de_opt_timestamp<'de, D>(de: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(de)?;
    match raw {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw))),
    }
}

/// Only JSON `true` means on mission; `null` is unknown.
fn de_mission_patch<'de, D>(de: D) -> Result<Option<Option<bool>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(de)?;
    Ok(Some(raw.map(|v| v == Value::Bool(true))))
}

fn de_count<'de, D>(de: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    // Older payloads send the list of tags instead of a count
    let raw = Option::<Value>::deserialize(de)?;
    Ok(match raw {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0).min(u32::MAX as u64) as u32,
        Some(Value::Array(items)) => items.len() as u32,
        _ => 0,
    })
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Stable entity identifier; the backend sends numbers, legacy feeds strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<i64> for EntityId {
    fn from(raw: i64) -> Self {
        Self(raw.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Text(String),
        }

        match RawId::deserialize(de)? {
            RawId::Int(n) => Ok(Self(n.to_string())),
            RawId::Text(s) if !s.trim().is_empty() => Ok(Self(s.trim().to_string())),
            RawId::Text(_) => Err(serde::de::Error::custom("empty identifier")),
        }
    }
}

// ---------------------------------------------------------------------------
// Firefighters
// ---------------------------------------------------------------------------

/// Last known location of a tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(alias = "lat")]
    pub latitude: f64,
    #[serde(alias = "lon")]
    pub longitude: f64,
    /// May be negative below ground
    pub floor: i32,
    #[serde(default, deserialize_with = "de_opt_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Position {
    pub fn lat_lon(&self) -> LatLon {
        LatLon::new(self.latitude, self.longitude)
    }
}

/// Last known vital signs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vitals {
    #[serde(alias = "heart_rate_bpm")]
    pub heart_rate: Option<f64>,
    pub battery_level: Option<f64>,
    pub scba_pressure: Option<f64>,
    pub temperature: Option<f64>,
    pub oxygen_level: Option<f64>,
    pub co_level: Option<f64>,
    pub motion_state: Option<String>,
    #[serde(deserialize_with = "de_opt_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Partial vitals as received in a poll response
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VitalsPatch {
    #[serde(default, alias = "heart_rate_bpm", deserialize_with = "double_option")]
    pub heart_rate: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub battery_level: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub scba_pressure: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub temperature: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub oxygen_level: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub co_level: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub motion_state: Option<Option<String>>,
    #[serde(default, deserialize_with = "de_patch_timestamp")]
    pub timestamp: Option<Option<DateTime<Utc>>>,
}

fn de_patch_timestamp<'de, D>(de: D) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
where
    D: Deserializer<'de>,
{
    de_opt_timestamp(de).map(Some)
}

/// True when both readings carry a timestamp and the incoming one is older.
pub fn is_stale(stored: Option<DateTime<Utc>>, incoming: Option<DateTime<Utc>>) -> bool {
    matches!((stored, incoming), (Some(stored), Some(incoming)) if incoming < stored)
}

fn patch<T>(slot: &mut Option<T>, incoming: Option<Option<T>>) {
    if let Some(value) = incoming {
        *slot = value;
    }
}

impl Vitals {
    /// Field-wise merge: absent keys keep the stored value.
    pub fn apply(&mut self, incoming: VitalsPatch) {
        patch(&mut self.heart_rate, incoming.heart_rate);
        patch(&mut self.battery_level, incoming.battery_level);
        patch(&mut self.scba_pressure, incoming.scba_pressure);
        patch(&mut self.temperature, incoming.temperature);
        patch(&mut self.oxygen_level, incoming.oxygen_level);
        patch(&mut self.co_level, incoming.co_level);
        patch(&mut self.motion_state, incoming.motion_state);
        patch(&mut self.timestamp, incoming.timestamp);
    }
}

/// Firefighter as held in the cache
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Firefighter {
    pub id: EntityId,
    pub name: String,
    pub badge_number: Option<String>,
    pub team: Option<String>,
    /// Tri-state; only `Some(true)` is visible
    pub on_mission: Option<bool>,
    pub position: Option<Position>,
    pub vitals: Option<Vitals>,
    pub time_stationary: Option<f64>,
}

impl Firefighter {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            badge_number: None,
            team: None,
            on_mission: None,
            position: None,
            vitals: None,
            time_stationary: None,
        }
    }

    pub fn is_on_mission(&self) -> bool {
        self.on_mission == Some(true)
    }

    /// Team label with surrounding whitespace removed; blank means no team.
    pub fn team_label(&self) -> Option<&str> {
        self.team
            .as_deref()
            .map(str::trim)
            .filter(|team| !team.is_empty())
    }

    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            self.id.as_str()
        } else {
            &self.name
        }
    }

    pub fn heart_rate(&self) -> Option<f64> {
        self.vitals.as_ref().and_then(|v| v.heart_rate)
    }

    /// Shallow merge of an incoming record.
    ///
    /// Position and vitals readings older than the cached ones are ignored.
    pub fn apply(&mut self, record: FirefighterRecord) {
        if let Some(name) = record.name {
            self.name = name;
        }
        patch(&mut self.badge_number, record.badge_number);
        patch(&mut self.team, record.team);
        patch(&mut self.on_mission, record.on_mission);
        match record.position {
            Some(Some(incoming))
                if is_stale(self.position.as_ref().and_then(|p| p.timestamp), incoming.timestamp) => {}
            other => patch(&mut self.position, other),
        }
        patch(&mut self.time_stationary, record.time_stationary);
        match record.vitals {
            None => {}
            Some(None) => self.vitals = None,
            Some(Some(incoming))
                if is_stale(
                    self.vitals.as_ref().and_then(|v| v.timestamp),
                    incoming.timestamp.flatten(),
                ) => {}
            Some(Some(incoming)) => self.vitals.get_or_insert_with(Vitals::default).apply(incoming),
        }
    }
}

impl From<FirefighterRecord> for Firefighter {
    fn from(record: FirefighterRecord) -> Self {
        let mut firefighter = Firefighter::new(record.id.clone(), String::new());
        firefighter.apply(record);
        firefighter
    }
}

/// Firefighter as received from a poll; any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FirefighterRecord {
    pub id: EntityId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub badge_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub team: Option<Option<String>>,
    #[serde(default, deserialize_with = "de_mission_patch")]
    pub on_mission: Option<Option<bool>>,
    #[serde(default, deserialize_with = "double_option")]
    pub position: Option<Option<Position>>,
    #[serde(default, deserialize_with = "double_option")]
    pub vitals: Option<Option<VitalsPatch>>,
    #[serde(default, deserialize_with = "double_option")]
    pub time_stationary: Option<Option<f64>>,
}

impl Default for EntityId {
    fn default() -> Self {
        Self(String::new())
    }
}

/// Minimal firefighter identity embedded in other payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirefighterSummary {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub badge_number: Option<String>,
}

/// One point of the heart-rate trend series
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeartRateSample {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Beacons
// ---------------------------------------------------------------------------

/// Fixed infrastructure node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beacon {
    pub id: EntityId,
    #[serde(default)]
    pub beacon_id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub floor: i32,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default, alias = "online")]
    pub is_online: bool,
    #[serde(default)]
    pub battery_percent: Option<f64>,
    #[serde(default)]
    pub signal_quality: Option<f64>,
    #[serde(default, deserialize_with = "de_count")]
    pub tags_in_range: u32,
    #[serde(default, deserialize_with = "de_opt_timestamp")]
    pub last_seen: Option<DateTime<Utc>>,
}

impl Beacon {
    pub fn lat_lon(&self) -> Option<LatLon> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(LatLon::new(lat, lon)).filter(LatLon::is_plottable),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            self.beacon_id.as_deref().unwrap_or(self.id.as_str())
        } else {
            &self.name
        }
    }
}

/// Closest beacon to a firefighter, as computed by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyBeacon {
    pub id: EntityId,
    #[serde(default)]
    pub beacon_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LastContact {
    #[serde(default, deserialize_with = "de_opt_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub seconds_ago: Option<f64>,
}

/// Beacon proximity panel for one firefighter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FirefighterBeacon {
    #[serde(default)]
    pub beacon: Option<NearbyBeacon>,
    #[serde(default)]
    pub time_stationary: f64,
    #[serde(default)]
    pub movement_status: Option<String>,
    #[serde(default)]
    pub vitals: Option<Vitals>,
    #[serde(default)]
    pub last_position: Option<Position>,
    #[serde(default)]
    pub last_contact: Option<LastContact>,
}

/// Firefighter currently in range of a beacon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeaconOccupant {
    pub firefighter: FirefighterSummary,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub vitals: Option<Vitals>,
    #[serde(default)]
    pub distance: Option<f64>,
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Sorts before `Warning`
    Critical,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" => Some(Severity::Critical),
            "warning" => Some(Severity::Warning),
            _ => None,
        }
    }
}

/// Known alert types; anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AlertKind {
    ManDown,
    SosPressed,
    HighHeartRate,
    LowBattery,
    ScbaLowPressure,
    ScbaCritical,
    BeaconOffline,
    TagOffline,
    HighCo,
    LowOxygen,
    ExplosiveGas,
    HighTemperature,
    Unknown(String),
}

impl AlertKind {
    pub fn as_str(&self) -> &str {
        match self {
            AlertKind::ManDown => "man_down",
            AlertKind::SosPressed => "sos_pressed",
            AlertKind::HighHeartRate => "high_heart_rate",
            AlertKind::LowBattery => "low_battery",
            AlertKind::ScbaLowPressure => "scba_low_pressure",
            AlertKind::ScbaCritical => "scba_critical",
            AlertKind::BeaconOffline => "beacon_offline",
            AlertKind::TagOffline => "tag_offline",
            AlertKind::HighCo => "high_co",
            AlertKind::LowOxygen => "low_oxygen",
            AlertKind::ExplosiveGas => "explosive_gas",
            AlertKind::HighTemperature => "high_temperature",
            AlertKind::Unknown(raw) => raw,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            AlertKind::ManDown
            | AlertKind::SosPressed
            | AlertKind::ScbaCritical
            | AlertKind::TagOffline
            | AlertKind::HighCo
            | AlertKind::LowOxygen
            | AlertKind::ExplosiveGas => Severity::Critical,
            AlertKind::HighHeartRate
            | AlertKind::LowBattery
            | AlertKind::ScbaLowPressure
            | AlertKind::BeaconOffline
            | AlertKind::HighTemperature
            | AlertKind::Unknown(_) => Severity::Warning,
        }
    }

    /// Operator-facing description (pl-PL)
    pub fn description(&self) -> Option<&'static str> {
        Some(match self {
            AlertKind::ManDown => "Bezruch >30s",
            AlertKind::SosPressed => "Przycisk SOS",
            AlertKind::HighHeartRate => "Tętno >180 bpm",
            AlertKind::LowBattery => "Bateria <20%",
            AlertKind::ScbaLowPressure => "Niskie ciśnienie SCBA",
            AlertKind::ScbaCritical => "Krytyczne ciśnienie SCBA",
            AlertKind::BeaconOffline => "Beacon nie odpowiada",
            AlertKind::TagOffline => "Tag strażaka offline",
            AlertKind::HighCo => "Wysokie CO",
            AlertKind::LowOxygen => "Niski O2",
            AlertKind::ExplosiveGas => "Gaz wybuchowy (LEL)",
            AlertKind::HighTemperature => "Wysoka temperatura",
            AlertKind::Unknown(_) => return None,
        })
    }

    /// `man_down` -> `MAN DOWN`
    pub fn code(&self) -> String {
        self.as_str().replace('_', " ").to_uppercase()
    }
}

impl From<String> for AlertKind {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "man_down" => AlertKind::ManDown,
            "sos_pressed" => AlertKind::SosPressed,
            "high_heart_rate" => AlertKind::HighHeartRate,
            "low_battery" => AlertKind::LowBattery,
            "scba_low_pressure" => AlertKind::ScbaLowPressure,
            "scba_critical" => AlertKind::ScbaCritical,
            "beacon_offline" => AlertKind::BeaconOffline,
            "tag_offline" => AlertKind::TagOffline,
            "high_co" => AlertKind::HighCo,
            "low_oxygen" => AlertKind::LowOxygen,
            "explosive_gas" => AlertKind::ExplosiveGas,
            "high_temperature" => AlertKind::HighTemperature,
            _ => AlertKind::Unknown(raw),
        }
    }
}

impl From<AlertKind> for String {
    fn from(kind: AlertKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Safety alert raised by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: EntityId,
    #[serde(alias = "type")]
    pub alert_type: AlertKind,
    #[serde(default)]
    pub firefighter_id: Option<EntityId>,
    /// Severity as labelled by the backend; display uses [`Alert::severity`].
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(deserialize_with = "de_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub acknowledged: bool,
}

impl Alert {
    pub fn severity(&self) -> Severity {
        self.alert_type.severity()
    }

    pub fn description(&self) -> Cow<'_, str> {
        match self.alert_type.description() {
            Some(text) => Cow::Borrowed(text),
            None => Cow::Owned(
                self.message
                    .clone()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| self.alert_type.as_str().to_string()),
            ),
        }
    }

    /// De-duplication key: the same id re-raised later is a new alert.
    pub fn key(&self) -> String {
        format!("{}-{}", self.id, self.timestamp.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Floor {
    #[serde(alias = "number")]
    pub index: i32,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width_m: f64,
    pub depth_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPoint {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub floor: i32,
    pub position: LocalPoint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardZone {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub zone_type: Option<String>,
    pub floor: i32,
    pub bounds: LocalBounds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub floors: Vec<Floor>,
    #[serde(default)]
    pub center: Option<LatLon>,
    #[serde(default)]
    pub dimensions: Option<Dimensions>,
    #[serde(default)]
    pub gps_reference: Option<GpsReference>,
    #[serde(default)]
    pub entry_points: Vec<EntryPoint>,
    #[serde(default)]
    pub hazard_zones: Vec<HazardZone>,
}

impl Building {
    /// Reference usable for coordinate conversion, if any
    pub fn reference(&self) -> Option<&GpsReference> {
        self.gps_reference.as_ref().filter(|r| r.is_valid())
    }

    pub fn has_floor(&self, index: i32) -> bool {
        self.floors.iter().any(|f| f.index == index)
    }

    pub fn floor_name(&self, index: i32) -> Option<&str> {
        self.floors
            .iter()
            .find(|f| f.index == index)
            .map(|f| f.name.as_str())
    }
}

// ---------------------------------------------------------------------------
// RFID / mission / export
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialPort {
    pub port: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfidScan {
    #[serde(default)]
    pub found: bool,
    #[serde(default)]
    pub firefighter: Option<FirefighterSummary>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionUpdate {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub firefighter: Option<FirefighterSummary>,
}

fn default_true() -> bool {
    true
}

/// Downloaded blackbox dump
#[derive(Debug, Clone, PartialEq)]
pub struct BlackboxExport {
    pub filename: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Service-facing messages
// ---------------------------------------------------------------------------

/// Messages pushed to dashboard WebSocket clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    /// Dashboard model changed
    Snapshot(Box<DashboardSnapshot>),
    /// Voice this announcement
    Speak(SpeechCommand),
    /// Stop any announcement in progress
    CancelSpeech,
    /// Connection acknowledgment
    Connected { client_id: String },
    /// Error message
    Error { message: String },
    /// Heartbeat/pong response
    Pong,
}

/// Messages received from dashboard WebSocket clients
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    /// Heartbeat/ping
    Ping,
    /// Browser finished voicing an announcement
    SpeechFinished { key: String },
    /// Browser could not voice an announcement
    SpeechFailed { key: String, reason: String },
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheck {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub connected_clients: usize,
    pub cached_firefighters: usize,
    pub active_alerts: usize,
    pub sync: Vec<crate::state::SyncReport>,
}
