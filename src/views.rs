//! Read-only projections of the synchronized model
//!
//! Map, mission list, teams, alert list, roster and banner as served to the
//! dashboard. Nothing here mutates the cache; operator selection lives in
//! [`Selection`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::alerts::{prioritize, select_banner};
use crate::coords::{GeoBounds, GpsReference, LatLon, LocalBounds, LocalPoint};
use crate::models::{
    Alert, Beacon, Building, EntityId, Firefighter, Severity, BEACON_RADIUS_M,
};
use crate::state::AppState;
use crate::store::EntityStore;

/// Alerts shown per page
pub const ALERTS_PER_PAGE: u32 = 20;

/// Color used when a firefighter has no team
pub const NO_TEAM_COLOR: &str = "#6c757d";

const TEAM_PALETTE: &[(&str, &str)] = &[
    ("rit", "#dc3545"),
    ("engine 1", "#0d6efd"),
    ("engine 2", "#198754"),
    ("engine 3", "#ffc107"),
    ("ladder 1", "#fd7e14"),
    ("ladder 2", "#6f42c1"),
    ("rescue 1", "#20c997"),
    ("rescue 2", "#e91e63"),
    ("squad 1", "#00bcd4"),
    ("squad 2", "#795548"),
];

/// Deterministic display color for a team label
pub fn team_color(team: Option<&str>) -> String {
    let Some(team) = team.map(str::trim).filter(|t| !t.is_empty()) else {
        return NO_TEAM_COLOR.to_string();
    };

    let lower = team.to_lowercase();
    if let Some((_, color)) = TEAM_PALETTE.iter().find(|(name, _)| *name == lower) {
        return color.to_string();
    }

    let hash = lower
        .chars()
        .fold(0u32, |h, c| h.wrapping_mul(31).wrapping_add(c as u32));
    format!("hsl({}, 70%, 50%)", hash % 360)
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Team filter for the mission list and the map
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TeamFilter {
    #[default]
    All,
    NoTeam,
    Named(String),
}

impl TeamFilter {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" | "all" => TeamFilter::All,
            "none" => TeamFilter::NoTeam,
            team => TeamFilter::Named(team.to_string()),
        }
    }

    pub fn matches(&self, firefighter: &Firefighter) -> bool {
        match self {
            TeamFilter::All => true,
            TeamFilter::NoTeam => firefighter.team_label().is_none(),
            TeamFilter::Named(team) => firefighter.team_label() == Some(team.as_str()),
        }
    }
}

impl Serialize for TeamFilter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TeamFilter::All => serializer.serialize_str("all"),
            TeamFilter::NoTeam => serializer.serialize_str("none"),
            TeamFilter::Named(team) => serializer.serialize_str(team),
        }
    }
}

/// Operator view state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub firefighter: Option<EntityId>,
    pub beacon: Option<EntityId>,
    pub floor: i32,
    pub team: TeamFilter,
    pub show_beacons: bool,
    pub show_history: bool,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            firefighter: None,
            beacon: None,
            floor: 0,
            team: TeamFilter::All,
            show_beacons: true,
            show_history: true,
        }
    }
}

impl Selection {
    /// Select (or clear) a firefighter; the map follows them to their floor.
    ///
    /// Returns whether the current floor changed.
    pub fn select_firefighter(&mut self, id: Option<EntityId>, store: &EntityStore) -> bool {
        let floor = id
            .as_ref()
            .and_then(|id| store.firefighter(id))
            .and_then(|f| f.position.as_ref())
            .map(|p| p.floor);
        self.firefighter = id;

        match floor {
            Some(floor) if floor != self.floor => {
                self.floor = floor;
                true
            }
            _ => false,
        }
    }
}

/// Presence in cache is not visibility: only firefighters strictly on
/// mission are shown.
pub fn is_visible(firefighter: &Firefighter) -> bool {
    firefighter.is_on_mission()
}

// ---------------------------------------------------------------------------
// Map
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirefighterMarker {
    pub id: EntityId,
    pub name: String,
    pub team: Option<String>,
    pub color: String,
    pub position: LatLon,
    pub selected: bool,
    pub heart_rate: Option<f64>,
    pub battery_level: Option<f64>,
}

/// Prior position of the selected firefighter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrailDot {
    pub id: EntityId,
    pub position: LatLon,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeaconMarker {
    pub id: EntityId,
    pub name: String,
    pub position: LatLon,
    pub radius_m: f64,
    pub online: bool,
    pub battery_percent: Option<f64>,
    pub signal_quality: Option<f64>,
    pub tags_in_range: u32,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryMarker {
    pub name: Option<String>,
    pub position: LatLon,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneOverlay {
    pub name: Option<String>,
    pub zone_type: Option<String>,
    pub bounds: GeoBounds,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildingOverlay {
    pub name: Option<String>,
    pub outline: Option<GeoBounds>,
    pub entry_points: Vec<EntryMarker>,
    pub hazard_zones: Vec<ZoneOverlay>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    pub floor: i32,
    pub floor_name: Option<String>,
    pub center: Option<LatLon>,
    pub building: Option<BuildingOverlay>,
    pub firefighters: Vec<FirefighterMarker>,
    pub trail: Option<TrailDot>,
    pub beacons: Vec<BeaconMarker>,
}

fn bounds_plottable(bounds: &GeoBounds) -> bool {
    bounds.south_west.is_plottable() && bounds.north_east.is_plottable()
}

fn building_overlay(building: &Building, reference: &GpsReference, floor: i32) -> BuildingOverlay {
    let outline = building
        .dimensions
        .map(|d| {
            reference.bounds_to_gps(&LocalBounds {
                x1: 0.0,
                y1: 0.0,
                x2: d.width_m,
                y2: d.depth_m,
            })
        })
        .filter(bounds_plottable);

    let entry_points = building
        .entry_points
        .iter()
        .filter(|e| e.floor == floor)
        .map(|e| EntryMarker {
            name: e.name.clone(),
            position: reference.to_gps(e.position.x, e.position.y),
        })
        .filter(|e| e.position.is_plottable())
        .collect();

    let hazard_zones = building
        .hazard_zones
        .iter()
        .filter(|z| z.floor == floor)
        .map(|z| ZoneOverlay {
            name: z.name.clone(),
            zone_type: z.zone_type.clone(),
            bounds: reference.bounds_to_gps(&z.bounds),
        })
        .filter(|z| bounds_plottable(&z.bounds))
        .collect();

    BuildingOverlay {
        name: building.name.clone(),
        outline,
        entry_points,
        hazard_zones,
    }
}

/// Project the cache onto the current floor.
pub fn map_view(
    store: &EntityStore,
    selection: &Selection,
    beacons: &[Beacon],
    building: Option<&Building>,
) -> MapView {
    let floor = selection.floor;

    let firefighters = store
        .firefighters()
        .filter(|f| is_visible(f) && selection.team.matches(f))
        .filter_map(|f| {
            let position = f.position.as_ref().filter(|p| p.floor == floor)?;
            let point = position.lat_lon();
            if !point.is_plottable() {
                return None;
            }
            Some(FirefighterMarker {
                id: f.id.clone(),
                name: f.display_name().to_string(),
                team: f.team_label().map(str::to_string),
                color: team_color(f.team_label()),
                position: point,
                selected: selection.firefighter.as_ref() == Some(&f.id),
                heart_rate: f.heart_rate(),
                battery_level: f.vitals.as_ref().and_then(|v| v.battery_level),
            })
        })
        .collect();

    let trail = selection
        .firefighter
        .as_ref()
        .filter(|_| selection.show_history)
        .filter(|id| store.firefighter(id).is_some_and(is_visible))
        .and_then(|id| {
            let previous = store.position_track(id)?.previous.as_ref()?;
            let point = previous.lat_lon();
            (previous.floor == floor && point.is_plottable()).then(|| TrailDot {
                id: id.clone(),
                position: point,
            })
        });

    let beacons = if selection.show_beacons {
        beacons
            .iter()
            .filter(|b| b.floor == floor)
            .filter_map(|b| {
                Some(BeaconMarker {
                    id: b.id.clone(),
                    name: b.display_name().to_string(),
                    position: b.lat_lon()?,
                    radius_m: BEACON_RADIUS_M,
                    online: b.is_online,
                    battery_percent: b.battery_percent,
                    signal_quality: b.signal_quality,
                    tags_in_range: b.tags_in_range,
                    selected: selection.beacon.as_ref() == Some(&b.id),
                })
            })
            .collect()
    } else {
        Vec::new()
    };

    MapView {
        floor,
        floor_name: building.and_then(|b| b.floor_name(floor)).map(str::to_string),
        center: building.and_then(|b| b.center).filter(LatLon::is_plottable),
        building: building.and_then(|b| b.reference().map(|r| building_overlay(b, r, floor))),
        firefighters,
        trail,
        beacons,
    }
}

// ---------------------------------------------------------------------------
// Lists
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissionEntry {
    pub id: EntityId,
    pub name: String,
    pub badge_number: Option<String>,
    pub team: Option<String>,
    pub color: String,
    pub floor: Option<i32>,
    pub heart_rate: Option<f64>,
    pub battery_level: Option<f64>,
    pub time_stationary: Option<f64>,
    pub selected: bool,
}

/// Visible firefighters passing the team filter, by name
pub fn mission_list(store: &EntityStore, selection: &Selection) -> Vec<MissionEntry> {
    let mut entries: Vec<MissionEntry> = store
        .firefighters()
        .filter(|f| is_visible(f) && selection.team.matches(f))
        .map(|f| MissionEntry {
            id: f.id.clone(),
            name: f.display_name().to_string(),
            badge_number: f.badge_number.clone(),
            team: f.team_label().map(str::to_string),
            color: team_color(f.team_label()),
            floor: f.position.as_ref().map(|p| p.floor),
            heart_rate: f.heart_rate(),
            battery_level: f.vitals.as_ref().and_then(|v| v.battery_level),
            time_stationary: f.time_stationary,
            selected: selection.firefighter.as_ref() == Some(&f.id),
        })
        .collect();

    entries.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    entries
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamSummary {
    pub team: Option<String>,
    pub color: String,
    pub members: usize,
}

/// Member count per team among visible firefighters; no-team group last.
pub fn teams_summary(store: &EntityStore) -> Vec<TeamSummary> {
    let mut teams: Vec<TeamSummary> = Vec::new();

    for firefighter in store.firefighters().filter(|f| is_visible(f)) {
        let label = firefighter.team_label();
        match teams.iter_mut().find(|t| t.team.as_deref() == label) {
            Some(summary) => summary.members += 1,
            None => teams.push(TeamSummary {
                team: label.map(str::to_string),
                color: team_color(label),
                members: 1,
            }),
        }
    }

    teams.sort_by(|a, b| match (&a.team, &b.team) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    teams
}

/// One page of a list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: u32,
    pub total_pages: u32,
}

/// `page` is 1-based; pages past the end are empty.
pub fn paginate<T>(items: Vec<T>, page: u32, limit: u32) -> Page<T> {
    let total = items.len();
    let limit = limit.max(1);
    let page = page.max(1);
    let start = ((page - 1) as usize).saturating_mul(limit as usize);

    let data = items.into_iter().skip(start).take(limit as usize).collect();

    Page {
        data,
        page,
        limit,
        total: total as u32,
        total_pages: total.div_ceil(limit as usize) as u32,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSort {
    #[default]
    Timestamp,
    Severity,
    Type,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEntry {
    pub id: EntityId,
    pub key: String,
    pub alert_type: String,
    pub code: String,
    pub severity: Severity,
    pub description: String,
    pub firefighter_id: Option<EntityId>,
    pub firefighter_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
}

impl AlertEntry {
    pub fn new(alert: &Alert, store: &EntityStore) -> Self {
        Self {
            id: alert.id.clone(),
            key: alert.key(),
            alert_type: alert.alert_type.as_str().to_string(),
            code: alert.alert_type.code(),
            severity: alert.severity(),
            description: alert.description().into_owned(),
            firefighter_id: alert.firefighter_id.clone(),
            firefighter_name: alert.firefighter_id.as_ref().map(|id| store.display_name(id)),
            timestamp: alert.timestamp,
            acknowledged: alert.acknowledged,
        }
    }
}

/// Active alerts filtered by severity, sorted, 20 per page.
pub fn alert_page(
    alerts: &[Alert],
    store: &EntityStore,
    severity: Option<Severity>,
    sort: AlertSort,
    order: SortOrder,
    page: u32,
) -> Page<AlertEntry> {
    let mut selected: Vec<&Alert> = prioritize(alerts)
        .into_iter()
        .filter(|a| severity.map_or(true, |s| a.severity() == s))
        .collect();

    selected.sort_by(|a, b| {
        let primary = match sort {
            AlertSort::Timestamp => a.timestamp.cmp(&b.timestamp),
            // Critical ranks above warning
            AlertSort::Severity => b.severity().cmp(&a.severity()),
            AlertSort::Type => a.alert_type.as_str().cmp(b.alert_type.as_str()),
        };
        order
            .apply(primary)
            .then_with(|| b.timestamp.cmp(&a.timestamp))
    });

    let entries = selected
        .into_iter()
        .map(|a| AlertEntry::new(a, store))
        .collect();
    paginate(entries, page, ALERTS_PER_PAGE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionFilter {
    #[default]
    All,
    OnMission,
    OffMission,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RosterSort {
    #[default]
    Name,
    Badge,
    Team,
}

/// Parameters for the all-firefighters roster
#[derive(Debug, Clone, Default)]
pub struct RosterQuery {
    pub search: Option<String>,
    pub mission: MissionFilter,
    pub sort: RosterSort,
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterEntry {
    pub id: EntityId,
    pub name: String,
    pub badge_number: Option<String>,
    pub team: Option<String>,
    pub color: String,
    pub on_mission: bool,
}

fn search_matches(firefighter: &Firefighter, needle: &str) -> bool {
    let hay = [
        Some(firefighter.name.as_str()),
        firefighter.badge_number.as_deref(),
        firefighter.team_label(),
        Some(firefighter.id.as_str()),
    ];
    hay.iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(needle))
}

pub fn roster_page(firefighters: &[Firefighter], query: &RosterQuery, page: u32, limit: u32) -> Page<RosterEntry> {
    let needle = query
        .search
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    let mut matched: Vec<&Firefighter> = firefighters
        .iter()
        .filter(|f| match query.mission {
            MissionFilter::All => true,
            MissionFilter::OnMission => f.is_on_mission(),
            MissionFilter::OffMission => !f.is_on_mission(),
        })
        .filter(|f| needle.as_deref().map_or(true, |n| search_matches(f, n)))
        .collect();

    matched.sort_by(|a, b| {
        let primary = match query.sort {
            RosterSort::Name => a.display_name().to_lowercase().cmp(&b.display_name().to_lowercase()),
            RosterSort::Badge => a.badge_number.cmp(&b.badge_number),
            RosterSort::Team => a.team_label().cmp(&b.team_label()),
        };
        query.order.apply(primary).then_with(|| a.id.cmp(&b.id))
    });

    let entries = matched
        .into_iter()
        .map(|f| RosterEntry {
            id: f.id.clone(),
            name: f.display_name().to_string(),
            badge_number: f.badge_number.clone(),
            team: f.team_label().map(str::to_string),
            color: team_color(f.team_label()),
            on_mission: f.is_on_mission(),
        })
        .collect();
    paginate(entries, page, limit)
}

// ---------------------------------------------------------------------------
// Banner and snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Banner {
    #[serde(flatten)]
    pub alert: AlertEntry,
    /// Firefighter position in building meters, when the reference is known
    pub local_position: Option<LocalPoint>,
    pub floor: Option<i32>,
}

pub fn banner(alerts: &[Alert], store: &EntityStore, building: Option<&Building>) -> Option<Banner> {
    let alert = select_banner(alerts)?;
    let position = alert
        .firefighter_id
        .as_ref()
        .and_then(|id| store.firefighter(id))
        .and_then(|f| f.position.as_ref());

    let local_position = position.and_then(|p| {
        let reference = building?.reference()?;
        let local = reference.to_local(p.lat_lon());
        (local.x.is_finite() && local.y.is_finite()).then_some(local)
    });

    Some(Banner {
        alert: AlertEntry::new(alert, store),
        local_position,
        floor: position.map(|p| p.floor),
    })
}

/// Everything a dashboard needs to redraw
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub revision: u64,
    pub generated_at: DateTime<Utc>,
    pub selection: Selection,
    pub floors: Vec<crate::models::Floor>,
    pub map: MapView,
    pub mission: Vec<MissionEntry>,
    pub teams: Vec<TeamSummary>,
    pub banner: Option<Banner>,
    pub active_alerts: usize,
    pub critical_alerts: usize,
    pub tts_enabled: bool,
    pub speaking: bool,
}

impl DashboardSnapshot {
    pub fn build(state: &AppState) -> Self {
        let store = state.store();
        let selection = state.selection();
        let building = state.building();
        let active = prioritize(state.alerts());

        Self {
            revision: state.revision(),
            generated_at: Utc::now(),
            selection: selection.clone(),
            floors: building.map(|b| b.floors.clone()).unwrap_or_default(),
            map: map_view(store, selection, state.beacons(), building),
            mission: mission_list(store, selection),
            teams: teams_summary(store),
            banner: banner(state.alerts(), store, building),
            active_alerts: active.len(),
            critical_alerts: active
                .iter()
                .filter(|a| a.severity() == Severity::Critical)
                .count(),
            tts_enabled: state.announcer().is_enabled(),
            speaking: state.announcer().is_speaking(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FirefighterRecord;
    use serde_json::json;

    fn store_with(records: serde_json::Value) -> EntityStore {
        let batch: Vec<FirefighterRecord> = serde_json::from_value(records).unwrap();
        let mut store = EntityStore::new();
        store.merge_firefighters(batch, Utc::now());
        store
    }

    fn building() -> Building {
        serde_json::from_value(json!({
            "name": "Magazyn A",
            "floors": [{"index": 0, "name": "Parter"}, {"index": 1, "name": "Piętro 1"}],
            "center": {"lat": 52.0001, "lon": 21.0002},
            "dimensions": {"width_m": 40.0, "depth_m": 20.0},
            "gps_reference": {
                "origin": {"lat": 52.0, "lon": 21.0},
                "scale_lat_m_per_deg": 111000.0,
                "scale_lon_m_per_deg": 111000.0
            },
            "entry_points": [{"name": "Brama", "floor": 0, "position": {"x": 0.0, "y": 10.0}}],
            "hazard_zones": [{"name": "Chemia", "type": "chemical", "floor": 1,
                              "bounds": {"x1": 30.0, "y1": 15.0, "x2": 20.0, "y2": 5.0}}]
        }))
        .unwrap()
    }

    #[test]
    fn test_team_colors() {
        assert_eq!(team_color(Some("RIT")), "#dc3545");
        assert_eq!(team_color(Some(" engine 1 ")), "#0d6efd");
        assert_eq!(team_color(None), NO_TEAM_COLOR);
        assert_eq!(team_color(Some("   ")), NO_TEAM_COLOR);

        let custom = team_color(Some("Drone Unit"));
        assert!(custom.starts_with("hsl("));
        assert_eq!(custom, team_color(Some("drone unit")));
    }

    #[test]
    fn test_visibility_requires_strict_true() {
        let store = store_with(json!([
            {"id": 1, "name": "A", "on_mission": true,
             "position": {"latitude": 52.0, "longitude": 21.0, "floor": 0}},
            {"id": 2, "name": "B", "on_mission": false,
             "position": {"latitude": 52.0, "longitude": 21.0, "floor": 0}},
            {"id": 3, "name": "C", "on_mission": 0,
             "position": {"latitude": 52.0, "longitude": 21.0, "floor": 0}},
            {"id": 4, "name": "D",
             "position": {"latitude": 52.0, "longitude": 21.0, "floor": 0}}
        ]));
        let selection = Selection::default();

        let map = map_view(&store, &selection, &[], None);
        let mission = mission_list(&store, &selection);

        assert_eq!(map.firefighters.len(), 1);
        assert_eq!(map.firefighters[0].id, EntityId::from(1));
        assert_eq!(mission.len(), 1);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_team_filter() {
        let store = store_with(json!([
            {"id": 1, "name": "A", "on_mission": true, "team": " RIT "},
            {"id": 2, "name": "B", "on_mission": true, "team": ""},
            {"id": 3, "name": "C", "on_mission": true, "team": "Engine 1"}
        ]));
        let mut selection = Selection::default();

        selection.team = TeamFilter::parse("RIT");
        assert_eq!(mission_list(&store, &selection).len(), 1);

        selection.team = TeamFilter::parse("none");
        let none = mission_list(&store, &selection);
        assert_eq!(none.len(), 1);
        assert_eq!(none[0].id, EntityId::from(2));

        selection.team = TeamFilter::parse("all");
        assert_eq!(mission_list(&store, &selection).len(), 3);
    }

    #[test]
    fn test_nan_positions_are_skipped() {
        let mut store = store_with(json!([{"id": 1, "name": "A", "on_mission": true}]));
        let record = FirefighterRecord {
            id: EntityId::from(1),
            position: Some(Some(crate::models::Position {
                latitude: f64::NAN,
                longitude: 21.0,
                floor: 0,
                timestamp: None,
            })),
            ..Default::default()
        };
        store.merge_firefighters(vec![record], Utc::now());

        let map = map_view(&store, &Selection::default(), &[], None);

        assert!(map.firefighters.is_empty());
    }

    #[test]
    fn test_beacons_on_floor_with_fixed_radius() {
        let beacons: Vec<Beacon> = serde_json::from_value(json!([
            {"id": 1, "name": "B1", "floor": 0, "latitude": 52.0, "longitude": 21.0, "is_online": true},
            {"id": 2, "name": "B2", "floor": 1, "latitude": 52.0, "longitude": 21.0},
            {"id": 3, "name": "B3", "floor": 0}
        ]))
        .unwrap();
        let store = EntityStore::new();
        let mut selection = Selection::default();

        let map = map_view(&store, &selection, &beacons, None);
        assert_eq!(map.beacons.len(), 1);
        assert_eq!(map.beacons[0].radius_m, 50.0);

        selection.show_beacons = false;
        assert!(map_view(&store, &selection, &beacons, None).beacons.is_empty());
    }

    #[test]
    fn test_building_overlay_filtered_by_floor() {
        let store = EntityStore::new();
        let building = building();
        let mut selection = Selection::default();

        let ground = map_view(&store, &selection, &[], Some(&building));
        let overlay = ground.building.unwrap();
        assert_eq!(overlay.entry_points.len(), 1);
        assert!(overlay.hazard_zones.is_empty());
        assert!(overlay.outline.is_some());
        assert_eq!(ground.floor_name.as_deref(), Some("Parter"));

        selection.floor = 1;
        let upper = map_view(&store, &selection, &[], Some(&building));
        let zone = &upper.building.unwrap().hazard_zones[0];
        assert!(zone.bounds.south_west.latitude < zone.bounds.north_east.latitude);
    }

    #[test]
    fn test_selection_defaults() {
        let selection = Selection::default();

        assert_eq!(selection.floor, 0);
        assert_eq!(selection.team, TeamFilter::All);
        assert!(selection.show_beacons);
        assert!(selection.show_history);
    }

    #[test]
    fn test_trail_only_for_selected_with_history() {
        let mut store = store_with(json!([
            {"id": 1, "name": "A", "on_mission": true,
             "position": {"latitude": 52.0, "longitude": 21.0, "floor": 0}}
        ]));
        let id = EntityId::from(1);
        let first = store.firefighter(&id).unwrap().position.clone().unwrap();
        store.record_position(&id, first);
        store.record_position(
            &id,
            crate::models::Position {
                latitude: 52.001,
                longitude: 21.0,
                floor: 0,
                timestamp: None,
            },
        );

        let mut selection = Selection::default();
        selection.firefighter = Some(id.clone());
        selection.show_history = false;
        assert!(map_view(&store, &selection, &[], None).trail.is_none());

        selection.show_history = true;
        let trail = map_view(&store, &selection, &[], None).trail.unwrap();
        assert_eq!(trail.position, LatLon::new(52.0, 21.0));
    }

    #[test]
    fn test_alert_page_filters_and_sorts() {
        let alerts: Vec<Alert> = serde_json::from_value(json!([
            {"id": 1, "alert_type": "low_battery", "timestamp": "2024-05-01T10:00:03"},
            {"id": 2, "alert_type": "man_down", "timestamp": "2024-05-01T10:00:01", "firefighter_id": 5},
            {"id": 3, "alert_type": "high_co", "timestamp": "2024-05-01T10:00:02"}
        ]))
        .unwrap();
        let store = EntityStore::new();

        let newest_first = alert_page(&alerts, &store, None, AlertSort::Timestamp, SortOrder::Desc, 1);
        let ids: Vec<&str> = newest_first.data.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3", "2"]);

        let critical = alert_page(
            &alerts,
            &store,
            Some(Severity::Critical),
            AlertSort::Timestamp,
            SortOrder::Asc,
            1,
        );
        let ids: Vec<&str> = critical.data.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
        assert_eq!(critical.data[0].firefighter_name.as_deref(), Some("5"));

        let by_severity = alert_page(&alerts, &store, None, AlertSort::Severity, SortOrder::Desc, 1);
        assert_eq!(by_severity.data[0].id.as_str(), "3");
        assert_eq!(by_severity.data[2].id.as_str(), "1");
    }

    #[test]
    fn test_alert_pages_of_twenty() {
        let alerts: Vec<Alert> = (0..45)
            .map(|i| {
                serde_json::from_value(json!({
                    "id": i, "alert_type": "low_battery",
                    "timestamp": format!("2024-05-01T10:{:02}:00", i)
                }))
                .unwrap()
            })
            .collect();
        let store = EntityStore::new();

        let third = alert_page(&alerts, &store, None, AlertSort::Timestamp, SortOrder::Desc, 3);

        assert_eq!(third.total, 45);
        assert_eq!(third.total_pages, 3);
        assert_eq!(third.data.len(), 5);
    }

    #[test]
    fn test_roster_search_and_sort() {
        let firefighters: Vec<Firefighter> = serde_json::from_value::<Vec<FirefighterRecord>>(json!([
            {"id": 1, "name": "Zofia", "badge_number": "FF-003", "on_mission": true},
            {"id": 2, "name": "adam", "badge_number": "FF-001", "team": "RIT"},
            {"id": 3, "name": "Marek", "badge_number": "FF-002", "team": "RIT", "on_mission": true}
        ]))
        .unwrap()
        .into_iter()
        .map(Firefighter::from)
        .collect();

        let query = RosterQuery {
            order: SortOrder::Asc,
            ..Default::default()
        };
        let page = roster_page(&firefighters, &query, 1, 10);
        let names: Vec<&str> = page.data.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["adam", "Marek", "Zofia"]);

        let query = RosterQuery {
            search: Some(" rit ".into()),
            mission: MissionFilter::OnMission,
            order: SortOrder::Asc,
            ..Default::default()
        };
        let page = roster_page(&firefighters, &query, 1, 10);
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].name, "Marek");
    }

    #[test]
    fn test_paginate_past_end() {
        let page = paginate(vec![1, 2, 3], 5, 2);
        assert!(page.data.is_empty());
        assert_eq!(page.total_pages, 2);
    }

    #[test]
    fn test_banner_resolves_name_and_local_position() {
        let store = store_with(json!([
            {"id": 7, "name": "Jan", "on_mission": true,
             "position": {"latitude": 52.000225, "longitude": 21.00036, "floor": 1}}
        ]));
        let alerts: Vec<Alert> = serde_json::from_value(json!([
            {"id": 1, "alert_type": "low_battery", "timestamp": "2024-05-01T10:00:05"},
            {"id": 2, "alert_type": "sos_pressed", "timestamp": "2024-05-01T10:00:01", "firefighter_id": 7}
        ]))
        .unwrap();
        let building = building();

        let banner = banner(&alerts, &store, Some(&building)).unwrap();

        assert_eq!(banner.alert.id, EntityId::from(2));
        assert_eq!(banner.alert.firefighter_name.as_deref(), Some("Jan"));
        assert_eq!(banner.floor, Some(1));
        let local = banner.local_position.unwrap();
        assert!((local.x - 39.96).abs() < 0.1);
        assert!((local.y - 24.975).abs() < 0.1);
    }

    #[test]
    fn test_selecting_firefighter_switches_floor_end_to_end() {
        let store = store_with(json!([
            {"id": "F1", "name": "Pierwszy", "on_mission": true,
             "position": {"latitude": 52.0001, "longitude": 21.0001, "floor": 1}},
            {"id": "F2", "name": "Drugi", "on_mission": false,
             "position": {"latitude": 52.0001, "longitude": 21.0001, "floor": 0}}
        ]));
        let building = building();
        let mut selection = Selection::default();
        assert_eq!(selection.floor, 0);

        let ground = map_view(&store, &selection, &[], Some(&building));
        assert!(ground.firefighters.is_empty());

        assert!(selection.select_firefighter(Some(EntityId::from("F1")), &store));
        assert_eq!(selection.floor, 1);

        let upper = map_view(&store, &selection, &[], Some(&building));
        assert_eq!(upper.firefighters.len(), 1);
        assert_eq!(upper.firefighters[0].id, EntityId::from("F1"));
        assert!(upper.firefighters[0].selected);

        for floor in [0, 1] {
            selection.floor = floor;
            let map = map_view(&store, &selection, &[], Some(&building));
            assert!(map.firefighters.iter().all(|m| m.id != EntityId::from("F2")));
        }
    }
}
