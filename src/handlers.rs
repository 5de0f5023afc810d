//! HTTP request handlers
//!
//! REST projections of the synchronized dashboard model, operator actions,
//! and passthroughs for user-initiated backend calls.

use actix_web::{http::header, web, HttpRequest, HttpResponse, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::BackendClient;
use crate::error::{AppError, AppResult};
use crate::models::{
    Beacon, BeaconOccupant, EntityId, Firefighter, FirefighterSummary, HealthCheck, HeartRateSample,
    MissionUpdate, Severity,
};
use crate::state::{AppState, FirefighterDetail, Toggles};
use crate::store::{CachedFirefighter, PositionTrack};
use crate::validation::{validate_pagination, validate_request, BadgeRequest, RequestConstraints, ScanRequest};
use crate::views::{
    self, AlertSort, MissionFilter, RosterQuery, RosterSort, Selection, SortOrder, TeamFilter,
};
use crate::websocket::WsSession;

type SharedState = web::Data<Arc<RwLock<AppState>>>;

/// Configure all application routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            // Health check
            .route("/health", web::get().to(health_check))
            // Projections
            .route("/map", web::get().to(get_map))
            .route("/firefighters", web::get().to(get_mission_list))
            .route("/firefighters/all", web::get().to(get_roster))
            .route("/firefighters/{id}", web::get().to(get_firefighter))
            .route("/firefighters/{id}/positions", web::get().to(get_position_history))
            .route("/teams", web::get().to(get_teams))
            .route("/alerts", web::get().to(get_alerts))
            .route("/alerts/banner", web::get().to(get_banner))
            .route("/beacons", web::get().to(get_beacons))
            .route("/beacons/{id}", web::get().to(get_beacon))
            // Operator selection
            .route("/selection/firefighter", web::post().to(select_firefighter))
            .route("/selection/beacon", web::post().to(select_beacon))
            .route("/selection/floor", web::post().to(select_floor))
            .route("/selection/team", web::post().to(select_team))
            .route("/toggles", web::post().to(set_toggles))
            // User-initiated backend actions
            .route("/mission/badge", web::post().to(badge_to_mission))
            .route("/rfid/ports", web::get().to(get_serial_ports))
            .route("/rfid/scan", web::post().to(scan_rfid))
            .route("/export/blackbox", web::get().to(export_blackbox))
            .route("/session/reset", web::post().to(reset_session)),
    )
    // WebSocket endpoint
    .route("/ws", web::get().to(websocket_handler));
}

/// Health check endpoint
///
/// GET /api/health
pub async fn health_check(state: SharedState) -> Result<HttpResponse, AppError> {
    let state = state.read().await;
    let sync = state.sync_reports();
    let degraded = sync.iter().any(|r| r.consecutive_failures > 0);

    let health = HealthCheck {
        status: if degraded { "degraded" } else { "healthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        uptime_seconds: state.uptime_seconds(),
        connected_clients: state.client_count(),
        cached_firefighters: state.store().len(),
        active_alerts: state.alerts().iter().filter(|a| !a.acknowledged).count(),
        sync,
    };

    Ok(HttpResponse::Ok().json(health))
}

/// Map projection for the current floor
///
/// GET /api/map
pub async fn get_map(state: SharedState) -> Result<HttpResponse, AppError> {
    let state = state.read().await;
    let map = views::map_view(state.store(), state.selection(), state.beacons(), state.building());
    Ok(HttpResponse::Ok().json(map))
}

/// GET /api/firefighters
pub async fn get_mission_list(state: SharedState) -> Result<HttpResponse, AppError> {
    let state = state.read().await;
    Ok(HttpResponse::Ok().json(views::mission_list(state.store(), state.selection())))
}

/// Query parameters for the roster
#[derive(Debug, Deserialize)]
pub struct RosterParams {
    pub search: Option<String>,
    #[serde(default)]
    pub mission: MissionFilter,
    #[serde(default)]
    pub sort: RosterSort,
    pub order: Option<SortOrder>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// All firefighters known to the backend, searchable and paginated
///
/// GET /api/firefighters/all?search=&mission=&sort=&order=&page=&limit=
pub async fn get_roster(
    client: web::Data<BackendClient>,
    query: web::Query<RosterParams>,
) -> Result<HttpResponse, AppError> {
    let (page, limit) = validate_pagination(query.page, query.limit, 50)?;
    let query = query.into_inner();

    let firefighters: Vec<Firefighter> = client
        .list_all_firefighters()
        .await?
        .into_iter()
        .map(Firefighter::from)
        .collect();

    let roster = RosterQuery {
        search: query.search,
        mission: query.mission,
        sort: query.sort,
        order: query.order.unwrap_or(SortOrder::Asc),
    };

    Ok(HttpResponse::Ok().json(views::roster_page(&firefighters, &roster, page, limit)))
}

#[derive(Serialize)]
struct FirefighterView<'a> {
    #[serde(flatten)]
    cached: &'a CachedFirefighter,
    visible: bool,
    color: String,
    trail: Option<&'a PositionTrack>,
    heart_rate_series: Vec<HeartRateSample>,
    detail: Option<&'a FirefighterDetail>,
}

/// Cached record, trail, heart-rate series and (if selected) detail panel
///
/// GET /api/firefighters/{id}
pub async fn get_firefighter(
    state: SharedState,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = EntityId::new(path.into_inner().trim());
    let state = state.read().await;

    let cached = state
        .store()
        .cached(&id)
        .ok_or_else(|| AppError::NotFound(format!("Firefighter {} is not cached", id)))?;

    let view = FirefighterView {
        cached,
        visible: views::is_visible(&cached.firefighter),
        color: views::team_color(cached.firefighter.team_label()),
        trail: state.store().position_track(&id),
        heart_rate_series: state.store().heart_rate_series(&id),
        detail: state
            .firefighter_detail()
            .filter(|d| d.firefighter_id == id),
    };

    Ok(HttpResponse::Ok().json(view))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

/// Position history, fetched on demand
///
/// GET /api/firefighters/{id}/positions?limit=
pub async fn get_position_history(
    client: web::Data<BackendClient>,
    path: web::Path<String>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, AppError> {
    let id = EntityId::new(path.into_inner());
    let positions = client
        .firefighter_positions(&id, query.limit.unwrap_or(100))
        .await?;
    Ok(HttpResponse::Ok().json(positions))
}

/// GET /api/teams
pub async fn get_teams(state: SharedState) -> Result<HttpResponse, AppError> {
    let state = state.read().await;
    Ok(HttpResponse::Ok().json(views::teams_summary(state.store())))
}

/// Query parameters for the alert list
#[derive(Debug, Deserialize)]
pub struct AlertParams {
    pub severity: Option<String>,
    #[serde(default)]
    pub sort: AlertSort,
    #[serde(default)]
    pub order: SortOrder,
    pub page: Option<u32>,
}

/// GET /api/alerts?severity=&sort=&order=&page=
pub async fn get_alerts(
    state: SharedState,
    query: web::Query<AlertParams>,
) -> Result<HttpResponse, AppError> {
    let (page, _) = validate_pagination(query.page, None, views::ALERTS_PER_PAGE)?;
    let severity = match query.severity.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(raw) => Some(
            Severity::parse(raw)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown severity: {}", raw)))?,
        ),
    };

    let state = state.read().await;
    let alerts = views::alert_page(state.alerts(), state.store(), severity, query.sort, query.order, page);

    Ok(HttpResponse::Ok().json(alerts))
}

/// GET /api/alerts/banner
pub async fn get_banner(state: SharedState) -> Result<HttpResponse, AppError> {
    let state = state.read().await;
    Ok(HttpResponse::Ok().json(views::banner(state.alerts(), state.store(), state.building())))
}

#[derive(Debug, Deserialize)]
pub struct FloorQuery {
    pub floor: Option<i32>,
}

/// Cached beacons, optionally for one floor
///
/// GET /api/beacons?floor=
pub async fn get_beacons(
    state: SharedState,
    query: web::Query<FloorQuery>,
) -> Result<HttpResponse, AppError> {
    let state = state.read().await;
    let beacons: Vec<&Beacon> = state
        .beacons()
        .iter()
        .filter(|b| query.floor.map_or(true, |f| b.floor == f))
        .collect();
    Ok(HttpResponse::Ok().json(beacons))
}

#[derive(Serialize)]
struct BeaconView {
    beacon: Beacon,
    firefighters: Vec<BeaconOccupant>,
}

/// Live beacon detail
///
/// GET /api/beacons/{id}
pub async fn get_beacon(
    client: web::Data<BackendClient>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = EntityId::new(path.into_inner());
    let (beacon, firefighters) = futures::join!(client.get_beacon(&id), client.list_beacon_firefighters(&id));

    Ok(HttpResponse::Ok().json(BeaconView {
        beacon: beacon?,
        firefighters: firefighters?,
    }))
}

/// Selection request; `null` clears
#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub id: Option<EntityId>,
}

#[derive(Serialize)]
struct SelectionResponse<'a> {
    selection: &'a Selection,
    floor_changed: bool,
}

/// POST /api/selection/firefighter
pub async fn select_firefighter(
    state: SharedState,
    body: web::Json<SelectRequest>,
) -> Result<HttpResponse, AppError> {
    let mut state = state.write().await;
    let id = body.into_inner().id;

    if let Some(id) = &id {
        if state.store().firefighter(id).is_none() {
            return Err(AppError::NotFound(format!("Firefighter {} is not cached", id)));
        }
    }

    let floor_changed = state.select_firefighter(id);
    Ok(HttpResponse::Ok().json(SelectionResponse {
        selection: state.selection(),
        floor_changed,
    }))
}

/// POST /api/selection/beacon
pub async fn select_beacon(
    state: SharedState,
    body: web::Json<SelectRequest>,
) -> Result<HttpResponse, AppError> {
    let mut state = state.write().await;
    state.select_beacon(body.into_inner().id);
    Ok(HttpResponse::Ok().json(state.selection()))
}

#[derive(Debug, Deserialize)]
pub struct FloorRequest {
    pub floor: i32,
}

/// POST /api/selection/floor
pub async fn select_floor(
    state: SharedState,
    body: web::Json<FloorRequest>,
) -> Result<HttpResponse, AppError> {
    let mut state = state.write().await;
    let floor = body.floor;

    if let Some(building) = state.building() {
        if !building.floors.is_empty() && !building.has_floor(floor) {
            return Err(AppError::BadRequest(format!("Building has no floor {}", floor)));
        }
    }

    state.set_floor(floor);
    Ok(HttpResponse::Ok().json(state.selection()))
}

#[derive(Debug, Deserialize)]
pub struct TeamRequest {
    pub team: String,
}

/// POST /api/selection/team
pub async fn select_team(
    state: SharedState,
    body: web::Json<TeamRequest>,
) -> Result<HttpResponse, AppError> {
    let mut state = state.write().await;
    state.set_team_filter(TeamFilter::parse(&body.team));
    Ok(HttpResponse::Ok().json(state.selection()))
}

/// POST /api/toggles
pub async fn set_toggles(
    state: SharedState,
    body: web::Json<Toggles>,
) -> Result<HttpResponse, AppError> {
    let mut state = state.write().await;
    state.apply_toggles(body.into_inner());

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "show_beacons": state.selection().show_beacons,
        "show_history": state.selection().show_history,
        "tts_enabled": state.announcer().is_enabled(),
    })))
}

#[derive(Serialize)]
struct BadgeResponse {
    firefighter: FirefighterSummary,
    mission: Option<MissionUpdate>,
    correlation_id: String,
}

/// Badge lookup, then add to mission
///
/// POST /api/mission/badge
pub async fn badge_to_mission(
    client: web::Data<BackendClient>,
    body: web::Json<BadgeRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let correlation_id = extract_correlation_id(&req);
    validate_request(&*body)?;
    let badge = body.badge.trim();

    info!(correlation_id = %correlation_id, badge = %badge, "Badge lookup requested");

    let firefighter = client.lookup_badge(badge).await.map_err(|e| {
        warn!(correlation_id = %correlation_id, error = %e, "Badge lookup failed");
        e
    })?;

    let mission = if body.add_to_mission {
        let update = client.add_to_mission(badge).await?;
        info!(
            correlation_id = %correlation_id,
            firefighter_id = %firefighter.id,
            success = update.success,
            "Add to mission completed"
        );
        Some(update)
    } else {
        None
    };

    Ok(HttpResponse::Ok().json(BadgeResponse {
        firefighter,
        mission,
        correlation_id,
    }))
}

/// GET /api/rfid/ports
pub async fn get_serial_ports(client: web::Data<BackendClient>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(client.list_serial_ports().await?))
}

/// POST /api/rfid/scan
pub async fn scan_rfid(
    client: web::Data<BackendClient>,
    body: web::Json<ScanRequest>,
) -> Result<HttpResponse, AppError> {
    validate_request(&*body)?;
    let timeout = body.timeout.unwrap_or(RequestConstraints::SCAN_TIMEOUT_DEFAULT);

    info!(port = %body.port, timeout, "RFID scan requested");
    let scan = client.scan_rfid(&body.port, timeout).await?;

    Ok(HttpResponse::Ok().json(scan))
}

/// Blackbox download passthrough
///
/// GET /api/export/blackbox
pub async fn export_blackbox(client: web::Data<BackendClient>) -> Result<HttpResponse, AppError> {
    let export = client.export_blackbox().await?;

    info!(filename = %export.filename, bytes = export.body.len(), "Blackbox export served");

    Ok(HttpResponse::Ok()
        .content_type(export.content_type)
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", export.filename),
        ))
        .body(export.body))
}

/// Explicit full-session reset
///
/// POST /api/session/reset
pub async fn reset_session(state: SharedState) -> AppResult<HttpResponse> {
    let mut state = state.write().await;
    state.reset_session();
    Ok(HttpResponse::Ok().json(serde_json::json!({ "reset": true, "revision": state.revision() })))
}

/// WebSocket upgrade handler
///
/// GET /ws
pub async fn websocket_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: SharedState,
) -> Result<HttpResponse, actix_web::Error> {
    let client_id = Uuid::new_v4().to_string();

    info!(client_id = %client_id, "WebSocket connection request");

    // Register client
    {
        let mut state = state.write().await;
        state.add_client(client_id.clone());
    }

    let ws_session = WsSession::new(client_id, state.get_ref().clone());

    actix_web_actors::ws::start(ws_session, &req, stream)
}

/// Extract or generate correlation ID from request headers
fn extract_correlation_id(req: &HttpRequest) -> String {
    req.headers()
        .get("X-Correlation-ID")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
