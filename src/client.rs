//! Backend REST client
//!
//! Typed facade over the external mission API. Every method performs exactly
//! one HTTP call, checks the status, and validates the body against the v1
//! schema in [`crate::models`]. Nothing is cached here.

use anyhow::Context;
use reqwest::{header, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::models::{
    Alert, Beacon, BeaconOccupant, BlackboxExport, Building, EntityId, FirefighterBeacon,
    FirefighterRecord, FirefighterSummary, MissionUpdate, Position, RfidScan, SerialPort,
    Severity, Vitals,
};
use crate::validation::{check_identifier, check_limit, check_scan_timeout};

/// Filename used when the export response carries no usable header
pub const DEFAULT_EXPORT_FILENAME: &str = "blackbox_export.json";

/// Logical backend resources, used to label requests and errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Firefighters,
    AllFirefighters,
    Positions,
    Vitals,
    FirefighterBeacon,
    Alerts,
    Beacons,
    Beacon,
    BeaconFirefighters,
    Building,
    BadgeLookup,
    MissionAdd,
    SerialPorts,
    RfidScan,
    BlackboxExport,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Firefighters => "firefighters",
            Resource::AllFirefighters => "all_firefighters",
            Resource::Positions => "positions",
            Resource::Vitals => "vitals",
            Resource::FirefighterBeacon => "firefighter_beacon",
            Resource::Alerts => "alerts",
            Resource::Beacons => "beacons",
            Resource::Beacon => "beacon",
            Resource::BeaconFirefighters => "beacon_firefighters",
            Resource::Building => "building",
            Resource::BadgeLookup => "badge_lookup",
            Resource::MissionAdd => "mission_add",
            Resource::SerialPorts => "serial_ports",
            Resource::RfidScan => "rfid_scan",
            Resource::BlackboxExport => "blackbox_export",
        }
    }

    /// Conventional keys under which a collection may be wrapped
    fn wrapper_keys(&self) -> &'static [&'static str] {
        match self {
            Resource::Firefighters | Resource::AllFirefighters | Resource::BeaconFirefighters => {
                &["firefighters"]
            }
            Resource::Positions => &["positions", "history"],
            Resource::Vitals => &["vitals", "history"],
            Resource::Alerts => &["alerts"],
            Resource::Beacons => &["beacons"],
            Resource::SerialPorts => &["ports"],
            _ => &[],
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional filters for the alert listing
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AlertQuery {
    pub severity: Option<Severity>,
    pub acknowledged: Option<bool>,
}

impl AlertQuery {
    /// Active (unacknowledged) alerts of any severity
    pub fn active() -> Self {
        Self::default()
    }
}

/// Read operations driven by the poll scheduler.
///
/// Implementations must be safe to call repeatedly and concurrently.
pub trait Backend: Send + Sync + 'static {
    fn firefighters(&self) -> impl Future<Output = Result<Vec<FirefighterRecord>, ClientError>> + Send;

    fn alerts(&self, query: AlertQuery) -> impl Future<Output = Result<Vec<Alert>, ClientError>> + Send;

    fn beacons(&self, floor: Option<i32>) -> impl Future<Output = Result<Vec<Beacon>, ClientError>> + Send;

    fn building(&self) -> impl Future<Output = Result<Building, ClientError>> + Send;

    fn firefighter_vitals(
        &self,
        id: &EntityId,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Vitals>, ClientError>> + Send;

    fn firefighter_beacon(
        &self,
        id: &EntityId,
    ) -> impl Future<Output = Result<FirefighterBeacon, ClientError>> + Send;

    fn beacon(&self, id: &EntityId) -> impl Future<Output = Result<Beacon, ClientError>> + Send;

    fn beacon_firefighters(
        &self,
        id: &EntityId,
    ) -> impl Future<Output = Result<Vec<BeaconOccupant>, ClientError>> + Send;
}

/// HTTP client for the mission API.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl BackendClient {
    /// Create a client rooted at `base_url`, bounding every call by `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url.trim())
            .with_context(|| format!("Invalid backend base URL: {}", base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Backend base URL cannot carry paths: {}", base_url);
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url,
            timeout,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(&self, resource: Resource, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| transport_error(resource, e))?;

        let status = response.status();
        if !status.is_success() {
            debug!(resource = %resource, status = status.as_u16(), "Backend returned failure status");
            return Err(ClientError::RequestFailed {
                resource,
                status: status.as_u16(),
            });
        }

        Ok(response)
    }

    async fn fetch_json(&self, resource: Resource, request: RequestBuilder) -> Result<Value, ClientError> {
        let response = self.send(resource, request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(resource, e))?;

        serde_json::from_slice(&bytes).map_err(|e| {
            warn!(resource = %resource, error = %e, "Backend returned invalid JSON");
            ClientError::MalformedResponse { resource }
        })
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        resource: Resource,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ClientError> {
        let request = self.http.get(self.endpoint(segments)).query(query);
        let body = self.fetch_json(resource, request).await?;
        decode_list(resource, body)
    }

    async fn get_object<T: DeserializeOwned>(
        &self,
        resource: Resource,
        segments: &[&str],
    ) -> Result<T, ClientError> {
        let request = self.http.get(self.endpoint(segments));
        let body = self.fetch_json(resource, request).await?;
        decode_object(resource, body)
    }

    /// GET /firefighters (mission-scoped roster)
    pub async fn list_firefighters(&self) -> Result<Vec<FirefighterRecord>, ClientError> {
        self.get_list(Resource::Firefighters, &["firefighters"], &[]).await
    }

    /// GET /firefighters/all
    pub async fn list_all_firefighters(&self) -> Result<Vec<FirefighterRecord>, ClientError> {
        self.get_list(Resource::AllFirefighters, &["firefighters", "all"], &[])
            .await
    }

    /// GET /firefighters/{id}/positions?limit=
    pub async fn firefighter_positions(
        &self,
        id: &EntityId,
        limit: u32,
    ) -> Result<Vec<Position>, ClientError> {
        let resource = Resource::Positions;
        let id = check_identifier(id.as_str()).map_err(|reason| invalid(resource, reason))?;
        let limit = check_limit(limit).map_err(|reason| invalid(resource, reason))?;
        self.get_list(
            resource,
            &["firefighters", id, "positions"],
            &[("limit", limit.to_string())],
        )
        .await
    }

    /// GET /firefighters/{id}/vitals?limit=
    pub async fn list_firefighter_vitals(
        &self,
        id: &EntityId,
        limit: u32,
    ) -> Result<Vec<Vitals>, ClientError> {
        let resource = Resource::Vitals;
        let id = check_identifier(id.as_str()).map_err(|reason| invalid(resource, reason))?;
        let limit = check_limit(limit).map_err(|reason| invalid(resource, reason))?;
        self.get_list(
            resource,
            &["firefighters", id, "vitals"],
            &[("limit", limit.to_string())],
        )
        .await
    }

    /// GET /firefighters/{id}/beacon
    pub async fn get_firefighter_beacon(&self, id: &EntityId) -> Result<FirefighterBeacon, ClientError> {
        let resource = Resource::FirefighterBeacon;
        let id = check_identifier(id.as_str()).map_err(|reason| invalid(resource, reason))?;
        self.get_object(resource, &["firefighters", id, "beacon"]).await
    }

    /// GET /alerts, or GET /alerts/all when a filter is given
    pub async fn list_alerts(&self, query: AlertQuery) -> Result<Vec<Alert>, ClientError> {
        if query == AlertQuery::active() {
            return self.get_list(Resource::Alerts, &["alerts"], &[]).await;
        }

        let mut params = vec![(
            "acknowledged",
            query.acknowledged.unwrap_or(false).to_string(),
        )];
        if let Some(severity) = query.severity {
            params.push(("severity", severity.as_str().to_string()));
        }
        self.get_list(Resource::Alerts, &["alerts", "all"], &params)
            .await
    }

    /// GET /beacons[?floor=]
    pub async fn list_beacons(&self, floor: Option<i32>) -> Result<Vec<Beacon>, ClientError> {
        let params: Vec<(&str, String)> = floor
            .map(|f| vec![("floor", f.to_string())])
            .unwrap_or_default();
        self.get_list(Resource::Beacons, &["beacons"], &params).await
    }

    /// GET /beacons/{id}
    pub async fn get_beacon(&self, id: &EntityId) -> Result<Beacon, ClientError> {
        let resource = Resource::Beacon;
        let id = check_identifier(id.as_str()).map_err(|reason| invalid(resource, reason))?;
        self.get_object(resource, &["beacons", id]).await
    }

    /// GET /beacons/{id}/firefighters
    pub async fn list_beacon_firefighters(&self, id: &EntityId) -> Result<Vec<BeaconOccupant>, ClientError> {
        let resource = Resource::BeaconFirefighters;
        let id = check_identifier(id.as_str()).map_err(|reason| invalid(resource, reason))?;
        self.get_list(resource, &["beacons", id, "firefighters"], &[])
            .await
    }

    /// GET /building
    pub async fn get_building(&self) -> Result<Building, ClientError> {
        self.get_object(Resource::Building, &["building"]).await
    }

    /// GET /firefighters/badge/{badge}
    pub async fn lookup_badge(&self, badge: &str) -> Result<FirefighterSummary, ClientError> {
        let resource = Resource::BadgeLookup;
        let badge = check_identifier(badge).map_err(|reason| invalid(resource, reason))?;
        self.get_object(resource, &["firefighters", "badge", badge]).await
    }

    /// POST /firefighters/badge/{badge}/mission
    pub async fn add_to_mission(&self, badge: &str) -> Result<MissionUpdate, ClientError> {
        let resource = Resource::MissionAdd;
        let badge = check_identifier(badge).map_err(|reason| invalid(resource, reason))?;
        let request = self
            .http
            .post(self.endpoint(&["firefighters", "badge", badge, "mission"]));
        let body = self.fetch_json(resource, request).await?;
        decode_object(resource, body)
    }

    /// GET /rfid/ports
    pub async fn list_serial_ports(&self) -> Result<Vec<SerialPort>, ClientError> {
        self.get_list(Resource::SerialPorts, &["rfid", "ports"], &[]).await
    }

    /// POST /rfid/scan; the reader may hold the request for `timeout_secs`.
    pub async fn scan_rfid(&self, port: &str, timeout_secs: u32) -> Result<RfidScan, ClientError> {
        let resource = Resource::RfidScan;
        let port = check_identifier(port).map_err(|reason| invalid(resource, reason))?;
        let timeout_secs = check_scan_timeout(timeout_secs).map_err(|reason| invalid(resource, reason))?;

        let request = self
            .http
            .post(self.endpoint(&["rfid", "scan"]))
            .timeout(self.timeout + Duration::from_secs(u64::from(timeout_secs)))
            .json(&serde_json::json!({ "port": port, "timeout": timeout_secs }));
        let body = self.fetch_json(resource, request).await?;
        decode_object(resource, body)
    }

    /// GET /export/blackbox, returned as raw bytes with its suggested filename
    pub async fn export_blackbox(&self) -> Result<BlackboxExport, ClientError> {
        let resource = Resource::BlackboxExport;
        let response = self
            .send(resource, self.http.get(self.endpoint(&["export", "blackbox"])))
            .await?;

        let headers = response.headers();
        let filename = export_filename(
            headers
                .get(header::CONTENT_DISPOSITION)
                .and_then(|v| v.to_str().ok()),
        );
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/json")
            .to_string();

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(resource, e))?
            .to_vec();

        debug!(filename = %filename, bytes = body.len(), "Blackbox export downloaded");

        Ok(BlackboxExport {
            filename,
            content_type,
            body,
        })
    }
}

impl Backend for BackendClient {
    async fn firefighters(&self) -> Result<Vec<FirefighterRecord>, ClientError> {
        self.list_firefighters().await
    }

    async fn alerts(&self, query: AlertQuery) -> Result<Vec<Alert>, ClientError> {
        self.list_alerts(query).await
    }

    async fn beacons(&self, floor: Option<i32>) -> Result<Vec<Beacon>, ClientError> {
        self.list_beacons(floor).await
    }

    async fn building(&self) -> Result<Building, ClientError> {
        self.get_building().await
    }

    async fn firefighter_vitals(&self, id: &EntityId, limit: u32) -> Result<Vec<Vitals>, ClientError> {
        self.list_firefighter_vitals(id, limit).await
    }

    async fn firefighter_beacon(&self, id: &EntityId) -> Result<FirefighterBeacon, ClientError> {
        self.get_firefighter_beacon(id).await
    }

    async fn beacon(&self, id: &EntityId) -> Result<Beacon, ClientError> {
        self.get_beacon(id).await
    }

    async fn beacon_firefighters(&self, id: &EntityId) -> Result<Vec<BeaconOccupant>, ClientError> {
        self.list_beacon_firefighters(id).await
    }
}

fn invalid(resource: Resource, reason: String) -> ClientError {
    ClientError::InvalidRequest { resource, reason }
}

fn transport_error(resource: Resource, err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout { resource }
    } else {
        ClientError::Transport {
            resource,
            reason: err.to_string(),
        }
    }
}

/// Accepts a bare array or an object wrapping the array under a
/// conventional key. Individual records that fail validation are dropped;
/// a non-empty collection with no valid record is malformed.
pub(crate) fn decode_list<T: DeserializeOwned>(
    resource: Resource,
    body: Value,
) -> Result<Vec<T>, ClientError> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => resource
            .wrapper_keys()
            .iter()
            .copied()
            .chain(std::iter::once("data"))
            .find_map(|key| match map.remove(key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .ok_or(ClientError::MalformedResponse { resource })?,
        _ => return Err(ClientError::MalformedResponse { resource }),
    };

    let total = items.len();
    let decoded: Vec<T> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(resource = %resource, error = %e, "Skipping invalid record");
                None
            }
        })
        .collect();

    if total > 0 && decoded.is_empty() {
        return Err(ClientError::MalformedResponse { resource });
    }
    if decoded.len() < total {
        warn!(
            resource = %resource,
            dropped = total - decoded.len(),
            total,
            "Dropped records that failed validation"
        );
    }

    Ok(decoded)
}

pub(crate) fn decode_object<T: DeserializeOwned>(resource: Resource, body: Value) -> Result<T, ClientError> {
    serde_json::from_value(body).map_err(|e| {
        warn!(resource = %resource, error = %e, "Backend object failed validation");
        ClientError::MalformedResponse { resource }
    })
}

/// Extracts `filename` from a Content-Disposition header value.
pub fn export_filename(content_disposition: Option<&str>) -> String {
    content_disposition
        .and_then(|value| {
            let lower = value.to_ascii_lowercase();
            let start = lower.find("filename=")? + "filename=".len();
            let rest = &value[start..];
            let name = rest.split(';').next().unwrap_or(rest).trim().trim_matches('"');
            Some(name.to_string())
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_EXPORT_FILENAME.to_string())
}
