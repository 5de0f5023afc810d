//! WebSocket module for live dashboard streaming
//!
//! Each session pushes a fresh dashboard snapshot whenever the shared state
//! revision moves, relays speech commands to the browser, and reports the
//! browser's speech outcome back to the announcer.

use actix::{Actor, ActorContext, ActorFutureExt, AsyncContext, Handler, StreamHandler};
use actix_web_actors::ws;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::alerts::SpeechEvent;
use crate::models::{ClientMessage, WsMessage};
use crate::state::AppState;
use crate::views::DashboardSnapshot;

/// How often heartbeat pings are sent
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// How long before lack of client response causes a timeout
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// How often the session checks for a new state revision
const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(1);

/// WebSocket session actor
pub struct WsSession {
    client_id: String,
    last_heartbeat: Instant,
    state: Arc<RwLock<AppState>>,
    last_revision: Option<u64>,
}

impl WsSession {
    pub fn new(client_id: String, state: Arc<RwLock<AppState>>) -> Self {
        Self {
            client_id,
            last_heartbeat: Instant::now(),
            state,
            last_revision: None,
        }
    }

    fn send(&self, msg: &WsMessage, ctx: &mut ws::WebsocketContext<Self>) {
        match serde_json::to_string(msg) {
            Ok(json) => ctx.text(json),
            Err(e) => warn!(client_id = %self.client_id, error = %e, "Failed to encode message"),
        }
    }

    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                warn!(
                    client_id = %act.client_id,
                    "WebSocket heartbeat timeout"
                );
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn push_snapshot(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let state = self.state.clone();
        let seen = self.last_revision;

        let fut = async move {
            let state = state.read().await;
            if seen == Some(state.revision()) {
                return None;
            }
            Some(DashboardSnapshot::build(&state))
        };

        let fut = actix::fut::wrap_future::<_, Self>(fut);

        ctx.spawn(fut.map(|snapshot, act, ctx| {
            if let Some(snapshot) = snapshot {
                act.last_revision = Some(snapshot.revision);
                act.send(&WsMessage::Snapshot(Box::new(snapshot)), ctx);
            }
        }));
    }

    fn start_snapshot_stream(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(SNAPSHOT_INTERVAL, |act, ctx| act.push_snapshot(ctx));
    }

    fn handle_client_message(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        match msg {
            ClientMessage::Ping => {
                self.last_heartbeat = Instant::now();
                self.send(&WsMessage::Pong, ctx);
            }
            ClientMessage::SpeechFinished { key } => {
                let state = self.state.clone();
                actix_rt::spawn(async move {
                    state.write().await.speech_finished(&key);
                });
            }
            ClientMessage::SpeechFailed { key, reason } => {
                let state = self.state.clone();
                actix_rt::spawn(async move {
                    state.write().await.speech_failed(&key, &reason);
                });
            }
        }
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(client_id = %self.client_id, "WebSocket connected");

        self.start_heartbeat(ctx);
        self.start_snapshot_stream(ctx);

        let state = self.state.clone();
        let client_id = self.client_id.clone();
        let recipient = ctx.address().recipient();
        actix_rt::spawn(async move {
            state.write().await.subscribe_speech(client_id, recipient);
        });

        self.send(
            &WsMessage::Connected {
                client_id: self.client_id.clone(),
            },
            ctx,
        );
        self.push_snapshot(ctx);
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        info!(client_id = %self.client_id, "WebSocket disconnected");

        let state = self.state.clone();
        let client_id = self.client_id.clone();

        // Actix runtime spawn: the session lives on an actix arbiter
        actix_rt::spawn(async move {
            let mut state = state.write().await;
            state.remove_client(&client_id);
        });
    }
}

impl Handler<SpeechEvent> for WsSession {
    type Result = ();

    fn handle(&mut self, event: SpeechEvent, ctx: &mut Self::Context) {
        match event {
            SpeechEvent::Speak(command) => {
                debug!(client_id = %self.client_id, key = %command.key, "Relaying announcement");
                self.send(&WsMessage::Speak(command), ctx);
            }
            SpeechEvent::Cancel => self.send(&WsMessage::CancelSpeech, ctx),
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                debug!(client_id = %self.client_id, message = %text);

                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => self.handle_client_message(msg, ctx),
                    Err(e) => {
                        warn!(client_id = %self.client_id, error = %e);
                        self.send(
                            &WsMessage::Error {
                                message: "Invalid message format".into(),
                            },
                            ctx,
                        );
                    }
                }
            }
            Ok(ws::Message::Close(reason)) => {
                info!(client_id = %self.client_id, reason = ?reason);
                ctx.stop();
            }
            Err(e) => {
                warn!(client_id = %self.client_id, error = %e);
                ctx.stop();
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::configure_routes;
    use crate::models::FirefighterRecord;
    use actix_web::{web, App};
    use awc::ws::{Frame, Message as WsFrame};
    use futures::{SinkExt, StreamExt};
    use serde_json::{json, Value};

    macro_rules! next_json {
        ($framed:expr) => {
            loop {
                match $framed.next().await {
                    Some(Ok(Frame::Text(bytes))) => {
                        break serde_json::from_slice::<Value>(&bytes).unwrap();
                    }
                    Some(Ok(_)) => continue,
                    other => panic!("socket closed early: {:?}", other.is_some()),
                }
            }
        };
    }

    #[actix_web::test]
    async fn test_session_greets_then_streams_snapshot() {
        let state = Arc::new(RwLock::new(AppState::default()));
        let batch: Vec<FirefighterRecord> = serde_json::from_value(json!([
            {"id": 1, "name": "Jan", "on_mission": true}
        ]))
        .unwrap();
        state.write().await.apply_firefighters(batch, chrono::Utc::now());

        let client = crate::client::BackendClient::new(
            "http://127.0.0.1:9/api",
            Duration::from_millis(200),
        )
        .unwrap();
        let shared = state.clone();
        let mut srv = actix_test::start(move || {
            App::new()
                .app_data(web::Data::new(shared.clone()))
                .app_data(web::Data::new(client.clone()))
                .configure(configure_routes)
        });

        let mut framed = srv.ws_at("/ws").await.unwrap();

        let hello = next_json!(framed);
        assert_eq!(hello["type"], "Connected");

        let snapshot = next_json!(framed);
        assert_eq!(snapshot["type"], "Snapshot");
        assert_eq!(snapshot["data"]["mission"][0]["name"], "Jan");

        framed
            .send(WsFrame::Text(r#"{"type":"Ping"}"#.into()))
            .await
            .unwrap();
        let pong = next_json!(framed);
        assert_eq!(pong["type"], "Pong");

        assert_eq!(state.read().await.client_count(), 1);
    }

    #[actix_web::test]
    async fn test_invalid_client_message_reports_error() {
        let state = Arc::new(RwLock::new(AppState::default()));
        let client = crate::client::BackendClient::new(
            "http://127.0.0.1:9/api",
            Duration::from_millis(200),
        )
        .unwrap();
        let mut srv = actix_test::start(move || {
            App::new()
                .app_data(web::Data::new(state.clone()))
                .app_data(web::Data::new(client.clone()))
                .configure(configure_routes)
        });

        let mut framed = srv.ws_at("/ws").await.unwrap();
        let _hello = next_json!(framed);
        let _snapshot = next_json!(framed);

        framed
            .send(WsFrame::Text("not json".into()))
            .await
            .unwrap();
        let reply = next_json!(framed);

        assert_eq!(reply["type"], "Error");
        assert_eq!(reply["data"]["message"], "Invalid message format");
    }
}
