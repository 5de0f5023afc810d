//! Alert prioritization and speech announcement
//!
//! Orders the active alert set for the banner and voices new critical alerts
//! through a [`SpeechSynthesizer`], with de-duplication and a cooldown.

use actix::{Message, Recipient};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{Alert, EntityId, Severity};

/// Alert keys remembered for de-duplication
pub const SPOKEN_KEYS_CAPACITY: usize = 10;

/// An announcement with no completion report is considered over after this
pub const SPEECH_STALE_AFTER: Duration = Duration::from_secs(30);

const SPEECH_RATE: f32 = 0.9;
const SPEECH_PITCH: f32 = 1.2;

/// Active alerts, critical first, then newest first, then by id.
pub fn prioritize(alerts: &[Alert]) -> Vec<&Alert> {
    let mut active: Vec<&Alert> = alerts.iter().filter(|a| !a.acknowledged).collect();
    active.sort_by(|a, b| {
        a.severity()
            .cmp(&b.severity())
            .then_with(|| b.timestamp.cmp(&a.timestamp))
            .then_with(|| a.id.cmp(&b.id))
    });
    active
}

/// Alert shown in the primary banner.
///
/// Severity outranks recency: an older unacknowledged critical alert stays
/// in the banner over a newer warning.
pub fn select_banner(alerts: &[Alert]) -> Option<&Alert> {
    prioritize(alerts).into_iter().next()
}

/// Spoken form of an alert
pub fn speech_text(alert: &Alert, firefighter_name: Option<&str>) -> String {
    let mut text = format!(
        "ALERT KRYTYCZNY: {}. {}",
        alert.alert_type.code(),
        alert.description()
    );
    if let Some(id) = &alert.firefighter_id {
        let who = firefighter_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(id.as_str());
        text.push_str(&format!(". Strażak: {}", who));
    }
    text
}

/// Utterance handed to the synthesizer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeechCommand {
    pub key: String,
    pub text: String,
    pub lang: String,
    pub rate: f32,
    pub pitch: f32,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SynthesisError {
    #[error("no dashboard is listening for speech")]
    NoListeners,

    #[error("speech delivery failed: {0}")]
    Delivery(String),

    #[error("speech platform error: {0}")]
    Platform(String),
}

/// Speech output seam.
///
/// `speak` starts an utterance and returns immediately; completion is
/// reported back through [`AlertAnnouncer::on_finished`].
pub trait SpeechSynthesizer: Send + Sync {
    fn speak(&mut self, command: &SpeechCommand) -> Result<(), SynthesisError>;

    fn cancel(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnnouncerState {
    Idle,
    Speaking { key: String, started_at: Instant },
}

/// Speech de-duplication and rate limiting for critical alerts
pub struct AlertAnnouncer<S> {
    synthesizer: S,
    enabled: bool,
    cooldown: Duration,
    lang: String,
    state: AnnouncerState,
    last_started: Option<Instant>,
    spoken: VecDeque<String>,
}

impl<S: SpeechSynthesizer> AlertAnnouncer<S> {
    pub fn new(synthesizer: S, enabled: bool, cooldown: Duration, lang: impl Into<String>) -> Self {
        Self {
            synthesizer,
            enabled,
            cooldown,
            lang: lang.into(),
            state: AnnouncerState::Idle,
            last_started: None,
            spoken: VecDeque::with_capacity(SPOKEN_KEYS_CAPACITY),
        }
    }

    /// Re-evaluate after a new alert batch.
    ///
    /// The top-priority critical alert is announced if it was not spoken yet
    /// and the cooldown has elapsed. Returns the command that was started.
    pub fn evaluate<F>(&mut self, alerts: &[Alert], resolve_name: F, now: Instant) -> Option<SpeechCommand>
    where
        F: Fn(&EntityId) -> Option<String>,
    {
        self.expire_stale(now);

        if !self.enabled {
            return None;
        }

        let alert = prioritize(alerts)
            .into_iter()
            .find(|a| a.severity() == Severity::Critical)?;

        let key = alert.key();
        if self.spoken.contains(&key) {
            return None;
        }
        if let Some(last) = self.last_started {
            if now.saturating_duration_since(last) < self.cooldown {
                debug!(key = %key, "Announcement held back by cooldown");
                return None;
            }
        }

        let name = alert.firefighter_id.as_ref().and_then(&resolve_name);
        let command = SpeechCommand {
            key: key.clone(),
            text: speech_text(alert, name.as_deref()),
            lang: self.lang.clone(),
            rate: SPEECH_RATE,
            pitch: SPEECH_PITCH,
        };

        if self.is_speaking() {
            self.synthesizer.cancel();
            self.state = AnnouncerState::Idle;
        }

        match self.synthesizer.speak(&command) {
            Ok(()) => {
                info!(key = %key, alert_type = %alert.alert_type.as_str(), "Announcing critical alert");
                self.state = AnnouncerState::Speaking {
                    key: key.clone(),
                    started_at: now,
                };
                self.last_started = Some(now);
                self.remember(key);
                Some(command)
            }
            Err(SynthesisError::NoListeners) => {
                debug!(key = %key, "No speech listeners connected");
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Speech synthesis failed");
                None
            }
        }
    }

    fn remember(&mut self, key: String) {
        if self.spoken.len() >= SPOKEN_KEYS_CAPACITY {
            self.spoken.pop_front();
        }
        self.spoken.push_back(key);
    }

    fn expire_stale(&mut self, now: Instant) {
        if let AnnouncerState::Speaking { key, started_at } = &self.state {
            if now.saturating_duration_since(*started_at) >= SPEECH_STALE_AFTER {
                debug!(key = %key, "Announcement never reported completion");
                self.state = AnnouncerState::Idle;
            }
        }
    }

    /// Synthesizer reported the utterance ended
    pub fn on_finished(&mut self, key: &str) {
        if matches!(&self.state, AnnouncerState::Speaking { key: current, .. } if current == key) {
            self.state = AnnouncerState::Idle;
        }
    }

    /// Synthesizer reported a platform error; logged and otherwise ignored
    pub fn on_failed(&mut self, key: &str, reason: &str) {
        warn!(key = %key, reason = %reason, "Speech synthesis error reported");
        self.on_finished(key);
    }

    /// Stop any announcement in progress
    pub fn cancel(&mut self) {
        if self.is_speaking() {
            self.synthesizer.cancel();
        }
        self.state = AnnouncerState::Idle;
    }

    /// Operator toggle; muting cancels in-flight speech.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.cancel();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_speaking(&self) -> bool {
        matches!(self.state, AnnouncerState::Speaking { .. })
    }

    pub fn state(&self) -> &AnnouncerState {
        &self.state
    }

    /// Forget spoken keys and timing; used on session reset.
    pub fn reset(&mut self) {
        self.cancel();
        self.spoken.clear();
        self.last_started = None;
    }

    pub fn synthesizer_mut(&mut self) -> &mut S {
        &mut self.synthesizer
    }
}

/// Speech events delivered to dashboard sessions
#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
pub enum SpeechEvent {
    Speak(SpeechCommand),
    Cancel,
}

/// Synthesizer that forwards utterances to connected dashboard sessions,
/// which voice them with the browser's speech engine.
#[derive(Default)]
pub struct SpeechChannel {
    listeners: HashMap<String, Recipient<SpeechEvent>>,
}

impl SpeechChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, client_id: String, recipient: Recipient<SpeechEvent>) {
        self.listeners.insert(client_id, recipient);
    }

    pub fn unsubscribe(&mut self, client_id: &str) {
        self.listeners.remove(client_id);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn broadcast(&mut self, event: SpeechEvent) -> usize {
        let mut delivered = 0;
        self.listeners.retain(|client_id, recipient| {
            if recipient.connected() {
                recipient.do_send(event.clone());
                delivered += 1;
                true
            } else {
                debug!(client_id = %client_id, "Dropping closed speech listener");
                false
            }
        });
        delivered
    }
}

impl SpeechSynthesizer for SpeechChannel {
    fn speak(&mut self, command: &SpeechCommand) -> Result<(), SynthesisError> {
        match self.broadcast(SpeechEvent::Speak(command.clone())) {
            0 => Err(SynthesisError::NoListeners),
            _ => Ok(()),
        }
    }

    fn cancel(&mut self) {
        self.broadcast(SpeechEvent::Cancel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[derive(Default)]
    struct RecordingSynth {
        spoken: Vec<SpeechCommand>,
        cancels: usize,
        fail_with: Option<SynthesisError>,
    }

    impl SpeechSynthesizer for RecordingSynth {
        fn speak(&mut self, command: &SpeechCommand) -> Result<(), SynthesisError> {
            if let Some(err) = self.fail_with.clone() {
                return Err(err);
            }
            self.spoken.push(command.clone());
            Ok(())
        }

        fn cancel(&mut self) {
            self.cancels += 1;
        }
    }

    fn alert(id: i64, kind: &str, secs: i64, firefighter: Option<i64>) -> Alert {
        let mut alert: Alert = serde_json::from_value(serde_json::json!({
            "id": id,
            "alert_type": kind,
            "timestamp": "2024-05-01T10:00:00",
        }))
        .unwrap();
        alert.timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap() + chrono::Duration::seconds(secs);
        alert.firefighter_id = firefighter.map(EntityId::from);
        alert
    }

    fn announcer() -> AlertAnnouncer<RecordingSynth> {
        AlertAnnouncer::new(RecordingSynth::default(), true, Duration::from_millis(2000), "pl-PL")
    }

    fn no_names(_: &EntityId) -> Option<String> {
        None
    }

    #[test]
    fn test_prioritize_critical_then_newest() {
        let mut acknowledged = alert(4, "sos_pressed", 50, None);
        acknowledged.acknowledged = true;
        let alerts = vec![
            alert(1, "low_battery", 30, None),
            alert(2, "man_down", 10, None),
            alert(3, "high_co", 20, None),
            acknowledged,
        ];

        let order: Vec<String> = prioritize(&alerts).iter().map(|a| a.id.to_string()).collect();

        assert_eq!(order, vec!["3", "2", "1"]);
        assert_eq!(select_banner(&alerts).unwrap().id, EntityId::from(3));
    }

    #[test]
    fn test_banner_empty_without_active_alerts() {
        let mut only = alert(1, "man_down", 0, None);
        only.acknowledged = true;
        assert!(select_banner(&[only]).is_none());
        assert!(select_banner(&[]).is_none());
    }

    #[test]
    fn test_speech_text_uses_name_then_id() {
        let with_ff = alert(1, "man_down", 0, Some(7));
        assert_eq!(
            speech_text(&with_ff, Some("Jan Kowalski")),
            "ALERT KRYTYCZNY: MAN DOWN. Bezruch >30s. Strażak: Jan Kowalski"
        );
        assert_eq!(
            speech_text(&with_ff, None),
            "ALERT KRYTYCZNY: MAN DOWN. Bezruch >30s. Strażak: 7"
        );

        let without_ff = alert(2, "explosive_gas", 0, None);
        assert_eq!(
            speech_text(&without_ff, None),
            "ALERT KRYTYCZNY: EXPLOSIVE GAS. Gaz wybuchowy (LEL)"
        );
    }

    #[test]
    fn test_same_alert_spoken_once() {
        let mut announcer = announcer();
        let t0 = Instant::now();
        let alerts = vec![alert(1, "sos_pressed", 0, Some(3))];

        assert!(announcer.evaluate(&alerts, no_names, t0).is_some());
        announcer.on_finished(&alerts[0].key());
        assert!(announcer.evaluate(&alerts, no_names, t0 + Duration::from_secs(10)).is_none());

        assert_eq!(announcer.synthesizer_mut().spoken.len(), 1);
    }

    #[test]
    fn test_cooldown_blocks_second_alert() {
        let mut announcer = announcer();
        let t0 = Instant::now();

        let first = vec![alert(1, "sos_pressed", 0, None)];
        let second = vec![alert(2, "man_down", 1, None), alert(1, "sos_pressed", 0, None)];

        assert!(announcer.evaluate(&first, no_names, t0).is_some());
        assert!(announcer
            .evaluate(&second, no_names, t0 + Duration::from_millis(1500))
            .is_none());

        let spoken = &announcer.synthesizer_mut().spoken;
        assert_eq!(spoken.len(), 1);
        assert_eq!(spoken[0].key, first[0].key());
    }

    #[test]
    fn test_newer_alert_preempts_after_cooldown() {
        let mut announcer = announcer();
        let t0 = Instant::now();

        announcer.evaluate(&[alert(1, "sos_pressed", 0, None)], no_names, t0);
        let command = announcer
            .evaluate(&[alert(2, "man_down", 5, None)], no_names, t0 + Duration::from_millis(2500))
            .unwrap();

        assert_eq!(command.key, alert(2, "man_down", 5, None).key());
        assert_eq!(announcer.synthesizer_mut().cancels, 1);
        assert!(announcer.is_speaking());
    }

    #[test]
    fn test_warnings_never_spoken() {
        let mut announcer = announcer();
        let alerts = vec![alert(1, "low_battery", 0, None), alert(2, "drone_lost", 1, None)];

        assert!(announcer.evaluate(&alerts, no_names, Instant::now()).is_none());
        assert!(!announcer.is_speaking());
    }

    #[test]
    fn test_disabled_announcer_is_silent() {
        let mut announcer = announcer();
        announcer.set_enabled(false);

        let result = announcer.evaluate(&[alert(1, "man_down", 0, None)], no_names, Instant::now());

        assert!(result.is_none());
        assert!(announcer.synthesizer_mut().spoken.is_empty());
    }

    #[test]
    fn test_muting_cancels_in_flight_speech() {
        let mut announcer = announcer();
        announcer.evaluate(&[alert(1, "man_down", 0, None)], no_names, Instant::now());
        assert!(announcer.is_speaking());

        announcer.set_enabled(false);

        assert_eq!(*announcer.state(), AnnouncerState::Idle);
        assert_eq!(announcer.synthesizer_mut().cancels, 1);
    }

    #[test]
    fn test_synthesis_error_is_swallowed() {
        let mut announcer = AlertAnnouncer::new(
            RecordingSynth {
                fail_with: Some(SynthesisError::Platform("audio busy".into())),
                ..Default::default()
            },
            true,
            Duration::from_millis(2000),
            "pl-PL",
        );
        let alerts = vec![alert(1, "man_down", 0, None)];
        let t0 = Instant::now();

        assert!(announcer.evaluate(&alerts, no_names, t0).is_none());
        assert_eq!(*announcer.state(), AnnouncerState::Idle);

        // Not remembered, so a later attempt can still voice it
        announcer.synthesizer_mut().fail_with = None;
        assert!(announcer.evaluate(&alerts, no_names, t0).is_some());
    }

    #[test]
    fn test_failure_report_returns_to_idle() {
        let mut announcer = announcer();
        let alerts = vec![alert(1, "man_down", 0, None)];
        announcer.evaluate(&alerts, no_names, Instant::now());

        announcer.on_failed(&alerts[0].key(), "not-allowed");

        assert!(!announcer.is_speaking());
    }

    #[test]
    fn test_stale_announcement_expires() {
        let mut announcer = announcer();
        let t0 = Instant::now();
        announcer.evaluate(&[alert(1, "man_down", 0, None)], no_names, t0);

        announcer.evaluate(&[], no_names, t0 + SPEECH_STALE_AFTER);

        assert!(!announcer.is_speaking());
    }

    #[test]
    fn test_spoken_keys_bounded() {
        let mut announcer = announcer();
        let t0 = Instant::now();

        for i in 0..12 {
            let alerts = vec![alert(i, "sos_pressed", i, None)];
            let now = t0 + Duration::from_secs(3 * i as u64);
            assert!(announcer.evaluate(&alerts, no_names, now).is_some());
        }

        assert_eq!(announcer.spoken.len(), SPOKEN_KEYS_CAPACITY);
        assert_eq!(announcer.spoken.front(), Some(&alert(2, "sos_pressed", 2, None).key()));
    }

    #[test]
    fn test_name_resolver_used() {
        let mut announcer = announcer();
        let command = announcer
            .evaluate(
                &[alert(1, "tag_offline", 0, Some(4))],
                |id| (id.as_str() == "4").then(|| "Anna Nowak".to_string()),
                Instant::now(),
            )
            .unwrap();

        assert!(command.text.ends_with("Strażak: Anna Nowak"));
        assert_eq!(command.lang, "pl-PL");
    }

    #[test]
    fn test_channel_without_listeners_reports_error() {
        let mut channel = SpeechChannel::new();
        let command = SpeechCommand {
            key: "1-x".into(),
            text: "test".into(),
            lang: "pl-PL".into(),
            rate: SPEECH_RATE,
            pitch: SPEECH_PITCH,
        };

        assert_eq!(channel.speak(&command), Err(SynthesisError::NoListeners));
    }

    struct Listener {
        seen: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl actix::Actor for Listener {
        type Context = actix::Context<Self>;
    }

    impl actix::Handler<SpeechEvent> for Listener {
        type Result = ();

        fn handle(&mut self, event: SpeechEvent, _: &mut Self::Context) {
            let label = match event {
                SpeechEvent::Speak(command) => command.key,
                SpeechEvent::Cancel => "cancel".to_string(),
            };
            self.seen.lock().unwrap().push(label);
        }
    }

    #[actix_web::test]
    async fn test_channel_delivers_to_subscribed_sessions() {
        use actix::Actor;

        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let addr = Listener { seen: seen.clone() }.start();

        let mut channel = SpeechChannel::new();
        channel.subscribe("client-1".into(), addr.recipient());
        assert_eq!(channel.listener_count(), 1);

        let command = SpeechCommand {
            key: "7-x".into(),
            text: "test".into(),
            lang: "pl-PL".into(),
            rate: SPEECH_RATE,
            pitch: SPEECH_PITCH,
        };
        assert!(channel.speak(&command).is_ok());
        channel.cancel();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(*seen.lock().unwrap(), vec!["7-x".to_string(), "cancel".to_string()]);

        channel.unsubscribe("client-1");
        assert_eq!(channel.listener_count(), 0);
        assert_eq!(channel.speak(&command), Err(SynthesisError::NoListeners));
    }
}
