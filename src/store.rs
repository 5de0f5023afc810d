//! Entity cache
//!
//! Merge-only store for firefighters, their heart-rate trend series and a
//! one-step position trail. A normal poll cycle never removes anything; only
//! [`EntityStore::reset`] clears the cache.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::{debug, info};

use crate::models::{is_stale, EntityId, Firefighter, FirefighterRecord, HeartRateSample, Position};

/// Maximum samples kept per heart-rate series
pub const HEART_RATE_CAPACITY: usize = 50;

/// Minimum change (bpm) that records a new sample on its own
pub const HEART_RATE_EPSILON: f64 = 1.0;

/// Minimum spacing that records a new sample even if the value is flat
pub fn heart_rate_min_gap() -> Duration {
    Duration::seconds(1)
}

/// Coordinate change (degrees) below which a position is considered unchanged
pub const POSITION_EPSILON_DEG: f64 = 0.0001;

/// Cached firefighter with the time of its last merge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedFirefighter {
    #[serde(flatten)]
    pub firefighter: Firefighter,
    pub updated_at: DateTime<Utc>,
}

/// Current position plus the one it replaced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionTrack {
    pub current: Position,
    pub previous: Option<Position>,
}

/// Counts reported by a merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub inserted: usize,
    pub updated: usize,
}

#[derive(Debug, Default)]
pub struct EntityStore {
    firefighters: BTreeMap<EntityId, CachedFirefighter>,
    heart_rates: HashMap<EntityId, VecDeque<HeartRateSample>>,
    positions: HashMap<EntityId, PositionTrack>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a poll batch.
    ///
    /// Fields present in a record overwrite the cached value, absent fields
    /// keep it, explicit nulls clear it. Existing entries missing from the
    /// batch are left untouched.
    pub fn merge_firefighters(
        &mut self,
        batch: impl IntoIterator<Item = FirefighterRecord>,
        now: DateTime<Utc>,
    ) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        for record in batch {
            match self.firefighters.get_mut(&record.id) {
                Some(cached) => {
                    cached.firefighter.apply(record);
                    cached.updated_at = now;
                    outcome.updated += 1;
                }
                None => {
                    let firefighter = Firefighter::from(record);
                    self.firefighters.insert(
                        firefighter.id.clone(),
                        CachedFirefighter {
                            firefighter,
                            updated_at: now,
                        },
                    );
                    outcome.inserted += 1;
                }
            }
        }

        debug!(
            inserted = outcome.inserted,
            updated = outcome.updated,
            cached = self.firefighters.len(),
            "Merged firefighter batch"
        );

        outcome
    }

    /// Append a heart-rate sample when it adds information.
    ///
    /// Returns whether the sample was recorded.
    pub fn record_heart_rate(&mut self, id: &EntityId, value: f64, timestamp: DateTime<Utc>) -> bool {
        if !value.is_finite() {
            return false;
        }
        let value = value.round();

        let series = self.heart_rates.entry(id.clone()).or_default();
        if let Some(last) = series.back() {
            if timestamp < last.timestamp {
                return false;
            }
            let changed = (value - last.value).abs() > HEART_RATE_EPSILON;
            let elapsed = timestamp - last.timestamp > heart_rate_min_gap();
            if !changed && !elapsed {
                return false;
            }
        }

        if series.len() >= HEART_RATE_CAPACITY {
            series.pop_front();
        }
        series.push_back(HeartRateSample { value, timestamp });
        true
    }

    /// Track the latest position, demoting the old one when it moved.
    /// A fix older than the current one is ignored.
    ///
    /// Returns whether the firefighter moved.
    pub fn record_position(&mut self, id: &EntityId, position: Position) -> bool {
        match self.positions.get_mut(id) {
            None => {
                self.positions.insert(
                    id.clone(),
                    PositionTrack {
                        current: position,
                        previous: None,
                    },
                );
                false
            }
            Some(track) if is_stale(track.current.timestamp, position.timestamp) => false,
            Some(track) if has_moved(&track.current, &position) => {
                let previous = std::mem::replace(&mut track.current, position);
                track.previous = Some(previous);
                true
            }
            Some(track) => {
                if position.timestamp.is_some() {
                    track.current.timestamp = position.timestamp;
                }
                false
            }
        }
    }

    /// Drop every cached entity. Only an explicit session reset calls this.
    pub fn reset(&mut self) {
        info!(
            firefighters = self.firefighters.len(),
            "Resetting entity cache"
        );
        self.firefighters.clear();
        self.heart_rates.clear();
        self.positions.clear();
    }

    pub fn firefighter(&self, id: &EntityId) -> Option<&Firefighter> {
        self.firefighters.get(id).map(|cached| &cached.firefighter)
    }

    pub fn cached(&self, id: &EntityId) -> Option<&CachedFirefighter> {
        self.firefighters.get(id)
    }

    /// All cached firefighters ordered by id
    pub fn firefighters(&self) -> impl Iterator<Item = &Firefighter> {
        self.firefighters.values().map(|cached| &cached.firefighter)
    }

    pub fn len(&self) -> usize {
        self.firefighters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.firefighters.is_empty()
    }

    pub fn heart_rate_series(&self, id: &EntityId) -> Vec<HeartRateSample> {
        self.heart_rates
            .get(id)
            .map(|series| series.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn position_track(&self, id: &EntityId) -> Option<&PositionTrack> {
        self.positions.get(id)
    }

    /// Display name for an id, falling back to the raw id
    pub fn display_name(&self, id: &EntityId) -> String {
        self.firefighter(id)
            .map(|f| f.display_name().to_string())
            .unwrap_or_else(|| id.to_string())
    }
}

fn has_moved(current: &Position, next: &Position) -> bool {
    current.floor != next.floor
        || (current.latitude - next.latitude).abs() > POSITION_EPSILON_DEG
        || (current.longitude - next.longitude).abs() > POSITION_EPSILON_DEG
}
