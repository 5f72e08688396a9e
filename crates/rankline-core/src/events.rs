//! Events delivered to the host application.
//!
//! Every completion of either flow ends in exactly one [`LeaderboardEvent`]:
//!
//! - `userResultSubmit`: no fields, success or failure
//! - `userRankRequest`: `rank`, `level`, `result`, `minorResult` on success,
//!   no fields on failure
//!
//! The raw remote status never reaches the sink, only the success flag.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;
use strum::{Display, EnumString, IntoStaticStr};

/// Which flow produced an event
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, EnumString, IntoStaticStr, Display,
)]
pub enum Phase {
    #[strum(serialize = "userResultSubmit")]
    #[serde(rename = "userResultSubmit")]
    ResultSubmit,
    #[strum(serialize = "userRankRequest")]
    #[serde(rename = "userRankRequest")]
    RankRequest,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

pub const FIELD_RANK: &str = "rank";
pub const FIELD_LEVEL: &str = "level";
pub const FIELD_RESULT: &str = "result";
pub const FIELD_MINOR_RESULT: &str = "minorResult";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEvent {
    pub phase: Phase,
    pub success: bool,
    pub player: String,
    pub fields: BTreeMap<&'static str, u32>,
}

impl LeaderboardEvent {
    pub fn new(phase: Phase, success: bool, player: impl Into<String>) -> Self {
        Self {
            phase,
            success,
            player: player.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: &'static str, value: u32) -> Self {
        self.fields.insert(key, value);
        self
    }

    pub fn field(&self, key: &str) -> Option<u32> {
        self.fields.get(key).copied()
    }
}

/// Receiver for leaderboard events.
///
/// Called without any tracker lock held, from whichever thread completed
/// the request. Implementations may call back into the tracker.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: LeaderboardEvent);
}

impl<F> EventSink for F
where
    F: Fn(LeaderboardEvent) + Send + Sync,
{
    fn emit(&self, event: LeaderboardEvent) {
        self(event)
    }
}

/// Sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<LeaderboardEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LeaderboardEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn count(&self, phase: Phase) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| e.phase == phase)
            .count()
    }

    pub fn last(&self) -> Option<LeaderboardEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: LeaderboardEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}
