// Playback engine boundary - whatever actually decodes and streams audio
// Sessions only ever talk to it through this trait and hear back through EngineEvent

pub mod simulated;

pub use simulated::SimulatedEngine;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::audio::Track;
use crate::error::Result;

/// Identifies one voice connection (one per guild)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey(pub u64);

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEventKind {
    Started,
    Ended,
    Stuck { threshold_ms: u64 },
    Exception { message: String },
}

impl EngineEventKind {
    /// Ended, stuck and exception all finish the track
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EngineEventKind::Started)
    }
}

/// Lifecycle report for the track an engine was told to play
#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    pub key: SessionKey,
    /// `Track::identifier` of the track the event is about
    pub track_id: String,
    /// The `play_id` the session handed to `play` for this playback
    pub play_id: u64,
    pub kind: EngineEventKind,
}

impl EngineEvent {
    pub fn new(key: SessionKey, track_id: impl Into<String>, play_id: u64, kind: EngineEventKind) -> Self {
        Self {
            key,
            track_id: track_id.into(),
            play_id,
            kind,
        }
    }
}

/// Commands a session issues to the engine.
///
/// Contract: every `play` gets exactly one terminal event (ended, stuck or
/// exception) unless it is replaced by another `play` or the connection is
/// dropped; a replaced track reports nothing. `stop` ends the playing track
/// with an `Ended` event, which may arrive after `stop` has returned. Every
/// event echoes the `play_id` of the `play` it belongs to. Volume is 0-100.
#[async_trait]
pub trait PlaybackEngine: Send + Sync {
    async fn connect(&self, key: SessionKey, channel: ChannelId) -> Result<()>;
    async fn play(&self, key: SessionKey, track: &Track, play_id: u64) -> Result<()>;
    async fn stop(&self, key: SessionKey) -> Result<()>;
    async fn set_pause(&self, key: SessionKey, paused: bool) -> Result<()>;
    async fn set_volume(&self, key: SessionKey, volume: u8) -> Result<()>;
    async fn disconnect(&self, key: SessionKey) -> Result<()>;
}
