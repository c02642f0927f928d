use serde::Serialize;
use tokio::sync::oneshot;

use crate::audio::{RepeatMode, Track};
use crate::engine::{ChannelId, EngineEvent, SessionKey};
use crate::error::Result;

pub(crate) type Reply<T> = oneshot::Sender<Result<T>>;

/// Everything a session reacts to, in arrival order through one mailbox
#[derive(Debug)]
pub(crate) enum SessionMessage {
    Command(SessionCommand),
    Engine(EngineEvent),
    /// Sent by the idle timer task; stale generations are ignored
    IdleElapsed { generation: u64 },
}

#[derive(Debug)]
pub(crate) enum SessionCommand {
    Connect { channel: ChannelId, reply: Reply<()> },
    Enqueue { tracks: Vec<Track>, channel: Option<ChannelId>, reply: Reply<()> },
    Pause { reply: Reply<()> },
    Resume { reply: Reply<()> },
    Stop { reply: Reply<()> },
    Skip { reply: Reply<()> },
    SetRepeatMode { mode: RepeatMode, reply: Reply<()> },
    Shuffle { reply: Reply<()> },
    Clear { reply: Reply<()> },
    SetVolume { volume: i64, reply: Reply<u8> },
    NowPlaying { reply: Reply<NowPlaying> },
    Upcoming { reply: Reply<Vec<Track>> },
    History { reply: Reply<Vec<Track>> },
    Status { reply: Reply<SessionStatus> },
    Teardown { clear_queue: bool, reply: Reply<()> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Disconnected,
    Idle,
    Playing,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NowPlaying {
    pub title: String,
    pub author: String,
    pub position_ms: u64,
    pub length_ms: u64,
    pub paused: bool,
}

/// Point-in-time view of a session for status displays
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub key: SessionKey,
    pub channel: Option<ChannelId>,
    pub state: PlaybackState,
    pub repeat_mode: RepeatMode,
    pub volume: u8,
    pub queue_len: usize,
    pub position: usize,
    pub idle_timer_armed: bool,
}
