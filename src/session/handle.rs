use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use super::events::{NowPlaying, Reply, SessionCommand, SessionMessage, SessionStatus};
use crate::audio::{RepeatMode, Track};
use crate::engine::{ChannelId, EngineEvent, SessionKey};
use crate::error::{Error, Result};
use crate::resolver::{resolve_tracks, Enqueued, Resolver};

/// Cheap, cloneable front door to one running session.
///
/// Every call is queued behind whatever the session is already doing. Once the
/// session has torn down, calls report `NotConnected`.
#[derive(Clone)]
pub struct SessionHandle {
    id: u64,
    key: SessionKey,
    mailbox: mpsc::UnboundedSender<SessionMessage>,
    resolver: Arc<dyn Resolver>,
}

impl SessionHandle {
    pub(crate) fn new(
        id: u64,
        key: SessionKey,
        mailbox: mpsc::UnboundedSender<SessionMessage>,
        resolver: Arc<dyn Resolver>,
    ) -> Self {
        Self {
            id,
            key,
            mailbox,
            resolver,
        }
    }

    pub fn key(&self) -> SessionKey {
        self.key
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.mailbox.is_closed()
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> SessionCommand) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.mailbox
            .send(SessionMessage::Command(command(reply)))
            .map_err(|_| Error::SessionClosed)?;
        response.await.map_err(|_| Error::SessionClosed)?
    }

    // SessionClosed is an internal race; callers only ever see NotConnected
    async fn call<T>(&self, command: impl FnOnce(Reply<T>) -> SessionCommand) -> Result<T> {
        self.request(command).await.map_err(|e| match e {
            Error::SessionClosed => Error::NotConnected,
            other => other,
        })
    }

    pub(crate) async fn try_connect(&self, channel: ChannelId) -> Result<()> {
        self.request(|reply| SessionCommand::Connect { channel, reply }).await
    }

    pub(crate) async fn try_enqueue(&self, tracks: Vec<Track>, channel: Option<ChannelId>) -> Result<()> {
        self.request(|reply| SessionCommand::Enqueue { tracks, channel, reply }).await
    }

    pub(crate) fn forward_engine_event(&self, event: EngineEvent) -> Result<()> {
        self.mailbox
            .send(SessionMessage::Engine(event))
            .map_err(|_| Error::SessionClosed)
    }

    pub async fn connect(&self, channel: ChannelId) -> Result<()> {
        self.call(|reply| SessionCommand::Connect { channel, reply }).await
    }

    /// Resolve `query` and queue the result, joining `channel` first if needed
    pub async fn play(&self, query: &str, channel: Option<ChannelId>) -> Result<Enqueued> {
        let (tracks, enqueued) = resolve_tracks(self.resolver.as_ref(), query).await?;
        self.enqueue(tracks, channel).await?;
        Ok(enqueued)
    }

    pub async fn enqueue(&self, tracks: Vec<Track>, channel: Option<ChannelId>) -> Result<()> {
        self.call(|reply| SessionCommand::Enqueue { tracks, channel, reply }).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.call(|reply| SessionCommand::Pause { reply }).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.call(|reply| SessionCommand::Resume { reply }).await
    }

    /// Clear the queue and stop playing, staying connected
    pub async fn stop(&self) -> Result<()> {
        self.call(|reply| SessionCommand::Stop { reply }).await
    }

    pub async fn skip(&self) -> Result<()> {
        self.call(|reply| SessionCommand::Skip { reply }).await
    }

    /// Takes the raw user input; anything but off/track/queue is rejected here
    pub async fn set_repeat_mode(&self, mode: &str) -> Result<RepeatMode> {
        let mode: RepeatMode = mode.parse()?;
        self.call(|reply| SessionCommand::SetRepeatMode { mode, reply }).await?;
        Ok(mode)
    }

    pub async fn shuffle(&self) -> Result<()> {
        self.call(|reply| SessionCommand::Shuffle { reply }).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.call(|reply| SessionCommand::Clear { reply }).await
    }

    /// Out-of-range volumes are clamped to 0-100; returns what was applied
    pub async fn set_volume(&self, volume: i64) -> Result<u8> {
        self.call(|reply| SessionCommand::SetVolume { volume, reply }).await
    }

    pub async fn now_playing(&self) -> Result<NowPlaying> {
        self.call(|reply| SessionCommand::NowPlaying { reply }).await
    }

    pub async fn upcoming(&self) -> Result<Vec<Track>> {
        self.call(|reply| SessionCommand::Upcoming { reply }).await
    }

    pub async fn history(&self) -> Result<Vec<Track>> {
        self.call(|reply| SessionCommand::History { reply }).await
    }

    pub async fn status(&self) -> Result<SessionStatus> {
        self.call(|reply| SessionCommand::Status { reply }).await
    }

    /// Leave the channel. A session that is already gone counts as torn down.
    pub async fn teardown(&self, clear_queue: bool) -> Result<()> {
        match self.request(|reply| SessionCommand::Teardown { clear_queue, reply }).await {
            Err(Error::SessionClosed) => Ok(()),
            other => other,
        }
    }
}
