// Per-connection playback state machine
// One Player runs as one task and is the only owner of its queue, so commands
// and engine events for a guild are handled strictly one at a time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::events::{NowPlaying, PlaybackState, SessionCommand, SessionMessage, SessionStatus};
use super::idle::IdleTimer;
use crate::audio::{Queue, RepeatMode, Track};
use crate::config::SessionConfig;
use crate::engine::{ChannelId, EngineEvent, EngineEventKind, PlaybackEngine, SessionKey};
use crate::error::{Error, Result};

// Process-wide so an event from a torn-down session can't match a play in its successor
static NEXT_PLAY_ID: AtomicU64 = AtomicU64::new(1);

fn next_play_id() -> u64 {
    NEXT_PLAY_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Disconnected,
    Connecting,
    Connected,
    TearingDown,
}

/// Play position bookkeeping that leaves paused time out
#[derive(Debug, Clone)]
struct PlayClock {
    started_at: Instant,
    paused_at: Option<Instant>,
    paused_total: Duration,
}

impl PlayClock {
    fn start() -> Self {
        Self {
            started_at: Instant::now(),
            paused_at: None,
            paused_total: Duration::ZERO,
        }
    }

    fn pause(&mut self) {
        if self.paused_at.is_none() {
            self.paused_at = Some(Instant::now());
        }
    }

    fn resume(&mut self) {
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_total += paused_at.elapsed();
        }
    }

    fn position(&self) -> Duration {
        let end = self.paused_at.unwrap_or_else(Instant::now);
        end.saturating_duration_since(self.started_at)
            .saturating_sub(self.paused_total)
    }
}

#[derive(Debug)]
struct ActiveTrack {
    track: Track,
    play_id: u64,
    clock: PlayClock,
    paused: bool,
    /// The queue was cleared underneath it; when it ends, play resumes from
    /// the queue start instead of advancing
    detached: bool,
}

pub(crate) struct Player {
    key: SessionKey,
    queue: Queue,
    engine: Arc<dyn PlaybackEngine>,
    channel: Option<ChannelId>,
    lifecycle: Lifecycle,
    active: Option<ActiveTrack>,
    idle: IdleTimer,
    volume: u8,
    consecutive_failures: u32,
    max_consecutive_failures: u32,
}

impl Player {
    pub(crate) fn new(
        key: SessionKey,
        engine: Arc<dyn PlaybackEngine>,
        settings: &SessionConfig,
        mailbox: mpsc::UnboundedSender<SessionMessage>,
    ) -> Self {
        Self {
            key,
            queue: Queue::new(),
            engine,
            channel: None,
            lifecycle: Lifecycle::Disconnected,
            active: None,
            idle: IdleTimer::new(key, settings.idle_timeout(), mailbox),
            volume: settings.default_volume.min(100),
            consecutive_failures: 0,
            max_consecutive_failures: settings.max_consecutive_failures.max(1),
        }
    }

    /// Process messages until the session ends up disconnected.
    /// A session only lives while it holds a voice connection.
    pub(crate) async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<SessionMessage>) {
        debug!("Session task started for guild {}", self.key);

        while let Some(message) = inbox.recv().await {
            match message {
                SessionMessage::Command(command) => self.handle_command(command).await,
                SessionMessage::Engine(event) => self.handle_engine_event(event).await,
                SessionMessage::IdleElapsed { generation } => self.handle_idle_elapsed(generation).await,
            }

            if self.lifecycle == Lifecycle::Disconnected {
                break;
            }
        }

        self.idle.cancel();
        debug!("Session task finished for guild {}", self.key);
    }

    pub(crate) fn playback_state(&self) -> PlaybackState {
        if self.channel.is_none() {
            return PlaybackState::Disconnected;
        }
        match &self.active {
            None => PlaybackState::Idle,
            Some(active) if active.paused => PlaybackState::Paused,
            Some(_) => PlaybackState::Playing,
        }
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        // A dropped receiver just means the caller stopped waiting
        match command {
            SessionCommand::Connect { channel, reply } => {
                let _ = reply.send(self.connect(channel).await);
            }
            SessionCommand::Enqueue { tracks, channel, reply } => {
                let _ = reply.send(self.enqueue(tracks, channel).await);
            }
            SessionCommand::Pause { reply } => {
                let _ = reply.send(self.pause().await);
            }
            SessionCommand::Resume { reply } => {
                let _ = reply.send(self.resume().await);
            }
            SessionCommand::Stop { reply } => {
                let _ = reply.send(self.stop().await);
            }
            SessionCommand::Skip { reply } => {
                let _ = reply.send(self.skip().await);
            }
            SessionCommand::SetRepeatMode { mode, reply } => {
                let _ = reply.send(self.set_repeat_mode(mode));
            }
            SessionCommand::Shuffle { reply } => {
                let _ = reply.send(self.shuffle());
            }
            SessionCommand::Clear { reply } => {
                let _ = reply.send(self.clear());
            }
            SessionCommand::SetVolume { volume, reply } => {
                let _ = reply.send(self.set_volume(volume).await);
            }
            SessionCommand::NowPlaying { reply } => {
                let _ = reply.send(self.now_playing());
            }
            SessionCommand::Upcoming { reply } => {
                let _ = reply.send(self.upcoming());
            }
            SessionCommand::History { reply } => {
                let _ = reply.send(self.history());
            }
            SessionCommand::Status { reply } => {
                let _ = reply.send(Ok(self.status()));
            }
            SessionCommand::Teardown { clear_queue, reply } => {
                if clear_queue {
                    self.queue.clear();
                }
                self.teardown().await;
                let _ = reply.send(Ok(()));
            }
        }
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.channel.is_none() {
            return Err(Error::NotConnected);
        }
        Ok(())
    }

    async fn connect(&mut self, channel: ChannelId) -> Result<()> {
        if self.channel == Some(channel) {
            return Err(Error::AlreadyConnected);
        }

        let previous = self.lifecycle;
        self.lifecycle = Lifecycle::Connecting;
        info!("Connecting guild {} to channel {}", self.key, channel);

        if let Err(e) = self.engine.connect(self.key, channel).await {
            warn!("Failed to connect guild {} to channel {}: {}", self.key, channel, e);
            self.lifecycle = previous;
            return Err(e);
        }

        let first_connect = self.channel.is_none();
        self.channel = Some(channel);
        self.lifecycle = Lifecycle::Connected;

        if first_connect {
            if let Err(e) = self.engine.set_volume(self.key, self.volume).await {
                warn!("Could not apply volume {} on guild {}: {}", self.volume, self.key, e);
            }
        }
        // Moving channels mid-song keeps the song going
        if self.active.is_none() {
            self.idle.arm();
        }
        Ok(())
    }

    async fn enqueue(&mut self, tracks: Vec<Track>, channel: Option<ChannelId>) -> Result<()> {
        if tracks.is_empty() {
            return Err(Error::NoResultsFound);
        }
        if self.channel.is_none() {
            let channel = channel.ok_or(Error::NoVoiceChannel)?;
            self.connect(channel).await?;
        }

        let count = tracks.len();
        for track in tracks {
            debug!("Queued '{}' on guild {}", track.title, self.key);
            self.queue.add(track);
        }
        info!("Added {} track(s) to the queue on guild {} ({} total)", count, self.key, self.queue.len());

        if self.active.is_none() {
            self.playback().await?;
        }
        Ok(())
    }

    /// Start whatever the queue says is current, or go idle if there is nothing
    async fn playback(&mut self) -> Result<()> {
        let next = self.queue.current_track().ok().flatten().cloned();

        match next {
            Some(track) => {
                self.idle.cancel();
                // Always re-issue play, even when TRACK repeat hands back the same track
                let play_id = next_play_id();
                if let Err(e) = self.engine.play(self.key, &track, play_id).await {
                    warn!("Engine refused to play '{}' on guild {}: {}", track.title, self.key, e);
                    self.active = None;
                    self.idle.arm();
                    return Err(e);
                }
                info!("Now playing '{}' by {} on guild {}", track.title, track.author, self.key);
                self.active = Some(ActiveTrack {
                    track,
                    play_id,
                    clock: PlayClock::start(),
                    paused: false,
                    detached: false,
                });
            }
            None => {
                self.active = None;
                if let Err(e) = self.engine.stop(self.key).await {
                    warn!("Failed to stop playback on guild {}: {}", self.key, e);
                }
                info!("Nothing left to play on guild {}", self.key);
                self.idle.arm();
            }
        }
        Ok(())
    }

    async fn pause(&mut self) -> Result<()> {
        match self.playback_state() {
            PlaybackState::Playing => {}
            PlaybackState::Paused => return Err(Error::AlreadyPaused),
            PlaybackState::Idle => return Err(Error::NotPlaying),
            PlaybackState::Disconnected => return Err(Error::NotConnected),
        }

        self.engine.set_pause(self.key, true).await?;
        if let Some(active) = self.active.as_mut() {
            active.paused = true;
            active.clock.pause();
        }
        // Pausing forever counts as idling
        self.idle.arm();
        info!("Playback paused on guild {}", self.key);
        Ok(())
    }

    async fn resume(&mut self) -> Result<()> {
        match self.playback_state() {
            PlaybackState::Paused => {}
            PlaybackState::Playing => return Err(Error::NotPaused),
            PlaybackState::Idle => return Err(Error::NotPlaying),
            PlaybackState::Disconnected => return Err(Error::NotConnected),
        }

        self.engine.set_pause(self.key, false).await?;
        if let Some(active) = self.active.as_mut() {
            active.paused = false;
            active.clock.resume();
        }
        self.idle.cancel();
        info!("Playback resumed on guild {}", self.key);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.ensure_connected()?;
        self.queue.clear();
        self.playback().await
    }

    async fn skip(&mut self) -> Result<()> {
        match self.playback_state() {
            PlaybackState::Playing => {}
            PlaybackState::Disconnected => return Err(Error::NotConnected),
            _ => return Err(Error::NotPlaying),
        }

        // The engine answers with an Ended event, which does the actual advancing
        self.engine.stop(self.key).await?;
        if self.active.as_ref().is_some_and(|a| !a.detached) {
            self.queue.request_skip();
        }
        info!("Skipping the current track on guild {}", self.key);
        Ok(())
    }

    fn set_repeat_mode(&mut self, mode: RepeatMode) -> Result<()> {
        self.ensure_connected()?;
        self.queue.set_repeat_mode(mode);
        info!("Repeat mode set to {} on guild {}", mode, self.key);
        Ok(())
    }

    fn shuffle(&mut self) -> Result<()> {
        self.ensure_connected()?;
        self.queue.shuffle()?;
        info!("Shuffled {} upcoming track(s) on guild {}", self.queue.upcoming()?.len(), self.key);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.ensure_connected()?;
        self.queue.clear();
        if let Some(active) = self.active.as_mut() {
            active.detached = true;
        }
        info!("Queue cleared on guild {}", self.key);
        Ok(())
    }

    async fn set_volume(&mut self, volume: i64) -> Result<u8> {
        self.ensure_connected()?;
        let volume = volume.clamp(0, 100) as u8;
        self.engine.set_volume(self.key, volume).await?;
        self.volume = volume;
        debug!("Volume set to {} on guild {}", volume, self.key);
        Ok(volume)
    }

    fn now_playing(&self) -> Result<NowPlaying> {
        self.ensure_connected()?;
        let active = self.active.as_ref().ok_or(Error::NotPlaying)?;

        let mut position_ms = active.clock.position().as_millis() as u64;
        if !active.track.is_stream() {
            position_ms = position_ms.min(active.track.length_ms);
        }

        Ok(NowPlaying {
            title: active.track.title.clone(),
            author: active.track.author.clone(),
            position_ms,
            length_ms: active.track.length_ms,
            paused: active.paused,
        })
    }

    fn upcoming(&self) -> Result<Vec<Track>> {
        self.ensure_connected()?;
        Ok(self.queue.upcoming()?.to_vec())
    }

    fn history(&self) -> Result<Vec<Track>> {
        self.ensure_connected()?;
        Ok(self.queue.history().to_vec())
    }

    fn status(&self) -> SessionStatus {
        SessionStatus {
            key: self.key,
            channel: self.channel,
            state: self.playback_state(),
            repeat_mode: self.queue.repeat_mode(),
            volume: self.volume,
            queue_len: self.queue.len(),
            position: self.queue.position(),
            idle_timer_armed: self.idle.is_armed(),
        }
    }

    async fn handle_engine_event(&mut self, event: EngineEvent) {
        if !event.kind.is_terminal() {
            debug!("Engine started '{}' on guild {}", event.track_id, self.key);
            return;
        }

        let detached = match &self.active {
            // A stop's Ended can land after the same track was played again
            Some(active) if active.play_id == event.play_id && active.track.identifier == event.track_id => {
                active.detached
            }
            _ => {
                debug!(
                    "Ignoring stale {:?} for '{}' (play {}) on guild {}",
                    event.kind, event.track_id, event.play_id, self.key
                );
                return;
            }
        };

        match &event.kind {
            EngineEventKind::Stuck { threshold_ms } => {
                self.consecutive_failures += 1;
                warn!(
                    "Track '{}' stuck for {}ms on guild {} ({} failure(s) in a row)",
                    event.track_id, threshold_ms, self.key, self.consecutive_failures
                );
            }
            EngineEventKind::Exception { message } => {
                self.consecutive_failures += 1;
                warn!(
                    "Track '{}' failed on guild {}: {} ({} failure(s) in a row)",
                    event.track_id, self.key, message, self.consecutive_failures
                );
            }
            _ => self.consecutive_failures = 0,
        }

        if self.consecutive_failures >= self.max_consecutive_failures {
            error!(
                "Giving up on guild {} after {} failed tracks in a row",
                self.key, self.consecutive_failures
            );
            self.teardown().await;
            return;
        }

        // Natural end, stuck and exception all move on the same way
        if !detached {
            self.queue.advance();
        }
        if let Err(e) = self.playback().await {
            warn!("Could not continue playback on guild {}: {}", self.key, e);
        }
    }

    async fn handle_idle_elapsed(&mut self, generation: u64) {
        if !self.idle.claim(generation) {
            debug!("Ignoring stale idle timer (generation {}) on guild {}", generation, self.key);
            return;
        }
        info!("Guild {} has been idle too long, leaving", self.key);
        self.teardown().await;
    }

    /// Best effort and idempotent - local state is always released
    async fn teardown(&mut self) {
        if self.lifecycle == Lifecycle::Disconnected {
            return;
        }
        self.lifecycle = Lifecycle::TearingDown;
        self.idle.cancel();
        self.active = None;

        match self.engine.disconnect(self.key).await {
            Ok(()) | Err(Error::NotConnected) => {}
            Err(e) => warn!("Engine disconnect failed on guild {}: {}", self.key, e),
        }

        self.channel = None;
        self.lifecycle = Lifecycle::Disconnected;
        info!("Session torn down for guild {}", self.key);
    }
}
