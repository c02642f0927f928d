// In-process stand-in for a real audio node
// "Plays" a track by waiting out its length on a tokio timer, then reports it ended.
// Pausing freezes the remaining time. Live streams (no length) only end when stopped.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{ChannelId, EngineEvent, EngineEventKind, PlaybackEngine, SessionKey};
use crate::audio::Track;
use crate::error::{Error, Result};

pub struct SimulatedEngine {
    inner: Arc<Inner>,
}

struct Inner {
    connections: Mutex<HashMap<SessionKey, Connection>>,
    events: mpsc::UnboundedSender<EngineEvent>,
}

struct Connection {
    channel: ChannelId,
    volume: u8,
    playing: Option<Playing>,
}

struct Playing {
    play_id: u64,
    track: Track,
    remaining: Duration,
    // None while paused
    resumed_at: Option<Instant>,
    timer: CancellationToken,
}

impl SimulatedEngine {
    pub fn new(events: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self {
            inner: Arc::new(Inner {
                connections: Mutex::new(HashMap::new()),
                events,
            }),
        }
    }

    pub async fn channel(&self, key: SessionKey) -> Option<ChannelId> {
        self.inner.connections.lock().await.get(&key).map(|c| c.channel)
    }

    pub async fn volume(&self, key: SessionKey) -> Option<u8> {
        self.inner.connections.lock().await.get(&key).map(|c| c.volume)
    }

    /// Identifier of the track currently loaded (playing or paused)
    pub async fn loaded_track(&self, key: SessionKey) -> Option<String> {
        self.inner
            .connections
            .lock()
            .await
            .get(&key)
            .and_then(|c| c.playing.as_ref())
            .map(|p| p.track.identifier.clone())
    }

    fn start_timer(&self, key: SessionKey, play_id: u64, track_id: String, remaining: Duration) -> CancellationToken {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let inner = self.inner.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(remaining) => {
                    let mut connections = inner.connections.lock().await;
                    let finished = connections
                        .get_mut(&key)
                        .filter(|c| c.playing.as_ref().is_some_and(|p| p.play_id == play_id))
                        .and_then(|c| c.playing.take());
                    drop(connections);

                    if finished.is_some() {
                        debug!("Track '{}' finished on guild {}", track_id, key);
                        let _ = inner.events.send(EngineEvent::new(key, track_id, play_id, EngineEventKind::Ended));
                    }
                }
            }
        });

        token
    }
}

#[async_trait]
impl PlaybackEngine for SimulatedEngine {
    async fn connect(&self, key: SessionKey, channel: ChannelId) -> Result<()> {
        let mut connections = self.inner.connections.lock().await;
        match connections.get_mut(&key) {
            Some(connection) => {
                info!("Moving guild {} to channel {}", key, channel);
                connection.channel = channel;
            }
            None => {
                info!("Connecting guild {} to channel {}", key, channel);
                connections.insert(
                    key,
                    Connection {
                        channel,
                        volume: 100,
                        playing: None,
                    },
                );
            }
        }
        Ok(())
    }

    async fn play(&self, key: SessionKey, track: &Track, play_id: u64) -> Result<()> {
        let mut connections = self.inner.connections.lock().await;
        let connection = connections.get_mut(&key).ok_or(Error::NotConnected)?;

        // Replacing a track is silent - only the new one gets reported
        if let Some(previous) = connection.playing.take() {
            previous.timer.cancel();
        }

        let remaining = track.length();
        let timer = if track.is_stream() {
            CancellationToken::new()
        } else {
            self.start_timer(key, play_id, track.identifier.clone(), remaining)
        };

        connection.playing = Some(Playing {
            play_id,
            track: track.clone(),
            remaining,
            resumed_at: Some(Instant::now()),
            timer,
        });
        drop(connections);

        let _ = self.inner.events.send(EngineEvent::new(
            key,
            track.identifier.clone(),
            play_id,
            EngineEventKind::Started,
        ));
        Ok(())
    }

    async fn stop(&self, key: SessionKey) -> Result<()> {
        let mut connections = self.inner.connections.lock().await;
        let connection = connections.get_mut(&key).ok_or(Error::NotConnected)?;

        if let Some(playing) = connection.playing.take() {
            playing.timer.cancel();
            drop(connections);
            let _ = self.inner.events.send(EngineEvent::new(
                key,
                playing.track.identifier,
                playing.play_id,
                EngineEventKind::Ended,
            ));
        }
        Ok(())
    }

    async fn set_pause(&self, key: SessionKey, paused: bool) -> Result<()> {
        let mut connections = self.inner.connections.lock().await;
        let connection = connections.get_mut(&key).ok_or(Error::NotConnected)?;
        let Some(playing) = connection.playing.as_mut() else {
            return Ok(());
        };

        match (paused, playing.resumed_at) {
            (true, Some(resumed_at)) => {
                playing.timer.cancel();
                playing.remaining = playing.remaining.saturating_sub(resumed_at.elapsed());
                playing.resumed_at = None;
            }
            (false, None) => {
                playing.resumed_at = Some(Instant::now());
                if !playing.track.is_stream() {
                    let (play_id, track_id, remaining) =
                        (playing.play_id, playing.track.identifier.clone(), playing.remaining);
                    playing.timer = self.start_timer(key, play_id, track_id, remaining);
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn set_volume(&self, key: SessionKey, volume: u8) -> Result<()> {
        let mut connections = self.inner.connections.lock().await;
        let connection = connections.get_mut(&key).ok_or(Error::NotConnected)?;
        connection.volume = volume.min(100);
        Ok(())
    }

    async fn disconnect(&self, key: SessionKey) -> Result<()> {
        let removed = self.inner.connections.lock().await.remove(&key);
        match removed {
            Some(connection) => {
                if let Some(playing) = connection.playing {
                    playing.timer.cancel();
                }
                info!("Disconnected guild {}", key);
                Ok(())
            }
            None => Err(Error::NotConnected),
        }
    }
}
