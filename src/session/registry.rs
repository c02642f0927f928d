// Session registry - one live session per guild
// Creation happens on the first command that needs a connection; a session
// removes itself from the map when its task ends (teardown or idle timeout).

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::handle::SessionHandle;
use super::player::Player;
use crate::audio::Track;
use crate::config::SessionConfig;
use crate::engine::{ChannelId, EngineEvent, PlaybackEngine, SessionKey};
use crate::error::{Error, Result};
use crate::resolver::{resolve_tracks, Enqueued, Resolver};

// A creating command can land on a session that is just shutting down; one
// retry on a fresh session is enough since the new one can't be mid-teardown
const CREATE_ATTEMPTS: usize = 2;

type SessionMap = Arc<Mutex<HashMap<SessionKey, SessionHandle>>>;

#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    sessions: SessionMap,
    engine: Arc<dyn PlaybackEngine>,
    resolver: Arc<dyn Resolver>,
    settings: SessionConfig,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new(engine: Arc<dyn PlaybackEngine>, resolver: Arc<dyn Resolver>, settings: SessionConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sessions: Arc::new(Mutex::new(HashMap::new())),
                engine,
                resolver,
                settings,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn settings(&self) -> &SessionConfig {
        &self.inner.settings
    }

    /// Feed engine events to their sessions. Events for guilds without a
    /// live session are dropped.
    pub fn route_engine_events(&self, mut events: mpsc::UnboundedReceiver<EngineEvent>) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match registry.get(event.key).await {
                    Some(handle) => {
                        if handle.forward_engine_event(event).is_err() {
                            debug!("Session for guild {} closed before an engine event arrived", handle.key());
                        }
                    }
                    None => debug!("Dropping {:?} for guild {} - no session", event.kind, event.key),
                }
            }
            debug!("Engine event stream closed");
        })
    }

    /// Live session for `key`, if there is one
    pub async fn get(&self, key: SessionKey) -> Option<SessionHandle> {
        let sessions = self.inner.sessions.lock().await;
        sessions.get(&key).filter(|h| !h.is_closed()).cloned()
    }

    /// Live session for `key` or `NotConnected`; for commands that never create one
    pub async fn session(&self, key: SessionKey) -> Result<SessionHandle> {
        self.get(key).await.ok_or(Error::NotConnected)
    }

    pub async fn get_or_create(&self, key: SessionKey) -> SessionHandle {
        let mut sessions = self.inner.sessions.lock().await;
        if let Some(handle) = sessions.get(&key).filter(|h| !h.is_closed()) {
            return handle.clone();
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (mailbox, inbox) = mpsc::unbounded_channel();
        let player = Player::new(key, self.inner.engine.clone(), &self.inner.settings, mailbox.clone());
        let handle = SessionHandle::new(id, key, mailbox, self.inner.resolver.clone());
        sessions.insert(key, handle.clone());
        drop(sessions);

        let session_map = self.inner.sessions.clone();
        tokio::spawn(async move {
            player.run(inbox).await;
            let mut sessions = session_map.lock().await;
            if sessions.get(&key).is_some_and(|h| h.id() == id) {
                sessions.remove(&key);
            }
        });

        info!("Created session {} for guild {}", id, key);
        handle
    }

    pub async fn connect(&self, key: SessionKey, channel: ChannelId) -> Result<()> {
        for _ in 0..CREATE_ATTEMPTS {
            match self.get_or_create(key).await.try_connect(channel).await {
                Err(Error::SessionClosed) => continue,
                other => return other,
            }
        }
        Err(Error::NotConnected)
    }

    /// Resolve `query` and queue it, connecting to `channel` if the guild has no session
    pub async fn play(&self, key: SessionKey, query: &str, channel: Option<ChannelId>) -> Result<Enqueued> {
        let (tracks, enqueued) = resolve_tracks(self.inner.resolver.as_ref(), query).await?;
        self.enqueue(key, tracks, channel).await?;
        Ok(enqueued)
    }

    pub async fn enqueue(&self, key: SessionKey, tracks: Vec<Track>, channel: Option<ChannelId>) -> Result<()> {
        for _ in 0..CREATE_ATTEMPTS {
            match self.get_or_create(key).await.try_enqueue(tracks.clone(), channel).await {
                Err(Error::SessionClosed) => continue,
                other => return other,
            }
        }
        Err(Error::NotConnected)
    }

    /// Clear the queue and leave
    pub async fn disconnect(&self, key: SessionKey) -> Result<()> {
        match self.get(key).await {
            Some(handle) => handle.teardown(true).await,
            None => Err(Error::NotConnected),
        }
    }

    /// Leave without touching the queue; no session is not an error
    pub async fn teardown(&self, key: SessionKey) -> Result<()> {
        match self.get(key).await {
            Some(handle) => handle.teardown(false).await,
            None => Ok(()),
        }
    }

    pub async fn keys(&self) -> Vec<SessionKey> {
        let sessions = self.inner.sessions.lock().await;
        let mut keys: Vec<SessionKey> = sessions
            .iter()
            .filter(|(_, h)| !h.is_closed())
            .map(|(k, _)| *k)
            .collect();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.keys().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Tear every session down at once
    pub async fn shutdown(&self) {
        let handles: Vec<SessionHandle> = self.inner.sessions.lock().await.values().cloned().collect();
        info!("Shutting down {} session(s)", handles.len());
        join_all(handles.iter().map(|h| h.teardown(true))).await;
    }
}
