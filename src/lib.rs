// Bandstand - playback sessions for a voice-channel music bot
// One session per guild: track queue, repeat modes, shuffle, idle teardown

pub mod audio;     // tracks and the queue cursor
pub mod config;    // settings and preferences
pub mod console;   // stdin front end
pub mod engine;    // what actually makes noise
pub mod error;
pub mod presence;  // leave when everyone else has
pub mod resolver;  // query -> tracks
pub mod session;   // per-guild playback state machine

// Export the stuff other modules actually use
pub use audio::{Queue, RepeatMode, Track};
pub use config::Config;
pub use engine::{ChannelId, EngineEvent, EngineEventKind, PlaybackEngine, SessionKey, SimulatedEngine};
pub use error::{Error, Result};
pub use resolver::{Enqueued, LibraryResolver, Resolver, SearchQuery};
pub use session::{NowPlaying, PlaybackState, SessionHandle, SessionRegistry, SessionStatus};
