// Error types for bandstand
// Precondition failures are plain values the command layer turns into replies

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Operation needs a current or upcoming track but the queue has none
    #[error("There are no songs currently in the queue")]
    EmptyQueue,

    #[error("Invalid repeat mode '{0}' (expected off, track or queue)")]
    InvalidRepeatMode(String),

    #[error("I am not connected to any channel")]
    NotConnected,

    #[error("Already connected to that channel")]
    AlreadyConnected,

    #[error("I am not currently playing anything")]
    NotPlaying,

    #[error("Playback is already paused")]
    AlreadyPaused,

    #[error("Playback is not paused")]
    NotPaused,

    #[error("No songs were found with that query")]
    NoResultsFound,

    #[error("No channel to join - join a voice channel first")]
    NoVoiceChannel,

    /// A command sent to the playback engine failed
    #[error("Playback engine error: {0}")]
    Engine(String),

    /// The resolver's backing source is unusable (unreadable or malformed catalog)
    #[error("Resolver error: {0}")]
    Resolver(String),

    /// The session's mailbox is gone - it was torn down while the command was in flight
    #[error("Session closed")]
    SessionClosed,

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Precondition failures are reported to users; everything else is an operational fault
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::EmptyQueue
                | Error::InvalidRepeatMode(_)
                | Error::NotConnected
                | Error::AlreadyConnected
                | Error::NotPlaying
                | Error::AlreadyPaused
                | Error::NotPaused
                | Error::NoResultsFound
                | Error::NoVoiceChannel
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
