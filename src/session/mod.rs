// Playback sessions - one per voice connection
// Commands and engine events meet in a single mailbox per session, so the
// queue is never advanced twice for the same track.

mod events;
mod handle;
mod idle;
mod player;
mod registry;

pub use events::{NowPlaying, PlaybackState, SessionStatus};
pub use handle::SessionHandle;
pub use registry::SessionRegistry;
