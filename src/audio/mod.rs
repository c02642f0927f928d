pub mod queue;
pub mod track;

pub use queue::{Queue, RepeatMode};
pub use track::{format_clock, Track};
