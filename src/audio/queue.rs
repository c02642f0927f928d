use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::track::Track;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    Track,
    Queue,
}

impl FromStr for RepeatMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "off" => Ok(RepeatMode::Off),
            "track" => Ok(RepeatMode::Track),
            "queue" => Ok(RepeatMode::Queue),
            _ => Err(Error::InvalidRepeatMode(s.to_string())),
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RepeatMode::Off => "off",
            RepeatMode::Track => "track",
            RepeatMode::Queue => "queue",
        };
        f.write_str(name)
    }
}

/// Ordered track list with a play cursor.
///
/// Tracks before the cursor are history and are never reordered; the track
/// under the cursor is current; everything after it is upcoming. The cursor
/// sits at `len()` once an unrepeated queue has run out, which is the
/// "nothing to play" state until more tracks are added.
#[derive(Debug, Clone, Default)]
pub struct Queue {
    items: Vec<Track>,
    position: usize,
    repeat_mode: RepeatMode,
    pending_skip: bool,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, track: Track) {
        self.items.push(track);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    pub fn skip_requested(&self) -> bool {
        self.pending_skip
    }

    pub fn tracks(&self) -> &[Track] {
        &self.items
    }

    /// Track under the cursor, `None` once the queue has run out.
    /// Asking an empty queue is a caller error.
    pub fn current_track(&self) -> Result<Option<&Track>> {
        if self.items.is_empty() {
            return Err(Error::EmptyQueue);
        }
        Ok(self.items.get(self.position))
    }

    pub fn upcoming(&self) -> Result<&[Track]> {
        if self.items.is_empty() {
            return Err(Error::EmptyQueue);
        }
        Ok(&self.items[self.upcoming_start()..])
    }

    pub fn history(&self) -> &[Track] {
        &self.items[..self.position.min(self.items.len())]
    }

    /// Move to whatever should play after the current track and return it.
    ///
    /// TRACK repeat holds the cursor unless a skip was requested; QUEUE repeat
    /// wraps past the end back to the first track. Any pending skip is consumed.
    pub fn advance(&mut self) -> Option<&Track> {
        let skip = std::mem::take(&mut self.pending_skip);
        if self.items.is_empty() {
            return None;
        }

        if self.repeat_mode == RepeatMode::Track && !skip {
            return self.items.get(self.position);
        }

        if self.position < self.items.len() {
            self.position += 1;
        }
        if self.position >= self.items.len() && self.repeat_mode == RepeatMode::Queue {
            self.position = 0;
        }

        self.items.get(self.position)
    }

    /// Force the next `advance` past a TRACK repeat
    pub fn request_skip(&mut self) {
        self.pending_skip = true;
    }

    pub fn shuffle(&mut self) -> Result<()> {
        self.shuffle_with(&mut rand::thread_rng())
    }

    /// Shuffle only the upcoming tracks; history and the current track keep their slots
    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        if self.items.is_empty() {
            return Err(Error::EmptyQueue);
        }
        let start = self.upcoming_start();
        self.items[start..].shuffle(rng);
        Ok(())
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat_mode = mode;
    }

    /// Drop every track and rewind. Repeat mode survives.
    pub fn clear(&mut self) {
        self.items.clear();
        self.position = 0;
        self.pending_skip = false;
    }

    fn upcoming_start(&self) -> usize {
        (self.position + 1).min(self.items.len())
    }
}
