use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A playable track as handed back by the resolver. Immutable once queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub identifier: String,
    pub title: String,
    pub author: String,
    /// 0 means unknown length (live streams)
    #[serde(default)]
    pub length_ms: u64,
    pub uri: String,
}

impl Track {
    pub fn new(
        identifier: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
        length_ms: u64,
        uri: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            author: author.into(),
            length_ms,
            uri: uri.into(),
        }
    }

    pub fn length(&self) -> Duration {
        Duration::from_millis(self.length_ms)
    }

    pub fn is_stream(&self) -> bool {
        self.length_ms == 0
    }

    pub fn display_length(&self) -> String {
        if self.is_stream() {
            "live".to_string()
        } else {
            format_clock(self.length_ms)
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)
    }
}

/// Format milliseconds as `m:ss`, rounding the seconds like the bot always has
pub fn format_clock(ms: u64) -> String {
    let minutes = ms / 60_000;
    let seconds = ((ms % 60_000) as f64 / 1000.0).round() as u64;
    if seconds == 60 {
        format!("{}:00", minutes + 1)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "0:00");
        assert_eq!(format_clock(61_000), "1:01");
        assert_eq!(format_clock(212_400), "3:32");
        assert_eq!(format_clock(119_700), "2:00");
    }

    #[test]
    fn test_streams_have_no_length() {
        let live = Track::new("live", "Radio", "Station", 0, "https://radio.example/live");
        assert!(live.is_stream());
        assert_eq!(live.display_length(), "live");

        let song = Track::new("a", "Song", "Band", 185_000, "https://example.com/a");
        assert!(!song.is_stream());
        assert_eq!(song.display_length(), "3:05");
        assert_eq!(song.to_string(), "Song");
    }
}
