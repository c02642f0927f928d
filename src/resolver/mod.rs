// Track resolution - turns what the user typed into something playable

pub mod library;

pub use library::LibraryResolver;

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

use crate::audio::Track;
use crate::error::{Error, Result};

fn looks_like_url(query: &str) -> bool {
    static URL_REG: OnceLock<Option<Regex>> = OnceLock::new();
    URL_REG
        .get_or_init(|| Regex::new(r"^https?://(?:www\.)?.+").ok())
        .as_ref()
        .is_some_and(|regex| regex.is_match(query))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    /// Direct link to a track or playlist
    Url(String),
    /// Free text, answered with the best match
    Search(String),
}

impl SearchQuery {
    /// Chat clients wrap links in `<...>` to suppress embeds; strip that first
    pub fn parse(raw: &str) -> Result<Self> {
        let query = raw.trim().trim_start_matches('<').trim_end_matches('>').trim();
        if query.is_empty() {
            return Err(Error::NoResultsFound);
        }

        if looks_like_url(query) {
            Ok(SearchQuery::Url(query.to_string()))
        } else {
            Ok(SearchQuery::Search(query.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SearchQuery::Url(s) | SearchQuery::Search(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Track(Track),
    Playlist { name: String, tracks: Vec<Track> },
    Empty,
}

/// What a `play` added to the queue, for the reply
#[derive(Debug, Clone, PartialEq)]
pub enum Enqueued {
    Track(Track),
    Playlist { name: String, count: usize },
}

#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, query: &SearchQuery) -> Result<Resolved>;
}

/// Parse, resolve and flatten a raw query into the tracks to enqueue.
/// Anything that yields no tracks is `NoResultsFound`.
pub async fn resolve_tracks(resolver: &dyn Resolver, raw: &str) -> Result<(Vec<Track>, Enqueued)> {
    let query = SearchQuery::parse(raw)?;
    match resolver.resolve(&query).await? {
        Resolved::Track(track) => Ok((vec![track.clone()], Enqueued::Track(track))),
        Resolved::Playlist { name, tracks } if !tracks.is_empty() => {
            let count = tracks.len();
            Ok((tracks, Enqueued::Playlist { name, count }))
        }
        Resolved::Playlist { .. } | Resolved::Empty => Err(Error::NoResultsFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_parsing() {
        assert_eq!(
            SearchQuery::parse("<https://www.example.com/watch?v=1>").unwrap(),
            SearchQuery::Url("https://www.example.com/watch?v=1".to_string())
        );
        assert_eq!(
            SearchQuery::parse("http://example.com/a").unwrap(),
            SearchQuery::Url("http://example.com/a".to_string())
        );
        assert_eq!(
            SearchQuery::parse("  never gonna give you up ").unwrap(),
            SearchQuery::Search("never gonna give you up".to_string())
        );
        assert_eq!(
            SearchQuery::parse("ftp://example.com/a").unwrap(),
            SearchQuery::Search("ftp://example.com/a".to_string())
        );
        assert!(matches!(SearchQuery::parse("  <> "), Err(Error::NoResultsFound)));
    }

    struct Fixed(Resolved);

    #[async_trait]
    impl Resolver for Fixed {
        async fn resolve(&self, _query: &SearchQuery) -> Result<Resolved> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_resolve_tracks_flattens_results() {
        let a = Track::new("a", "A", "X", 1_000, "https://example.com/a");
        let b = Track::new("b", "B", "X", 1_000, "https://example.com/b");

        let (tracks, enqueued) = resolve_tracks(&Fixed(Resolved::Track(a.clone())), "a").await.unwrap();
        assert_eq!(tracks, vec![a.clone()]);
        assert_eq!(enqueued, Enqueued::Track(a.clone()));

        let playlist = Resolved::Playlist {
            name: "Mix".to_string(),
            tracks: vec![a.clone(), b.clone()],
        };
        let (tracks, enqueued) = resolve_tracks(&Fixed(playlist), "mix").await.unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(enqueued, Enqueued::Playlist { name: "Mix".to_string(), count: 2 });

        let empty = Resolved::Playlist { name: "Nothing".to_string(), tracks: vec![] };
        assert!(matches!(resolve_tracks(&Fixed(empty), "x").await, Err(Error::NoResultsFound)));
        assert!(matches!(resolve_tracks(&Fixed(Resolved::Empty), "x").await, Err(Error::NoResultsFound)));
    }
}
