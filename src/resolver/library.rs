use async_trait::async_trait;
use fuzzy_matcher::{clangd::ClangdMatcher, FuzzyMatcher};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use super::{Resolved, Resolver, SearchQuery};
use crate::audio::Track;
use crate::error::{Error, Result};

/// Named list of catalog tracks reachable by its own URL
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogPlaylist {
    pub name: String,
    pub uri: String,
    pub track_ids: Vec<String>,
}

/// On-disk catalog the library resolver answers from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub playlists: Vec<CatalogPlaylist>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let catalog: Catalog = serde_json::from_str(&content)?;
        info!(
            "Loaded catalog with {} tracks and {} playlists from {}",
            catalog.tracks.len(),
            catalog.playlists.len(),
            path.display()
        );
        Ok(catalog)
    }

    fn track(&self, identifier: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.identifier == identifier)
    }
}

/// Resolves queries against a local catalog: links by exact uri, text by fuzzy match
pub struct LibraryResolver {
    catalog: Catalog,
    matcher: ClangdMatcher,
    min_score: i64,
}

impl LibraryResolver {
    pub fn new(catalog: Catalog, min_score: i64) -> Self {
        Self {
            catalog,
            matcher: ClangdMatcher::default(),
            min_score,
        }
    }

    /// Missing catalog file means an empty library, not a startup failure
    pub fn from_path(path: &Path, min_score: i64) -> Result<Self> {
        let catalog = if path.exists() {
            Catalog::load(path)
                .map_err(|e| Error::Resolver(format!("could not load catalog {}: {}", path.display(), e)))?
        } else {
            warn!("Catalog {} not found - every search will come back empty", path.display());
            Catalog::default()
        };
        Ok(Self::new(catalog, min_score))
    }

    fn lookup_url(&self, url: &str) -> Resolved {
        if let Some(playlist) = self.catalog.playlists.iter().find(|p| p.uri == url) {
            let tracks: Vec<Track> = playlist
                .track_ids
                .iter()
                .filter_map(|id| {
                    let track = self.catalog.track(id);
                    if track.is_none() {
                        warn!("Playlist '{}' references unknown track '{}'", playlist.name, id);
                    }
                    track.cloned()
                })
                .collect();
            return Resolved::Playlist {
                name: playlist.name.clone(),
                tracks,
            };
        }

        match self.catalog.tracks.iter().find(|t| t.uri == url) {
            Some(track) => Resolved::Track(track.clone()),
            None => Resolved::Empty,
        }
    }

    // fuzzy_match(choice, pattern) - the track field is the choice, the query is the pattern
    fn search(&self, text: &str) -> Resolved {
        let mut best: Option<(i64, &Track)> = None;

        for track in &self.catalog.tracks {
            let combined = format!("{} {}", track.title, track.author);
            let score = [track.title.as_str(), track.author.as_str(), combined.as_str()]
                .iter()
                .filter_map(|field| self.matcher.fuzzy_match(field, text))
                .max();

            if let Some(score) = score {
                if score >= self.min_score && best.map_or(true, |(top, _)| score > top) {
                    best = Some((score, track));
                }
            }
        }

        match best {
            Some((score, track)) => {
                debug!("Search '{}' matched '{}' (score {})", text, track.title, score);
                Resolved::Track(track.clone())
            }
            None => Resolved::Empty,
        }
    }
}

#[async_trait]
impl Resolver for LibraryResolver {
    async fn resolve(&self, query: &SearchQuery) -> Result<Resolved> {
        Ok(match query {
            SearchQuery::Url(url) => self.lookup_url(url),
            SearchQuery::Search(text) => self.search(text),
        })
    }
}
