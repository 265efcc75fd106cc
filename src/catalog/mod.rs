use include_dir::{include_dir, Dir};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

static CATALOG_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/catalog");

const BUILTIN_FILE: &str = "tracks.json";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

/// Track metadata; only the duration matters to a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    /// 0 means the session never completes on its own
    #[serde(default)]
    pub duration_secs: u32,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub difficulty: Difficulty,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog file {path:?} could not be read: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("catalog is not valid json: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("builtin catalog missing from the binary")]
    MissingBuiltin,
    #[error("duplicate track id {0:?}")]
    DuplicateId(String),
}

pub trait MusicCatalog: Send + Sync {
    fn track_by_id(&self, id: &str) -> Option<Track>;
    fn search_tracks(&self, query: &str) -> Vec<Track>;
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[allow(dead_code)]
    #[serde(default)]
    name: String,
    tracks: Vec<Track>,
}

/// In-memory catalog backed by a JSON track list
#[derive(Debug, Clone)]
pub struct BuiltinCatalog {
    tracks: Vec<Track>,
}

impl BuiltinCatalog {
    /// The track list compiled into the binary
    pub fn load() -> Result<Self, CatalogError> {
        let file = CATALOG_DIR
            .get_file(BUILTIN_FILE)
            .ok_or(CatalogError::MissingBuiltin)?;
        let contents = file
            .contents_utf8()
            .ok_or(CatalogError::MissingBuiltin)?;
        Self::from_json(contents)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::from_tracks(file.tracks)
    }

    pub fn from_tracks(tracks: Vec<Track>) -> Result<Self, CatalogError> {
        if let Some(dup) = tracks.iter().map(|t| &t.id).duplicates().next() {
            return Err(CatalogError::DuplicateId(dup.clone()));
        }
        Ok(Self { tracks })
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl MusicCatalog for BuiltinCatalog {
    fn track_by_id(&self, id: &str) -> Option<Track> {
        self.tracks.iter().find(|t| t.id == id).cloned()
    }

    fn search_tracks(&self, query: &str) -> Vec<Track> {
        let needle = query.trim().to_lowercase();
        self.tracks
            .iter()
            .filter(|t| {
                needle.is_empty()
                    || t.title.to_lowercase().contains(&needle)
                    || t.artist.to_lowercase().contains(&needle)
                    || t.genre.to_lowercase().contains(&needle)
            })
            .sorted_by_key(|t| t.title.to_lowercase())
            .cloned()
            .collect()
    }
}
