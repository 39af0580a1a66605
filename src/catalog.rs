use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One entry of the song database. Catalog order matches scorer class order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub title: String,
    pub artist: String,
    pub genre: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub chord: String,
}

pub fn load_catalog(path: &Path) -> Result<Vec<Song>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read song catalog: {}", path.display()))?;
    let songs: Vec<Song> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse song catalog: {}", path.display()))?;
    log::info!("Loaded {} songs from {}", songs.len(), path.display());
    Ok(songs)
}
