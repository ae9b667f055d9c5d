use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{LibraryItem, MediaType, WatchHistoryEntry};

/// Every Plex JSON response is wrapped in a `MediaContainer` object
#[derive(Debug, Deserialize)]
pub struct PlexResponse<T> {
    #[serde(rename = "MediaContainer")]
    pub media_container: T,
}

/// GET /identity
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlexIdentity {
    pub machine_identifier: String,
}

/// GET /library/sections
#[derive(Debug, Deserialize)]
pub struct PlexSections {
    #[serde(rename = "Directory", default)]
    pub directories: Vec<PlexSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlexSection {
    pub key: String,
    pub title: String,
    #[serde(rename = "type")]
    pub section_type: String,
}

/// Any endpoint returning a list of metadata items
#[derive(Debug, Default, Deserialize)]
pub struct PlexMetadataList {
    #[serde(rename = "Metadata", default)]
    pub metadata: Vec<PlexMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlexMetadata {
    #[serde(default)]
    pub rating_key: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub item_type: String,
    #[serde(default)]
    pub grandparent_title: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    /// Unix seconds, present on history entries
    #[serde(default)]
    pub viewed_at: Option<i64>,
    #[serde(rename = "Label", default)]
    pub labels: Vec<PlexTag>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlexTag {
    pub tag: String,
}

impl PlexMetadata {
    /// Converts a history row, folding episodes into their show
    pub fn into_history_entry(self) -> Option<WatchHistoryEntry> {
        let watched_at = self
            .viewed_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));

        let (title, media_type) = match self.item_type.as_str() {
            "movie" => (self.title, MediaType::Movie),
            "episode" => (self.grandparent_title?, MediaType::Show),
            "show" => (self.title, MediaType::Show),
            _ => return None,
        };

        if title.trim().is_empty() {
            return None;
        }

        Some(WatchHistoryEntry {
            title,
            media_type,
            watched_at,
        })
    }

    pub fn into_library_item(self) -> Option<LibraryItem> {
        let media_type = MediaType::parse(&self.item_type)?;
        Some(LibraryItem {
            id: self.rating_key?,
            title: self.title,
            media_type,
            year: self.year,
        })
    }
}

/// Plex library item type codes used by filters and collection creation
pub fn plex_type_code(media_type: MediaType) -> u8 {
    match media_type {
        MediaType::Movie => 1,
        MediaType::Show => 2,
    }
}
