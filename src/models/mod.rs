use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, path::PathBuf};
use uuid::Uuid;

pub mod ombi;
pub mod openai;
pub mod plex;
pub mod theme;

pub use theme::{PromptModifier, Season, Theme};

/// Kind of library content a recommendation refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Show,
}

impl MediaType {
    /// Lenient parse of the many spellings upstream APIs and models use
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "movie" | "movies" | "film" => Some(MediaType::Movie),
            "show" | "shows" | "tv" | "tv show" | "tv_show" | "tvshow" | "series" | "tv_series"
            | "episode" => Some(MediaType::Show),
            _ => None,
        }
    }

    /// Human-facing noun used in prompts and logs
    pub fn noun(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Show => "TV show",
        }
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaType::Movie => write!(f, "movie"),
            MediaType::Show => write!(f, "show"),
        }
    }
}

/// Drops a trailing "(1999)" year marker, as models often append one
pub fn strip_year(title: &str) -> &str {
    let trimmed = title.trim();
    if let Some(idx) = trimmed.rfind(" (") {
        let inner = &trimmed[idx + 2..];
        if let Some(year) = inner.strip_suffix(')') {
            if year.len() == 4 && year.chars().all(|c| c.is_ascii_digit()) {
                return trimmed[..idx].trim_end();
            }
        }
    }
    trimmed
}

/// Lowercases, collapses whitespace and drops a trailing year marker
///
/// Used for every title comparison: history dedup, library matching and
/// recommendation dedup.
pub fn normalize_title(title: &str) -> String {
    strip_year(title)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// One title from the viewer's watch history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchHistoryEntry {
    pub title: String,
    pub media_type: MediaType,
    pub watched_at: Option<DateTime<Utc>>,
}

/// Input to a single model call for one theme
#[derive(Debug, Clone)]
pub struct RecommendationRequest {
    pub history: Vec<WatchHistoryEntry>,
    pub theme: Theme,
}

/// A title suggested by the language model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub title: String,
    pub media_type: MediaType,
    pub genre: Option<String>,
    pub rationale: Option<String>,
}

impl RecommendationItem {
    pub fn new(title: impl Into<String>, media_type: MediaType) -> Self {
        Self {
            title: title.into(),
            media_type,
            genre: None,
            rationale: None,
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    pub fn normalized_title(&self) -> String {
        normalize_title(&self.title)
    }
}

/// Media server identifier for a library item (Plex rating key)
pub type LibraryId = String;

/// A title that exists in the media server's catalog
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryItem {
    pub id: LibraryId,
    pub title: String,
    pub media_type: MediaType,
    pub year: Option<i32>,
}

/// Result of checking one recommendation against the library
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryMatch {
    pub item: RecommendationItem,
    pub found: bool,
    pub library_id: Option<LibraryId>,
}

impl LibraryMatch {
    pub fn found(item: RecommendationItem, library_id: LibraryId) -> Self {
        Self {
            item,
            found: true,
            library_id: Some(library_id),
        }
    }

    pub fn missing(item: RecommendationItem) -> Self {
        Self {
            item,
            found: false,
            library_id: None,
        }
    }
}

/// Handle to an existing collection on the media server
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionRef {
    pub id: LibraryId,
    pub name: String,
}

/// Request for a title the library does not have
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestTicket {
    pub title: String,
    pub media_type: MediaType,
}

impl From<&RecommendationItem> for RequestTicket {
    fn from(item: &RecommendationItem) -> Self {
        Self {
            title: item.title.clone(),
            media_type: item.media_type,
        }
    }
}

/// What the request service did with a ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Submitted,
    /// The service already has a request (or the title) on file
    AlreadyRequested,
    /// The service's catalog has no match for the title
    NotFound,
}

/// Final outcome of one recommendation item
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    Added {
        collection: String,
        library_id: LibraryId,
    },
    Forwarded {
        already_requested: bool,
    },
    Dropped {
        reason: String,
    },
}

impl Disposition {
    pub fn dropped(reason: impl Into<String>) -> Self {
        Disposition::Dropped {
            reason: reason.into(),
        }
    }

    /// Short label written to reports
    pub fn label(&self) -> &'static str {
        match self {
            Disposition::Added { .. } => "added",
            Disposition::Forwarded { .. } => "forwarded",
            Disposition::Dropped { .. } => "dropped",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemDisposition {
    pub item: RecommendationItem,
    pub disposition: Disposition,
}

/// Everything that happened to one theme during a run
#[derive(Debug, Clone)]
pub struct ThemeReport {
    pub theme_id: String,
    pub collection_name: String,
    pub items: Vec<ItemDisposition>,
    pub report_path: Option<PathBuf>,
}

impl ThemeReport {
    pub fn count(&self, label: &str) -> usize {
        self.items
            .iter()
            .filter(|i| i.disposition.label() == label)
            .count()
    }

    pub fn added(&self) -> usize {
        self.count("added")
    }

    pub fn forwarded(&self) -> usize {
        self.count("forwarded")
    }

    pub fn dropped(&self) -> usize {
        self.count("dropped")
    }
}

#[derive(Debug, Clone)]
pub struct ThemeFailure {
    pub theme_id: String,
    pub error: String,
}

/// Outcome of a whole run across themes
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub reports: Vec<ThemeReport>,
    pub failures: Vec<ThemeFailure>,
}

impl RunSummary {
    /// Collections that received at least one item this run
    pub fn updated_collections(&self) -> Vec<&str> {
        self.reports
            .iter()
            .filter(|r| r.added() > 0)
            .map(|r| r.collection_name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_parse_variants() {
        assert_eq!(MediaType::parse("Movie"), Some(MediaType::Movie));
        assert_eq!(MediaType::parse(" film "), Some(MediaType::Movie));
        assert_eq!(MediaType::parse("TV Show"), Some(MediaType::Show));
        assert_eq!(MediaType::parse("tv"), Some(MediaType::Show));
        assert_eq!(MediaType::parse("episode"), Some(MediaType::Show));
        assert_eq!(MediaType::parse("podcast"), None);
    }

    #[test]
    fn test_media_type_serialization() {
        assert_eq!(serde_json::to_string(&MediaType::Show).unwrap(), "\"show\"");
        assert_eq!(MediaType::Movie.to_string(), "movie");
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  The   Matrix "), "the matrix");
        assert_eq!(normalize_title("Heat (1995)"), "heat");
        assert_eq!(normalize_title("Blade Runner 2049"), "blade runner 2049");
        assert_eq!(normalize_title("Alien (Director's Cut)"), "alien (director's cut)");
    }

    #[test]
    fn test_strip_year() {
        assert_eq!(strip_year("Heat (1995)"), "Heat");
        assert_eq!(strip_year(" Heat "), "Heat");
        assert_eq!(strip_year("Ocean's (Eleven)"), "Ocean's (Eleven)");
    }

    #[test]
    fn test_library_match_constructors() {
        let item = RecommendationItem::new("Interstellar", MediaType::Movie);
        let found = LibraryMatch::found(item.clone(), "42".to_string());
        assert!(found.found);
        assert_eq!(found.library_id.as_deref(), Some("42"));

        let missing = LibraryMatch::missing(item);
        assert!(!missing.found);
        assert!(missing.library_id.is_none());
    }

    #[test]
    fn test_request_ticket_from_item() {
        let item = RecommendationItem::new("The Matrix", MediaType::Movie).with_rationale("classic");
        let ticket = RequestTicket::from(&item);
        assert_eq!(ticket.title, "The Matrix");
        assert_eq!(ticket.media_type, MediaType::Movie);
    }

    #[test]
    fn test_theme_report_counts_and_updated_collections() {
        let report = ThemeReport {
            theme_id: "general".to_string(),
            collection_name: "general".to_string(),
            items: vec![
                ItemDisposition {
                    item: RecommendationItem::new("Interstellar", MediaType::Movie),
                    disposition: Disposition::Added {
                        collection: "general".to_string(),
                        library_id: "1".to_string(),
                    },
                },
                ItemDisposition {
                    item: RecommendationItem::new("The Matrix", MediaType::Movie),
                    disposition: Disposition::Forwarded {
                        already_requested: false,
                    },
                },
            ],
            report_path: None,
        };
        assert_eq!(report.added(), 1);
        assert_eq!(report.forwarded(), 1);
        assert_eq!(report.dropped(), 0);

        let empty = ThemeReport {
            theme_id: "empty".to_string(),
            collection_name: "Empty".to_string(),
            items: vec![],
            report_path: None,
        };
        let summary = RunSummary {
            run_id: Uuid::new_v4(),
            reports: vec![report, empty],
            failures: vec![],
        };
        assert_eq!(summary.updated_collections(), vec!["general"]);
    }
}
