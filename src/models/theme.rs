use chrono::{Datelike, NaiveDate};
use std::fmt::Display;

use super::MediaType;
use crate::error::{AppError, AppResult};

/// How a theme constrains the prompt sent to the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptModifier {
    /// Recommend new titles based purely on watch history
    Personalized,
    /// Recommend titles matching a fixed description, e.g. "top romantic comedy movies"
    Static(String),
    /// Titles suited to the season of the run date
    Seasonal,
    /// Titles suited to the holiday coming up after the run date
    Holiday,
}

/// A named recommendation category that maps to one collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    /// Stable slug used for CLI filtering and report file names
    pub id: String,
    pub collection_name: String,
    pub media_type: MediaType,
    pub modifier: PromptModifier,
}

impl Theme {
    pub fn new(
        id: impl Into<String>,
        collection_name: impl Into<String>,
        media_type: MediaType,
        modifier: PromptModifier,
    ) -> Self {
        Self {
            id: id.into(),
            collection_name: collection_name.into(),
            media_type,
            modifier,
        }
    }

    /// Movie theme with a static description
    fn movies(id: &str, collection_name: &str, description: &str) -> Self {
        Self::new(
            id,
            collection_name,
            MediaType::Movie,
            PromptModifier::Static(description.to_string()),
        )
    }

    /// Renders the theme constraint sentence for a run on `today`
    pub fn criteria(&self, today: NaiveDate, count: usize) -> String {
        let noun = self.media_type.noun();
        match &self.modifier {
            PromptModifier::Personalized => format!(
                "Based on this list, recommend {} new {}s that I might like.",
                count, noun
            ),
            PromptModifier::Static(description) => format!("Recommend {} {}.", count, description),
            PromptModifier::Seasonal => format!(
                "Recommend {} {}s suitable for {} season.",
                count,
                noun,
                Season::for_date(today)
            ),
            PromptModifier::Holiday => format!(
                "Recommend {} {}s suitable for {}.",
                count,
                noun,
                upcoming_holiday(today).unwrap_or("the upcoming holiday season")
            ),
        }
    }

    /// Parses a `[THEMES]` config entry of the form `Collection Name | description`
    pub fn from_config_entry(id: &str, value: &str) -> AppResult<Self> {
        let (name, description) = value.split_once('|').ok_or_else(|| {
            AppError::Config(format!(
                "Theme '{}' must look like 'Collection Name | description', got '{}'",
                id, value
            ))
        })?;

        let (name, description) = (name.trim(), description.trim());
        if id.trim().is_empty() || name.is_empty() || description.is_empty() {
            return Err(AppError::Config(format!(
                "Theme '{}' has an empty id, name or description",
                id
            )));
        }

        Ok(Self::movies(&slugify(id), name, description))
    }
}

/// Built-in theme catalog, in run order
pub fn builtin_themes() -> Vec<Theme> {
    vec![
        Theme::new(
            "movies",
            "AI Recommended Movies",
            MediaType::Movie,
            PromptModifier::Personalized,
        ),
        Theme::new(
            "tv_shows",
            "AI Recommended TV Shows",
            MediaType::Show,
            PromptModifier::Personalized,
        ),
        Theme::new("seasonal", "Seasonal", MediaType::Movie, PromptModifier::Seasonal),
        Theme::new("holiday", "Holiday", MediaType::Movie, PromptModifier::Holiday),
        Theme::movies("romantic_comedy", "Romantic Comedy", "top romantic comedy movies"),
        Theme::movies(
            "action_adventure",
            "Action Adventure",
            "exciting action-adventure movies",
        ),
        Theme::movies(
            "family_friendly",
            "Family Friendly",
            "family-friendly movies suitable for all ages",
        ),
        Theme::movies(
            "sci_fi_spectacle",
            "Sci-Fi Spectacle",
            "mind-bending science fiction movies",
        ),
        Theme::movies(
            "classic_cinema",
            "Classic Cinema",
            "classic movies from various decades that have stood the test of time",
        ),
        Theme::movies(
            "based_on_true_story",
            "Based on True Story",
            "compelling movies based on true stories or real events",
        ),
        Theme::movies(
            "teen_90s_00s",
            "90s & 00s Teenage Movies",
            "iconic teenage movies from the 1990s and 2000s",
        ),
        Theme::movies(
            "very_sarcastic",
            "Very Sarcastic Movies",
            "highly sarcastic or satirical movies, similar in tone to 'Baby Mama (2008)' or 'They Came Together (2014)'",
        ),
    ]
}

/// Narrows `themes` to the requested ids, keeping catalog order
///
/// An empty selection means every theme.
pub fn select_themes(themes: Vec<Theme>, ids: &[String]) -> AppResult<Vec<Theme>> {
    if ids.is_empty() {
        return Ok(themes);
    }

    if let Some(unknown) = ids.iter().find(|id| !themes.iter().any(|t| &t.id == *id)) {
        let known: Vec<_> = themes.iter().map(|t| t.id.as_str()).collect();
        return Err(AppError::Config(format!(
            "Unknown theme '{}'; available: {}",
            unknown,
            known.join(", ")
        )));
    }

    Ok(themes.into_iter().filter(|t| ids.contains(&t.id)).collect())
}

/// Lowercase snake-case id suitable for file names
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    for c in value.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_').to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Winter,
}

impl Season {
    pub fn for_date(date: NaiveDate) -> Self {
        match date.month() {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Fall,
            _ => Season::Winter,
        }
    }
}

impl Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
            Season::Winter => "Winter",
        };
        write!(f, "{}", name)
    }
}

/// Holiday the viewer is heading into, if any
pub fn upcoming_holiday(date: NaiveDate) -> Option<&'static str> {
    match (date.month(), date.day()) {
        (10, _) => Some("Halloween"),
        (11, _) => Some("Thanksgiving"),
        (12, _) => Some("Christmas"),
        (2, day) if day <= 14 => Some("Valentine's Day"),
        _ => None,
    }
}
