//! Best-effort extraction of recommendation items from model output.
//!
//! The model is asked for JSON, but nothing guarantees it complies. Parsing
//! tries, in order: the whole text as JSON, the outermost `[...]` slice as a
//! JSON array, and finally numbered or bulleted list lines when the JSON
//! attempts yield no titles. Elements that do not yield a title are dropped,
//! never fatal.

use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::{
    error::{AppError, AppResult},
    models::{MediaType, RecommendationItem},
};

const ARRAY_KEYS: [&str; 3] = ["recommendations", "items", "results"];
const RATIONALE_SEPARATORS: [&str; 3] = [" - ", " – ", " — "];

/// Parses `text` into items, defaulting each item's media type to `media_type`
///
/// Returns `AppError::Parse` when nothing usable is found, including for empty text.
pub fn parse_recommendations(text: &str, media_type: MediaType) -> AppResult<Vec<RecommendationItem>> {
    let text = strip_code_fence(text.trim());
    if text.is_empty() {
        return Err(AppError::Parse("Model returned an empty response".to_string()));
    }

    let from_json: Vec<RecommendationItem> = json_elements(text)
        .unwrap_or_default()
        .iter()
        .filter_map(|element| {
            let item = item_from_json(element, media_type);
            if item.is_none() {
                tracing::debug!(element = %element, "Dropping unusable recommendation element");
            }
            item
        })
        .collect();

    // A bracketed aside such as "[1995]" can be valid JSON without any titles
    let items = if from_json.is_empty() {
        parse_list_lines(text, media_type)
    } else {
        from_json
    };

    let items = dedup(items);
    if items.is_empty() {
        return Err(AppError::Parse(
            "No recommendations could be extracted from the model response".to_string(),
        ));
    }

    Ok(items)
}

/// Removes a surrounding ```json ... ``` fence if present
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn json_elements(text: &str) -> Option<Vec<Value>> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        if let Some(elements) = array_from_value(value) {
            return Some(elements);
        }
    }

    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end <= start {
        return None;
    }

    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Array(elements)) => Some(elements),
        _ => None,
    }
}

fn array_from_value(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(elements) => Some(elements),
        Value::Object(mut map) => {
            for key in ARRAY_KEYS {
                if let Some(Value::Array(elements)) = map.remove(key) {
                    return Some(elements);
                }
            }
            map.into_iter().find_map(|(_, v)| match v {
                Value::Array(elements) => Some(elements),
                _ => None,
            })
        }
        _ => None,
    }
}

fn string_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn item_from_json(element: &Value, media_type: MediaType) -> Option<RecommendationItem> {
    match element {
        Value::String(title) => clean_title(title).map(|t| RecommendationItem::new(t, media_type)),
        Value::Object(map) => {
            let title = string_field(map, &["title", "name"]).and_then(|t| clean_title(&t))?;
            let media_type = string_field(map, &["media_type", "mediaType", "type"])
                .and_then(|t| MediaType::parse(&t))
                .unwrap_or(media_type);

            Some(RecommendationItem {
                title,
                media_type,
                genre: string_field(map, &["genre", "genres"]),
                rationale: string_field(map, &["description", "rationale", "reason"]),
            })
        }
        _ => None,
    }
}

fn parse_list_lines(text: &str, media_type: MediaType) -> Vec<RecommendationItem> {
    text.lines()
        .filter_map(|line| {
            let content = strip_list_marker(line.trim())?;
            let item = split_line(content, media_type);
            if item.is_none() {
                tracing::debug!(line = %line, "Dropping unparseable recommendation line");
            }
            item
        })
        .collect()
}

/// Returns the text after a `1.`, `2)`, `-`, `*`, `+` or `•` marker
fn strip_list_marker(line: &str) -> Option<&str> {
    for bullet in ["- ", "* ", "+ ", "• "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return Some(rest.trim());
        }
    }

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = &line[digits..];
    rest.strip_prefix('.')
        .or_else(|| rest.strip_prefix(')'))
        .map(str::trim)
        .filter(|r| !r.is_empty())
}

fn split_line(content: &str, media_type: MediaType) -> Option<RecommendationItem> {
    // **Title** rationale
    if let Some(rest) = content.strip_prefix("**") {
        if let Some(end) = rest.find("**") {
            let title = clean_title(&rest[..end])?;
            let rationale = rest[end + 2..]
                .trim_start_matches(|c: char| c == ':' || c == '-' || c == '–' || c == '—' || c.is_whitespace())
                .trim();
            let item = RecommendationItem::new(title, media_type);
            return Some(if rationale.is_empty() {
                item
            } else {
                item.with_rationale(rationale)
            });
        }
    }

    for separator in RATIONALE_SEPARATORS {
        if let Some((title, rationale)) = content.split_once(separator) {
            let title = clean_title(title)?;
            let rationale = rationale.trim();
            let item = RecommendationItem::new(title, media_type);
            return Some(if rationale.is_empty() {
                item
            } else {
                item.with_rationale(rationale)
            });
        }
    }

    clean_title(content).map(|t| RecommendationItem::new(t, media_type))
}

/// Strips markdown emphasis and quotes; `None` when nothing remains
///
/// Single quotes are only removed as a wrapping pair, so apostrophes that
/// belong to the title ('Salem's Lot, Fast Times at Ridgemont High') survive.
fn clean_title(raw: &str) -> Option<String> {
    let mut title = raw
        .trim()
        .trim_matches(|c: char| c == '*' || c == '_' || c == '"' || c == '“' || c == '”')
        .trim();

    if let Some(inner) = title
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        title = inner.trim();
    }

    (!title.is_empty()).then(|| title.to_string())
}

/// Keeps the first occurrence of each normalized title
fn dedup(items: Vec<RecommendationItem>) -> Vec<RecommendationItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| {
            let fresh = seen.insert(item.normalized_title());
            if !fresh {
                tracing::info!(title = %item.title, "Dropping duplicate recommendation");
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles(items: &[RecommendationItem]) -> Vec<&str> {
        items.iter().map(|i| i.title.as_str()).collect()
    }

    #[test]
    fn test_numbered_list() {
        let items = parse_recommendations("1. The Matrix\n2. Interstellar", MediaType::Movie).unwrap();
        assert_eq!(titles(&items), vec!["The Matrix", "Interstellar"]);
        assert!(items.iter().all(|i| i.media_type == MediaType::Movie));
    }

    #[test]
    fn test_bullets_with_rationale_and_prose() {
        let text = "Here are some picks:\n\n- **Heat (1995)** - A tense crime epic\n* Arrival – quiet sci-fi\n• \"Amélie\"\n2) Mission: Impossible";
        let items = parse_recommendations(text, MediaType::Movie).unwrap();

        assert_eq!(
            titles(&items),
            vec!["Heat (1995)", "Arrival", "Amélie", "Mission: Impossible"]
        );
        assert_eq!(items[0].rationale.as_deref(), Some("A tense crime epic"));
        assert_eq!(items[1].rationale.as_deref(), Some("quiet sci-fi"));
        assert_eq!(items[2].rationale, None);
    }

    #[test]
    fn test_json_array() {
        let text = r#"[
            {"title": "Dark", "genre": "Sci-Fi", "description": "Time travel mystery"},
            {"title": "The Wire", "genre": "Crime", "description": "Baltimore"}
        ]"#;
        let items = parse_recommendations(text, MediaType::Show).unwrap();

        assert_eq!(titles(&items), vec!["Dark", "The Wire"]);
        assert_eq!(items[0].genre.as_deref(), Some("Sci-Fi"));
        assert_eq!(items[0].rationale.as_deref(), Some("Time travel mystery"));
        assert_eq!(items[1].media_type, MediaType::Show);
    }

    #[test]
    fn test_structured_object() {
        let text = r#"{"recommendations": [{"title": "Paddington 2", "genre": "Family", "description": "Kind bear"}]}"#;
        let items = parse_recommendations(text, MediaType::Movie).unwrap();
        assert_eq!(titles(&items), vec!["Paddington 2"]);
    }

    #[test]
    fn test_json_embedded_in_prose_and_fence() {
        let text = "Sure! Here you go:\n```json\n[{\"title\": \"Clue\"}, {\"genre\": \"no title\"}, 42]\n```\nEnjoy!";
        let items = parse_recommendations(text, MediaType::Movie).unwrap();
        assert_eq!(titles(&items), vec!["Clue"]);
    }

    #[test]
    fn test_code_fence_only() {
        let text = "```json\n[\"Up\", \"Coco\"]\n```";
        let items = parse_recommendations(text, MediaType::Movie).unwrap();
        assert_eq!(titles(&items), vec!["Up", "Coco"]);
    }

    #[test]
    fn test_element_media_type_overrides_default() {
        let text = r#"[{"title": "Fargo", "type": "tv"}]"#;
        let items = parse_recommendations(text, MediaType::Movie).unwrap();
        assert_eq!(items[0].media_type, MediaType::Show);
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let items =
            parse_recommendations("1. Heat\n2. heat (1995)\n3. Ronin", MediaType::Movie).unwrap();
        assert_eq!(titles(&items), vec!["Heat", "Ronin"]);
    }

    #[test]
    fn test_empty_response_is_parse_error() {
        assert!(matches!(
            parse_recommendations("   ", MediaType::Movie),
            Err(AppError::Parse(_))
        ));
    }

    #[test]
    fn test_unparseable_response_is_parse_error() {
        let text = "I'm sorry, I can't help with that request.";
        assert!(matches!(
            parse_recommendations(text, MediaType::Movie),
            Err(AppError::Parse(_))
        ));
    }

    #[test]
    fn test_bracketed_year_falls_back_to_list_lines() {
        let items = parse_recommendations("1. Heat [1995]\n2. Ronin", MediaType::Movie).unwrap();
        assert_eq!(titles(&items), vec!["Heat [1995]", "Ronin"]);
    }

    #[test]
    fn test_clean_title_keeps_apostrophes() {
        assert_eq!(clean_title("'Salem's Lot").as_deref(), Some("'Salem's Lot"));
        assert_eq!(clean_title("'Heat'").as_deref(), Some("Heat"));
        assert_eq!(clean_title("**\"Amélie\"**").as_deref(), Some("Amélie"));
        assert_eq!(clean_title("''"), None);

        let items = parse_recommendations("1. 'Salem's Lot - Stephen King vampires", MediaType::Movie).unwrap();
        assert_eq!(titles(&items), vec!["'Salem's Lot"]);
    }

    #[test]
    fn test_strip_list_marker() {
        assert_eq!(strip_list_marker("10. Heat"), Some("Heat"));
        assert_eq!(strip_list_marker("3) Heat"), Some("Heat"));
        assert_eq!(strip_list_marker("1999 was a good year"), None);
        assert_eq!(strip_list_marker("1."), None);
        assert_eq!(strip_list_marker("Heat"), None);
    }
}
