use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::MediaType;

/// One entry of GET /api/v1/Search/multi/{term}
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OmbiSearchResult {
    /// Numeric on some Ombi versions, string on others
    pub id: Value,
    #[serde(alias = "type", default)]
    pub media_type: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl OmbiSearchResult {
    pub fn media_type(&self) -> Option<MediaType> {
        match self.media_type.to_lowercase().as_str() {
            "movie" => Some(MediaType::Movie),
            "tv" => Some(MediaType::Show),
            _ => None,
        }
    }

    pub fn numeric_id(&self) -> Option<i64> {
        match &self.id {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// POST /api/v1/Request/movie
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OmbiMovieRequest {
    pub the_movie_db_id: i64,
    pub language_code: String,
}

/// POST /api/v1/Request/tv
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OmbiTvRequest {
    pub tv_db_id: i64,
    pub request_all: bool,
    pub language_code: String,
}

/// Ombi's RequestEngineResult
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OmbiRequestResult {
    #[serde(default)]
    pub result: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_code: Option<Value>,
}

impl OmbiRequestResult {
    /// Ombi reports duplicates as errors; the caller treats them as success
    pub fn is_already_requested(&self) -> bool {
        let mentions_already = |text: &Option<String>| {
            text.as_deref()
                .map(|t| t.to_lowercase().contains("already"))
                .unwrap_or(false)
        };

        let code_says_already = match &self.error_code {
            Some(Value::String(code)) => code.to_lowercase().contains("already"),
            _ => false,
        };

        code_says_already || mentions_already(&self.message) || mentions_already(&self.error_message)
    }
}
