use config::FileFormat;
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    error::{AppError, AppResult},
    models::{theme::builtin_themes, Theme},
    services::retry::RetryPolicy,
};

pub const DEFAULT_CONFIG_FILE: &str = "plex_recommendations.ini";

/// Application configuration loaded from an ini file, with environment overrides
///
/// Section and key names are matched case-insensitively so both the
/// `[PLEX] PLEX_URL` spelling and lowercase variants work.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(alias = "PLEX", default)]
    pub plex: PlexConfig,

    #[serde(alias = "GPT", default)]
    pub gpt: LlmConfig,

    /// Request forwarding is skipped entirely when this section is absent or empty
    #[serde(alias = "OMBI", default)]
    pub ombi: Option<OmbiConfig>,

    #[serde(alias = "OUTPUT", default)]
    pub output: OutputConfig,

    #[serde(alias = "RUN", default)]
    pub run: RunConfig,

    /// Extra movie themes: `id = Collection Name | description`
    #[serde(alias = "THEMES", default)]
    pub themes: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlexConfig {
    #[serde(alias = "PLEX_URL", default)]
    pub plex_url: String,

    #[serde(alias = "PLEX_TOKEN", default)]
    pub plex_token: String,

    #[serde(alias = "MOVIE_SECTION", default = "default_movie_section")]
    pub movie_section: String,

    #[serde(alias = "SHOW_SECTION", default = "default_show_section")]
    pub show_section: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(alias = "GPT4O_API_KEY", default)]
    pub gpt4o_api_key: String,

    #[serde(alias = "API_URL", default = "default_llm_api_url")]
    pub api_url: String,

    #[serde(alias = "MODEL", default = "default_model")]
    pub model: String,

    #[serde(alias = "MAX_TOKENS", default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(alias = "TEMPERATURE", default = "default_temperature")]
    pub temperature: f32,

    /// Ask the model for a schema-constrained JSON object
    #[serde(alias = "STRUCTURED_OUTPUT", default = "default_true")]
    pub structured_output: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OmbiConfig {
    #[serde(alias = "OMBI_URL", default)]
    pub ombi_url: String,

    #[serde(alias = "OMBI_API_KEY", default)]
    pub ombi_api_key: String,

    #[serde(alias = "LANGUAGE_CODE", default = "default_language_code")]
    pub language_code: String,

    /// Pause between consecutive submissions
    #[serde(alias = "REQUEST_DELAY_MS", default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(alias = "DIR", default = "default_output_dir")]
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RunConfig {
    /// Most recent history titles embedded in each prompt
    #[serde(alias = "HISTORY_LIMIT", default = "default_history_limit")]
    pub history_limit: usize,

    #[serde(alias = "RECOMMENDATION_COUNT", default = "default_recommendation_count")]
    pub recommendation_count: usize,

    #[serde(alias = "HTTP_TIMEOUT_SECS", default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    #[serde(alias = "RETRY_MAX_ATTEMPTS", default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,

    #[serde(alias = "RETRY_BASE_DELAY_MS", default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(alias = "RETRY_MAX_DELAY_MS", default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

/// Environment variables that take precedence over the config file
#[derive(Debug, Default, Deserialize)]
pub struct EnvOverrides {
    pub config_file: Option<PathBuf>,
    pub plex_url: Option<String>,
    pub plex_token: Option<String>,
    pub gpt4o_api_key: Option<String>,
    pub ombi_url: Option<String>,
    pub ombi_api_key: Option<String>,
    pub output_dir: Option<PathBuf>,
}

fn default_movie_section() -> String {
    "Movies".to_string()
}

fn default_show_section() -> String {
    "TV Shows".to_string()
}

fn default_llm_api_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    10000
}

fn default_temperature() -> f32 {
    0.7
}

fn default_true() -> bool {
    true
}

fn default_language_code() -> String {
    "en".to_string()
}

fn default_request_delay_ms() -> u64 {
    1000
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("/output")
}

fn default_history_limit() -> usize {
    200
}

fn default_recommendation_count() -> usize {
    10
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_retry_max_delay_ms() -> u64 {
    30_000
}

impl Default for PlexConfig {
    fn default() -> Self {
        Self {
            plex_url: String::new(),
            plex_token: String::new(),
            movie_section: default_movie_section(),
            show_section: default_show_section(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            gpt4o_api_key: String::new(),
            api_url: default_llm_api_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            structured_output: default_true(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            recommendation_count: default_recommendation_count(),
            http_timeout_secs: default_http_timeout_secs(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Config {
    /// Load configuration from the ini file and environment variables
    ///
    /// File lookup order: `explicit_path`, then `CONFIG_FILE`, then
    /// `plex_recommendations.ini` in the working directory. Only an explicitly
    /// named file is required to exist.
    pub fn load(explicit_path: Option<&Path>) -> AppResult<Self> {
        let (config, path) = Self::read(explicit_path)?;
        config.validate()?;

        tracing::info!(
            config_file = %path.display(),
            plex_url = %config.plex.plex_url,
            model = %config.gpt.model,
            ombi_enabled = config.ombi().is_some(),
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Same lookup as [`Config::load`] but without validation; returns the file path used
    pub fn read(explicit_path: Option<&Path>) -> AppResult<(Self, PathBuf)> {
        dotenvy::dotenv().ok();
        let env = envy::from_env::<EnvOverrides>()
            .map_err(|e| AppError::Config(format!("Failed to read environment: {}", e)))?;

        let (path, required) = match (explicit_path, env.config_file.as_deref()) {
            (Some(path), _) => (path.to_path_buf(), true),
            (None, Some(path)) => (path.to_path_buf(), true),
            (None, None) => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        let config = Self::from_file(&path, required)?.with_overrides(env);
        Ok((config, path))
    }

    /// Parse an ini file without applying environment overrides or validation
    pub fn from_file(path: &Path, required: bool) -> AppResult<Self> {
        if required && !path.exists() {
            return Err(AppError::Config(format!(
                "Config file {} does not exist",
                path.display()
            )));
        }

        config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(FileFormat::Ini)
                    .required(required),
            )
            .build()
            .and_then(|settings| settings.try_deserialize::<Config>())
            .map_err(|e| AppError::Config(format!("Failed to load {}: {}", path.display(), e)))
    }

    pub fn with_overrides(mut self, env: EnvOverrides) -> Self {
        if let Some(url) = env.plex_url {
            self.plex.plex_url = url;
        }
        if let Some(token) = env.plex_token {
            self.plex.plex_token = token;
        }
        if let Some(key) = env.gpt4o_api_key {
            self.gpt.gpt4o_api_key = key;
        }
        if env.ombi_url.is_some() || env.ombi_api_key.is_some() {
            let ombi = self.ombi.get_or_insert_with(|| OmbiConfig {
                ombi_url: String::new(),
                ombi_api_key: String::new(),
                language_code: default_language_code(),
                request_delay_ms: default_request_delay_ms(),
            });
            if let Some(url) = env.ombi_url {
                ombi.ombi_url = url;
            }
            if let Some(key) = env.ombi_api_key {
                ombi.ombi_api_key = key;
            }
        }
        if let Some(dir) = env.output_dir {
            self.output.dir = dir;
        }
        self
    }

    /// Rejects configurations that would fail only after the run has started
    pub fn validate(&self) -> AppResult<()> {
        if self.plex.plex_url.trim().is_empty() || self.plex.plex_token.trim().is_empty() {
            return Err(AppError::Config(
                "PLEX_URL and/or PLEX_TOKEN not found in configuration".to_string(),
            ));
        }
        if self.gpt.gpt4o_api_key.trim().is_empty() {
            return Err(AppError::Config(
                "GPT4O_API_KEY not found in configuration".to_string(),
            ));
        }
        if self.run.retry_max_attempts == 0 {
            return Err(AppError::Config(
                "RETRY_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        if self.run.recommendation_count == 0 {
            return Err(AppError::Config(
                "RECOMMENDATION_COUNT must be at least 1".to_string(),
            ));
        }
        self.themes()?;
        Ok(())
    }

    /// Ombi settings, if forwarding is enabled
    pub fn ombi(&self) -> Option<&OmbiConfig> {
        self.ombi
            .as_ref()
            .filter(|o| !o.ombi_url.trim().is_empty() && !o.ombi_api_key.trim().is_empty())
    }

    /// Built-in themes followed by configured ones, sorted by id
    pub fn themes(&self) -> AppResult<Vec<Theme>> {
        let mut themes = builtin_themes();
        for (id, value) in &self.themes {
            let theme = Theme::from_config_entry(id, value)?;
            if themes.iter().any(|t| t.id == theme.id) {
                return Err(AppError::Config(format!(
                    "Theme id '{}' is already defined",
                    theme.id
                )));
            }
            themes.push(theme);
        }
        Ok(themes)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.run.retry_max_attempts,
            base_delay: Duration::from_millis(self.run.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.run.retry_max_delay_ms),
            jitter: true,
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.run.http_timeout_secs)
    }
}
