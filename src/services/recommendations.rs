use chrono::NaiveDate;

use crate::{
    error::AppResult,
    models::{RecommendationItem, RecommendationRequest},
    services::{parser::parse_recommendations, providers::LanguageModel},
};

/// Prompt pair sent to the language model for one theme
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Knobs shared by every recommendation call in a run
#[derive(Debug, Clone, Copy)]
pub struct RequestOptions {
    pub today: NaiveDate,
    pub recommendation_count: usize,
    pub history_limit: usize,
}

/// Builds the prompt for a theme from the viewer's history
///
/// Only the first `history_limit` history entries are embedded; callers pass
/// history most-recent-first so the newest titles survive the cut.
pub fn build_prompt(request: &RecommendationRequest, options: &RequestOptions) -> Prompt {
    let theme = &request.theme;
    let noun = theme.media_type.noun();

    let watched: Vec<&str> = request
        .history
        .iter()
        .take(options.history_limit)
        .map(|entry| entry.title.as_str())
        .collect();

    let user = format!(
        "I have watched the following movies and TV shows:\n\n\
         {watched}\n\n\
         {criteria} For each recommendation, provide the following in JSON format:\n\n\
         {{\n  \"title\": \"Title of the {noun}\",\n  \"genre\": \"Genre(s)\",\n  \"description\": \"A brief description\"\n}}\n\n\
         Please provide the entire response as a JSON array of objects.",
        watched = watched.join(", "),
        criteria = theme.criteria(options.today, options.recommendation_count),
        noun = noun,
    );

    Prompt {
        system: format!("You are a recommendation system for {}s.", noun),
        user,
    }
}

/// Asks the model for recommendations and parses whatever it returns
///
/// Model errors and unparseable responses are returned to the caller, which
/// decides how a failed theme is recorded.
pub async fn request_recommendations(
    model: &dyn LanguageModel,
    request: &RecommendationRequest,
    options: &RequestOptions,
) -> AppResult<Vec<RecommendationItem>> {
    let prompt = build_prompt(request, options);

    tracing::info!(
        theme = %request.theme.id,
        provider = model.name(),
        history = request.history.len().min(options.history_limit),
        "Requesting recommendations"
    );

    let text = model.complete(&prompt.system, &prompt.user).await?;
    let items = parse_recommendations(&text, request.theme.media_type)?;

    tracing::info!(theme = %request.theme.id, items = items.len(), "Recommendations parsed");
    Ok(items)
}
