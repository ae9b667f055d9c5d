//! Ombi request-management client
//!
//! API Flow:
//! 1. Search: /api/v1/Search/multi/{title} → TMDb/TVDb ids with a media type
//! 2. Request: /api/v1/Request/movie or /api/v1/Request/tv
//!
//! Ombi owns deduplication; an "already requested" answer is reported as such
//! rather than as an error.
use crate::{
    config::OmbiConfig,
    error::{AppError, AppResult},
    models::{
        ombi::{OmbiMovieRequest, OmbiRequestResult, OmbiSearchResult, OmbiTvRequest},
        MediaType, RequestOutcome, RequestTicket,
    },
    services::providers::RequestService,
};
use reqwest::{Client as HttpClient, Url};
use std::time::Duration;

const SERVICE: &str = "Ombi";
const API_KEY_HEADER: &str = "ApiKey";

#[derive(Clone)]
pub struct OmbiClient {
    http_client: HttpClient,
    api_url: String,
    api_key: String,
    language_code: String,
}

impl OmbiClient {
    pub fn new(config: &OmbiConfig, timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            http_client: HttpClient::builder().timeout(timeout).build()?,
            api_url: config.ombi_url.trim_end_matches('/').to_string(),
            api_key: config.ombi_api_key.clone(),
            language_code: config.language_code.clone(),
        })
    }

    /// Search URL with the title percent-encoded as a single path segment
    fn search_url(&self, title: &str) -> AppResult<Url> {
        let mut url = Url::parse(&format!("{}/api/v1/Search/multi", self.api_url))
            .map_err(|e| AppError::Config(format!("Invalid OMBI_URL '{}': {}", self.api_url, e)))?;

        url.path_segments_mut()
            .map_err(|_| AppError::Config(format!("OMBI_URL '{}' cannot be a base", self.api_url)))?
            .push(title);

        Ok(url)
    }

    async fn search(&self, title: &str) -> AppResult<Vec<OmbiSearchResult>> {
        let response = self
            .http_client
            .get(self.search_url(title)?)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::from_response(SERVICE, response).await);
        }

        Ok(response.json().await?)
    }

    async fn post_request(&self, candidate: &OmbiSearchResult) -> AppResult<RequestOutcome> {
        let id = candidate.numeric_id().ok_or_else(|| {
            AppError::Parse(format!("Ombi search result has non-numeric id {}", candidate.id))
        })?;

        let builder = match candidate.media_type() {
            Some(MediaType::Show) => self
                .http_client
                .post(format!("{}/api/v1/Request/tv", self.api_url))
                .json(&OmbiTvRequest {
                    tv_db_id: id,
                    request_all: true,
                    language_code: self.language_code.clone(),
                }),
            _ => self
                .http_client
                .post(format!("{}/api/v1/Request/movie", self.api_url))
                .json(&OmbiMovieRequest {
                    the_movie_db_id: id,
                    language_code: self.language_code.clone(),
                }),
        };

        let response = builder.header(API_KEY_HEADER, &self.api_key).send().await?;
        let status = response.status();
        let body = response.text().await?;

        interpret_request_response(status, body)
    }
}

/// Pick the search hit to request: same media type first, then any movie/tv hit
fn choose_candidate(
    results: &[OmbiSearchResult],
    media_type: MediaType,
) -> Option<&OmbiSearchResult> {
    results
        .iter()
        .find(|r| r.media_type() == Some(media_type))
        .or_else(|| results.iter().find(|r| r.media_type().is_some()))
}

fn interpret_request_response(
    status: reqwest::StatusCode,
    body: String,
) -> AppResult<RequestOutcome> {
    let parsed = serde_json::from_str::<OmbiRequestResult>(&body);

    if !status.is_success() {
        let already = match &parsed {
            Ok(result) => result.is_already_requested(),
            Err(_) => body.to_lowercase().contains("already"),
        };
        if already {
            return Ok(RequestOutcome::AlreadyRequested);
        }
        return Err(AppError::ExternalApi {
            service: SERVICE,
            status,
            body,
        });
    }

    // A success status must still carry a readable RequestEngineResult
    let result = parsed.map_err(|e| {
        tracing::error!(error = %e, body = %body, "Failed to parse Ombi request response");
        AppError::Parse(format!("Unreadable Ombi request response: {}", e))
    })?;

    if result.is_already_requested() {
        return Ok(RequestOutcome::AlreadyRequested);
    }

    if result.is_error {
        return Err(AppError::ExternalApi {
            service: SERVICE,
            status,
            body: result.error_message.or(result.message).unwrap_or(body),
        });
    }

    Ok(RequestOutcome::Submitted)
}

#[async_trait::async_trait]
impl RequestService for OmbiClient {
    async fn submit(&self, ticket: &RequestTicket) -> AppResult<RequestOutcome> {
        let results = self.search(&ticket.title).await?;

        let Some(candidate) = choose_candidate(&results, ticket.media_type) else {
            tracing::info!(
                title = %ticket.title,
                results = results.len(),
                provider = "ombi",
                "No requestable match in Ombi"
            );
            return Ok(RequestOutcome::NotFound);
        };

        let outcome = self.post_request(candidate).await?;

        tracing::info!(
            title = %ticket.title,
            media_type = %ticket.media_type,
            outcome = ?outcome,
            provider = "ombi",
            "Request submitted"
        );

        Ok(outcome)
    }

    fn name(&self) -> &'static str {
        "ombi"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn create_test_client() -> OmbiClient {
        OmbiClient::new(
            &OmbiConfig {
                ombi_url: "http://ombi.local/".to_string(),
                ombi_api_key: "key".to_string(),
                language_code: "en".to_string(),
                request_delay_ms: 0,
            },
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn hit(id: i64, media_type: &str) -> OmbiSearchResult {
        serde_json::from_value(serde_json::json!({"id": id, "mediaType": media_type})).unwrap()
    }

    #[test]
    fn test_search_url_encodes_title() {
        let client = create_test_client();
        let url = client.search_url("Amélie / Le Fabuleux").unwrap();
        assert_eq!(
            url.as_str(),
            "http://ombi.local/api/v1/Search/multi/Am%C3%A9lie%20%2F%20Le%20Fabuleux"
        );
    }

    #[test]
    fn test_choose_candidate_prefers_matching_type() {
        let results = vec![hit(1, "person"), hit(2, "tv"), hit(3, "movie")];
        assert_eq!(
            choose_candidate(&results, MediaType::Movie).unwrap().numeric_id(),
            Some(3)
        );
        assert_eq!(
            choose_candidate(&results, MediaType::Show).unwrap().numeric_id(),
            Some(2)
        );
    }

    #[test]
    fn test_choose_candidate_falls_back_to_other_type() {
        let results = vec![hit(1, "person"), hit(2, "tv")];
        assert_eq!(
            choose_candidate(&results, MediaType::Movie).unwrap().numeric_id(),
            Some(2)
        );
        assert!(choose_candidate(&[hit(1, "person")], MediaType::Movie).is_none());
    }

    #[test]
    fn test_interpret_success() {
        assert_eq!(
            interpret_request_response(StatusCode::OK, r#"{"result": true, "message": "Request added"}"#.to_string())
                .unwrap(),
            RequestOutcome::Submitted
        );
    }

    #[test]
    fn test_interpret_already_requested_is_success() {
        let duplicate = interpret_request_response(
            StatusCode::OK,
            r#"{"isError": true, "errorMessage": "This has already been requested"}"#.to_string(),
        );
        assert_eq!(duplicate.unwrap(), RequestOutcome::AlreadyRequested);

        let conflict = interpret_request_response(
            StatusCode::CONFLICT,
            "Movie already requested".to_string(),
        );
        assert_eq!(conflict.unwrap(), RequestOutcome::AlreadyRequested);
    }

    #[test]
    fn test_interpret_failure_keeps_status() {
        let err = interpret_request_response(StatusCode::UNAUTHORIZED, "bad key".to_string()).unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));

        let logical = interpret_request_response(
            StatusCode::OK,
            r#"{"isError": true, "errorMessage": "Quota exceeded"}"#.to_string(),
        )
        .unwrap_err();
        assert!(logical.to_string().contains("Quota exceeded"));
    }

    #[test]
    fn test_interpret_unreadable_success_body_is_not_submitted() {
        let truncated = interpret_request_response(StatusCode::OK, r#"{"result": tr"#.to_string());
        assert!(matches!(truncated, Err(AppError::Parse(_))));

        let empty = interpret_request_response(StatusCode::OK, String::new());
        assert!(matches!(empty, Err(AppError::Parse(_))));
    }
}
