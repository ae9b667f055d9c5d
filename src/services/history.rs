use std::collections::HashSet;

use crate::{
    error::{AppError, AppResult},
    models::{normalize_title, WatchHistoryEntry},
    services::providers::MediaServer,
};

/// Fetches the viewer's history, most recent first and deduplicated by title
///
/// Errors from the media server are returned as-is, and an empty history is an
/// error too: callers must not spend model calls without something to base
/// recommendations on.
pub async fn collect_history(media_server: &dyn MediaServer) -> AppResult<Vec<WatchHistoryEntry>> {
    tracing::info!(provider = media_server.name(), "Retrieving watch history");

    let mut entries = media_server.watch_history().await?;

    // Stable sort keeps server order among entries without a timestamp
    entries.sort_by(|a, b| b.watched_at.cmp(&a.watched_at));

    let mut seen = HashSet::new();
    entries.retain(|entry| seen.insert(normalize_title(&entry.title)));

    if entries.is_empty() {
        return Err(AppError::EmptyHistory(media_server.name()));
    }

    tracing::info!(titles = entries.len(), "Watch history collected");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::MediaType, services::providers::MockMediaServer};
    use chrono::{TimeZone, Utc};
    use reqwest::StatusCode;

    fn entry(title: &str, media_type: MediaType, ts: Option<i64>) -> WatchHistoryEntry {
        WatchHistoryEntry {
            title: title.to_string(),
            media_type,
            watched_at: ts.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
        }
    }

    fn mock_with_history(history: Vec<WatchHistoryEntry>) -> MockMediaServer {
        let mut mock = MockMediaServer::new();
        mock.expect_name().return_const("mock");
        mock.expect_watch_history()
            .times(1)
            .returning(move || Ok(history.clone()));
        mock
    }

    #[tokio::test]
    async fn test_orders_most_recent_first_and_dedups() {
        let mock = mock_with_history(vec![
            entry("Severance", MediaType::Show, Some(100)),
            entry("Inception", MediaType::Movie, Some(300)),
            entry("severance", MediaType::Show, Some(200)),
            entry("Heat", MediaType::Movie, None),
        ]);

        let history = collect_history(&mock).await.unwrap();
        let titles: Vec<_> = history.iter().map(|e| e.title.as_str()).collect();

        assert_eq!(titles, vec!["Inception", "severance", "Heat"]);
    }

    #[tokio::test]
    async fn test_empty_history_is_error() {
        let mock = mock_with_history(vec![]);
        let result = collect_history(&mock).await;
        assert!(matches!(result, Err(AppError::EmptyHistory("mock"))));
    }

    #[tokio::test]
    async fn test_server_error_propagates() {
        let mut mock = MockMediaServer::new();
        mock.expect_name().return_const("mock");
        mock.expect_watch_history().returning(|| {
            Err(AppError::ExternalApi {
                service: "Plex",
                status: StatusCode::UNAUTHORIZED,
                body: String::new(),
            })
        });

        let err = collect_history(&mock).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    }
}
