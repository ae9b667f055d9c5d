//! Plex Media Server client
//!
//! Talks to the server's HTTP API with `X-Plex-Token` auth and JSON responses.
//!
//! API Flow:
//! 1. Startup: /identity (machine id, proves the token) and /library/sections
//! 2. History: /status/sessions/history/all, newest first
//! 3. Catalog: /library/sections/{key}/all filtered by type and title
//! 4. Collections: /library/sections/{key}/collections, /library/collections[/{id}/items]
use crate::{
    config::PlexConfig,
    error::{AppError, AppResult},
    models::{
        plex::{
            plex_type_code, PlexIdentity, PlexMetadata, PlexMetadataList, PlexResponse,
            PlexSection, PlexSections,
        },
        CollectionRef, LibraryId, LibraryItem, MediaType, WatchHistoryEntry,
    },
    services::providers::MediaServer,
};
use reqwest::{Client as HttpClient, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::{collections::HashSet, time::Duration};

const SERVICE: &str = "Plex";
const TOKEN_HEADER: &str = "X-Plex-Token";

#[derive(Clone)]
pub struct PlexClient {
    http_client: HttpClient,
    base_url: String,
    token: String,
    machine_identifier: String,
    movie_section: PlexSection,
    show_section: Option<PlexSection>,
}

impl PlexClient {
    /// Connects to the server, verifying the token and resolving library sections
    ///
    /// Any failure here is fatal for the run: nothing downstream can work
    /// without a reachable, authenticated server.
    pub async fn connect(config: &PlexConfig, timeout: Duration) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;
        let base_url = config.plex_url.trim_end_matches('/').to_string();

        let identity: PlexIdentity =
            Self::get_json_with(&http_client, &base_url, &config.plex_token, "/identity", &[])
                .await?;

        let sections: PlexSections = Self::get_json_with(
            &http_client,
            &base_url,
            &config.plex_token,
            "/library/sections",
            &[],
        )
        .await?;

        let movie_section =
            select_section(&sections.directories, &config.movie_section, MediaType::Movie)
                .ok_or_else(|| {
                    AppError::Config(format!(
                        "No movie library section named '{}' on Plex",
                        config.movie_section
                    ))
                })?;

        let show_section =
            select_section(&sections.directories, &config.show_section, MediaType::Show);
        if show_section.is_none() {
            tracing::warn!(
                section = %config.show_section,
                "No TV library section found; show themes will fail"
            );
        }

        tracing::info!(
            machine_identifier = %identity.machine_identifier,
            movie_section = %movie_section.key,
            show_section = ?show_section.as_ref().map(|s| &s.key),
            "Connected to Plex"
        );

        Ok(Self {
            http_client,
            base_url,
            token: config.plex_token.clone(),
            machine_identifier: identity.machine_identifier,
            movie_section,
            show_section,
        })
    }

    fn section(&self, media_type: MediaType) -> AppResult<&PlexSection> {
        match media_type {
            MediaType::Movie => Ok(&self.movie_section),
            MediaType::Show => self.show_section.as_ref().ok_or_else(|| {
                AppError::Config("No TV library section configured on Plex".to_string())
            }),
        }
    }

    /// `server://` URI Plex expects when attaching items to a collection
    fn metadata_uri(&self, items: &[LibraryId]) -> String {
        format!(
            "server://{}/com.plexapp.plugins.library/library/metadata/{}",
            self.machine_identifier,
            items.join(",")
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}{}", self.base_url, path))
            .header(TOKEN_HEADER, &self.token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send(builder: RequestBuilder) -> AppResult<reqwest::Response> {
        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(AppError::from_response(SERVICE, response).await);
        }
        Ok(response)
    }

    async fn get_json_with<T: DeserializeOwned>(
        http_client: &HttpClient,
        base_url: &str,
        token: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> AppResult<T> {
        let builder = http_client
            .get(format!("{}{}", base_url, path))
            .header(TOKEN_HEADER, token)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query);

        let response_text = Self::send(builder).await?.text().await?;
        let parsed: PlexResponse<T> = serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                path = %path,
                "Failed to deserialize Plex response"
            );
            AppError::Parse(format!("Failed to parse Plex response for {}: {}", path, e))
        })?;
        Ok(parsed.media_container)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> AppResult<T> {
        Self::get_json_with(&self.http_client, &self.base_url, &self.token, path, query).await
    }

    async fn get_metadata(&self, path: &str, query: &[(&str, String)]) -> AppResult<Vec<PlexMetadata>> {
        let list: PlexMetadataList = self.get_json(path, query).await?;
        Ok(list.metadata)
    }
}

/// Prefer the section with the configured name; fall back to the first of the right type
fn select_section(
    sections: &[PlexSection],
    preferred_name: &str,
    media_type: MediaType,
) -> Option<PlexSection> {
    let type_name = match media_type {
        MediaType::Movie => "movie",
        MediaType::Show => "show",
    };

    sections
        .iter()
        .find(|s| s.section_type == type_name && s.title.eq_ignore_ascii_case(preferred_name))
        .or_else(|| sections.iter().find(|s| s.section_type == type_name))
        .cloned()
}

/// Query string for Plex's tag editor, keeping the labels an item already has
fn label_edit_query(
    item: &LibraryId,
    media_type: MediaType,
    existing: &[String],
    label: &str,
) -> Vec<(String, String)> {
    let mut query = vec![
        ("type".to_string(), plex_type_code(media_type).to_string()),
        ("id".to_string(), item.clone()),
    ];
    for (idx, tag) in existing.iter().map(String::as_str).chain([label]).enumerate() {
        query.push((format!("label[{}].tag.tag", idx), tag.to_string()));
    }
    query.push(("label.locked".to_string(), "1".to_string()));
    query
}

#[async_trait::async_trait]
impl MediaServer for PlexClient {
    async fn watch_history(&self) -> AppResult<Vec<WatchHistoryEntry>> {
        let metadata = self
            .get_metadata(
                "/status/sessions/history/all",
                &[("sort", "viewedAt:desc".to_string())],
            )
            .await?;

        let raw_count = metadata.len();
        let entries: Vec<WatchHistoryEntry> = metadata
            .into_iter()
            .filter_map(PlexMetadata::into_history_entry)
            .collect();

        tracing::info!(
            raw = raw_count,
            entries = entries.len(),
            provider = "plex",
            "Watch history fetched"
        );

        Ok(entries)
    }

    async fn search_library(
        &self,
        title: &str,
        media_type: MediaType,
    ) -> AppResult<Vec<LibraryItem>> {
        if title.trim().is_empty() {
            return Ok(vec![]);
        }

        let section = self.section(media_type)?;
        let metadata = self
            .get_metadata(
                &format!("/library/sections/{}/all", section.key),
                &[
                    ("type", plex_type_code(media_type).to_string()),
                    ("title", title.to_string()),
                ],
            )
            .await?;

        let items: Vec<LibraryItem> = metadata
            .into_iter()
            .filter_map(PlexMetadata::into_library_item)
            .collect();

        tracing::debug!(
            query = %title,
            results = items.len(),
            provider = "plex",
            "Library search completed"
        );

        Ok(items)
    }

    async fn find_collection(
        &self,
        name: &str,
        media_type: MediaType,
    ) -> AppResult<Option<CollectionRef>> {
        let section = self.section(media_type)?;
        let metadata = self
            .get_metadata(&format!("/library/sections/{}/collections", section.key), &[])
            .await?;

        Ok(metadata
            .into_iter()
            .find(|m| m.title.eq_ignore_ascii_case(name))
            .and_then(|m| {
                m.rating_key.map(|id| CollectionRef {
                    id,
                    name: m.title,
                })
            }))
    }

    async fn collection_members(&self, collection: &CollectionRef) -> AppResult<HashSet<LibraryId>> {
        let metadata = self
            .get_metadata(&format!("/library/collections/{}/children", collection.id), &[])
            .await?;

        Ok(metadata.into_iter().filter_map(|m| m.rating_key).collect())
    }

    async fn create_collection(
        &self,
        name: &str,
        media_type: MediaType,
        items: &[LibraryId],
    ) -> AppResult<CollectionRef> {
        let section = self.section(media_type)?;
        let builder = self.request(Method::POST, "/library/collections").query(&[
            ("type", plex_type_code(media_type).to_string()),
            ("title", name.to_string()),
            ("smart", "0".to_string()),
            ("sectionId", section.key.clone()),
            ("uri", self.metadata_uri(items)),
        ]);

        let response_text = Self::send(builder).await?.text().await?;
        let created: PlexResponse<PlexMetadataList> = serde_json::from_str(&response_text)
            .map_err(|e| AppError::Parse(format!("Failed to parse created collection: {}", e)))?;

        let id = created
            .media_container
            .metadata
            .into_iter()
            .find_map(|m| m.rating_key)
            .ok_or_else(|| {
                AppError::Parse(format!("Plex did not return an id for collection '{}'", name))
            })?;

        tracing::info!(
            collection = %name,
            collection_id = %id,
            items = items.len(),
            "Created collection"
        );

        Ok(CollectionRef {
            id,
            name: name.to_string(),
        })
    }

    async fn add_to_collection(
        &self,
        collection: &CollectionRef,
        _media_type: MediaType,
        items: &[LibraryId],
    ) -> AppResult<()> {
        if items.is_empty() {
            return Ok(());
        }

        let builder = self
            .request(
                Method::PUT,
                &format!("/library/collections/{}/items", collection.id),
            )
            .query(&[("uri", self.metadata_uri(items))]);
        Self::send(builder).await?;

        tracing::info!(
            collection = %collection.name,
            items = items.len(),
            "Added items to existing collection"
        );

        Ok(())
    }

    async fn add_label(&self, item: &LibraryId, media_type: MediaType, label: &str) -> AppResult<()> {
        let section = self.section(media_type)?;
        let existing: Vec<String> = self
            .get_metadata(&format!("/library/metadata/{}", item), &[])
            .await?
            .into_iter()
            .next()
            .map(|m| m.labels.into_iter().map(|l| l.tag).collect())
            .unwrap_or_default();

        if existing.iter().any(|tag| tag.eq_ignore_ascii_case(label)) {
            return Ok(());
        }

        let builder = self
            .request(
                Method::PUT,
                &format!("/library/sections/{}/all", section.key),
            )
            .query(&label_edit_query(item, media_type, &existing, label));
        Self::send(builder).await?;

        tracing::debug!(item = %item, label = %label, "Label added");
        Ok(())
    }

    async fn promote_collection(
        &self,
        collection: &CollectionRef,
        media_type: MediaType,
    ) -> AppResult<()> {
        let section = self.section(media_type)?;
        let builder = self
            .request(
                Method::POST,
                &format!("/hubs/sections/{}/manage", section.key),
            )
            .query(&[
                ("metadataItemId", collection.id.clone()),
                ("promotedToRecommended", "1".to_string()),
                ("promotedToOwnHome", "1".to_string()),
            ]);
        Self::send(builder).await?;

        tracing::info!(collection = %collection.name, "Collection featured on the home screen");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "plex"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(key: &str, title: &str, section_type: &str) -> PlexSection {
        PlexSection {
            key: key.to_string(),
            title: title.to_string(),
            section_type: section_type.to_string(),
        }
    }

    fn create_test_client() -> PlexClient {
        PlexClient {
            http_client: reqwest::Client::new(),
            base_url: "http://test.local:32400".to_string(),
            token: "test_token".to_string(),
            machine_identifier: "abc123".to_string(),
            movie_section: section("1", "Movies", "movie"),
            show_section: None,
        }
    }

    #[test]
    fn test_select_section_prefers_configured_name() {
        let sections = vec![
            section("1", "Movies", "movie"),
            section("3", "Kids Movies", "movie"),
            section("2", "TV Shows", "show"),
        ];

        let picked = select_section(&sections, "kids movies", MediaType::Movie).unwrap();
        assert_eq!(picked.key, "3");

        let show = select_section(&sections, "TV Shows", MediaType::Show).unwrap();
        assert_eq!(show.key, "2");
    }

    #[test]
    fn test_select_section_falls_back_to_type() {
        let sections = vec![section("5", "Films", "movie")];
        let picked = select_section(&sections, "Movies", MediaType::Movie).unwrap();
        assert_eq!(picked.key, "5");
        assert!(select_section(&sections, "TV Shows", MediaType::Show).is_none());
    }

    #[test]
    fn test_metadata_uri() {
        let client = create_test_client();
        assert_eq!(
            client.metadata_uri(&["10".to_string(), "11".to_string()]),
            "server://abc123/com.plexapp.plugins.library/library/metadata/10,11"
        );
    }

    #[test]
    fn test_missing_show_section_is_config_error() {
        let client = create_test_client();
        assert!(client.section(MediaType::Movie).is_ok());
        assert!(matches!(
            client.section(MediaType::Show),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_label_edit_query_keeps_existing_labels() {
        let query = label_edit_query(
            &"77".to_string(),
            MediaType::Movie,
            &["Favorites".to_string()],
            "AI Recommended - Seasonal",
        );

        assert_eq!(query[0], ("type".to_string(), "1".to_string()));
        assert_eq!(query[1], ("id".to_string(), "77".to_string()));
        assert_eq!(
            query[2],
            ("label[0].tag.tag".to_string(), "Favorites".to_string())
        );
        assert_eq!(
            query[3],
            (
                "label[1].tag.tag".to_string(),
                "AI Recommended - Seasonal".to_string()
            )
        );
        assert_eq!(query[4], ("label.locked".to_string(), "1".to_string()));
    }

    #[tokio::test]
    async fn test_empty_search_skips_request() {
        let client = create_test_client();
        let results = client.search_library("   ", MediaType::Movie).await.unwrap();
        assert!(results.is_empty());
    }
}
