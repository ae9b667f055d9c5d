//! External service abstraction
//!
//! Each upstream API the workflow talks to sits behind a trait so the
//! workflow can be driven against in-memory fakes. Concrete clients:
//! Plex (media server), OpenAI-compatible chat completions (language model)
//! and Ombi (request management).

use std::collections::HashSet;

use crate::{
    error::AppResult,
    models::{
        CollectionRef, LibraryId, LibraryItem, MediaType, RequestOutcome, RequestTicket,
        WatchHistoryEntry,
    },
};

pub mod ombi;
pub mod openai;
pub mod plex;

pub use ombi::OmbiClient;
pub use openai::OpenAiClient;
pub use plex::PlexClient;

/// Media server holding the library, watch history and collections
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MediaServer: Send + Sync {
    /// Full viewing history, in whatever order the server returns it
    async fn watch_history(&self) -> AppResult<Vec<WatchHistoryEntry>>;

    /// Library items of `media_type` whose title matches `title`
    async fn search_library(&self, title: &str, media_type: MediaType)
        -> AppResult<Vec<LibraryItem>>;

    /// Collection named `name` in the library section for `media_type`
    async fn find_collection(
        &self,
        name: &str,
        media_type: MediaType,
    ) -> AppResult<Option<CollectionRef>>;

    async fn collection_members(&self, collection: &CollectionRef)
        -> AppResult<HashSet<LibraryId>>;

    async fn create_collection(
        &self,
        name: &str,
        media_type: MediaType,
        items: &[LibraryId],
    ) -> AppResult<CollectionRef>;

    async fn add_to_collection(
        &self,
        collection: &CollectionRef,
        media_type: MediaType,
        items: &[LibraryId],
    ) -> AppResult<()>;

    /// Tags a library item; an existing identical label is a no-op
    async fn add_label(&self, item: &LibraryId, media_type: MediaType, label: &str)
        -> AppResult<()>;

    /// Features the collection on the home screen
    async fn promote_collection(
        &self,
        collection: &CollectionRef,
        media_type: MediaType,
    ) -> AppResult<()>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Language model that turns a prompt into free text
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    /// Single completion; implementations own their retry policy
    async fn complete(&self, system: &str, prompt: &str) -> AppResult<String>;

    fn name(&self) -> &'static str;
}

/// Service that accepts requests for titles the library lacks
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RequestService: Send + Sync {
    async fn submit(&self, ticket: &RequestTicket) -> AppResult<RequestOutcome>;

    fn name(&self) -> &'static str;
}
