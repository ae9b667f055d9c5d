use std::collections::HashSet;

use crate::{
    error::AppResult,
    models::{
        normalize_title, strip_year, Disposition, ItemDisposition, LibraryId, LibraryMatch,
        RecommendationItem, Theme,
    },
    services::providers::MediaServer,
};

/// Result of syncing one theme's items into its collection
#[derive(Debug, Default)]
pub struct SyncOutcome {
    /// Items that were found in the library, or whose lookup failed
    pub dispositions: Vec<ItemDisposition>,
    /// Items the library does not have; candidates for forwarding
    pub missing: Vec<RecommendationItem>,
}

/// Label applied to every library item added by a theme
pub fn recommendation_label(collection_name: &str) -> String {
    format!("AI Recommended - {}", collection_name)
}

pub const OTHER_SECTION: &str = "in library, different section";

/// Looks `item` up in the library section of its own media type
///
/// The search uses the title without a trailing year; a hit must match the
/// normalized title exactly.
pub async fn match_library(
    media_server: &dyn MediaServer,
    item: RecommendationItem,
) -> AppResult<LibraryMatch> {
    let wanted = item.normalized_title();
    let results = media_server
        .search_library(strip_year(&item.title), item.media_type)
        .await?;

    let hit = results
        .into_iter()
        .find(|candidate| normalize_title(&candidate.title) == wanted);

    Ok(match hit {
        Some(found) => {
            tracing::debug!(title = %item.title, library_id = %found.id, "Found in library");
            LibraryMatch::found(item, found.id)
        }
        None => {
            tracing::debug!(title = %item.title, "Not in library");
            LibraryMatch::missing(item)
        }
    })
}

/// Puts every recommended title the library has into the theme's collection
///
/// The collection is created on first use and only receives items that are
/// not yet members afterwards. A title the library holds in another section
/// than the theme's is dropped; it is never reported as missing. Labels and
/// home-screen promotion are best-effort. With `dry_run` set, lookups still
/// run but nothing is changed.
pub async fn sync_collection(
    media_server: &dyn MediaServer,
    theme: &Theme,
    items: Vec<RecommendationItem>,
    dry_run: bool,
) -> SyncOutcome {
    let mut outcome = SyncOutcome::default();
    let mut found: Vec<(RecommendationItem, LibraryId)> = Vec::new();

    for item in items {
        match match_library(media_server, item.clone()).await {
            Ok(LibraryMatch {
                item,
                library_id: Some(id),
                ..
            }) if item.media_type == theme.media_type => found.push((item, id)),
            Ok(LibraryMatch {
                item,
                library_id: Some(id),
                ..
            }) => {
                tracing::info!(
                    theme = %theme.id,
                    title = %item.title,
                    library_id = %id,
                    media_type = %item.media_type,
                    "In library outside the theme's section"
                );
                outcome.dispositions.push(ItemDisposition {
                    item,
                    disposition: Disposition::dropped(OTHER_SECTION),
                });
            }
            Ok(LibraryMatch { item, .. }) => outcome.missing.push(item),
            Err(e) => {
                tracing::warn!(
                    theme = %theme.id,
                    title = %item.title,
                    status = ?e.status(),
                    error = %e,
                    "Library lookup failed"
                );
                outcome.dispositions.push(ItemDisposition {
                    item,
                    disposition: Disposition::dropped(format!("library lookup failed: {}", e)),
                });
            }
        }
    }

    if found.is_empty() {
        return outcome;
    }

    let disposition = match apply_membership(media_server, theme, &found, dry_run).await {
        Ok(_) => None,
        Err(e) => {
            tracing::error!(
                theme = %theme.id,
                collection = %theme.collection_name,
                status = ?e.status(),
                error = %e,
                "Collection update failed"
            );
            Some(Disposition::dropped(format!("collection update failed: {}", e)))
        }
    };

    outcome
        .dispositions
        .extend(found.into_iter().map(|(item, library_id)| ItemDisposition {
            item,
            disposition: disposition.clone().unwrap_or_else(|| Disposition::Added {
                collection: theme.collection_name.clone(),
                library_id,
            }),
        }));

    outcome
}

/// Ensures every found id is a member; returns the ids newly added
async fn apply_membership(
    media_server: &dyn MediaServer,
    theme: &Theme,
    found: &[(RecommendationItem, LibraryId)],
    dry_run: bool,
) -> AppResult<Vec<LibraryId>> {
    let mut wanted: Vec<LibraryId> = Vec::new();
    let mut seen = HashSet::new();
    for (_, id) in found {
        if seen.insert(id.clone()) {
            wanted.push(id.clone());
        }
    }

    let existing = media_server
        .find_collection(&theme.collection_name, theme.media_type)
        .await?;

    let added = match existing {
        Some(collection) => {
            let members = media_server.collection_members(&collection).await?;
            let new_ids: Vec<LibraryId> = wanted
                .into_iter()
                .filter(|id| !members.contains(id))
                .collect();

            if dry_run {
                tracing::info!(
                    collection = %collection.name,
                    new_items = new_ids.len(),
                    "Dry run: skipping collection update"
                );
                return Ok(new_ids);
            }

            if !new_ids.is_empty() {
                media_server
                    .add_to_collection(&collection, theme.media_type, &new_ids)
                    .await?;
            } else {
                tracing::info!(collection = %collection.name, "Collection already up to date");
            }
            new_ids
        }
        None => {
            if dry_run {
                tracing::info!(
                    collection = %theme.collection_name,
                    items = wanted.len(),
                    "Dry run: skipping collection creation"
                );
                return Ok(wanted);
            }

            let collection = media_server
                .create_collection(&theme.collection_name, theme.media_type, &wanted)
                .await?;

            if let Err(e) = media_server
                .promote_collection(&collection, theme.media_type)
                .await
            {
                tracing::warn!(collection = %collection.name, error = %e, "Could not promote collection");
            }
            wanted
        }
    };

    let label = recommendation_label(&theme.collection_name);
    for id in &added {
        if let Err(e) = media_server.add_label(id, theme.media_type, &label).await {
            tracing::warn!(library_id = %id, label = %label, error = %e, "Could not label item");
        }
    }

    Ok(added)
}
