//! Feed read paths.
//!
//! Three read models over the same activity store: the global feed, the
//! per-user following feed, and the "gems" view (global activities narrowed
//! to a dynamically matched set of collections). Activities are enriched
//! with card, profile, and collection data through external directories,
//! one batched lookup per page and directory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use curio_common::AppResult;
use curio_db::{
    entities::activity,
    repositories::{ActivityFilter, ActivityRepository, FeedEntryRepository},
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Enriched card data from the card directory.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardView {
    /// Card id.
    pub id: String,
    /// The saved URL.
    pub url: String,
    /// Page title, if resolved.
    pub title: Option<String>,
    /// Preview image, if resolved.
    pub image_url: Option<String>,
    /// URL classification.
    pub url_type: Option<String>,
}

/// Enriched actor data from the profile directory.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    /// User id.
    pub id: String,
    /// User handle.
    pub handle: String,
    /// Display name, if set.
    pub display_name: Option<String>,
    /// Avatar image, if set.
    pub avatar_url: Option<String>,
}

/// Enriched collection data from the collection directory.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionView {
    /// Collection id.
    pub id: String,
    /// Collection name.
    pub name: String,
    /// Owning user id.
    pub owner_id: String,
}

/// One enriched activity in a feed page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    /// Activity id.
    pub id: String,
    /// Acting user id.
    pub actor_id: String,
    /// Actor profile, when the directory knows the user.
    pub actor: Option<ProfileView>,
    /// The collected card, when the directory still has it.
    pub card: Option<CardView>,
    /// Collections the activity references.
    pub collections: Vec<CollectionView>,
    /// When the activity happened.
    pub created_at: DateTime<Utc>,
}

/// A cursor-paginated page of feed items.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    /// Items, newest first.
    pub items: Vec<FeedItem>,
    /// Cursor for the next page, absent when exhausted.
    pub next_cursor: Option<String>,
}

/// Batched card lookups.
#[async_trait]
pub trait CardDirectory: Send + Sync {
    /// Resolve card views for a batch of card ids. Unknown ids are absent
    /// from the result.
    async fn get_batch_card_views(
        &self,
        card_ids: &[String],
    ) -> AppResult<HashMap<String, CardView>>;
}

/// Batched profile lookups.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    /// Resolve profile views for a batch of user ids.
    async fn get_batch_profile_views(
        &self,
        user_ids: &[String],
    ) -> AppResult<HashMap<String, ProfileView>>;
}

/// Collection search, lookup, and live membership.
#[async_trait]
pub trait CollectionDirectory: Send + Sync {
    /// Ids of collections matching a free-text query.
    async fn find_collections_matching(&self, query: &str) -> AppResult<Vec<String>>;

    /// Resolve collection views for a batch of collection ids.
    async fn get_batch_collection_views(
        &self,
        collection_ids: &[String],
    ) -> AppResult<HashMap<String, CollectionView>>;

    /// Current card ids of one collection.
    async fn get_collection_card_ids(&self, collection_id: &str) -> AppResult<Vec<String>>;
}

/// Wrapper for boxed `CardDirectory` trait object.
pub type CardDirectoryService = Arc<dyn CardDirectory>;
/// Wrapper for boxed `ProfileDirectory` trait object.
pub type ProfileDirectoryService = Arc<dyn ProfileDirectory>;
/// Wrapper for boxed `CollectionDirectory` trait object.
pub type CollectionDirectoryService = Arc<dyn CollectionDirectory>;

/// Feed service serving the read paths.
#[derive(Clone)]
pub struct FeedService {
    activity_repo: ActivityRepository,
    feed_entry_repo: FeedEntryRepository,
    cards: CardDirectoryService,
    profiles: ProfileDirectoryService,
    collections: CollectionDirectoryService,
}

impl FeedService {
    /// Create a new feed service.
    #[must_use]
    pub fn new(
        activity_repo: ActivityRepository,
        feed_entry_repo: FeedEntryRepository,
        cards: CardDirectoryService,
        profiles: ProfileDirectoryService,
        collections: CollectionDirectoryService,
    ) -> Self {
        Self {
            activity_repo,
            feed_entry_repo,
            cards,
            profiles,
            collections,
        }
    }

    /// Global feed: every activity, newest first.
    pub async fn global_feed(
        &self,
        limit: u64,
        until_id: Option<&str>,
        filter: &ActivityFilter,
    ) -> AppResult<FeedPage> {
        let activities = self.activity_repo.find_page(limit, until_id, filter).await?;

        let next_cursor = Self::cursor_from(&activities, limit);
        let items = self.enrich(&activities).await?;

        Ok(FeedPage { items, next_cursor })
    }

    /// Following feed: activities fanned out to `user_id`, newest first.
    pub async fn following_feed(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
        filter: &ActivityFilter,
    ) -> AppResult<FeedPage> {
        let entries = self
            .feed_entry_repo
            .find_page(user_id, limit, until_id)
            .await?;

        // Cursor walks the fan-out rows, not the filtered output, so a
        // heavily filtered page still makes progress.
        let next_cursor = if entries.len() as u64 == limit {
            entries.last().map(|e| e.activity_id.clone())
        } else {
            None
        };

        let activity_ids: Vec<String> = entries.iter().map(|e| e.activity_id.clone()).collect();
        let mut by_id: HashMap<String, activity::Model> = self
            .activity_repo
            .find_by_ids(&activity_ids)
            .await?
            .into_iter()
            .map(|a| (a.id.clone(), a))
            .collect();

        // Restore fan-out order, then apply the filter in memory.
        let activities: Vec<activity::Model> = activity_ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .filter(|a| Self::matches_filter(a, filter))
            .collect();

        let items = self.enrich(&activities).await?;

        Ok(FeedPage { items, next_cursor })
    }

    /// Gems feed: global activities restricted to collections matching
    /// `query`, re-validated against live collection membership.
    ///
    /// An activity's stored collection list can go stale; a card removed
    /// from its collection since the activity was written is dropped here
    /// while still appearing in the global feed.
    pub async fn gems_feed(
        &self,
        query: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<FeedPage> {
        let matched = self.collections.find_collections_matching(query).await?;
        if matched.is_empty() {
            return Ok(FeedPage {
                items: Vec::new(),
                next_cursor: None,
            });
        }
        let matched: HashSet<String> = matched.into_iter().collect();

        let raw = self
            .activity_repo
            .find_page(limit, until_id, &ActivityFilter::default())
            .await?;
        // Advance past everything scanned, kept or not.
        let next_cursor = Self::cursor_from(&raw, limit);

        // Live membership per matched collection seen on this page.
        let mut live_cards: HashMap<String, HashSet<String>> = HashMap::new();
        for activity in &raw {
            for collection_id in activity.collection_id_list() {
                if matched.contains(&collection_id) && !live_cards.contains_key(&collection_id) {
                    let cards = self
                        .collections
                        .get_collection_card_ids(&collection_id)
                        .await?;
                    live_cards.insert(collection_id, cards.into_iter().collect());
                }
            }
        }

        let kept: Vec<activity::Model> = raw
            .into_iter()
            .filter(|activity| {
                activity.collection_id_list().iter().any(|collection_id| {
                    live_cards
                        .get(collection_id)
                        .is_some_and(|cards| cards.contains(&activity.card_id))
                })
            })
            .collect();

        let items = self.enrich(&kept).await?;

        Ok(FeedPage { items, next_cursor })
    }

    fn cursor_from(activities: &[activity::Model], limit: u64) -> Option<String> {
        if activities.len() as u64 == limit {
            activities.last().map(|a| a.id.clone())
        } else {
            None
        }
    }

    fn matches_filter(activity: &activity::Model, filter: &ActivityFilter) -> bool {
        if let Some(ref url_type) = filter.url_type
            && activity.url_type.as_ref() != Some(url_type)
        {
            return false;
        }
        if let Some(ref source) = filter.source
            && activity.source.as_ref() != Some(source)
        {
            return false;
        }
        true
    }

    /// Enrich a page of activities with one batched directory call each.
    async fn enrich(&self, activities: &[activity::Model]) -> AppResult<Vec<FeedItem>> {
        if activities.is_empty() {
            return Ok(Vec::new());
        }

        let mut actor_ids: Vec<String> = Vec::new();
        let mut card_ids: Vec<String> = Vec::new();
        let mut collection_ids: Vec<String> = Vec::new();
        let mut seen_actors = HashSet::new();
        let mut seen_cards = HashSet::new();
        let mut seen_collections = HashSet::new();
        for activity in activities {
            if seen_actors.insert(activity.actor_id.clone()) {
                actor_ids.push(activity.actor_id.clone());
            }
            if seen_cards.insert(activity.card_id.clone()) {
                card_ids.push(activity.card_id.clone());
            }
            for id in activity.collection_id_list() {
                if seen_collections.insert(id.clone()) {
                    collection_ids.push(id);
                }
            }
        }

        let (profiles, cards, collections) = tokio::try_join!(
            self.profiles.get_batch_profile_views(&actor_ids),
            self.cards.get_batch_card_views(&card_ids),
            self.collections.get_batch_collection_views(&collection_ids),
        )?;

        Ok(activities
            .iter()
            .map(|activity| FeedItem {
                id: activity.id.clone(),
                actor_id: activity.actor_id.clone(),
                actor: profiles.get(&activity.actor_id).cloned(),
                card: cards.get(&activity.card_id).cloned(),
                collections: activity
                    .collection_id_list()
                    .iter()
                    .filter_map(|id| collections.get(id).cloned())
                    .collect(),
                created_at: activity.created_at.to_utc(),
            })
            .collect())
    }
}
