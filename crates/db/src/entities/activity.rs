//! Activity entity (canonical feed activities).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Activity kinds.
///
/// Only one kind exists today; the enum keeps the wire and storage
/// representation stable when more kinds arrive.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum ActivityKind {
    #[sea_orm(string_value = "cardCollected")]
    CardCollected,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activity")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The user who performed the action
    pub actor_id: String,

    /// Activity kind
    pub kind: ActivityKind,

    /// The collected card
    pub card_id: String,

    /// Collections the card was added to (JSON array of ids, denormalized;
    /// may grow through dedup-window merges and go stale relative to live
    /// collection membership)
    pub collection_ids: Json,

    /// URL type of the card (article, video, ...)
    #[sea_orm(nullable)]
    pub url_type: Option<String>,

    /// Client/source that produced the action
    #[sea_orm(nullable)]
    pub source: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Collection ids as a string list (empty on malformed metadata).
    #[must_use]
    pub fn collection_id_list(&self) -> Vec<String> {
        self.collection_ids
            .as_array()
            .map(|ids| {
                ids.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}
