//! Follow entity (user→user and user→collection follows).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// What a follow points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum FollowTargetType {
    #[sea_orm(string_value = "user")]
    User,
    #[sea_orm(string_value = "collection")]
    Collection,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "follow")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The user who follows
    pub follower_id: String,

    /// The followed user or collection
    pub target_id: String,

    /// Target discriminator
    pub target_type: FollowTargetType,

    /// Id of the external (AT-Protocol) record once published
    #[sea_orm(nullable)]
    pub published_record_id: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
