//! Database entities.

#![allow(missing_docs)]

pub mod activity;
pub mod feed_entry;
pub mod follow;

pub use activity::Entity as Activity;
pub use feed_entry::Entity as FeedEntry;
pub use follow::Entity as Follow;
