//! Database repositories.

mod activity;
mod feed_entry;
mod follow;

pub use activity::{ActivityFilter, ActivityRepository};
pub use feed_entry::FeedEntryRepository;
pub use follow::FollowRepository;
