//! Event handlers wired into queue dispatchers.

mod feed;

pub use feed::FeedActivityHandler;
