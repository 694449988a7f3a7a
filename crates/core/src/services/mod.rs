//! Business logic services.

pub mod activity_feed;
pub mod events;
pub mod fan_out;
pub mod feed;
pub mod follow;
pub mod follower_resolver;
pub mod lock;

pub use activity_feed::{ActivityFeedService, CardCollectedInput};
pub use events::{
    CardCollectedPayload, CardRemovedPayload, DomainEvent, EventKind, EventPublisher,
    EventPublisherService, NoOpEventPublisher,
};
pub use fan_out::FanOutWriter;
pub use feed::{
    CardDirectory, CardDirectoryService, CardView, CollectionDirectory, CollectionDirectoryService,
    CollectionView, FeedItem, FeedPage, FeedService, ProfileDirectory, ProfileDirectoryService,
    ProfileView,
};
pub use follow::{FollowService, NoOpRecordPublisher, RecordPublisher, RecordPublisherService};
pub use follower_resolver::FollowerResolver;
pub use lock::{DistributedLock, InMemoryLock, LockService};
