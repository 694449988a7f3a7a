//! Feed queue handler.

use async_trait::async_trait;
use curio_common::AppResult;
use curio_core::{ActivityFeedService, CardCollectedInput, CardCollectedPayload, DomainEvent};
use tracing::debug;

use crate::dispatcher::EventHandler;

/// Turns `cardCollected` events into activities and fans them out.
///
/// Activity creation and fan-out run in one handler invocation on
/// purpose: a fan-out failure fails the job, and the retry re-runs the
/// idempotent creation step before re-attempting distribution. The
/// activity created on the first pass survives either way.
#[derive(Clone)]
pub struct FeedActivityHandler {
    feed: ActivityFeedService,
}

impl FeedActivityHandler {
    /// Create a new feed handler.
    #[must_use]
    pub const fn new(feed: ActivityFeedService) -> Self {
        Self { feed }
    }
}

#[async_trait]
impl EventHandler for FeedActivityHandler {
    async fn handle(&self, event: &DomainEvent) -> AppResult<()> {
        let payload: CardCollectedPayload = event.payload_as()?;

        let input = CardCollectedInput {
            actor_id: payload.actor_id,
            card_id: payload.card_id,
            collection_ids: payload.collection_ids,
            url_type: payload.url_type,
            source: payload.source,
            card_created_at: payload.card_created_at,
            occurred_at: event.occurred_at,
        };

        let activity = self.feed.add_card_collected(&input).await?;
        let written = self.feed.distribute(&activity).await?;

        debug!(
            activity_id = %activity.id,
            written,
            "Handled card collected event"
        );
        Ok(())
    }
}
