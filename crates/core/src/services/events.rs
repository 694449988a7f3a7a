//! Domain event envelope and publisher abstraction.
//!
//! Events are serialized to a stable JSON envelope and handed to an
//! [`EventPublisher`]. The actual implementation is provided by the queue
//! crate (Redis-backed); core services only see the trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use curio_common::AppResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Kinds of domain events carried through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A card was collected (saved) by a user.
    #[serde(rename = "cardCollected")]
    CardCollected,
    /// A card was removed from a user's library.
    #[serde(rename = "cardRemoved")]
    CardRemoved,
}

impl EventKind {
    /// Every kind the pipeline knows about.
    pub const ALL: [Self; 2] = [Self::CardCollected, Self::CardRemoved];

    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CardCollected => "cardCollected",
            Self::CardRemoved => "cardRemoved",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The envelope wrapping every event on the wire.
///
/// The payload stays opaque JSON at this level so the envelope schema never
/// changes when a payload grows a field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    /// What happened.
    pub kind: EventKind,
    /// Primary entity the event is about (the card id for card events).
    pub aggregate_id: String,
    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,
    /// Kind-specific payload.
    pub payload: serde_json::Value,
}

impl DomainEvent {
    /// Build a `cardCollected` event from its payload.
    pub fn card_collected(payload: &CardCollectedPayload) -> AppResult<Self> {
        Ok(Self {
            kind: EventKind::CardCollected,
            aggregate_id: payload.card_id.clone(),
            occurred_at: Utc::now(),
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Build a `cardRemoved` event from its payload.
    pub fn card_removed(payload: &CardRemovedPayload) -> AppResult<Self> {
        Ok(Self {
            kind: EventKind::CardRemoved,
            aggregate_id: payload.card_id.clone(),
            occurred_at: Utc::now(),
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Decode the payload as a concrete type.
    pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> AppResult<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// Payload of a `cardCollected` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardCollectedPayload {
    /// User who collected the card.
    pub actor_id: String,
    /// The collected card.
    pub card_id: String,
    /// Collections the card was placed into, possibly empty.
    #[serde(default)]
    pub collection_ids: Vec<String>,
    /// URL classification of the card, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_type: Option<String>,
    /// Where the collect originated (web, extension, import).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// When the card itself was created, for library-only collects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_created_at: Option<DateTime<Utc>>,
}

/// Payload of a `cardRemoved` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRemovedPayload {
    /// User who removed the card.
    pub actor_id: String,
    /// The removed card.
    pub card_id: String,
}

/// Trait for publishing domain events.
///
/// This allows core services to emit events without depending on the
/// queue implementation.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a batch of events.
    async fn publish(&self, events: Vec<DomainEvent>) -> AppResult<()>;
}

/// A no-op implementation of `EventPublisher` for testing or when event
/// distribution is disabled.
#[derive(Clone, Default)]
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish(&self, _events: Vec<DomainEvent>) -> AppResult<()> {
        Ok(())
    }
}

/// Wrapper for boxed `EventPublisher` trait object.
pub type EventPublisherService = Arc<dyn EventPublisher>;
