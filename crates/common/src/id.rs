//! ID generation utilities.

use chrono::{DateTime, Utc};
use ulid::Ulid;
use uuid::Uuid;

/// ID generator for entities.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new ULID-based ID.
    ///
    /// ULIDs are lexicographically sortable, which is what makes activity
    /// ids usable as feed cursors: ordering by id is ordering by time.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate a random opaque token (lock fencing, not time-ordered).
    #[must_use]
    pub fn generate_token(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// The smallest id [`IdGenerator::generate`] can have produced at or after
/// `at`.
///
/// A ULID embeds its creation time in the high bits, so `id >= min_id_at(t)`
/// selects the rows inserted since `t` regardless of what their other
/// timestamp columns say.
#[must_use]
pub fn min_id_at(at: DateTime<Utc>) -> String {
    let millis = u64::try_from(at.timestamp_millis()).unwrap_or(0);
    Ulid::from_parts(millis, 0).to_string().to_lowercase()
}
