//! Worker functions and subscriber bootstrap.

mod event;

pub use event::{DispatcherContext, EventSubscriber, event_worker};
