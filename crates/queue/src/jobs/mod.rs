//! Job definitions.

mod event;

pub use event::EventJob;
