//! Per-run event bus (C7): a timestamped [`Event`] ring plus `on_progress` /
//! `on_token` callbacks, gated by [`StreamMode`].

#![deny(missing_docs)]

mod event;
mod manager;
mod stream_mode;

pub use event::{Event, EventType};
pub use manager::StreamingManager;
pub use stream_mode::{resolve_stream_mode, StreamMode};
