//! Incremental streaming-body decoders (C6, §4.6), shared by every provider
//! adapter crate. Each decoder consumes a byte stream, calls `on_token` for
//! each produced text fragment, and returns the fully accumulated text; both
//! ignore malformed individual records rather than aborting the stream.

#![deny(missing_docs)]

pub mod anthropic;
pub mod error;
pub mod linebuf;
pub mod ndjson;
pub mod sse;

pub use anthropic::decode_anthropic_sse;
pub use error::StreamError;
pub use ndjson::decode_ndjson;
pub use sse::decode_sse;
