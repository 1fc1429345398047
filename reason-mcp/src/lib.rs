//! Tool-call RPC surface (§6): request/response schemas for the six named
//! tools, provider and tool-registry wiring, and the stdio/SSE/streamable-HTTP
//! transports that carry the protocol.
//!
//! This crate is deliberately thin — every algorithmic decision lives in
//! `reason-engine-*`; this crate's job is request parsing, engine wiring,
//! and result serialization (§1 "Out of scope: the outward tool-call RPC
//! framing").

#![deny(missing_docs)]

mod dialectic;
pub mod error;
mod got;
mod memory;
mod providers;
mod reflexion;
mod sequential;
mod server;
mod streamctl;
mod tools;
pub mod transport;

pub use dialectic::{DialecticReasonRequest, DialecticReasonResponse};
pub use error::McpError;
pub use got::{GraphOfThoughtsRequest, GraphOfThoughtsResponse};
pub use memory::{memory_path, memory_stats, open_memory_store, MemoryStatsResponse};
pub use providers::{list_providers, ProviderListing};
pub use reflexion::{ReflexionRequest, ReflexionResponse};
pub use sequential::{SequentialParams, SequentialRequest, SequentialResponse, SequentialResult};
pub use server::ReasoningServer;
pub use tools::{build_registry, resolve_enabled_tools};
pub use transport::{bind_addr, http_path, resolve_transport, serve, TransportKind};
