//! Episodic memory (C9): a persistent on-disk JSON store of past reflexion
//! attempts, looked up by normalized-hash or token-similarity match (§4.8).

#![deny(missing_docs)]

mod error;
pub mod episode;
pub mod similarity;
mod store;

pub use episode::Episode;
pub use error::MemoryError;
pub use similarity::{jaccard_similarity, normalize};
pub use store::{MemoryStats, MemoryStore, RETENTION_LIMIT};
