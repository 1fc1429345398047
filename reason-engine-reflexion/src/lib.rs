//! Reflexion engine (C11, §4.10): attempt, evaluate, reflect, retry — with
//! optional cross-run episodic memory informing each run's first attempt
//! and every attempt persisted as a new episode.

#![deny(missing_docs)]

mod engine;
mod error;
mod params;
mod prompts;
mod result;

pub use engine::ReflexionEngine;
pub use error::ReflexionError;
pub use params::ReflexionParams;
pub use prompts::{Attempt, Judgment};
pub use result::{AttemptRecord, ReflexionResult};
