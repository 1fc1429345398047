//! Built-in tool implementations (§3 "Tool").

mod calculator;
mod code_executor;
mod http_fetch;
mod string_ops;

pub use calculator::Calculator;
pub use code_executor::{validate_syntax, CodeExecutor};
pub use http_fetch::HttpFetch;
pub use string_ops::StringOps;
