//! Shared plumbing for sources: HTTP, local tools and retries.

/// Local tool execution behind the [`ToolRunner`] seam
pub mod command;
/// Shared HTTP client with timeouts and retries
pub mod http;
/// Retry with linear backoff
pub mod retry;

pub use command::{SystemToolRunner, ToolRunner};
pub use http::HttpClient;
pub use retry::with_retry;
