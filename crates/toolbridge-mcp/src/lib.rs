pub mod cache;
pub mod client;
pub mod retry;
pub mod toolset;

pub use cache::{CacheEntry, ToolCache};
pub use client::HttpToolSource;
pub use retry::RetryPolicy;
pub use toolset::ToolSetSession;
