//! Pull side - REST client used for refetching
//!
//! The coordinator refreshes cached data through this client whenever
//! push delivery is unavailable.

mod client;

pub use client::{FetchError, MessageApiClient};
