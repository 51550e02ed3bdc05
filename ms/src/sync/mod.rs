//! Synchronization - keeping the cache fresh
//!
//! [`SyncCoordinator`] watches the transport's connection status and runs
//! the polling fallback when push delivery is unavailable;
//! [`ApiSyncHandler`] is the production refetch path (REST -> state).

mod coordinator;
mod handler;

pub use coordinator::{SyncCoordinator, SyncSnapshot};
pub use handler::{ApiSyncHandler, SyncError, SyncHandler};
