// Service exports
pub mod client;
pub mod regenerator;
pub mod store;

pub use client::{SnapshotClient, ClientError, mock_snapshot, DEFAULT_FETCH_TIMEOUT};
pub use regenerator::BackgroundRegenerator;
pub use store::SnapshotStore;
