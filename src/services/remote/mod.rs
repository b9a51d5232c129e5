mod blob;
mod edge_config;
mod retry;
mod snapshot;

pub use snapshot::{RemoteSnapshotStore, DEFAULT_CACHE_VERSION};
