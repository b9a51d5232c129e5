pub mod backup;
pub mod local_store;
pub mod query;
pub mod reconciliation;
pub mod remote;
pub mod stats;
