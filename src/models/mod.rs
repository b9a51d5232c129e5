pub mod mood_entry;
pub mod stats;
pub mod sync_entry;
