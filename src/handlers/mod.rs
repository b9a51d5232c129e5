pub mod backup;
pub mod entries;
pub mod health;
pub mod sync;
