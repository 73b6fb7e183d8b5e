//! Storage boundary. All cross-table reads the workers depend on are raw
//! statements here, written per backend: Postgres in production, SQLite in
//! tests. Row claiming (`FOR UPDATE SKIP LOCKED`) only exists on Postgres.

mod hosts;
mod notifications;

pub use hosts::HostStore;
pub use notifications::NotificationStore;
