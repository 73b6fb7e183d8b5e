//! certwatch worker: tracks TLS certificates for registered hostnames and
//! delivers webhook reminders as they approach expiry.
//!
//! Three moving parts run inside one process: the [`poller::Poller`]
//! periodically re-probes every tracked host under a bounded concurrency
//! budget, the [`scheduler::ReminderScheduler`] derives due reminder rows
//! from expiring hosts, and the [`dispatcher::NotificationDispatcher`]
//! delivers them over provider webhooks with bounded retries.

pub mod config;
pub mod dispatcher;
pub mod entity;
pub mod error;
pub mod model;
pub mod notifier;
pub mod poller;
pub mod probe;
pub mod scheduler;
pub mod store;
pub mod webhook;
