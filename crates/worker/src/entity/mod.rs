//! Database entities. Joins used by the workers live as raw statements in
//! the store layer, so the entities carry no relation definitions.

pub mod host;
pub mod notification;
pub mod settings;
pub mod user;
pub mod user_host;
