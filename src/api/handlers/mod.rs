//! API handlers.
//!
//! Auth endpoints live under [`auth`], with the shared envelope in
//! [`crate::api::response`]. `/health` reports the database and the identity
//! provider so orchestrators see dependency failures.

pub mod auth;
pub mod health;
pub mod root;
