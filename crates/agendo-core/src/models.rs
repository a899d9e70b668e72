//! Domain models for Agendo.
//!
//! Records are stored as camelCase JSON under the tree described in
//! [`crate::store::paths`].

pub mod appointment;
pub mod business;
pub mod client;
pub mod license;
pub mod record;
pub mod service;
pub mod user;
