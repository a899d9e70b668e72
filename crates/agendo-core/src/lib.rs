//! Agendo Core — domain models, error taxonomy, the store adapter
//! contract, and the pure engines that decide license validity, access
//! and appointment conflicts.
//!
//! Nothing in this crate performs I/O. Stateful orchestration lives in
//! `agendo-session`; the in-memory store lives in `agendo-store`.

pub mod access;
pub mod clock;
pub mod error;
pub mod license;
pub mod models;
pub mod schedule;
pub mod store;

pub use error::{AgendoError, AgendoResult};
