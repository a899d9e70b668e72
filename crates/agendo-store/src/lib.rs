//! Agendo Store — in-memory document tree implementing the
//! `agendo_core::store::Store` contract.
//!
//! This crate provides:
//! - The store itself ([`MemoryStore`], [`StoreConfig`])
//! - Error types ([`StoreError`])
//!
//! Any other backend (a hosted real-time database, for instance) plugs in
//! by implementing the same trait.

mod config;
mod error;
mod memory;
mod tree;

pub use config::StoreConfig;
pub use error::StoreError;
pub use memory::MemoryStore;
