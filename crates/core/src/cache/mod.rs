//! SQLite-backed stores shared with the rest of the application.
//!
//! This module provides persistent storage using SQLite with async access
//! via tokio-rusqlite. It supports:
//!
//! - A shared HTTP-level response cache with exact-request lookup
//! - A best-effort persisted-object store addressed by namespace + name
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod objects;
pub mod responses;

pub use crate::Error;

pub use connection::CacheDb;
pub use objects::ObjectStore;
pub use responses::{ResponseStore, StoredResponse};
