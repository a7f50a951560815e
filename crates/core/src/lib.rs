//! Core types and shared functionality for the folio scheme interceptor.
//!
//! This crate provides:
//! - Bounded FIFO caches used by the dispatcher
//! - The article model and the section-data response records
//! - SQLite-backed shared response cache and persisted-object store
//! - Unified error types
//! - Configuration structures

pub mod article;
pub mod cache;
pub mod config;
pub mod error;
pub mod fifo;

pub use article::{Article, Section, SectionDataResponse, SectionRecord};
pub use cache::{CacheDb, ObjectStore, ResponseStore, StoredResponse};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use fifo::FifoCache;
