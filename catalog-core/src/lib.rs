//! Catalog core library
//!
//! Persistence and domain layer of an image catalogue: files, tags,
//! locations and saved searches stored in SQLite, with criteria-based
//! search and periodic snapshot backups.

pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod services;
