//! Infrastructure layer - External concerns
//! 
//! This layer contains:
//! - Config: Configuration loading
//! - Storage: JSON grant file and the backend factory
//! - Database: SQLite grant store
//! - Adapters: Session integrations (console, sidecar bridge)

pub mod config;
pub mod storage;
pub mod database;
pub mod adapters;
