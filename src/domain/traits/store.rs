use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use crate::application::errors::StorageError;

/// Identity (user or chat JID) → command names it may run
pub type Grants = BTreeMap<String, BTreeSet<String>>;

/// Durable storage for command grants
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Read every grant
    async fn load(&self) -> Result<Grants, StorageError>;

    /// Persist a single grant. Granting twice is not an error.
    async fn grant(&self, identity: &str, command: &str) -> Result<(), StorageError>;

    /// Remove a single grant, returning whether it existed
    async fn revoke(&self, identity: &str, command: &str) -> Result<bool, StorageError>;

    /// Short backend name for logs
    fn backend(&self) -> &'static str;
}
