//! Permission evaluation and the grant cache backing it

use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::application::errors::StorageError;
use crate::domain::entities::jid::{self, Jid};
use crate::domain::entities::{Command, MessageContext};
use crate::domain::traits::{Grants, PermissionStore};

/// Why a call was allowed or denied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Owner,
    UserGrant,
    GroupGrant,
    Public,
    OwnerOnly,
    GroupOnly,
    PrivateOnly,
    NotGranted,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(
            self,
            Decision::Owner | Decision::UserGrant | Decision::GroupGrant | Decision::Public
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Owner => "owner",
            Decision::UserGrant => "user grant",
            Decision::GroupGrant => "group grant",
            Decision::Public => "public",
            Decision::OwnerOnly => "owner only",
            Decision::GroupOnly => "group only",
            Decision::PrivateOnly => "private only",
            Decision::NotGranted => "not granted",
        }
    }
}

/// Pure decision function over command flags, caller and grants.
///
/// Structural rules (owner-only, group-only, private-only) are checked
/// before grants, so a grant never lifts them.
#[derive(Debug, Clone)]
pub struct PermissionEvaluator {
    owner: Jid,
}

impl PermissionEvaluator {
    pub fn new(owner: Jid) -> Self {
        Self { owner }
    }

    pub fn owner(&self) -> &Jid {
        &self.owner
    }

    pub fn is_owner(&self, identity: &str) -> bool {
        Jid::parse(identity)
            .map(|j| j.same_user(&self.owner))
            .unwrap_or(false)
    }

    pub fn evaluate(&self, command: &Command, ctx: &MessageContext, grants: &Grants) -> Decision {
        let flags = &command.flags;

        if self.is_owner(&ctx.sender_id) {
            return Decision::Owner;
        }
        if flags.owner_only {
            return Decision::OwnerOnly;
        }
        if flags.group_only && !ctx.is_group {
            return Decision::GroupOnly;
        }
        if flags.private_only && ctx.is_group {
            return Decision::PrivateOnly;
        }

        let granted = |identity: &str| {
            grants
                .get(&jid::bare(identity))
                .map(|set| set.contains(&command.name))
                .unwrap_or(false)
        };

        if granted(&ctx.sender_id) {
            return Decision::UserGrant;
        }
        if ctx.is_group && granted(&ctx.chat_id) {
            return Decision::GroupGrant;
        }
        if !flags.restricted {
            return Decision::Public;
        }
        Decision::NotGranted
    }

    pub fn can_execute(&self, command: &Command, ctx: &MessageContext, grants: &Grants) -> bool {
        self.evaluate(command, ctx, grants).is_allowed()
    }
}

/// In-memory grants loaded once from a [`PermissionStore`].
///
/// Mutations hit the store first and update memory only once the store
/// accepted them; readers always see the latest successful write.
pub struct PermissionService {
    store: Arc<dyn PermissionStore>,
    grants: RwLock<Grants>,
    evaluator: PermissionEvaluator,
}

impl PermissionService {
    pub async fn load(store: Arc<dyn PermissionStore>, owner: Jid) -> Result<Self, StorageError> {
        let grants = store.load().await?;
        tracing::info!(
            "Loaded {} permission entries from {} store",
            grants.values().map(BTreeSet::len).sum::<usize>(),
            store.backend()
        );
        Ok(Self {
            store,
            grants: RwLock::new(grants),
            evaluator: PermissionEvaluator::new(owner),
        })
    }

    pub fn evaluator(&self) -> &PermissionEvaluator {
        &self.evaluator
    }

    pub async fn evaluate(&self, command: &Command, ctx: &MessageContext) -> Decision {
        let grants = self.grants.read().await;
        self.evaluator.evaluate(command, ctx, &grants)
    }

    pub async fn can_execute(&self, command: &Command, ctx: &MessageContext) -> bool {
        self.evaluate(command, ctx).await.is_allowed()
    }

    /// Grant `command` to a user or chat. Returns `false` when it was already granted.
    pub async fn grant(&self, identity: &str, command: &str) -> Result<bool, StorageError> {
        let identity = jid::bare(identity);
        let command = command.to_ascii_lowercase();

        let mut grants = self.grants.write().await;
        if grants.get(&identity).is_some_and(|set| set.contains(&command)) {
            return Ok(false);
        }

        self.store.grant(&identity, &command).await?;
        grants.entry(identity.clone()).or_default().insert(command.clone());
        tracing::info!("Granted '{}' to {}", command, identity);
        Ok(true)
    }

    /// Revoke a grant. Returns `false` when there was nothing to revoke.
    pub async fn revoke(&self, identity: &str, command: &str) -> Result<bool, StorageError> {
        let identity = jid::bare(identity);
        let command = command.to_ascii_lowercase();

        let mut grants = self.grants.write().await;
        if !grants.get(&identity).is_some_and(|set| set.contains(&command)) {
            return Ok(false);
        }

        self.store.revoke(&identity, &command).await?;
        if let Some(set) = grants.get_mut(&identity) {
            set.remove(&command);
            if set.is_empty() {
                grants.remove(&identity);
            }
        }
        tracing::info!("Revoked '{}' from {}", command, identity);
        Ok(true)
    }

    pub async fn list(&self) -> Grants {
        self.grants.read().await.clone()
    }

    pub async fn grants_for(&self, identity: &str) -> BTreeSet<String> {
        self.grants
            .read()
            .await
            .get(&jid::bare(identity))
            .cloned()
            .unwrap_or_default()
    }
}
