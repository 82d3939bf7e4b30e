//! Domain layer - Core business types
//! 
//! This layer contains:
//! - Entities: Core business objects (Jid, MessageContext, Command, CommandRegistry)
//! - Traits: Abstractions for infrastructure (Bot, PermissionStore)

pub mod entities;
pub mod traits;
