//! Domain entities - Core business objects

pub mod jid;
pub mod event;
pub mod message;
pub mod command;

pub use jid::Jid;
pub use event::{InboundEvent, MessageKey, MessagePayload};
pub use message::{MessageContext, MessageKind, QuotedMessage, OutgoingMessage, OutboundContent, MediaSource};
pub use command::{Command, CommandFlags, CommandRegistry, SharedRegistry, HandlerFn, HandlerFuture};
