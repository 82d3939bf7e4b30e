//! Message handling - Event-driven message processing

pub mod dispatcher;
pub mod middleware;
pub mod parser;

pub use dispatcher::{DispatchOutcome, DispatchPolicy, MessageDispatcher};
pub use middleware::{Listener, RateLimiter};
pub use parser::{MessageParser, ParsedCommand, ParsedText, SelfId};
