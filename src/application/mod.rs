//! Application layer - Use cases and business logic
//! 
//! This layer contains:
//! - Errors: Error taxonomy for dispatch, storage and plugins
//! - Handle: The facade passed to plugins and handlers
//! - Services: Permission evaluation, counters, help rendering
//! - Messaging: Normalization, parsing, middleware, dispatching

pub mod errors;
pub mod handle;
pub mod services;
pub mod messaging;
