//! Session adapters

pub mod bridge;
pub mod console;

pub use bridge::BridgeAdapter;
pub use console::ConsoleAdapter;
