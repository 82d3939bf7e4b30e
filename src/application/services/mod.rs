//! Application services - Business logic orchestration

pub mod command_service;
pub mod permission_service;
pub mod stats;

pub use permission_service::{Decision, PermissionEvaluator, PermissionService};
pub use stats::{Stats, StatsSnapshot};
