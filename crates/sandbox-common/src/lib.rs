//! Shared types for the sandbox agent: the canonical execution language,
//! uniform execution result, error kinds, and the two pieces of tiny
//! process-wide state (readiness, activity) that every facade touches.

pub mod activity;
pub mod error;
pub mod exec_result;
pub mod fsmodel;
pub mod lang;
pub mod paths;
pub mod readiness;

pub use activity::ActivityMonitor;
pub use error::SandboxError;
pub use exec_result::{ExecuteRequest, ExecuteResult};
pub use lang::Lang;
pub use readiness::Readiness;
