//! Sandbox-root-confined filesystem access: path resolution and file
//! operations.

pub mod ops;
pub mod resolver;

pub use resolver::PathResolver;
