//! Shared utilities for the workspace tools
//!
//! This crate provides:
//! - The error taxonomy every other crate converts into
//! - Validated name types (workspace names, trash generation names)
//! - Operation and privilege mode enums shared by config and engine
//! - Time utilities (epoch seconds, day arithmetic, mock time)
//! - Default paths for the policy file

mod error;
mod ids;
mod kinds;
mod paths;
mod time;

pub use error::*;
pub use ids::*;
pub use kinds::*;
pub use paths::*;
pub use time::*;
