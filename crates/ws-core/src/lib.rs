//! Workspace lifecycle for the workspace tools
//!
//! This crate contains:
//! - Policy resolution (which filesystems an identity may use, the default
//!   one, and the duration and extension limits that apply)
//! - The lifecycle engine (allocate / extend / release / restore)
//! - Storage pool selection and the optional path prefix hook

mod engine;
mod outcome;
mod prefix;
mod resolver;
mod spaces;

pub use engine::*;
pub use outcome::*;
pub use prefix::*;
pub use resolver::*;
pub use spaces::*;
