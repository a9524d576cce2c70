//! DRIFT Core - Fundamental types and primitives
//!
//! This crate defines the core types used throughout DRIFT:
//! - Identifiers (NodeId)
//! - Wall-clock time (WallTime)
//! - Error type shared by every layer

pub mod error;
pub mod id;
pub mod time;

pub use error::*;
pub use id::*;
pub use time::*;
