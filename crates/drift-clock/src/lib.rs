//! DRIFT Clock - Lamport logical clock
//!
//! One clock per node, mutated only by the node's event loop:
//! - local event (internal or send): `clock + 1`
//! - receive of clock `r`: `max(clock, r) + 1`

pub mod lamport;

pub use lamport::*;
