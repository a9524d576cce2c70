//! DRIFT Simulation Driver
//!
//! Spawns N independent nodes, each on its own OS thread with its own
//! single-threaded runtime, for a fixed wall-clock duration, then joins them.
//! Nodes share no memory; TCP is the only channel between them.

pub mod config;
pub mod simulation;

pub use config::*;
pub use simulation::*;
