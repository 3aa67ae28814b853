//! Domain layer - Core types and port definitions
//!
//! This module defines the core traits (ports) that transports implement,
//! following hexagonal architecture principles.

pub mod ports;

pub use ports::*;
