//! Ferrous DoH Application Layer
//!
//! Ports for every external collaborator of the forwarding engine, plus the
//! engine itself: upstream exchange, packet pipeline and lifecycle.

pub mod ports;
pub mod services;
pub mod use_cases;
