//! Server catalog: domain model, ports, adapters, and workflow services.
//!
//! The registry stores one row per published `(name, version)` pair,
//! maintains lifecycle status and the per-name latest flag, and serves
//! filtered, cursor-paginated listings. The module follows hexagonal
//! architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
