//! Hierarchical work-queue engine: buffers and brokers work elements
//! between a request-management layer and execution agents, organized as
//! global and local queue instances (see `DESIGN.md`).

pub mod adapters;
pub mod api;
pub mod bootstrap;
pub mod config;
pub mod engine;
pub mod error;
pub mod location;
pub mod matcher;
pub mod model;
pub mod policy;
pub mod repo;
pub mod telemetry;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
