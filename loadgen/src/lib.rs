//! Mecha Hamster load generator
//!
//! Drives many simulated player lifecycles against the matchmaking frontend,
//! shaping traffic into alternating heavy and quiet phases.
//!
//! Components, leaves first:
//! - [`runner`]: one session's register/subscribe/await/deregister/cooldown lifecycle
//! - [`group`]: a batch of concurrent sessions launched per admission token
//! - [`pool`]: the fixed-capacity token queue bounding concurrent groups
//! - [`scheduler`]: the simulate/rest control loop
//! - [`shutdown`]: the cancellation signal threaded through all of the above

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod group;
pub mod pool;
pub mod runner;
pub mod scheduler;
pub mod shutdown;
pub mod stats;
pub mod status;
pub mod telemetry;
pub mod wait;

// Re-export commonly used types
pub use client::{ClientService, GrpcClientService, MatchResult, UpdateStream};
pub use config::Config;
pub use engine::LoadEngine;
pub use error::ClientError;
pub use scheduler::Phase;
pub use stats::{RunStats, StatsSnapshot};
