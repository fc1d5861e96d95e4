//! Client Service module for the backend under test
//!
//! This module provides:
//! - `ClientService` trait abstracting the three calls a session makes
//! - `GrpcClientService` talking to the matchmaking frontend over gRPC
//! - `pb`, the generated protobuf types and client/server stubs

mod grpc;
mod service;

/// Generated `frontend` protobuf definitions
pub mod pb {
    tonic::include_proto!("frontend");
}

pub use grpc::GrpcClientService;
pub use service::{ClientService, MatchResult, UpdateStream};
