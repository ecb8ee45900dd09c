//! tbapi-api: gRPC API layer
//!
//! This crate provides the public surface of the gateway:
//! - The `tbapi.v1.TigerBeetle` gRPC service via Tonic
//! - Hex encoding of 128-bit identifiers
//! - Logging setup for the `tbapi` binary
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 tbapi-api                    │
//! ├─────────────────────────────────────────────┤
//! │  grpc/          - Service and server setup  │
//! │  ids.rs         - Hex ids, id generation    │
//! │  observability/ - Structured logging        │
//! └─────────────────────────────────────────────┘
//! ```

pub mod grpc;
pub mod ids;
pub mod observability;

/// Code generated from `proto/tbapi/v1/tbapi.proto`.
pub mod proto {
    pub mod tbapi {
        pub mod v1 {
            tonic::include_proto!("tbapi.v1");

            /// Encoded descriptor set, served by gRPC reflection.
            pub const FILE_DESCRIPTOR_SET: &[u8] =
                tonic::include_file_descriptor_set!("tbapi_descriptor");
        }
    }
}
