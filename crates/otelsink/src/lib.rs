//! otelsink - a minimal OTLP ingestion sink.
//!
//! Accepts OTLP/gRPC export requests for traces, metrics, and logs and writes
//! each request, unmodified, as one protobuf-encoded file on local disk.
//!
//! ## Architecture
//!
//! ```text
//! OTLP gRPC → OtlpGrpcReceiver → Sink → {root}/{signal}/{unix_nanos}
//! ```
//!
//! There is no buffering: every request is persisted before its response is
//! sent, and a failed write surfaces to the caller as `Internal`.

pub mod config;
pub mod error;
pub mod ingest;
pub mod server;
pub mod storage;

pub use config::SinkConfig;
pub use error::SinkError;
pub use storage::{Signal, Sink};
