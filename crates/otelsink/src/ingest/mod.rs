//! OTLP ingestion receivers.

pub mod grpc;

pub use grpc::{LogsServiceServer, MetricsServiceServer, OtlpGrpcReceiver, TraceServiceServer};
