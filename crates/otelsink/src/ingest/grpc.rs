//! tonic gRPC OTLP receivers.
//!
//! Implements the TraceService, MetricsService, and LogsService gRPC services
//! from the OpenTelemetry collector protocol. Every request is written to the
//! [`Sink`] before the response is returned.

use std::sync::Arc;

use opentelemetry_proto::tonic::collector::{
    logs::v1::{logs_service_server::LogsService, ExportLogsServiceRequest, ExportLogsServiceResponse},
    metrics::v1::{
        metrics_service_server::MetricsService, ExportMetricsServiceRequest,
        ExportMetricsServiceResponse,
    },
    trace::v1::{
        trace_service_server::TraceService, ExportTraceServiceRequest, ExportTraceServiceResponse,
    },
};
use prost::Message;
use tonic::{Request, Response, Status};

use crate::storage::{Signal, Sink};

/// gRPC receiver for all OTLP signals.
#[derive(Debug, Clone)]
pub struct OtlpGrpcReceiver {
    sink: Arc<Sink>,
}

impl OtlpGrpcReceiver {
    /// Create a new OTLP gRPC receiver writing to `sink`.
    pub const fn new(sink: Arc<Sink>) -> Self {
        Self { sink }
    }

    /// Sink every accepted request is written to.
    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    /// Persist one request, turning any failure into an opaque `Internal` status.
    async fn persist<M: Message>(&self, signal: Signal, request: &M) -> Result<(), Status> {
        match self.sink.export(signal, request).await {
            Ok(path) => {
                tracing::debug!(signal = %signal, path = %path.display(), "Stored export request");
                Ok(())
            }
            Err(e) => {
                tracing::error!(signal = %signal, error = %e, "Failed to store export request");
                Err(e.into())
            }
        }
    }
}

#[tonic::async_trait]
impl TraceService for OtlpGrpcReceiver {
    async fn export(
        &self,
        request: Request<ExportTraceServiceRequest>,
    ) -> Result<Response<ExportTraceServiceResponse>, Status> {
        let request = request.into_inner();
        tracing::info!(signal = %Signal::Traces, request = ?request, "trace.Export");

        self.persist(Signal::Traces, &request).await?;

        Ok(Response::new(ExportTraceServiceResponse {
            partial_success: None,
        }))
    }
}

#[tonic::async_trait]
impl MetricsService for OtlpGrpcReceiver {
    async fn export(
        &self,
        request: Request<ExportMetricsServiceRequest>,
    ) -> Result<Response<ExportMetricsServiceResponse>, Status> {
        let request = request.into_inner();
        tracing::info!(signal = %Signal::Metrics, request = ?request, "metrics.Export");

        self.persist(Signal::Metrics, &request).await?;

        Ok(Response::new(ExportMetricsServiceResponse {
            partial_success: None,
        }))
    }
}

#[tonic::async_trait]
impl LogsService for OtlpGrpcReceiver {
    async fn export(
        &self,
        request: Request<ExportLogsServiceRequest>,
    ) -> Result<Response<ExportLogsServiceResponse>, Status> {
        let request = request.into_inner();
        tracing::info!(signal = %Signal::Logs, request = ?request, "logs.Export");

        self.persist(Signal::Logs, &request).await?;

        Ok(Response::new(ExportLogsServiceResponse {
            partial_success: None,
        }))
    }
}

/// Re-export the service servers for convenience.
pub use opentelemetry_proto::tonic::collector::{
    logs::v1::logs_service_server::LogsServiceServer,
    metrics::v1::metrics_service_server::MetricsServiceServer,
    trace::v1::trace_service_server::TraceServiceServer,
};
