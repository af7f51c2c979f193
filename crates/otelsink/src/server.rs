//! gRPC server wiring.

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::codec::CompressionEncoding;
use tonic::transport::Server as TonicServer;

use crate::config::ServerConfig;
use crate::ingest::{LogsServiceServer, MetricsServiceServer, OtlpGrpcReceiver, TraceServiceServer};
use crate::storage::Sink;
use crate::SinkError;

/// Serve the trace, metrics, and logs services on `listener` until
/// `shutdown` resolves.
///
/// The listener is bound by the caller so bind failures surface before any
/// request is accepted.
///
/// # Errors
///
/// Returns [`SinkError::Transport`] if the server stops for any reason other
/// than `shutdown`.
pub async fn serve<F>(
    listener: TcpListener,
    sink: Arc<Sink>,
    config: &ServerConfig,
    shutdown: F,
) -> Result<(), SinkError>
where
    F: Future<Output = ()>,
{
    let receiver = OtlpGrpcReceiver::new(sink);
    let max_size = config.max_decoding_message_size;

    let mut traces = TraceServiceServer::new(receiver.clone()).max_decoding_message_size(max_size);
    let mut metrics =
        MetricsServiceServer::new(receiver.clone()).max_decoding_message_size(max_size);
    let mut logs = LogsServiceServer::new(receiver).max_decoding_message_size(max_size);

    if config.accept_gzip {
        traces = traces.accept_compressed(CompressionEncoding::Gzip);
        metrics = metrics.accept_compressed(CompressionEncoding::Gzip);
        logs = logs.accept_compressed(CompressionEncoding::Gzip);
    }

    TonicServer::builder()
        .add_service(traces)
        .add_service(metrics)
        .add_service(logs)
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await?;

    Ok(())
}
