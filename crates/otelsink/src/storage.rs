//! Filesystem persistence for export requests.
//!
//! Every accepted request becomes one file:
//!
//! ```text
//! {root}/{signal}/{unix_nanos}
//! ```
//!
//! The file holds the canonical protobuf encoding of the request and nothing
//! else. Nothing here reads entries back; retention and cleanup are left to
//! the operator, e.g.:
//!
//! ```bash
//! # Delete traces older than 7 days
//! find /var/lib/otelsink/traces -type f -mtime +7 -delete
//! ```

use chrono::{DateTime, Utc};
use prost::Message;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::SinkError;

/// Telemetry signal type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Trace spans.
    Traces,
    /// Metrics (gauges, counters, histograms).
    Metrics,
    /// Log records.
    Logs,
}

impl Signal {
    /// All signals, in a stable order.
    pub const ALL: [Self; 3] = [Self::Traces, Self::Metrics, Self::Logs];

    /// Get the string representation for use in paths.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Traces => "traces",
            Self::Metrics => "metrics",
            Self::Logs => "logs",
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Name of a stored entry: nanoseconds since the Unix epoch.
///
/// Renders as a plain base-10 integer, which is also the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryName(u64);

impl EntryName {
    /// Wrap a raw nanosecond timestamp, e.g. to target a known entry.
    pub const fn from_unix_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Raw nanoseconds since the Unix epoch.
    pub const fn as_unix_nanos(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EntryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wall-clock entry name source that never repeats a value.
///
/// Each name is `max(now, last + 1)`, so requests arriving within the same
/// nanosecond (or while the wall clock steps backwards) still get distinct
/// files.
#[derive(Debug, Default)]
pub struct EntryClock {
    last: AtomicU64,
}

impl EntryClock {
    /// A clock that has not handed out any name yet.
    pub const fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Allocate the next entry name from the current wall-clock time.
    pub fn next(&self) -> EntryName {
        self.next_after(unix_nanos(Utc::now()))
    }

    fn next_after(&self, now: u64) -> EntryName {
        let step = |last: u64| now.max(last.saturating_add(1));
        // The closure always returns Some, so both arms carry the previous value.
        let prev = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| Some(step(last)))
            .unwrap_or_else(|last| last);
        EntryName(step(prev))
    }
}

/// Nanoseconds since the epoch, or 0 when `now` is before 1970 or past
/// the i64 nanosecond range.
fn unix_nanos(now: DateTime<Utc>) -> u64 {
    match now
        .timestamp_nanos_opt()
        .and_then(|nanos| u64::try_from(nanos).ok())
    {
        Some(nanos) => nanos,
        None => {
            tracing::warn!(
                now = %now,
                "Wall clock outside the representable range; entry names fall back to a counter"
            );
            0
        }
    }
}

/// Write-only store of opaque protobuf records, partitioned by signal.
#[derive(Debug)]
pub struct Sink {
    root: PathBuf,
    clock: EntryClock,
}

impl Sink {
    /// Create a sink over `root`. Nothing is created on disk until the
    /// first export.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            clock: EntryClock::new(),
        }
    }

    /// Storage root every stream lives under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every entry of `signal`.
    pub fn stream_dir(&self, signal: Signal) -> PathBuf {
        self.root.join(signal.as_str())
    }

    /// Path of the entry `name` within `signal`'s stream.
    pub fn entry_path(&self, signal: Signal, name: EntryName) -> PathBuf {
        self.stream_dir(signal).join(name.to_string())
    }

    /// Persist `message` under a freshly allocated entry name.
    ///
    /// Returns the path of the written file.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Encode`], [`SinkError::CreateDir`] or
    /// [`SinkError::Write`] depending on which step failed.
    pub async fn export<M: Message>(
        &self,
        signal: Signal,
        message: &M,
    ) -> Result<PathBuf, SinkError> {
        let name = self.clock.next();
        self.export_as(signal, name, message).await
    }

    /// Persist `message` under an explicit entry name.
    ///
    /// An existing entry with the same name is truncated and replaced.
    ///
    /// The filesystem work runs on the blocking pool and completes even if
    /// the returned future is dropped part way through.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Encode`], [`SinkError::CreateDir`] or
    /// [`SinkError::Write`] depending on which step failed, and
    /// [`SinkError::Join`] if the blocking task did not complete.
    pub async fn export_as<M: Message>(
        &self,
        signal: Signal,
        name: EntryName,
        message: &M,
    ) -> Result<PathBuf, SinkError> {
        // Encoded up front so the blocking task owns its data and never
        // borrows `message`.
        let bytes = encode(message)?;
        let dir = self.stream_dir(signal);
        let path = dir.join(name.to_string());

        tokio::task::spawn_blocking(move || write_entry(&dir, &path, &bytes).map(|()| path))
            .await?
    }
}

fn encode<M: Message>(message: &M) -> Result<Vec<u8>, SinkError> {
    let mut buf = Vec::with_capacity(message.encoded_len());
    message.encode(&mut buf)?;
    Ok(buf)
}

fn write_entry(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), SinkError> {
    std::fs::create_dir_all(dir).map_err(|source| SinkError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;
    std::fs::write(path, bytes).map_err(|source| SinkError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
    use opentelemetry_proto::tonic::common::v1::{any_value, AnyValue};
    use opentelemetry_proto::tonic::logs::v1::{LogRecord, ResourceLogs, ScopeLogs};
    use chrono::TimeZone;
    use std::collections::HashSet;
    use std::future::Future;
    use std::sync::Arc;
    use std::task::{Context, Poll, Wake, Waker};
    use std::time::Duration;

    struct NoopWake;

    impl Wake for NoopWake {
        fn wake(self: Arc<Self>) {}
    }

    fn log_request(body: &str) -> ExportLogsServiceRequest {
        ExportLogsServiceRequest {
            resource_logs: vec![ResourceLogs {
                scope_logs: vec![ScopeLogs {
                    log_records: vec![LogRecord {
                        time_unix_nano: 1_704_067_200_000_000_000,
                        severity_text: "INFO".to_string(),
                        body: Some(AnyValue {
                            value: Some(any_value::Value::StringValue(body.to_string())),
                        }),
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }],
        }
    }

    fn files_in(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    #[test]
    fn signal_as_str() {
        assert_eq!(Signal::Traces.as_str(), "traces");
        assert_eq!(Signal::Metrics.as_str(), "metrics");
        assert_eq!(Signal::Logs.as_str(), "logs");
        assert_eq!(Signal::Logs.to_string(), "logs");
    }

    #[test]
    fn entry_name_is_decimal_nanos() {
        let name = EntryName::from_unix_nanos(1_704_067_200_123_456_789);
        assert_eq!(name.to_string(), "1704067200123456789");
        assert_eq!(name.as_unix_nanos(), 1_704_067_200_123_456_789);
    }

    #[test]
    fn entry_path_layout() {
        let sink = Sink::new("/srv/otelsink");
        assert_eq!(sink.root(), Path::new("/srv/otelsink"));
        let path = sink.entry_path(Signal::Metrics, EntryName::from_unix_nanos(42));
        assert_eq!(path, PathBuf::from("/srv/otelsink/metrics/42"));
    }

    #[test]
    fn clock_follows_wall_clock_when_it_advances() {
        let clock = EntryClock::new();
        assert_eq!(clock.next_after(100).as_unix_nanos(), 100);
        assert_eq!(clock.next_after(500).as_unix_nanos(), 500);
    }

    #[test]
    fn clock_never_repeats_within_same_nanosecond() {
        let clock = EntryClock::new();
        assert_eq!(clock.next_after(100).as_unix_nanos(), 100);
        assert_eq!(clock.next_after(100).as_unix_nanos(), 101);
        // Wall clock stepping backwards still moves forward.
        assert_eq!(clock.next_after(50).as_unix_nanos(), 102);
    }

    #[test]
    fn clock_is_unique_across_threads() {
        let clock = Arc::new(EntryClock::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let clock = clock.clone();
                std::thread::spawn(move || (0..1000).map(|_| clock.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for name in handle.join().unwrap() {
                assert!(seen.insert(name), "duplicate entry name {name}");
            }
        }
        assert_eq!(seen.len(), 8000);
    }

    #[test]
    fn clock_before_epoch_falls_back_to_zero() {
        let before_epoch = Utc.with_ymd_and_hms(1960, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(unix_nanos(before_epoch), 0);

        let clock = EntryClock::new();
        assert_eq!(clock.next_after(unix_nanos(before_epoch)).as_unix_nanos(), 1);
        assert_eq!(clock.next_after(unix_nanos(before_epoch)).as_unix_nanos(), 2);
    }

    #[test]
    fn unix_nanos_matches_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(unix_nanos(now), 1_704_067_200_000_000_000);
    }

    #[tokio::test]
    async fn dropped_export_still_writes_entry() {
        let temp_dir = tempfile::tempdir().unwrap();
        let sink = Sink::new(temp_dir.path());
        let request = log_request("cancelled");

        let waker = Waker::from(Arc::new(NoopWake));
        let mut cx = Context::from_waker(&waker);
        let mut export = Box::pin(sink.export(Signal::Logs, &request));
        // One poll hands the write to the blocking pool; then the caller goes away.
        if let Poll::Ready(result) = export.as_mut().poll(&mut cx) {
            result.unwrap();
        }
        drop(export);

        let dir = sink.stream_dir(Signal::Logs);
        let mut entries = Vec::new();
        for _ in 0..200 {
            if dir.is_dir() {
                entries = files_in(&dir);
                if !entries.is_empty() {
                    break;
                }
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        assert_eq!(entries.len(), 1);
        let stored =
            ExportLogsServiceRequest::decode(std::fs::read(&entries[0]).unwrap().as_slice())
                .unwrap();
        assert_eq!(stored, request);
    }

    #[tokio::test]
    async fn export_creates_missing_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("not").join("yet").join("here");
        let sink = Sink::new(&root);

        let request = log_request("first");
        let path = sink.export(Signal::Logs, &request).await.unwrap();

        assert!(path.starts_with(root.join("logs")));
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes, request.encode_to_vec());
    }

    #[tokio::test]
    async fn repeated_exports_produce_distinct_entries() {
        let temp_dir = tempfile::tempdir().unwrap();
        let sink = Sink::new(temp_dir.path());

        let first = sink.export(Signal::Logs, &log_request("a")).await.unwrap();
        let second = sink.export(Signal::Logs, &log_request("b")).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(files_in(&sink.stream_dir(Signal::Logs)).len(), 2);
    }

    #[tokio::test]
    async fn export_as_same_name_overwrites() {
        let temp_dir = tempfile::tempdir().unwrap();
        let sink = Sink::new(temp_dir.path());
        let name = EntryName::from_unix_nanos(1_000);

        let first = log_request("first");
        let second = log_request("second");
        sink.export_as(Signal::Logs, name, &first).await.unwrap();
        let path = sink.export_as(Signal::Logs, name, &second).await.unwrap();

        assert_eq!(files_in(&sink.stream_dir(Signal::Logs)), vec![path.clone()]);
        let stored = ExportLogsServiceRequest::decode(std::fs::read(&path).unwrap().as_slice())
            .unwrap();
        assert_eq!(stored, second);
    }

    #[tokio::test]
    async fn root_under_regular_file_fails_to_create_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let sink = Sink::new(blocker.join("data"));

        let err = sink
            .export(Signal::Traces, &log_request("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::CreateDir { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn entry_path_occupied_by_directory_fails_to_write() {
        let temp_dir = tempfile::tempdir().unwrap();
        let sink = Sink::new(temp_dir.path());
        let name = EntryName::from_unix_nanos(7);
        std::fs::create_dir_all(sink.entry_path(Signal::Metrics, name)).unwrap();

        let err = sink
            .export_as(Signal::Metrics, name, &log_request("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Write { .. }), "got {err:?}");
    }
}
