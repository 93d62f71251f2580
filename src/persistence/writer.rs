//! Periodic latency log writer

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::SecondsFormat;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::latency::{RecordQueue, ReturnRecord};
use crate::stats::BenchStats;

use super::config::{FailurePolicy, PersistenceConfig};

const DELIMITER: &str = ";";

#[cfg(windows)]
const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
const LINE_ENDING: &str = "\n";

/// Render one record as a log line, terminator included
pub fn format_line(record: &ReturnRecord) -> String {
    let mut line = record
        .timestamp
        .to_rfc3339_opts(SecondsFormat::AutoSi, true);
    line.push_str(DELIMITER);
    line.push_str(record.protocol.as_str());
    line.push_str(DELIMITER);
    line.push_str(&record.elapsed_nanos.to_string());
    line.push_str(LINE_ENDING);
    line
}

/// Sole consumer of the latency queue
pub struct PersistenceWriter {
    path: PathBuf,
    queue: RecordQueue,
    flush_interval: Duration,
    initial_delay: Duration,
    failure_policy: FailurePolicy,
    stats: Arc<BenchStats>,
}

impl PersistenceWriter {
    /// Create a writer appending to `path`
    ///
    /// Fails if the flush interval is zero.
    pub fn new(
        config: &PersistenceConfig,
        path: PathBuf,
        queue: RecordQueue,
        stats: Arc<BenchStats>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            path,
            queue,
            flush_interval: config.flush_interval,
            initial_delay: config.initial_delay,
            failure_policy: config.failure_policy,
            stats,
        })
    }

    /// Log file this writer appends to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write every queued record and return how many were written
    ///
    /// If the file cannot be opened nothing is popped. If a write fails the
    /// records popped for this batch are lost and counted in the error.
    pub async fn flush(&mut self) -> Result<usize> {
        let mut writer = match self.open().await {
            Ok(file) => BufWriter::new(file),
            Err(source) => {
                return Err(Error::Persistence {
                    path: self.path.clone(),
                    lost: 0,
                    source,
                })
            }
        };

        let mut popped = 0;
        while let Some(record) = self.queue.try_pop() {
            popped += 1;
            if let Err(source) = writer.write_all(format_line(&record).as_bytes()).await {
                return Err(self.batch_failed(popped, source));
            }
        }

        if let Err(source) = writer.flush().await {
            return Err(self.batch_failed(popped, source));
        }

        self.stats.add_written(popped as u64);
        Ok(popped)
    }

    async fn open(&self) -> std::io::Result<tokio::fs::File> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
    }

    fn batch_failed(&self, lost: usize, source: std::io::Error) -> Error {
        Error::Persistence {
            path: self.path.clone(),
            lost,
            source,
        }
    }

    /// Flush once and apply the failure policy
    async fn flush_cycle(&mut self) -> Result<()> {
        match self.flush().await {
            Ok(written) => {
                let stats = self.stats.snapshot();
                tracing::info!(
                    path = %self.path.display(),
                    records = written,
                    delivered = stats.delivered,
                    skipped = stats.skipped,
                    dropped = stats.dropped,
                    submitted = stats.records_submitted,
                    "Latency log flushed"
                );
                Ok(())
            }
            Err(e) => {
                let lost = match &e {
                    Error::Persistence { lost, .. } => *lost,
                    _ => 0,
                };
                self.stats.add_write_failure(lost as u64);
                tracing::error!(error = %e, "Latency log write failed");

                match self.failure_policy {
                    FailurePolicy::LogAndContinue => Ok(()),
                    FailurePolicy::Fatal => Err(e),
                }
            }
        }
    }

    /// Run the flush loop until `shutdown` fires, then flush one last time
    ///
    /// Returns early with the error under [`FailurePolicy::Fatal`].
    pub async fn run(mut self, mut shutdown: oneshot::Receiver<()>) -> Result<()> {
        let start = tokio::time::Instant::now() + self.initial_delay;
        let mut ticker = tokio::time::interval_at(start, self.flush_interval);

        tracing::info!(
            path = %self.path.display(),
            interval_secs = self.flush_interval.as_secs_f64(),
            "Latency log writer started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.flush_cycle().await?;
                }
                _ = &mut shutdown => {
                    tracing::info!("Latency log writer stopping, final flush");
                    return self.flush_cycle().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::latency::{LatencyRecorder, ReturnAck};
    use crate::message::TransportKind;

    fn ack(protocol: TransportKind) -> ReturnAck {
        ReturnAck {
            timestamp: DateTime::parse_from_rfc3339("2024-01-02T03:04:05.123456789Z")
                .unwrap()
                .with_timezone(&Utc),
            protocol,
            send_time: 1_000,
        }
    }

    fn writer(
        path: PathBuf,
        config: PersistenceConfig,
    ) -> (LatencyRecorder, PersistenceWriter, Arc<BenchStats>) {
        let stats = Arc::new(BenchStats::new());
        let (recorder, queue) = LatencyRecorder::channel(Arc::clone(&stats));
        let writer = PersistenceWriter::new(&config, path, queue, Arc::clone(&stats)).unwrap();
        (recorder, writer, stats)
    }

    fn lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn test_format_line() {
        let record = ReturnRecord::from_ack(&ack(TransportKind::Sse), 5_001_000);
        let line = format_line(&record);

        assert_eq!(
            line.trim_end(),
            "2024-01-02T03:04:05.123456789Z;sse;5000000"
        );
        assert!(line.ends_with(LINE_ENDING));
    }

    #[tokio::test]
    async fn test_flush_writes_each_record_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("LogReply.csv");
        let (recorder, mut writer, stats) = writer(path.clone(), PersistenceConfig::default());

        recorder.submit_at(&ack(TransportKind::Sse), 2_000);
        recorder.submit_at(&ack(TransportKind::Ws), 3_000);
        assert_eq!(writer.flush().await.unwrap(), 2);

        recorder.submit_at(&ack(TransportKind::Lp), 4_000);
        assert_eq!(writer.flush().await.unwrap(), 1);

        let lines = lines(&path);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with(";sse;1000"));
        assert!(lines[1].ends_with(";ws;2000"));
        assert!(lines[2].ends_with(";lp;3000"));
        assert_eq!(stats.snapshot().records_written, 3);
    }

    #[tokio::test]
    async fn test_empty_flush_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("LogReply.csv");
        let (_recorder, mut writer, _stats) = writer(path.clone(), PersistenceConfig::default());

        assert_eq!(writer.flush().await.unwrap(), 0);
        assert!(lines(&path).is_empty());
    }

    #[tokio::test]
    async fn test_flush_appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("LogReply.csv");
        std::fs::write(&path, format!("earlier;run;1{}", LINE_ENDING)).unwrap();

        let (recorder, mut writer, _stats) = writer(path.clone(), PersistenceConfig::default());
        recorder.submit_at(&ack(TransportKind::Ws), 1_500);
        writer.flush().await.unwrap();

        let lines = lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "earlier;run;1");
    }

    #[tokio::test]
    async fn test_flush_creates_per_run_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs").join("latency.csv");
        let (recorder, mut writer, _stats) = writer(path.clone(), PersistenceConfig::default());

        recorder.submit_at(&ack(TransportKind::Sse), 1_001);
        writer.flush().await.unwrap();
        assert_eq!(lines(&path).len(), 1);
    }

    #[tokio::test]
    async fn test_open_failure_keeps_records_queued() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let path = blocker.join("LogReply.csv");
        let (recorder, mut writer, _stats) = writer(path, PersistenceConfig::default());

        recorder.submit_at(&ack(TransportKind::Sse), 2_000);
        let err = writer.flush().await.unwrap_err();

        assert!(matches!(err, Error::Persistence { lost: 0, .. }));
        assert_eq!(writer.queue.len(), 1);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_write_failure_loses_batch() {
        let (recorder, mut writer, _stats) =
            writer(PathBuf::from("/dev/full"), PersistenceConfig::default());

        recorder.submit_at(&ack(TransportKind::Sse), 2_000);
        recorder.submit_at(&ack(TransportKind::Ws), 2_000);
        let err = writer.flush().await.unwrap_err();

        assert!(matches!(err, Error::Persistence { lost: 2, .. }));
        assert!(writer.queue.is_empty());
    }

    #[tokio::test]
    async fn test_run_flushes_periodically_and_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("LogReply.csv");
        let config = PersistenceConfig::default()
            .initial_delay(Duration::ZERO)
            .flush_interval(Duration::from_millis(20));
        let (recorder, writer, stats) = writer(path.clone(), config);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(writer.run(shutdown_rx));

        recorder.submit_at(&ack(TransportKind::Sse), 2_000);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(stats.snapshot().records_written, 1);

        // Submitted after the last periodic flush; the final flush picks it up
        recorder.submit_at(&ack(TransportKind::Lp), 2_000);
        shutdown_tx.send(()).unwrap();
        task.await.unwrap().unwrap();

        assert_eq!(lines(&path).len(), 2);
    }

    #[tokio::test]
    async fn test_fatal_policy_stops_writer() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let config = PersistenceConfig::default()
            .initial_delay(Duration::ZERO)
            .failure_policy(FailurePolicy::Fatal);
        let (_recorder, writer, stats) = writer(blocker.join("LogReply.csv"), config);

        let (_shutdown_tx, shutdown_rx) = oneshot::channel();
        let result = writer.run(shutdown_rx).await;

        assert!(matches!(result, Err(Error::Persistence { .. })));
        assert_eq!(stats.snapshot().write_failures, 1);
    }

    #[tokio::test]
    async fn test_log_policy_keeps_running() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let config = PersistenceConfig::default()
            .initial_delay(Duration::ZERO)
            .flush_interval(Duration::from_millis(10));
        let (_recorder, writer, stats) = writer(blocker.join("LogReply.csv"), config);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(writer.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(stats.snapshot().write_failures >= 2);

        shutdown_tx.send(()).unwrap();
        assert!(task.await.unwrap().is_ok());
    }
}
