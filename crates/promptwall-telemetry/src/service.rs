//! Audit service for background audit persistence
//!
//! Provides:
//! - A non-blocking [`AuditSink`] for the evaluator
//! - A background writer thread owning the [`AuditWriter`]
//! - Query access through the [`AuditReader`]

use parking_lot::Mutex;
use promptwall_core::{AuditRecord, AuditSink, Error, Result};
use std::io;
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::persistence::{AuditPage, AuditQuery, AuditReader, AuditWriter, ExportFormat, PersistenceConfig};

/// Commands sent to the background writer
enum AuditCommand {
    /// Persist a record
    Record(Box<AuditRecord>),

    /// Flush to disk and acknowledge
    Flush(oneshot::Sender<io::Result<()>>),

    /// Flush and stop
    Shutdown,
}

/// Persisted, hash-chained audit log
pub struct AuditService {
    sender: mpsc::UnboundedSender<AuditCommand>,
    reader: AuditReader,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AuditService {
    /// Open the audit directory and start the background writer
    pub fn new(config: PersistenceConfig) -> io::Result<Self> {
        // Opened here so configuration problems surface to the caller
        let writer = AuditWriter::new(config.clone())?;
        let (sender, receiver) = mpsc::unbounded_channel();

        let worker = std::thread::Builder::new()
            .name("promptwall-audit".to_string())
            .spawn(move || {
                if let Err(e) = run_writer(writer, receiver) {
                    error!(error = %e, "Audit writer thread failed");
                }
            })?;

        info!(dir = %config.audit_dir.display(), "Audit service started");

        Ok(Self {
            sender,
            reader: AuditReader::new(config.audit_dir),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Flush pending records to disk
    pub async fn flush(&self) -> io::Result<()> {
        let (ack, done) = oneshot::channel();
        self.sender
            .send(AuditCommand::Flush(ack))
            .map_err(|_| writer_stopped())?;
        done.await.map_err(|_| writer_stopped())?
    }

    /// Query audit records
    pub fn query(&self, query: &AuditQuery) -> io::Result<AuditPage> {
        self.reader.query(query)
    }

    /// Export audit records
    pub fn export<W: io::Write>(&self, query: &AuditQuery, format: ExportFormat, out: W) -> io::Result<usize> {
        self.reader.export(query, format, out)
    }

    /// Verify the hash chain on disk
    pub fn verify(&self) -> io::Result<bool> {
        self.reader.verify()
    }

    pub fn reader(&self) -> &AuditReader {
        &self.reader
    }

    /// Flush, stop the writer and wait for it to exit
    pub fn shutdown(&self) {
        let _ = self.sender.send(AuditCommand::Shutdown);
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                warn!("Audit writer thread panicked");
            }
        }
    }
}

impl AuditSink for AuditService {
    fn record(&self, record: AuditRecord) -> Result<()> {
        self.sender
            .send(AuditCommand::Record(Box::new(record)))
            .map_err(|_| Error::internal("audit writer is not running"))
    }
}

impl Drop for AuditService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn writer_stopped() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "audit writer is not running")
}

/// Background writer loop
fn run_writer(
    mut writer: AuditWriter,
    mut receiver: mpsc::UnboundedReceiver<AuditCommand>,
) -> io::Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(async {
        while let Some(cmd) = receiver.recv().await {
            match cmd {
                AuditCommand::Record(record) => match writer.write_record(*record) {
                    Ok(chained) => {
                        metrics::counter!("promptwall_audit_records_total").increment(1);
                        debug!(sequence = chained.sequence, request_id = %chained.record.request_id, "Audit record written");
                    }
                    Err(e) => {
                        metrics::counter!("promptwall_audit_write_errors_total").increment(1);
                        error!(error = %e, "Failed to write audit record");
                    }
                },
                AuditCommand::Flush(ack) => {
                    let result = writer.flush();
                    if let Err(ref e) = result {
                        error!(error = %e, "Failed to flush audit writer");
                    }
                    let _ = ack.send(result);
                }
                AuditCommand::Shutdown => {
                    debug!("Audit writer shutting down");
                    if let Err(e) = writer.flush() {
                        error!(error = %e, "Failed to flush audit writer on shutdown");
                    }
                    break;
                }
            }
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use promptwall_core::{AuditRisk, Decision, RiskType, Severity};
    use tempfile::TempDir;

    fn test_config(dir: &std::path::Path) -> PersistenceConfig {
        PersistenceConfig {
            audit_dir: dir.to_path_buf(),
            max_file_size: 1024 * 1024,
            max_file_age_secs: 3600,
            retention_days: 7,
            flush_interval: 100,
        }
    }

    fn record(request_id: &str) -> AuditRecord {
        AuditRecord {
            request_id: request_id.to_string(),
            timestamp: Utc::now(),
            decision: Decision::Redact,
            risks: vec![AuditRisk {
                risk_type: RiskType::Pii,
                severity: Severity::High,
            }],
            rule_set_version: 3,
            prompt_modified: true,
            response_modified: false,
        }
    }

    #[tokio::test]
    async fn test_record_and_query() {
        let temp_dir = TempDir::new().unwrap();
        let service = AuditService::new(test_config(temp_dir.path())).unwrap();

        service.record(record("req-001")).unwrap();
        service.record(record("req-002")).unwrap();
        service.flush().await.unwrap();

        let page = service.query(&AuditQuery::new()).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.records[0].record.request_id, "req-002");
        assert_eq!(page.records[0].record.rule_set_version, 3);
        assert!(service.verify().unwrap());
    }

    #[tokio::test]
    async fn test_drop_flushes_pending_records() {
        let temp_dir = TempDir::new().unwrap();
        {
            let service = AuditService::new(test_config(temp_dir.path())).unwrap();
            for i in 0..5 {
                service.record(record(&format!("req-{}", i))).unwrap();
            }
        }

        let reader = AuditReader::new(temp_dir.path());
        assert_eq!(reader.records().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_record_after_shutdown_fails() {
        let temp_dir = TempDir::new().unwrap();
        let service = AuditService::new(test_config(temp_dir.path())).unwrap();
        service.shutdown();

        let err = service.record(record("late")).unwrap_err();
        assert_eq!(err.kind(), "internal_error");
        assert!(service.flush().await.is_err());
    }

    #[tokio::test]
    async fn test_export_json() {
        let temp_dir = TempDir::new().unwrap();
        let service = AuditService::new(test_config(temp_dir.path())).unwrap();
        service.record(record("req-json")).unwrap();
        service.flush().await.unwrap();

        let mut out = Vec::new();
        let count = service
            .export(&AuditQuery::new(), ExportFormat::Json, &mut out)
            .unwrap();
        assert_eq!(count, 1);

        let exported: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(exported[0]["request_id"], "req-json");
        assert_eq!(exported[0]["sequence"], 1);
    }
}
