//! Audit log persistence
//!
//! Provides file-based persistence for audit records with:
//! - JSON-lines format for append-only writes
//! - Rotation based on size/age, with retention cleanup
//! - Query, pagination and export for the admin log listing

use chrono::{DateTime, Utc};
use promptwall_core::{Decision, RiskType, Severity};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

use crate::audit::{AuditChain, ChainedRecord};

const CURRENT_FILE: &str = "audit_current.jsonl";

/// Configuration for audit persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Directory to store audit files
    pub audit_dir: PathBuf,

    /// Maximum file size before rotation (bytes)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Maximum age before rotation (seconds)
    #[serde(default = "default_max_file_age")]
    pub max_file_age_secs: u64,

    /// Retain rotated files for this many days
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Flush to disk after this many records
    #[serde(default = "default_flush_interval")]
    pub flush_interval: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            audit_dir: PathBuf::from("./audit"),
            max_file_size: default_max_file_size(),
            max_file_age_secs: default_max_file_age(),
            retention_days: default_retention_days(),
            flush_interval: default_flush_interval(),
        }
    }
}

fn default_max_file_size() -> u64 {
    64 * 1024 * 1024
}

fn default_max_file_age() -> u64 {
    86400
}

fn default_retention_days() -> u32 {
    90
}

fn default_flush_interval() -> usize {
    10
}

/// Audit file writer with rotation support
pub struct AuditWriter {
    config: PersistenceConfig,
    current_file: Option<BufWriter<File>>,
    current_size: u64,
    current_start: SystemTime,
    records_since_flush: usize,
    chain: AuditChain,
}

impl AuditWriter {
    /// Create a new audit writer, continuing any chain already on disk
    pub fn new(config: PersistenceConfig) -> io::Result<Self> {
        std::fs::create_dir_all(&config.audit_dir)?;

        let chain = match last_record(&config.audit_dir)? {
            Some(last) => {
                debug!(sequence = last.sequence, "Resuming audit chain");
                AuditChain::resume(&last)
            }
            None => AuditChain::new(),
        };

        let mut writer = Self {
            config,
            current_file: None,
            current_size: 0,
            current_start: SystemTime::now(),
            records_since_flush: 0,
            chain,
        };

        writer.open_current_file()?;
        Ok(writer)
    }

    /// Chain and append a record
    pub fn write_record(&mut self, record: promptwall_core::AuditRecord) -> io::Result<ChainedRecord> {
        if self.should_rotate() {
            self.rotate()?;
        }

        let chained = self.chain.chain(record)?;
        let mut line = serde_json::to_vec(&chained)?;
        line.push(b'\n');

        if let Some(ref mut writer) = self.current_file {
            writer.write_all(&line)?;
            self.current_size += line.len() as u64;
            self.records_since_flush += 1;

            if self.records_since_flush >= self.config.flush_interval {
                writer.flush()?;
                self.records_since_flush = 0;
            }
        }

        Ok(chained)
    }

    /// Force flush to disk
    pub fn flush(&mut self) -> io::Result<()> {
        if let Some(ref mut writer) = self.current_file {
            writer.flush()?;
            self.records_since_flush = 0;
        }
        Ok(())
    }

    /// Sequence number of the last written record
    pub fn sequence(&self) -> u64 {
        self.chain.sequence()
    }

    fn should_rotate(&self) -> bool {
        if self.current_size == 0 {
            return false;
        }

        if self.current_size >= self.config.max_file_size {
            return true;
        }

        let age = SystemTime::now()
            .duration_since(self.current_start)
            .unwrap_or_default();
        age.as_secs() >= self.config.max_file_age_secs
    }

    fn rotate(&mut self) -> io::Result<()> {
        if let Some(ref mut writer) = self.current_file {
            writer.flush()?;
        }
        self.current_file = None;

        // Named after the last sequence it holds, so rotated files sort in
        // chain order
        let current_path = self.config.audit_dir.join(CURRENT_FILE);
        let rotated_path = self
            .config
            .audit_dir
            .join(format!("audit_{:020}.jsonl", self.chain.sequence()));

        match std::fs::rename(&current_path, &rotated_path) {
            Ok(()) => info!(path = %rotated_path.display(), "Rotated audit file"),
            Err(e) => warn!(error = %e, "Failed to rotate audit file"),
        }

        self.open_current_file()?;

        if let Err(e) = self.cleanup_old_files() {
            warn!(error = %e, "Failed to clean up old audit files");
        }

        Ok(())
    }

    fn open_current_file(&mut self) -> io::Result<()> {
        let path = self.config.audit_dir.join(CURRENT_FILE);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        self.current_size = file.metadata()?.len();
        self.current_start = SystemTime::now();
        self.current_file = Some(BufWriter::new(file));
        self.records_since_flush = 0;

        Ok(())
    }

    fn cleanup_old_files(&self) -> io::Result<()> {
        let retention = Duration::from_secs(self.config.retention_days as u64 * 86400);
        let Some(cutoff) = SystemTime::now().checked_sub(retention) else {
            return Ok(());
        };

        for path in audit_files(&self.config.audit_dir)? {
            if path.file_name().is_some_and(|n| n == CURRENT_FILE) {
                continue;
            }

            let modified = std::fs::metadata(&path).and_then(|m| m.modified());
            if matches!(modified, Ok(modified) if modified < cutoff) {
                info!(path = %path.display(), "Removing expired audit file");
                std::fs::remove_file(&path)?;
            }
        }

        Ok(())
    }
}

/// Audit files in chain order: rotated files by sequence, then the current file
fn audit_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e == "jsonl") {
            files.push(path);
        }
    }
    // "audit_0..." sorts before "audit_current"
    files.sort();
    Ok(files)
}

fn read_records(path: &Path) -> io::Result<Vec<ChainedRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ChainedRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => debug!(path = %path.display(), error = %e, "Skipping unreadable audit line"),
        }
    }

    Ok(records)
}

fn last_record(dir: &Path) -> io::Result<Option<ChainedRecord>> {
    for path in audit_files(dir)?.iter().rev() {
        if let Some(last) = read_records(path)?.pop() {
            return Ok(Some(last));
        }
    }
    Ok(None)
}

/// Default page size when a query sets no limit
pub const DEFAULT_LIMIT: usize = 50;

/// Largest page a query may request
pub const MAX_LIMIT: usize = 1000;

/// Filter for audit records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditQuery {
    /// Records with at least one risk of this type
    #[serde(default, rename = "type")]
    pub risk_type: Option<RiskType>,

    /// Records with at least one risk of this severity
    #[serde(default)]
    pub severity: Option<Severity>,

    #[serde(default)]
    pub decision: Option<Decision>,

    #[serde(default)]
    pub request_id: Option<String>,

    /// Inclusive lower bound on the record timestamp
    #[serde(default)]
    pub date_from: Option<DateTime<Utc>>,

    /// Inclusive upper bound on the record timestamp
    #[serde(default)]
    pub date_to: Option<DateTime<Utc>>,

    /// Page size, clamped to `1..=MAX_LIMIT`
    #[serde(default)]
    pub limit: Option<usize>,

    #[serde(default)]
    pub offset: Option<usize>,
}

impl AuditQuery {
    /// Create a new empty query
    pub fn new() -> Self {
        Self::default()
    }

    pub fn risk_type(mut self, risk_type: RiskType) -> Self {
        self.risk_type = Some(risk_type);
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn decision(mut self, decision: Decision) -> Self {
        self.decision = Some(decision);
        self
    }

    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Set time range
    pub fn time_range(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.date_from = Some(from);
        self.date_to = Some(to);
        self
    }

    /// Set limit and offset
    pub fn paginate(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    /// Effective page size
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// Whether `record` passes every filter
    pub fn matches(&self, record: &ChainedRecord) -> bool {
        let record = &record.record;

        if let Some(risk_type) = self.risk_type {
            if !record.risks.iter().any(|r| r.risk_type == risk_type) {
                return false;
            }
        }

        if let Some(severity) = self.severity {
            if !record.risks.iter().any(|r| r.severity == severity) {
                return false;
            }
        }

        if let Some(decision) = self.decision {
            if record.decision != decision {
                return false;
            }
        }

        if let Some(ref request_id) = self.request_id {
            if &record.request_id != request_id {
                return false;
            }
        }

        if let Some(from) = self.date_from {
            if record.timestamp < from {
                return false;
            }
        }

        if let Some(to) = self.date_to {
            if record.timestamp > to {
                return false;
            }
        }

        true
    }
}

/// One page of query results, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditPage {
    pub records: Vec<ChainedRecord>,

    /// Matching records across all pages
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Pretty-printed JSON array
    Json,
    /// JSON Lines format (one JSON object per line)
    JsonLines,
    /// CSV with the columns of the admin log listing
    Csv,
}

/// Audit reader for querying persisted records
#[derive(Debug, Clone)]
pub struct AuditReader {
    audit_dir: PathBuf,
}

impl AuditReader {
    pub fn new(audit_dir: impl Into<PathBuf>) -> Self {
        Self {
            audit_dir: audit_dir.into(),
        }
    }

    /// Every persisted record in chain order
    pub fn records(&self) -> io::Result<Vec<ChainedRecord>> {
        if !self.audit_dir.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for path in audit_files(&self.audit_dir)? {
            records.extend(read_records(&path)?);
        }
        Ok(records)
    }

    /// Visit records newest first, one file at a time, until `visit` breaks
    fn scan_newest_first<F>(&self, mut visit: F) -> io::Result<()>
    where
        F: FnMut(ChainedRecord) -> ControlFlow<()>,
    {
        if !self.audit_dir.exists() {
            return Ok(());
        }

        for path in audit_files(&self.audit_dir)?.iter().rev() {
            for record in read_records(path)?.into_iter().rev() {
                if visit(record).is_break() {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Query one page of records, newest first.
    ///
    /// Every file is scanned to compute `total`, but only the requested page
    /// is kept in memory.
    pub fn query(&self, query: &AuditQuery) -> io::Result<AuditPage> {
        let limit = query.effective_limit();
        let offset = query.offset.unwrap_or(0);
        let end = offset.saturating_add(limit);

        let mut total = 0;
        let mut records = Vec::new();
        self.scan_newest_first(|record| {
            if query.matches(&record) {
                if (offset..end).contains(&total) {
                    records.push(record);
                }
                total += 1;
            }
            ControlFlow::Continue(())
        })?;

        Ok(AuditPage {
            records,
            total,
            limit,
            offset,
            has_more: end < total,
        })
    }

    /// Matching records of the requested page, newest first. Stops reading
    /// once the page is full.
    fn page(&self, query: &AuditQuery) -> io::Result<Vec<ChainedRecord>> {
        let offset = query.offset.unwrap_or(0);
        let end = offset.saturating_add(query.effective_limit());

        let mut seen = 0;
        let mut records = Vec::new();
        self.scan_newest_first(|record| {
            if !query.matches(&record) {
                return ControlFlow::Continue(());
            }
            if seen >= offset {
                records.push(record);
            }
            seen += 1;
            if seen >= end {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;

        Ok(records)
    }

    /// Count records matching the filters of `query`, ignoring pagination
    pub fn count(&self, query: &AuditQuery) -> io::Result<usize> {
        let mut count = 0;
        self.scan_newest_first(|record| {
            if query.matches(&record) {
                count += 1;
            }
            ControlFlow::Continue(())
        })?;
        Ok(count)
    }

    /// Check the hash chain across all files
    pub fn verify(&self) -> io::Result<bool> {
        Ok(AuditChain::verify(&self.records()?))
    }

    /// Write one page of records in the given format
    pub fn export<W: Write>(
        &self,
        query: &AuditQuery,
        format: ExportFormat,
        mut out: W,
    ) -> io::Result<usize> {
        let records = self.page(query)?;

        match format {
            ExportFormat::Json => {
                serde_json::to_writer_pretty(&mut out, &records)?;
            }
            ExportFormat::JsonLines => {
                for record in &records {
                    serde_json::to_writer(&mut out, record)?;
                    writeln!(out)?;
                }
            }
            ExportFormat::Csv => {
                writeln!(out, "id,request_id,timestamp,decision,risk_count")?;
                for record in &records {
                    writeln!(
                        out,
                        "{},{},{},{},{}",
                        record.id,
                        record.record.request_id,
                        record.record.timestamp.to_rfc3339(),
                        record.record.decision,
                        record.record.risks.len()
                    )?;
                }
            }
        }

        out.flush()?;
        Ok(records.len())
    }

    /// Export to a file for compliance reporting
    pub fn export_to_file(
        &self,
        query: &AuditQuery,
        output_path: &Path,
        format: ExportFormat,
    ) -> io::Result<usize> {
        let file = File::create(output_path)?;
        self.export(query, format, BufWriter::new(file))
    }
}
