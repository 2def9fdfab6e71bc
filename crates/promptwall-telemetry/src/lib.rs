//! PromptWall Telemetry
//!
//! Persisted audit log for PromptWall evaluations.
//!
//! Provides:
//! - Hash-chained audit records for tamper detection
//! - JSON-lines persistence with rotation and retention
//! - Query, pagination and CSV/JSON export of the audit history
//! - [`AuditService`], the background [`promptwall_core::AuditSink`]

pub mod audit;
pub mod persistence;
pub mod service;

pub use audit::{AuditChain, ChainedRecord};
pub use persistence::{
    AuditPage, AuditQuery, AuditReader, AuditWriter, ExportFormat, PersistenceConfig,
};
pub use service::AuditService;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::persistence::{AuditQuery, ExportFormat, PersistenceConfig};
    pub use crate::service::AuditService;
}
