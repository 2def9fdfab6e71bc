//! PromptWall Core
//!
//! Core types, traits, and utilities shared across PromptWall components.
//!
//! This crate provides:
//! - The wire contract for queries (`QueryRequest`, `QueryResponse`, `Risk`)
//! - The ordered enumerations used by rules and decisions
//! - Error types and result handling
//! - The audit seam (`AuditSink`) the evaluator reports completed queries to

pub mod audit;
pub mod error;
pub mod types;

pub use audit::{AuditRecord, AuditRisk, AuditSink, DiscardAuditSink};
pub use error::{Error, Result};
pub use types::{
    Action, Decision, QueryRequest, QueryResponse, ResponseMetadata, Risk, RiskType, Severity,
    TextField,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::audit::{AuditRecord, AuditSink};
    pub use crate::error::{Error, Result};
    pub use crate::types::{Action, QueryRequest, QueryResponse, Risk, RiskType, Severity};
}
