//! PromptWall Server
//!
//! HTTP surface of the PromptWall policy firewall: query evaluation, policy
//! administration, audit log listing, health and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod security;
pub mod state;

pub use config::{Cli, ServerConfig};
pub use routes::create_router;
pub use state::AppState;
