//! Shared application state

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusHandle;
use promptwall_policy::{Firewall, PolicyDocument, RuleStore};
use promptwall_telemetry::AuditService;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ServerConfig;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<ServerConfig>,

    /// Policy engine over the hot-swappable rule store
    pub firewall: Firewall,

    /// Persisted audit log, when enabled
    pub audit: Option<Arc<AuditService>>,

    /// Prometheus metrics handle for rendering
    pub metrics_handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("firewall", &self.firewall)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Build state from configuration: load the initial rules and start the
    /// audit writer
    pub fn new(config: ServerConfig, metrics_handle: Option<PrometheusHandle>) -> anyhow::Result<Self> {
        let store = Arc::new(RuleStore::new());
        load_initial_rules(&store, &config.policy_path)?;

        let audit = if config.audit.enabled {
            let service = AuditService::new(config.audit.persistence()).with_context(|| {
                format!(
                    "failed to open audit directory {}",
                    config.audit.audit_dir.display()
                )
            })?;
            Some(Arc::new(service))
        } else {
            info!("Audit log disabled");
            None
        };

        Ok(Self::from_parts(config, store, audit, metrics_handle))
    }

    /// Assemble state from already-built components
    pub fn from_parts(
        config: ServerConfig,
        store: Arc<RuleStore>,
        audit: Option<Arc<AuditService>>,
        metrics_handle: Option<PrometheusHandle>,
    ) -> Self {
        let mut firewall = Firewall::new(store);
        if let Some(ref service) = audit {
            firewall = firewall.with_audit_sink(service.clone());
        }

        Self {
            config: Arc::new(config),
            firewall,
            audit,
            metrics_handle,
        }
    }

    pub fn store(&self) -> &Arc<RuleStore> {
        self.firewall.store()
    }

    /// Configured admin token, if any
    pub fn admin_token(&self) -> Option<&str> {
        self.config.admin_token.as_deref()
    }
}

/// Install the rules from `path` through the same atomic replace used by
/// policy updates. A missing file leaves the store empty.
fn load_initial_rules(store: &RuleStore, path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        warn!(path = %path.display(), "Policy file not found, starting with no rules");
        return Ok(());
    }

    let document = PolicyDocument::from_file(path)
        .with_context(|| format!("failed to load policy file {}", path.display()))?;
    let rules = store
        .replace(document.rules)
        .with_context(|| format!("invalid rules in policy file {}", path.display()))?;

    info!(
        path = %path.display(),
        rules = rules.len(),
        enabled = rules.enabled_len(),
        "Loaded initial policy"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_policy(path: &Path) -> ServerConfig {
        ServerConfig {
            policy_path: path.to_path_buf(),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_missing_policy_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(config_with_policy(&dir.path().join("absent.yaml")), None).unwrap();
        assert!(state.store().snapshot().is_empty());
        assert!(state.audit.is_none());
    }

    #[test]
    fn test_policy_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.yaml");
        std::fs::write(
            &path,
            "rules:\n  - name: ssn\n    risk_type: PII\n    pattern: '\\d{3}-\\d{2}-\\d{4}'\n    severity: high\n    action: redact\n",
        )
        .unwrap();

        let state = AppState::new(config_with_policy(&path), None).unwrap();
        let snapshot = state.store().snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.version(), 1);
    }

    #[test]
    fn test_invalid_policy_file_aborts_startup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.yaml");
        std::fs::write(
            &path,
            "rules:\n  - name: broken\n    risk_type: OTHER\n    pattern: '(unclosed'\n    severity: low\n    action: warn\n",
        )
        .unwrap();

        let err = AppState::new(config_with_policy(&path), None).unwrap_err();
        assert!(format!("{:#}", err).contains("broken"));
    }

    #[test]
    fn test_audit_service_is_started_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_policy(&dir.path().join("absent.yaml"));
        config.audit.enabled = true;
        config.audit.audit_dir = dir.path().join("audit");

        let state = AppState::new(config, None).unwrap();
        assert!(state.audit.is_some());
        assert!(dir.path().join("audit").exists());
    }
}
