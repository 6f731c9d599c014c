//! Start-up wiring from configuration to application state.

use crate::credentials::{CredentialValidator, HmacCredentialValidator};
use crate::namespaces::{NamespaceBinding, NamespaceTable};
use crate::state::AppState;
use anyhow::{Context, Result, anyhow};
use porter_core::Namespace;
use porter_core::config::{AppConfig, AuthConfig};
use std::sync::Arc;

/// Validate `config` and build everything a router needs.
pub async fn build_state(config: AppConfig) -> Result<AppState> {
    config
        .validate()
        .map_err(|e| anyhow!(e))
        .context("invalid configuration")?;

    let validator = build_validator(&config.auth)?;
    let namespaces = build_namespaces(&config).await?;
    Ok(AppState::new(config, namespaces, validator))
}

/// Construct the credential validator once for the whole process.
pub fn build_validator(config: &AuthConfig) -> Result<Arc<dyn CredentialValidator>> {
    let validator =
        HmacCredentialValidator::new(config.shared_secret.as_bytes(), config.credential_ttl())
            .map_err(|e| anyhow!("invalid shared secret: {e}"))?;
    Ok(Arc::new(validator))
}

/// Connect every namespace's storage and coordinator.
///
/// Storage is health-checked before the server accepts requests, so a
/// misconfigured backend fails start-up instead of the first read.
pub async fn build_namespaces(config: &AppConfig) -> Result<NamespaceTable> {
    let attachments = bind(config, Namespace::Attachments).await?;
    let backups = bind(config, Namespace::Backups).await?;
    Ok(NamespaceTable::new(|namespace| match namespace {
        Namespace::Attachments => attachments.clone(),
        Namespace::Backups => backups.clone(),
    }))
}

async fn bind(config: &AppConfig, namespace: Namespace) -> Result<NamespaceBinding> {
    let section = config.namespaces.get(namespace);

    let storage = porter_storage::from_config(&section.storage)
        .await
        .with_context(|| format!("failed to initialize {namespace} storage"))?;
    storage
        .health_check()
        .await
        .with_context(|| format!("{namespace} storage health check failed"))?;

    let coordinator = porter_coordinator::from_config(&section.coordinator)
        .with_context(|| format!("failed to initialize {namespace} coordinator"))?;

    tracing::info!(
        %namespace,
        storage = storage.backend_name(),
        coordinator = coordinator.backend_name(),
        "namespace bound"
    );
    Ok(NamespaceBinding::new(
        namespace,
        storage,
        coordinator,
        &config.retry,
    ))
}
