//! Application state shared across handlers.

use crate::cache::ResponseCache;
use crate::credentials::CredentialValidator;
use crate::namespaces::NamespaceTable;
use crate::pipeline::{
    Authenticate, MetadataAuthorizedKey, PathAuthorizedKey, Pipeline, RequirePermission,
    ServiceIdFromQuery, SubdirAuthorizedKey, UnauthenticatedKeyFromId, WithNamespace,
};
use porter_core::config::AppConfig;
use std::sync::Arc;

/// The stage chain of every route, built once at start-up.
#[derive(Clone)]
pub struct Pipelines {
    pub attachments_read: Pipeline,
    pub attachments_create: Pipeline,
    pub attachments_resume: Pipeline,
    pub backups_read: Pipeline,
    pub backups_create: Pipeline,
    pub backups_resume: Pipeline,
}

impl Pipelines {
    pub fn build(
        namespaces: &Arc<NamespaceTable>,
        validator: &Arc<dyn CredentialValidator>,
        enforce_entity_match: bool,
    ) -> Self {
        let namespace = |prefix: &str| WithNamespace::new(namespaces.clone(), prefix);
        let authenticate = || Authenticate::new(validator.clone());

        Self {
            attachments_read: Pipeline::new()
                .then(namespace("attachments"))
                .then(UnauthenticatedKeyFromId),
            attachments_create: Pipeline::new()
                .then(namespace("attachments"))
                .then(ServiceIdFromQuery)
                .then(authenticate())
                .then(MetadataAuthorizedKey::new(
                    "attachments/",
                    enforce_entity_match,
                )),
            attachments_resume: Pipeline::new()
                .then(namespace("attachments"))
                .then(authenticate())
                .then(PathAuthorizedKey::new("attachments/", enforce_entity_match)),
            backups_read: Pipeline::new()
                .then(namespace("backups"))
                .then(authenticate())
                .then(RequirePermission::read())
                .then(SubdirAuthorizedKey::new(enforce_entity_match)),
            backups_create: Pipeline::new()
                .then(namespace("backups"))
                .then(authenticate())
                .then(RequirePermission::write())
                .then(MetadataAuthorizedKey::new("", enforce_entity_match)),
            backups_resume: Pipeline::new()
                .then(namespace("backups"))
                .then(authenticate())
                .then(RequirePermission::write())
                .then(PathAuthorizedKey::new("", enforce_entity_match)),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Namespace bindings.
    pub namespaces: Arc<NamespaceTable>,
    /// Credential validator, constructed once.
    pub validator: Arc<dyn CredentialValidator>,
    /// Read response cache, when enabled.
    pub cache: Option<Arc<ResponseCache>>,
    /// Per-route stage chains.
    pub pipelines: Arc<Pipelines>,
}

impl AppState {
    /// Create application state.
    pub fn new(
        config: AppConfig,
        namespaces: NamespaceTable,
        validator: Arc<dyn CredentialValidator>,
    ) -> Self {
        let namespaces = Arc::new(namespaces);
        let pipelines = Pipelines::build(
            &namespaces,
            &validator,
            config.auth.enforce_entity_match,
        );
        if config.auth.enforce_entity_match {
            tracing::info!("entity match enforcement enabled");
        }

        let cache = config
            .cache
            .enabled
            .then(|| Arc::new(ResponseCache::new(&config.cache)));

        Self {
            config: Arc::new(config),
            namespaces,
            validator,
            cache,
            pipelines: Arc::new(pipelines),
        }
    }
}
