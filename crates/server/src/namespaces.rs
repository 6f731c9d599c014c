//! The static namespace table.

use crate::resilience::{RetryingCoordinator, RetryingStore};
use porter_coordinator::UploadCoordinator;
use porter_core::Namespace;
use porter_core::config::RetrySettings;
use porter_storage::BlobStore;
use std::sync::Arc;

/// A namespace together with the backends that serve it.
#[derive(Clone)]
pub struct NamespaceBinding {
    namespace: Namespace,
    storage: RetryingStore,
    coordinator: RetryingCoordinator,
}

impl NamespaceBinding {
    pub fn new(
        namespace: Namespace,
        storage: Arc<dyn BlobStore>,
        coordinator: Arc<dyn UploadCoordinator>,
        retry: &RetrySettings,
    ) -> Self {
        Self {
            namespace,
            storage: RetryingStore::new(storage, retry.storage.policy()),
            coordinator: RetryingCoordinator::new(
                coordinator,
                retry.coordinator.policy(),
                retry.coordinator_deadline(),
            ),
        }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn name(&self) -> &'static str {
        self.namespace.as_str()
    }

    pub fn storage(&self) -> &RetryingStore {
        &self.storage
    }

    pub fn coordinator(&self) -> &RetryingCoordinator {
        &self.coordinator
    }
}

impl std::fmt::Debug for NamespaceBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceBinding")
            .field("namespace", &self.namespace)
            .field("storage", &self.storage.backend_name())
            .field("coordinator", &self.coordinator.backend_name())
            .finish()
    }
}

/// One binding per [`Namespace`], read-only after start-up.
#[derive(Clone, Debug)]
pub struct NamespaceTable {
    attachments: NamespaceBinding,
    backups: NamespaceBinding,
}

impl NamespaceTable {
    /// Build the table from a constructor called once per namespace.
    pub fn new(mut bind: impl FnMut(Namespace) -> NamespaceBinding) -> Self {
        Self {
            attachments: bind(Namespace::Attachments),
            backups: bind(Namespace::Backups),
        }
    }

    pub fn get(&self, namespace: Namespace) -> &NamespaceBinding {
        match namespace {
            Namespace::Attachments => &self.attachments,
            Namespace::Backups => &self.backups,
        }
    }

    /// Resolve a URL prefix. Unknown prefixes yield `None`.
    pub fn select(&self, prefix: &str) -> Option<&NamespaceBinding> {
        Namespace::from_prefix(prefix).map(|namespace| self.get(namespace))
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamespaceBinding> {
        Namespace::ALL.into_iter().map(|namespace| self.get(namespace))
    }
}
