//! Per-request state threaded through the stage pipeline.

use crate::error::{ApiError, ApiResult};
use crate::namespaces::NamespaceBinding;
use porter_core::{Capability, Permission};

/// Why a permission scope could not be consumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeRejection {
    /// No scope is left to consume.
    Missing,
    /// The claimed scope names a different permission.
    Mismatch,
}

/// The authenticated caller.
#[derive(Clone, Debug)]
pub struct Principal {
    capability: Capability,
    scope_consumed: bool,
}

impl Principal {
    pub fn new(capability: Capability) -> Self {
        Self {
            capability,
            scope_consumed: false,
        }
    }

    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    /// The user identity as later stages see it: the full username until a
    /// permission stage consumes the scope, the subject afterwards.
    pub fn user(&self) -> &str {
        if self.scope_consumed {
            self.capability.subject()
        } else {
            self.capability.raw()
        }
    }

    /// Consume the permission scope if it names `permission`.
    ///
    /// A scope is consumed at most once. On rejection nothing changes.
    pub fn consume_scope(&mut self, permission: Permission) -> Result<(), ScopeRejection> {
        if self.scope_consumed || self.capability.scope().is_none() {
            return Err(ScopeRejection::Missing);
        }
        if !self.capability.grants(permission) {
            return Err(ScopeRejection::Mismatch);
        }
        self.scope_consumed = true;
        Ok(())
    }
}

/// Mutable state for one request. Created empty, filled in by stages.
#[derive(Clone, Default)]
pub struct RequestContext {
    pub user: Option<Principal>,
    namespace: Option<NamespaceBinding>,
    key: Option<String>,
    pub service_id: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(&self) -> Option<&NamespaceBinding> {
        self.namespace.as_ref()
    }

    /// Bind the request's namespace. Fails if one was already bound.
    pub fn set_namespace(
        &mut self,
        stage: &'static str,
        binding: NamespaceBinding,
    ) -> ApiResult<()> {
        if self.namespace.is_some() {
            return Err(ApiError::StageOrdering {
                stage,
                missing: "an unbound namespace",
            });
        }
        self.namespace = Some(binding);
        Ok(())
    }

    /// The storage key this request may touch, once a key stage has run.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Record the authorized key. Fails if a key was already set.
    pub fn set_key(&mut self, stage: &'static str, key: String) -> ApiResult<()> {
        if self.key.is_some() {
            return Err(ApiError::StageOrdering {
                stage,
                missing: "an unset key",
            });
        }
        self.key = Some(key);
        Ok(())
    }

    pub fn require_user(&self, stage: &'static str) -> ApiResult<&Principal> {
        self.user.as_ref().ok_or(ApiError::StageOrdering {
            stage,
            missing: "user",
        })
    }

    pub fn require_user_mut(&mut self, stage: &'static str) -> ApiResult<&mut Principal> {
        self.user.as_mut().ok_or(ApiError::StageOrdering {
            stage,
            missing: "user",
        })
    }

    pub fn require_namespace(&self, stage: &'static str) -> ApiResult<&NamespaceBinding> {
        self.namespace.as_ref().ok_or(ApiError::StageOrdering {
            stage,
            missing: "namespace",
        })
    }

    pub fn require_key(&self, stage: &'static str) -> ApiResult<&str> {
        self.key.as_deref().ok_or(ApiError::StageOrdering {
            stage,
            missing: "key",
        })
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("user", &self.user.as_ref().map(Principal::user))
            .field(
                "namespace",
                &self.namespace.as_ref().map(NamespaceBinding::name),
            )
            .field("key", &self.key)
            .field("service_id", &self.service_id)
            .finish()
    }
}
