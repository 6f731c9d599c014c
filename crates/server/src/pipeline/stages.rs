//! Routing and authentication stages.

use super::context::{Principal, ScopeRejection};
use super::{InboundRequest, RequestContext, Stage};
use crate::auth::{TOKEN_QUERY_PARAM, credentials_from_request};
use crate::credentials::CredentialValidator;
use crate::error::{ApiError, ApiResult};
use crate::namespaces::NamespaceTable;
use async_trait::async_trait;
use porter_core::{Capability, Permission};
use std::sync::Arc;
use uuid::Uuid;

/// Query parameter naming the attachment's owning service.
pub const SERVICE_ID_QUERY_PARAM: &str = "serviceId";

/// Bind the request to a namespace by prefix. Unknown prefixes are `404`.
pub struct WithNamespace {
    table: Arc<NamespaceTable>,
    prefix: String,
}

impl WithNamespace {
    pub fn new(table: Arc<NamespaceTable>, prefix: impl Into<String>) -> Self {
        Self {
            table,
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl Stage for WithNamespace {
    fn name(&self) -> &'static str {
        "namespace"
    }

    async fn apply(&self, ctx: &mut RequestContext, _req: &InboundRequest) -> ApiResult<()> {
        if ctx.namespace().is_some() {
            return Err(ApiError::StageOrdering {
                stage: self.name(),
                missing: "an unbound namespace",
            });
        }
        let binding = self
            .table
            .select(&self.prefix)
            .ok_or_else(|| ApiError::NotFound(format!("unknown namespace: {}", self.prefix)))?;
        ctx.set_namespace(self.name(), binding.clone())
    }
}

/// Require a hyphenated UUID `serviceId` query parameter.
pub struct ServiceIdFromQuery;

/// Whether `value` is a UUID in the hyphenated 8-4-4-4-12 form.
fn is_hyphenated_uuid(value: &str) -> bool {
    // Uuid::try_parse also accepts the simple, braced and URN forms, which
    // all differ in length.
    value.len() == 36 && Uuid::try_parse(value).is_ok()
}

#[async_trait]
impl Stage for ServiceIdFromQuery {
    fn name(&self) -> &'static str {
        "service_id"
    }

    async fn apply(&self, ctx: &mut RequestContext, req: &InboundRequest) -> ApiResult<()> {
        let service_id = req.query(SERVICE_ID_QUERY_PARAM).ok_or_else(|| {
            ApiError::BadRequest("serviceId query parameter is required".to_string())
        })?;
        if !is_hyphenated_uuid(service_id) {
            return Err(ApiError::BadRequest(
                "serviceId must be a valid UUID".to_string(),
            ));
        }
        ctx.service_id = Some(service_id.to_string());
        Ok(())
    }
}

/// Validate the request's credential and record the caller.
pub struct Authenticate {
    validator: Arc<dyn CredentialValidator>,
}

impl Authenticate {
    pub fn new(validator: Arc<dyn CredentialValidator>) -> Self {
        Self { validator }
    }
}

#[async_trait]
impl Stage for Authenticate {
    fn name(&self) -> &'static str {
        "authenticate"
    }

    async fn apply(&self, ctx: &mut RequestContext, req: &InboundRequest) -> ApiResult<()> {
        let credentials = credentials_from_request(&req.headers, req.query(TOKEN_QUERY_PARAM))?;
        if !self
            .validator
            .validate(&credentials.username, &credentials.password)
            .await
        {
            return Err(ApiError::Unauthorized("invalid credentials".to_string()));
        }

        if ctx.user.is_some() {
            return Err(ApiError::StageOrdering {
                stage: self.name(),
                missing: "an unauthenticated context",
            });
        }
        tracing::debug!(user = %credentials.username, "credential accepted");
        ctx.user = Some(Principal::new(Capability::parse(&credentials.username)));
        Ok(())
    }
}

/// Consume the caller's permission scope, which must name `permission`.
pub struct RequirePermission {
    permission: Permission,
}

impl RequirePermission {
    pub fn new(permission: Permission) -> Self {
        Self { permission }
    }

    pub fn read() -> Self {
        Self::new(Permission::Read)
    }

    pub fn write() -> Self {
        Self::new(Permission::Write)
    }
}

#[async_trait]
impl Stage for RequirePermission {
    fn name(&self) -> &'static str {
        "permission"
    }

    async fn apply(&self, ctx: &mut RequestContext, _req: &InboundRequest) -> ApiResult<()> {
        let stage = self.name();
        let principal = ctx.require_user_mut(stage)?;
        principal
            .consume_scope(self.permission)
            .map_err(|rejection| match rejection {
                ScopeRejection::Missing => {
                    ApiError::Unauthorized("no permission scope claimed".to_string())
                }
                ScopeRejection::Mismatch => {
                    ApiError::Unauthorized(format!("{} permission required", self.permission))
                }
            })
    }
}
