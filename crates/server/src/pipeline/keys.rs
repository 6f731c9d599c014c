//! Key derivation stages.
//!
//! Every route that touches storage or a coordinator ends its chain with
//! exactly one of these. They are the only writers of
//! [`RequestContext::key`].

use super::stages::SERVICE_ID_QUERY_PARAM;
use super::{InboundRequest, RequestContext, Stage};
use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use porter_core::keys::{
    extract_service_id_from_path, generate_upload_path, has_traversal_pattern, validate_path,
};
use porter_core::upload_metadata::UPLOAD_METADATA_HEADER;
use porter_core::UploadMetadata;
use std::sync::Arc;

/// Derives a value from the request and what earlier stages recorded.
pub type Extractor =
    Arc<dyn Fn(&RequestContext, &InboundRequest) -> Option<String> + Send + Sync>;

/// Route policy: how to find the key and the entity that must own it.
#[derive(Clone)]
pub struct AuthorizationOptions {
    key: Extractor,
    entity: Option<Extractor>,
}

impl AuthorizationOptions {
    pub fn new<F>(key: F) -> Self
    where
        F: Fn(&RequestContext, &InboundRequest) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            key: Arc::new(key),
            entity: None,
        }
    }

    /// Use a separate entity extractor. Without one the key is the entity.
    pub fn with_entity<F>(mut self, entity: F) -> Self
    where
        F: Fn(&RequestContext, &InboundRequest) -> Option<String> + Send + Sync + 'static,
    {
        self.entity = Some(Arc::new(entity));
        self
    }

    fn extract_key(&self, ctx: &RequestContext, req: &InboundRequest) -> Option<String> {
        (self.key)(ctx, req)
    }

    fn extract_entity(&self, ctx: &RequestContext, req: &InboundRequest) -> Option<String> {
        (self.entity.as_ref().unwrap_or(&self.key))(ctx, req)
    }
}

/// Shared tail of every authenticated key stage.
///
/// Requires a user and a namespace. When `enforce_entity_match` is set the
/// caller's identity must be `<namespace>/<entity>`.
fn authorize(
    stage: &'static str,
    ctx: &mut RequestContext,
    key: Option<String>,
    entity: Option<String>,
    enforce_entity_match: bool,
) -> ApiResult<()> {
    let namespace = ctx.require_namespace(stage)?.name();
    let user = ctx.require_user(stage)?.user();

    let key = key
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("no key could be derived".to_string()))?;
    let entity = entity
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("no entity could be derived".to_string()))?;

    if enforce_entity_match && user != format!("{namespace}/{entity}") {
        tracing::info!(stage, user, entity, "entity mismatch");
        return Err(ApiError::Unauthorized(
            "credential does not grant access to this entity".to_string(),
        ));
    }

    ctx.set_key(stage, key)
}

/// The generic key stage driven by [`AuthorizationOptions`].
#[derive(Clone)]
pub struct AuthorizedKey {
    options: AuthorizationOptions,
    enforce_entity_match: bool,
}

impl AuthorizedKey {
    pub fn new(options: AuthorizationOptions, enforce_entity_match: bool) -> Self {
        Self {
            options,
            enforce_entity_match,
        }
    }
}

#[async_trait]
impl Stage for AuthorizedKey {
    fn name(&self) -> &'static str {
        "authorized_key"
    }

    async fn apply(&self, ctx: &mut RequestContext, req: &InboundRequest) -> ApiResult<()> {
        let key = self.options.extract_key(ctx, req);
        let entity = self.options.extract_entity(ctx, req);
        authorize(self.name(), ctx, key, entity, self.enforce_entity_match)
    }
}

/// Public reads: `<namespace>/<id>`, or the bare id without a namespace.
pub struct UnauthenticatedKeyFromId;

#[async_trait]
impl Stage for UnauthenticatedKeyFromId {
    fn name(&self) -> &'static str {
        "unauthenticated_key"
    }

    async fn apply(&self, ctx: &mut RequestContext, req: &InboundRequest) -> ApiResult<()> {
        let id = req
            .param("id")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::BadRequest("object id is required".to_string()))?;
        let key = match ctx.namespace() {
            Some(binding) => format!("{}/{id}", binding.name()),
            None => id.to_string(),
        };
        ctx.set_key(self.name(), key)
    }
}

/// `<subdir>/<id>`, owned by the entity `subdir`.
pub struct SubdirAuthorizedKey {
    inner: AuthorizedKey,
}

impl SubdirAuthorizedKey {
    pub fn new(enforce_entity_match: bool) -> Self {
        let options = AuthorizationOptions::new(|_, req| {
            let subdir = req.param("subdir").filter(|s| !s.is_empty())?;
            let id = req.param("id").filter(|s| !s.is_empty())?;
            Some(format!("{subdir}/{id}"))
        })
        .with_entity(|_, req| req.param("subdir").map(str::to_string));
        Self {
            inner: AuthorizedKey::new(options, enforce_entity_match),
        }
    }
}

#[async_trait]
impl Stage for SubdirAuthorizedKey {
    fn name(&self) -> &'static str {
        "subdir_key"
    }

    async fn apply(&self, ctx: &mut RequestContext, req: &InboundRequest) -> ApiResult<()> {
        self.inner.apply(ctx, req).await
    }
}

/// `<prefix><id>` for requests against an existing upload session.
pub struct PathAuthorizedKey {
    prefix: String,
    inner: AuthorizedKey,
}

impl PathAuthorizedKey {
    pub fn new(prefix: impl Into<String>, enforce_entity_match: bool) -> Self {
        let prefix = prefix.into();
        let key_prefix = prefix.clone();
        let options = AuthorizationOptions::new(move |_, req| {
            let id = req.param("id").filter(|id| !id.is_empty())?;
            Some(format!("{key_prefix}{id}"))
        });
        Self {
            prefix,
            inner: AuthorizedKey::new(options, enforce_entity_match),
        }
    }
}

#[async_trait]
impl Stage for PathAuthorizedKey {
    fn name(&self) -> &'static str {
        "path_key"
    }

    async fn apply(&self, ctx: &mut RequestContext, req: &InboundRequest) -> ApiResult<()> {
        if let Some(id) = req.param("id") {
            let candidate = format!("{}{id}", self.prefix);
            if has_traversal_pattern(&candidate) {
                tracing::info!(path = %candidate, "rejected traversal in upload path");
                return Err(ApiError::BadRequest("invalid upload path".to_string()));
            }
            if ctx.service_id.is_none()
                && let Some(service_id) =
                    extract_service_id_from_path(&candidate, self.prefix.trim_end_matches('/'))
            {
                ctx.service_id = Some(service_id.to_string());
            }
        }
        self.inner.apply(ctx, req).await
    }
}

/// Derive the key for a new upload from its `Upload-Metadata` filename.
///
/// With a service id the key is `<prefix>/<service_id>/<sanitized>`.
/// Without one it is the legacy flat `<prefix><filename>`.
pub struct MetadataAuthorizedKey {
    prefix: String,
    enforce_entity_match: bool,
}

impl MetadataAuthorizedKey {
    pub fn new(prefix: impl Into<String>, enforce_entity_match: bool) -> Self {
        Self {
            prefix: prefix.into(),
            enforce_entity_match,
        }
    }

    fn derive_key(&self, ctx: &RequestContext, req: &InboundRequest) -> ApiResult<String> {
        let header = req.header(UPLOAD_METADATA_HEADER).ok_or_else(|| {
            ApiError::BadRequest("upload-metadata header is required".to_string())
        })?;
        let metadata = UploadMetadata::parse(header)?;
        let filename = metadata.filename().ok_or_else(|| {
            ApiError::BadRequest("upload-metadata must include a filename".to_string())
        })?;

        let service_id = ctx
            .service_id
            .as_deref()
            .or_else(|| req.query(SERVICE_ID_QUERY_PARAM));
        let Some(service_id) = service_id else {
            return Ok(format!("{}{filename}", self.prefix));
        };

        let root = self.prefix.trim_end_matches('/');
        let path = generate_upload_path(root, service_id, filename)?;
        if !validate_path(&path, root) {
            return Err(ApiError::BadRequest("invalid upload path".to_string()));
        }
        // An empty root leaves a leading separator that is not part of the key.
        Ok(match path.strip_prefix('/') {
            Some(key) if root.is_empty() => key.to_string(),
            _ => path,
        })
    }
}

#[async_trait]
impl Stage for MetadataAuthorizedKey {
    fn name(&self) -> &'static str {
        "metadata_key"
    }

    async fn apply(&self, ctx: &mut RequestContext, req: &InboundRequest) -> ApiResult<()> {
        let key = self.derive_key(ctx, req)?;
        let entity = Some(key.clone());
        authorize(
            self.name(),
            ctx,
            Some(key),
            entity,
            self.enforce_entity_match,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Principal;
    use crate::testing::{binding_table, inbound};
    use axum::http::{HeaderMap, HeaderValue, Method};
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use porter_core::Capability;

    fn ctx(namespace: &str, user: &str) -> RequestContext {
        let mut ctx = RequestContext::new();
        bind(&mut ctx, namespace);
        ctx.user = Some(Principal::new(Capability::parse(user)));
        ctx
    }

    fn bind(ctx: &mut RequestContext, namespace: &str) {
        let binding = binding_table().select(namespace).cloned().unwrap();
        ctx.set_namespace("test", binding).unwrap();
    }

    fn metadata_headers(filename: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let value = format!("filename {}", STANDARD.encode(filename));
        headers.insert(
            UPLOAD_METADATA_HEADER,
            HeaderValue::from_str(&value).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn test_unauthenticated_key_is_namespaced() {
        let mut ctx = RequestContext::new();
        bind(&mut ctx, "attachments");
        let req = inbound(Method::GET, "/attachments/a/b", HeaderMap::new(), &[("id", "a/b")]);
        UnauthenticatedKeyFromId.apply(&mut ctx, &req).await.unwrap();
        assert_eq!(ctx.key(), Some("attachments/a/b"));
    }

    #[tokio::test]
    async fn test_unauthenticated_key_without_namespace() {
        let mut ctx = RequestContext::new();
        let req = inbound(Method::GET, "/x", HeaderMap::new(), &[("id", "plain")]);
        UnauthenticatedKeyFromId.apply(&mut ctx, &req).await.unwrap();
        assert_eq!(ctx.key(), Some("plain"));
    }

    #[tokio::test]
    async fn test_key_stage_requires_prior_state() {
        let stage = PathAuthorizedKey::new("attachments/", false);
        let req = inbound(Method::PATCH, "/", HeaderMap::new(), &[("id", "x")]);

        let mut no_user = RequestContext::new();
        bind(&mut no_user, "attachments");
        let err = stage.apply(&mut no_user, &req).await.unwrap_err();
        assert!(matches!(err, ApiError::StageOrdering { missing: "user", .. }));

        let mut no_namespace = RequestContext::new();
        no_namespace.user = Some(Principal::new(Capability::parse("attachments/x")));
        let err = stage.apply(&mut no_namespace, &req).await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::StageOrdering {
                missing: "namespace",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_empty_key_is_unauthorized() {
        let stage = AuthorizedKey::new(AuthorizationOptions::new(|_, _| None), false);
        let mut ctx = ctx("backups", "backups/e");
        let req = inbound(Method::GET, "/", HeaderMap::new(), &[]);
        let err = stage.apply(&mut ctx, &req).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
        assert_eq!(ctx.key(), None);
    }

    #[tokio::test]
    async fn test_entity_defaults_to_key() {
        let stage = AuthorizedKey::new(
            AuthorizationOptions::new(|_, _| Some("entity".to_string())),
            true,
        );
        let mut ctx = ctx("backups", "backups/entity");
        let req = inbound(Method::GET, "/", HeaderMap::new(), &[]);
        stage.apply(&mut ctx, &req).await.unwrap();
        assert_eq!(ctx.key(), Some("entity"));
    }

    #[tokio::test]
    async fn test_key_is_set_once() {
        let stage = PathAuthorizedKey::new("", false);
        let mut ctx = ctx("backups", "backups/e");
        let req = inbound(Method::PATCH, "/", HeaderMap::new(), &[("id", "one")]);
        stage.apply(&mut ctx, &req).await.unwrap();
        let err = stage.apply(&mut ctx, &req).await.unwrap_err();
        assert!(matches!(err, ApiError::StageOrdering { .. }));
        assert_eq!(ctx.key(), Some("one"));
    }

    #[tokio::test]
    async fn test_subdir_entity_match_modes() {
        let req = inbound(
            Method::GET,
            "/backups/alice/snap",
            HeaderMap::new(),
            &[("subdir", "alice"), ("id", "snap")],
        );

        // Permissive: any authenticated user gets the key.
        let mut permissive = ctx("backups", "backups/bob");
        SubdirAuthorizedKey::new(false)
            .apply(&mut permissive, &req)
            .await
            .unwrap();
        assert_eq!(permissive.key(), Some("alice/snap"));

        // Enforced: only the owning entity.
        let mut wrong = ctx("backups", "backups/bob");
        let err = SubdirAuthorizedKey::new(true)
            .apply(&mut wrong, &req)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
        assert_eq!(wrong.key(), None);

        let mut owner = ctx("backups", "backups/alice");
        SubdirAuthorizedKey::new(true)
            .apply(&mut owner, &req)
            .await
            .unwrap();
        assert_eq!(owner.key(), Some("alice/snap"));
    }

    #[tokio::test]
    async fn test_path_key_rejects_traversal() {
        let stage = PathAuthorizedKey::new("attachments/", false);
        for id in ["../secret", "a//b", "a\\b", "x/../../y"] {
            let mut ctx = ctx("attachments", "attachments/x");
            let req = inbound(Method::PATCH, "/", HeaderMap::new(), &[("id", id)]);
            let err = stage.apply(&mut ctx, &req).await.unwrap_err();
            assert!(matches!(err, ApiError::BadRequest(_)), "{id}");
            assert_eq!(ctx.key(), None);
        }
    }

    #[tokio::test]
    async fn test_path_key_recovers_service_id() {
        let stage = PathAuthorizedKey::new("attachments/", false);
        let mut ctx = ctx("attachments", "attachments/x");
        let req = inbound(
            Method::PATCH,
            "/",
            HeaderMap::new(),
            &[("id", "svc-1/report.pdf")],
        );
        stage.apply(&mut ctx, &req).await.unwrap();
        assert_eq!(ctx.key(), Some("attachments/svc-1/report.pdf"));
        assert_eq!(ctx.service_id.as_deref(), Some("svc-1"));
    }

    #[tokio::test]
    async fn test_metadata_key_hierarchical() {
        let stage = MetadataAuthorizedKey::new("attachments/", false);
        let mut ctx = ctx("attachments", "attachments/x");
        ctx.service_id = Some("67e55044-10b1-426f-9247-bb680e5fe0c8".to_string());
        let req = inbound(
            Method::POST,
            "/upload/attachments",
            metadata_headers("../../etc/passwd"),
            &[],
        );
        stage.apply(&mut ctx, &req).await.unwrap();
        assert_eq!(
            ctx.key(),
            Some("attachments/67e55044-10b1-426f-9247-bb680e5fe0c8/passwd")
        );
    }

    #[tokio::test]
    async fn test_metadata_key_flat_without_service_id() {
        let stage = MetadataAuthorizedKey::new("", false);
        let mut ctx = ctx("backups", "backups/x");
        let req = inbound(
            Method::POST,
            "/upload/backups",
            metadata_headers("snapshot-1"),
            &[],
        );
        stage.apply(&mut ctx, &req).await.unwrap();
        assert_eq!(ctx.key(), Some("snapshot-1"));
    }

    #[tokio::test]
    async fn test_metadata_key_uses_query_service_id() {
        let stage = MetadataAuthorizedKey::new("", false);
        let mut ctx = ctx("backups", "backups/x");
        let req = inbound(
            Method::POST,
            "/upload/backups?serviceId=svc",
            metadata_headers("snap"),
            &[],
        );
        stage.apply(&mut ctx, &req).await.unwrap();
        assert_eq!(ctx.key(), Some("svc/snap"));
    }

    #[tokio::test]
    async fn test_metadata_key_rejects_hostile_service_id() {
        let stage = MetadataAuthorizedKey::new("", false);
        let mut ctx = ctx("backups", "backups/x");
        let req = inbound(
            Method::POST,
            "/upload/backups?serviceId=..",
            metadata_headers("snap"),
            &[],
        );
        let err = stage.apply(&mut ctx, &req).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_metadata_key_requires_filename() {
        let stage = MetadataAuthorizedKey::new("attachments/", false);

        let mut missing = ctx("attachments", "attachments/x");
        let req = inbound(Method::POST, "/", HeaderMap::new(), &[]);
        let err = stage.apply(&mut missing, &req).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let mut headers = HeaderMap::new();
        headers.insert(
            UPLOAD_METADATA_HEADER,
            HeaderValue::from_static("filetype dGV4dA=="),
        );
        let mut no_filename = ctx("attachments", "attachments/x");
        let req = inbound(Method::POST, "/", headers, &[]);
        let err = stage.apply(&mut no_filename, &req).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let mut headers = HeaderMap::new();
        headers.insert(
            UPLOAD_METADATA_HEADER,
            HeaderValue::from_static("filename !!!"),
        );
        let mut malformed = ctx("attachments", "attachments/x");
        let req = inbound(Method::POST, "/", headers, &[]);
        let err = stage.apply(&mut malformed, &req).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_metadata_entity_match_modes() {
        let req = inbound(Method::POST, "/", metadata_headers("snap"), &[]);

        let mut permissive = ctx("backups", "backups/other");
        MetadataAuthorizedKey::new("", false)
            .apply(&mut permissive, &req)
            .await
            .unwrap();
        assert_eq!(permissive.key(), Some("snap"));

        let mut wrong = ctx("backups", "backups/other");
        let err = MetadataAuthorizedKey::new("", true)
            .apply(&mut wrong, &req)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));

        let mut owner = ctx("backups", "backups/snap");
        MetadataAuthorizedKey::new("", true)
            .apply(&mut owner, &req)
            .await
            .unwrap();
        assert_eq!(owner.key(), Some("snap"));
    }
}
