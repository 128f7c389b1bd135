// src/db/scoped.rs
//
// Acesso a dados com escopo de tenant. A política (quem enxerga o quê, quem
// carimba o `tenant_id`) mora só aqui; cada entidade implementa apenas as
// operações "cruas" de `ScopedBackend`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    common::error::AppError, db::principal_repo::PrincipalStore,
    middleware::tenancy::TenantContext,
};

const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, Deserialize, IntoParams)]
#[serde(default)]
pub struct Pagination {
    pub offset: i64,
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

impl Pagination {
    /// Offset nunca negativo, limite entre 1 e 100.
    pub fn normalized(self) -> Self {
        Self {
            offset: self.offset.max(0),
            limit: self.limit.clamp(1, MAX_PAGE_SIZE),
        }
    }
}

/// Filtro de leitura derivado do contexto do request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadScope {
    /// Operador: sem filtro.
    All,
    Tenant(Uuid),
}

impl ReadScope {
    /// `None` quando não há filtro (operador).
    pub fn tenant_filter(self) -> Option<Uuid> {
        match self {
            ReadScope::All => None,
            ReadScope::Tenant(id) => Some(id),
        }
    }

    pub fn allows(self, tenant_id: Uuid) -> bool {
        match self {
            ReadScope::All => true,
            ReadScope::Tenant(id) => id == tenant_id,
        }
    }
}

/// Contexto vazio (não autenticado) não enxerga nada.
pub fn read_scope(ctx: &TenantContext) -> Option<ReadScope> {
    if ctx.is_privileged() {
        return Some(ReadScope::All);
    }
    ctx.get_tenant().map(ReadScope::Tenant)
}

/// Decide o `tenant_id` de uma escrita. O valor enviado pelo cliente nunca é
/// usado; o operador não tem tenant atual, então precisa informar um.
pub fn write_tenant(ctx: &TenantContext, requested: Option<Uuid>) -> Result<Uuid, AppError> {
    if ctx.is_privileged() {
        return requested.ok_or(AppError::MissingTenantId);
    }

    match ctx.get_tenant() {
        Some(tenant_id) => {
            if requested.is_some_and(|id| id != tenant_id) {
                tracing::warn!(%tenant_id, "tenantId enviado pelo cliente foi ignorado");
            }
            Ok(tenant_id)
        }
        None => Err(AppError::Unauthenticated),
    }
}

/// Operações sem política que cada entidade do tenant fornece.
/// O `TenantContext` é repassado só para o backend preparar a conexão (RLS).
#[async_trait]
pub trait ScopedBackend: Send + Sync {
    type Entity: Send;
    type NewFields: Send;
    type Changes: Send;

    /// Nome usado no erro "não encontrado".
    fn entity_name(&self) -> &'static str;

    async fn fetch(
        &self,
        ctx: &TenantContext,
        scope: ReadScope,
        id: Uuid,
    ) -> Result<Option<Self::Entity>, AppError>;

    async fn fetch_page(
        &self,
        ctx: &TenantContext,
        scope: ReadScope,
        page: Pagination,
    ) -> Result<Vec<Self::Entity>, AppError>;

    async fn insert(
        &self,
        ctx: &TenantContext,
        tenant_id: Uuid,
        fields: Self::NewFields,
    ) -> Result<Self::Entity, AppError>;

    async fn write(
        &self,
        ctx: &TenantContext,
        id: Uuid,
        changes: Self::Changes,
    ) -> Result<Option<Self::Entity>, AppError>;

    async fn remove(&self, ctx: &TenantContext, id: Uuid) -> Result<bool, AppError>;
}

/// Repositório com isolamento de tenant sobre qualquer `ScopedBackend`.
/// `tenants` resolve o destino das escritas de operadores.
pub struct TenantScoped<B: ?Sized> {
    backend: Arc<B>,
    tenants: Arc<dyn PrincipalStore>,
}

impl<B: ?Sized> Clone for TenantScoped<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            tenants: Arc::clone(&self.tenants),
        }
    }
}

impl<B> TenantScoped<B>
where
    B: ScopedBackend + ?Sized,
{
    pub fn new(backend: Arc<B>, tenants: Arc<dyn PrincipalStore>) -> Self {
        Self { backend, tenants }
    }

    /// "Existe, mas é de outro tenant" e "não existe" dão o mesmo `None`.
    pub async fn find_by_id(
        &self,
        ctx: &TenantContext,
        id: Uuid,
    ) -> Result<Option<B::Entity>, AppError> {
        let Some(scope) = read_scope(ctx) else {
            return Ok(None);
        };
        self.backend.fetch(ctx, scope, id).await
    }

    pub async fn list(
        &self,
        ctx: &TenantContext,
        page: Pagination,
    ) -> Result<Vec<B::Entity>, AppError> {
        let Some(scope) = read_scope(ctx) else {
            return Ok(Vec::new());
        };
        self.backend.fetch_page(ctx, scope, page.normalized()).await
    }

    pub async fn create(
        &self,
        ctx: &TenantContext,
        requested_tenant: Option<Uuid>,
        fields: B::NewFields,
    ) -> Result<B::Entity, AppError> {
        let tenant_id = write_tenant(ctx, requested_tenant)?;

        // O operador escolhe o destino: precisa ser um principal tenant existente
        if ctx.is_privileged() {
            let is_tenant = self
                .tenants
                .find_by_id(tenant_id)
                .await?
                .is_some_and(|p| p.tenant_id() == Some(tenant_id));
            if !is_tenant {
                tracing::warn!(%tenant_id, "Escrita de operador para um tenant inexistente");
                return Err(AppError::NotFound("Tenant"));
            }
        }

        self.backend.insert(ctx, tenant_id, fields).await
    }

    /// Passa por `find_by_id` antes: linha de outro tenant = não encontrado.
    pub async fn update(
        &self,
        ctx: &TenantContext,
        id: Uuid,
        changes: B::Changes,
    ) -> Result<Option<B::Entity>, AppError> {
        if self.find_by_id(ctx, id).await?.is_none() {
            return Ok(None);
        }
        self.backend.write(ctx, id, changes).await
    }

    pub async fn delete(&self, ctx: &TenantContext, id: Uuid) -> Result<bool, AppError> {
        if self.find_by_id(ctx, id).await?.is_none() {
            return Ok(false);
        }
        self.backend.remove(ctx, id).await
    }

    /// Igual a `find_by_id`, mas já convertendo ausência em `NotFound`.
    pub async fn get(&self, ctx: &TenantContext, id: Uuid) -> Result<B::Entity, AppError> {
        self.find_by_id(ctx, id)
            .await?
            .ok_or(AppError::NotFound(self.backend.entity_name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_context_sees_nothing() {
        assert_eq!(read_scope(&TenantContext::default()), None);
    }

    #[test]
    fn privileged_context_reads_everything() {
        let scope = read_scope(&TenantContext::privileged()).unwrap();
        assert_eq!(scope, ReadScope::All);
        assert!(scope.allows(Uuid::new_v4()));
        assert_eq!(scope.tenant_filter(), None);
    }

    #[test]
    fn tenant_context_reads_only_own_rows() {
        let tenant = Uuid::new_v4();
        let scope = read_scope(&TenantContext::for_tenant(tenant)).unwrap();
        assert!(scope.allows(tenant));
        assert!(!scope.allows(Uuid::new_v4()));
    }

    #[test]
    fn tenant_write_ignores_requested_tenant() {
        let tenant = Uuid::new_v4();
        let ctx = TenantContext::for_tenant(tenant);

        assert_eq!(write_tenant(&ctx, Some(Uuid::new_v4())).unwrap(), tenant);
        assert_eq!(write_tenant(&ctx, None).unwrap(), tenant);
    }

    #[test]
    fn privileged_write_requires_explicit_tenant() {
        let ctx = TenantContext::privileged();
        assert!(matches!(write_tenant(&ctx, None), Err(AppError::MissingTenantId)));

        let target = Uuid::new_v4();
        assert_eq!(write_tenant(&ctx, Some(target)).unwrap(), target);
    }

    #[test]
    fn anonymous_write_is_unauthenticated() {
        assert!(matches!(
            write_tenant(&TenantContext::default(), Some(Uuid::new_v4())),
            Err(AppError::Unauthenticated)
        ));
    }

    #[test]
    fn pagination_is_clamped() {
        let page = Pagination { offset: -5, limit: 10_000 }.normalized();
        assert_eq!(page.offset, 0);
        assert_eq!(page.limit, MAX_PAGE_SIZE);
    }
}
