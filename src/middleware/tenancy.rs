// src/middleware/tenancy.rs

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

// O escopo do request: qual tenant pode ser tocado e se quem chama é operador.
// Vive nas extensions do próprio request, então dois requests concorrentes
// nunca enxergam o valor um do outro.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: Option<Uuid>,
    privileged: bool,
}

impl TenantContext {
    pub fn for_tenant(tenant_id: Uuid) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            privileged: false,
        }
    }

    pub fn privileged() -> Self {
        Self {
            tenant_id: None,
            privileged: true,
        }
    }

    pub fn set_tenant(&mut self, tenant_id: Uuid) {
        self.tenant_id = Some(tenant_id);
    }

    pub fn set_privileged(&mut self, privileged: bool) {
        self.privileged = privileged;
    }

    pub fn get_tenant(&self) -> Option<Uuid> {
        self.tenant_id
    }

    pub fn is_privileged(&self) -> bool {
        self.privileged
    }

    /// Idempotente: volta para "sem tenant, sem privilégio".
    pub fn clear(&mut self) {
        self.tenant_id = None;
        self.privileged = false;
    }

    pub fn is_empty(&self) -> bool {
        self.tenant_id.is_none() && !self.privileged
    }
}

// Sem contexto nas extensions = contexto vazio (rota pública ou token inválido).
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<TenantContext>()
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_resets_both_fields_and_is_idempotent() {
        let mut ctx = TenantContext::for_tenant(Uuid::new_v4());
        ctx.set_privileged(true);

        ctx.clear();
        assert_eq!(ctx.get_tenant(), None);
        assert!(!ctx.is_privileged());

        ctx.clear();
        assert!(ctx.is_empty());
    }

    #[test]
    fn setters_are_reflected_by_getters() {
        let tenant = Uuid::new_v4();
        let mut ctx = TenantContext::default();
        assert!(ctx.is_empty());

        ctx.set_tenant(tenant);
        assert_eq!(ctx.get_tenant(), Some(tenant));
        assert!(!ctx.is_privileged());

        ctx.set_privileged(true);
        assert!(ctx.is_privileged());
    }

    #[tokio::test]
    async fn extractor_defaults_to_empty_context() {
        let (mut parts, _) = axum::http::Request::new(()).into_parts();
        let ctx = TenantContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(ctx.is_empty());

        let tenant = Uuid::new_v4();
        parts.extensions.insert(TenantContext::for_tenant(tenant));
        let ctx = TenantContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ctx.get_tenant(), Some(tenant));
    }
}
