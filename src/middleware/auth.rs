// src/middleware/auth.rs

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::tenancy::TenantContext,
    models::principal::{Contact, Principal},
};

// O middleware de escopo: roda uma vez por request (exceto rotas públicas) e
// só preenche o contexto. Nunca responde 401/403 por conta própria.
pub async fn scope_request(
    State(app_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    // 1. Começa sempre limpo, mesmo que alguém tenha inserido algo antes
    request.extensions_mut().remove::<TenantContext>();
    request.extensions_mut().remove::<AuthenticatedPrincipal>();

    // 2. Rotas públicas não são escopadas
    if !app_state.config.is_public_route(request.uri().path()) {
        // 3-5. Token -> principal -> contexto
        if let Some(principal) = resolve_principal(&app_state, request.headers()).await {
            let mut ctx = TenantContext::default();
            match principal.tenant_id() {
                Some(tenant_id) => ctx.set_tenant(tenant_id),
                None => ctx.set_privileged(true),
            }

            tracing::debug!(
                principal_id = %principal.id,
                tenant_id = ?ctx.get_tenant(),
                privileged = ctx.is_privileged(),
                "Escopo do request resolvido"
            );

            request.extensions_mut().insert(ctx);
            request.extensions_mut().insert(AuthenticatedPrincipal(principal));
        }
    }

    // 6. O contexto vive nas extensions do request, que é consumido pelo
    // handler; nada sobra para o próximo request, com ou sem erro.
    let mut response = next.run(request).await;
    response.extensions_mut().remove::<TenantContext>();
    response
}

/// Qualquer falha aqui resulta em "sem contexto", nunca em erro.
async fn resolve_principal(app_state: &AppState, headers: &HeaderMap) -> Option<Principal> {
    let bearer = headers.typed_get::<Authorization<Bearer>>()?;

    let verified = app_state.tokens.verify_session(bearer.token()).ok()?;
    let contact = Contact::parse(&verified.subject)?;

    let principal = match app_state.principals.find_by_contact(&contact).await {
        Ok(principal) => principal?,
        Err(e) => {
            tracing::warn!("Falha ao buscar o principal do token: {}", e);
            return None;
        }
    };

    if !principal.is_active {
        tracing::debug!(principal_id = %principal.id, "Conta desativada: request sem escopo");
        return None;
    }

    Some(principal)
}

// Extrator para obter o principal autenticado diretamente nos handlers
#[derive(Debug, Clone)]
pub struct AuthenticatedPrincipal(pub Principal);

impl<S> FromRequestParts<S> for AuthenticatedPrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedPrincipal>()
            .cloned()
            .ok_or(AppError::Unauthenticated)
    }
}
