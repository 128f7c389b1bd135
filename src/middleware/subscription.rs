// src/middleware/subscription.rs

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{common::error::AppError, config::AppState, middleware::tenancy::TenantContext};

// Portão de assinatura: nas rotas de conteúdo do tenant, nega acesso quando a
// assinatura atual não está válida. Não trata de identidade: sem tenant no
// contexto, quem decide é a checagem de autenticação da rota.
pub async fn subscription_gate(
    State(app_state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !app_state.config.is_gated_route(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let ctx = request
        .extensions()
        .get::<TenantContext>()
        .cloned()
        .unwrap_or_default();

    // Operador passa sempre
    if ctx.is_privileged() {
        return Ok(next.run(request).await);
    }

    let Some(tenant_id) = ctx.get_tenant() else {
        return Ok(next.run(request).await);
    };

    let check = app_state.subscription_service.evaluate(tenant_id).await?;
    if !check.active {
        tracing::info!(%tenant_id, status = ?check.status, "🚫 Acesso negado: assinatura inativa");
        return Err(AppError::SubscriptionInactive {
            status: check.status,
            expires_at: check.expires_at,
        });
    }

    Ok(next.run(request).await)
}
