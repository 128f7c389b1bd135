// src/handlers/subscriptions.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{
        auth::AuthenticatedPrincipal,
        rbac::{PermSubscriptionsManage, RequirePermission},
        tenancy::TenantContext,
    },
    models::subscription::{AssignSubscriptionPayload, Subscription, SubscriptionOverview},
};

// GET /api/subscription (fora do portão: um tenant vencido precisa ver o status)
#[utoipa::path(
    get,
    path = "/api/subscription",
    tag = "Subscriptions",
    responses(
        (status = 200, description = "Assinatura atual do tenant", body = SubscriptionOverview),
        (status = 401, description = "Não autenticado"),
        (status = 404, description = "Sem assinatura")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_my_subscription(
    State(app_state): State<AppState>,
    _user: AuthenticatedPrincipal,
    ctx: TenantContext,
) -> Result<Json<SubscriptionOverview>, AppError> {
    // Operadores não têm assinatura própria
    let tenant_id = ctx.get_tenant().ok_or(AppError::NotFound("Assinatura"))?;

    let overview = app_state
        .subscription_service
        .overview(tenant_id)
        .await?
        .ok_or(AppError::NotFound("Assinatura"))?;

    Ok(Json(overview))
}

// POST /api/admin/subscriptions
#[utoipa::path(
    post,
    path = "/api/admin/subscriptions",
    tag = "Subscriptions",
    request_body = AssignSubscriptionPayload,
    responses(
        (status = 201, description = "Plano atribuído", body = Subscription),
        (status = 404, description = "Tenant não encontrado"),
        (status = 422, description = "Plano inexistente ou inativo")
    ),
    security(("api_jwt" = []))
)]
pub async fn assign_subscription(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermSubscriptionsManage>,
    Json(payload): Json<AssignSubscriptionPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let subscription = app_state
        .subscription_service
        .assign(payload.tenant_id, payload.plan_id, payload.duration_days)
        .await?;

    Ok((StatusCode::CREATED, Json(subscription)))
}

// POST /api/admin/subscriptions/{id}/renew
#[utoipa::path(
    post,
    path = "/api/admin/subscriptions/{id}/renew",
    tag = "Subscriptions",
    params(("id" = Uuid, Path, description = "ID da assinatura")),
    responses(
        (status = 200, description = "Assinatura renovada", body = Subscription),
        (status = 404, description = "Assinatura não encontrada"),
        (status = 409, description = "Não é a assinatura atual do tenant")
    ),
    security(("api_jwt" = []))
)]
pub async fn renew_subscription(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermSubscriptionsManage>,
    Path(id): Path<Uuid>,
) -> Result<Json<Subscription>, AppError> {
    let subscription = app_state.subscription_service.renew(id).await?;
    Ok(Json(subscription))
}

// POST /api/admin/subscriptions/{id}/cancel
#[utoipa::path(
    post,
    path = "/api/admin/subscriptions/{id}/cancel",
    tag = "Subscriptions",
    params(("id" = Uuid, Path, description = "ID da assinatura")),
    responses(
        (status = 200, description = "Assinatura cancelada", body = Subscription),
        (status = 404, description = "Assinatura não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn cancel_subscription(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermSubscriptionsManage>,
    Path(id): Path<Uuid>,
) -> Result<Json<Subscription>, AppError> {
    let subscription = app_state.subscription_service.cancel(id).await?;
    Ok(Json(subscription))
}
