// src/handlers/plans.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::rbac::{PermPlansManage, RequirePermission},
    models::subscription::{CreatePlanPayload, SubscriptionPlan, UpdatePlanPayload},
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ListPlansQuery {
    /// Inclui planos desativados
    #[serde(default)]
    pub include_inactive: bool,
}

// POST /api/admin/plans
#[utoipa::path(
    post,
    path = "/api/admin/plans",
    tag = "Plans",
    request_body = CreatePlanPayload,
    responses(
        (status = 201, description = "Plano criado", body = SubscriptionPlan),
        (status = 400, description = "Dados inválidos"),
        (status = 403, description = "Sem permissão")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_plan(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermPlansManage>,
    Json(payload): Json<CreatePlanPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let plan = app_state.plan_service.create_plan(payload).await?;

    Ok((StatusCode::CREATED, Json(plan)))
}

// GET /api/admin/plans
#[utoipa::path(
    get,
    path = "/api/admin/plans",
    tag = "Plans",
    params(ListPlansQuery),
    responses((status = 200, description = "Planos", body = Vec<SubscriptionPlan>)),
    security(("api_jwt" = []))
)]
pub async fn list_plans(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermPlansManage>,
    Query(query): Query<ListPlansQuery>,
) -> Result<Json<Vec<SubscriptionPlan>>, AppError> {
    let plans = app_state.plan_service.list_plans(query.include_inactive).await?;
    Ok(Json(plans))
}

// PUT /api/admin/plans/{id}
#[utoipa::path(
    put,
    path = "/api/admin/plans/{id}",
    tag = "Plans",
    request_body = UpdatePlanPayload,
    params(("id" = Uuid, Path, description = "ID do plano")),
    responses(
        (status = 200, description = "Plano atualizado", body = SubscriptionPlan),
        (status = 404, description = "Plano não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_plan(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermPlansManage>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePlanPayload>,
) -> Result<Json<SubscriptionPlan>, AppError> {
    payload.validate()?;

    let plan = app_state.plan_service.update_plan(id, payload).await?;
    Ok(Json(plan))
}
