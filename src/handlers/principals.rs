// src/handlers/principals.rs

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::rbac::{PermPrincipalsManage, RequirePermission},
    models::principal::{Principal, UpdateActivePayload, UpdateApprovalPayload},
};

// PUT /api/admin/principals/{id}/approval
#[utoipa::path(
    put,
    path = "/api/admin/principals/{id}/approval",
    tag = "Principals",
    request_body = UpdateApprovalPayload,
    params(("id" = Uuid, Path, description = "ID do principal")),
    responses(
        (status = 200, description = "Aprovação atualizada", body = Principal),
        (status = 404, description = "Principal não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_approval(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermPrincipalsManage>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateApprovalPayload>,
) -> Result<Json<Principal>, AppError> {
    let principal = app_state.auth_service.set_approval(id, payload.approval).await?;
    Ok(Json(principal))
}

// PUT /api/admin/principals/{id}/active (desativação lógica, nunca DELETE)
#[utoipa::path(
    put,
    path = "/api/admin/principals/{id}/active",
    tag = "Principals",
    request_body = UpdateActivePayload,
    params(("id" = Uuid, Path, description = "ID do principal")),
    responses(
        (status = 200, description = "Status atualizado", body = Principal),
        (status = 404, description = "Principal não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_active(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermPrincipalsManage>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateActivePayload>,
) -> Result<Json<Principal>, AppError> {
    let principal = app_state.auth_service.set_active(id, payload.is_active).await?;
    Ok(Json(principal))
}
