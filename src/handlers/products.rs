// src/handlers/products.rs
//
// Módulo de conteúdo do tenant. Toda a filtragem fica no repositório com
// escopo; aqui só repassamos o `TenantContext` do request.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    db::Pagination,
    middleware::{auth::AuthenticatedPrincipal, tenancy::TenantContext},
    models::product::{CreateProductPayload, Product, UpdateProductPayload},
};

// POST /api/products
#[utoipa::path(
    post,
    path = "/api/products",
    tag = "Products",
    request_body = CreateProductPayload,
    responses(
        (status = 201, description = "Produto criado", body = Product),
        (status = 400, description = "Dados inválidos (ou operador sem tenantId)"),
        (status = 402, description = "Assinatura inativa")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_product(
    State(app_state): State<AppState>,
    _user: AuthenticatedPrincipal,
    ctx: TenantContext,
    Json(payload): Json<CreateProductPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let (requested_tenant, fields) = payload.into_parts();
    let product = app_state
        .products
        .create(&ctx, requested_tenant, fields)
        .await?;

    Ok((StatusCode::CREATED, Json(product)))
}

// GET /api/products
#[utoipa::path(
    get,
    path = "/api/products",
    tag = "Products",
    params(Pagination),
    responses(
        (status = 200, description = "Produtos visíveis para quem chama", body = Vec<Product>),
        (status = 402, description = "Assinatura inativa")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_products(
    State(app_state): State<AppState>,
    _user: AuthenticatedPrincipal,
    ctx: TenantContext,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<Product>>, AppError> {
    let products = app_state.products.list(&ctx, page).await?;
    Ok(Json(products))
}

// GET /api/products/{id}
#[utoipa::path(
    get,
    path = "/api/products/{id}",
    tag = "Products",
    params(("id" = Uuid, Path, description = "ID do produto")),
    responses(
        (status = 200, description = "Produto", body = Product),
        (status = 404, description = "Produto não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_product(
    State(app_state): State<AppState>,
    _user: AuthenticatedPrincipal,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    let product = app_state.products.get(&ctx, id).await?;
    Ok(Json(product))
}

// PUT /api/products/{id}
#[utoipa::path(
    put,
    path = "/api/products/{id}",
    tag = "Products",
    request_body = UpdateProductPayload,
    params(("id" = Uuid, Path, description = "ID do produto")),
    responses(
        (status = 200, description = "Produto atualizado", body = Product),
        (status = 404, description = "Produto não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_product(
    State(app_state): State<AppState>,
    _user: AuthenticatedPrincipal,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductPayload>,
) -> Result<Json<Product>, AppError> {
    payload.validate()?;

    let product = app_state
        .products
        .update(&ctx, id, payload)
        .await?
        .ok_or(AppError::NotFound("Produto"))?;

    Ok(Json(product))
}

// DELETE /api/products/{id}
#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    tag = "Products",
    params(("id" = Uuid, Path, description = "ID do produto")),
    responses(
        (status = 204, description = "Produto removido"),
        (status = 404, description = "Produto não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_product(
    State(app_state): State<AppState>,
    _user: AuthenticatedPrincipal,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !app_state.products.delete(&ctx, id).await? {
        return Err(AppError::NotFound("Produto"));
    }
    Ok(StatusCode::NO_CONTENT)
}
