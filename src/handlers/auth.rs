// src/handlers/auth.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{auth::AuthenticatedPrincipal, tenancy::TenantContext},
    models::auth::{
        AuthResponse, ForgotPasswordPayload, LoginPayload, MeResponse, RegisterPayload,
        ResetPasswordPayload,
    },
};

// Handler de registro (cliente/tenant)
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterPayload,
    responses(
        (status = 201, description = "Tenant criado com a assinatura padrão", body = AuthResponse),
        (status = 400, description = "Dados inválidos"),
        (status = 409, description = "Contato já cadastrado"),
        (status = 500, description = "Nenhum plano padrão configurado")
    )
)]
pub async fn register(
    State(app_state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let (_, token) = app_state.auth_service.register_tenant(payload).await?;

    Ok((StatusCode::CREATED, Json(AuthResponse { token })))
}

// Handler de login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginPayload,
    responses(
        (status = 200, description = "Token de sessão", body = AuthResponse),
        (status = 401, description = "Credenciais inválidas"),
        (status = 403, description = "Conta desativada")
    )
)]
pub async fn login(
    State(app_state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<AuthResponse>, AppError> {
    payload.validate()?;

    let token = app_state
        .auth_service
        .login(&payload.login, &payload.password)
        .await?;

    Ok(Json(AuthResponse { token }))
}

// Sempre 202: não revelamos se o contato existe.
#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    tag = "Auth",
    request_body = ForgotPasswordPayload,
    responses((status = 202, description = "Se a conta existir, as instruções foram enviadas"))
)]
pub async fn forgot_password(
    State(app_state): State<AppState>,
    Json(payload): Json<ForgotPasswordPayload>,
) -> Result<StatusCode, AppError> {
    payload.validate()?;

    // A entrega do token (e-mail/SMS) é feita por outro serviço.
    app_state.auth_service.forgot_password(&payload.login).await?;

    Ok(StatusCode::ACCEPTED)
}

#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    tag = "Auth",
    request_body = ResetPasswordPayload,
    responses(
        (status = 204, description = "Senha redefinida"),
        (status = 401, description = "Token inválido, expirado ou de outro tipo")
    )
)]
pub async fn reset_password(
    State(app_state): State<AppState>,
    Json(payload): Json<ResetPasswordPayload>,
) -> Result<StatusCode, AppError> {
    payload.validate()?;

    app_state
        .auth_service
        .reset_password(&payload.token, &payload.new_password)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// Handler da rota protegida /me
#[utoipa::path(
    get,
    path = "/api/me",
    tag = "Users",
    responses(
        (status = 200, description = "Principal autenticado e o seu escopo", body = MeResponse),
        (status = 401, description = "Não autenticado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_me(
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    ctx: TenantContext,
) -> Json<MeResponse> {
    Json(MeResponse {
        principal,
        tenant_id: ctx.get_tenant(),
        is_privileged: ctx.is_privileged(),
    })
}
