// src/handlers/webhooks.rs

use axum::{extract::State, http::HeaderMap, Json};

use crate::{
    common::error::AppError,
    config::AppState,
    models::subscription::{PaymentConfirmedPayload, Subscription},
};

const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

// POST /api/webhooks/payments
// O gateway avisa "pagamento confirmado"; a assinatura é renovada ou trocada.
#[utoipa::path(
    post,
    path = "/api/webhooks/payments",
    tag = "Webhooks",
    request_body = PaymentConfirmedPayload,
    params(("x-webhook-secret" = String, Header, description = "Segredo compartilhado com o gateway")),
    responses(
        (status = 200, description = "Assinatura atualizada", body = Subscription),
        (status = 401, description = "Segredo ausente ou incorreto")
    )
)]
pub async fn payment_confirmed(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<PaymentConfirmedPayload>,
) -> Result<Json<Subscription>, AppError> {
    // Sem segredo configurado, o webhook fica fechado
    let expected = app_state
        .config
        .payment_webhook_secret
        .as_deref()
        .ok_or(AppError::InvalidToken)?;

    let received = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::InvalidToken)?;

    if received != expected {
        tracing::warn!(tenant_id = %payload.tenant_id, "Webhook de pagamento com segredo incorreto");
        return Err(AppError::InvalidToken);
    }

    tracing::info!(
        tenant_id = %payload.tenant_id,
        plan_id = %payload.plan_id,
        reference = ?payload.reference,
        "💳 Pagamento confirmado"
    );

    let subscription = app_state
        .subscription_service
        .confirm_payment(payload.tenant_id, payload.plan_id)
        .await?;

    Ok(Json(subscription))
}
