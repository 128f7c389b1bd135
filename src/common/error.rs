use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::subscription::SubscriptionStatus;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Contato já cadastrado")]
    ContactAlreadyExists,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Não autenticado")]
    Unauthenticated,

    #[error("Acesso negado: {0}")]
    Forbidden(String),

    #[error("Conta desativada")]
    AccountDisabled,

    // Inclui "existe, mas é de outro tenant". Nunca distinguimos os dois casos.
    #[error("{0} não encontrado")]
    NotFound(&'static str),

    #[error("Operador precisa informar o tenant_id")]
    MissingTenantId,

    #[error("Assinatura inativa")]
    SubscriptionInactive {
        status: Option<SubscriptionStatus>,
        expires_at: Option<DateTime<Utc>>,
    },

    #[error("A assinatura {0} não é a atual do tenant")]
    SubscriptionNotCurrent(Uuid),

    #[error("Plano {0} inexistente ou inativo")]
    PlanUnavailable(Uuid),

    // Erro de configuração do operador: não há o que tentar de novo.
    #[error("Nenhum plano padrão ativo configurado")]
    NoDefaultPlan,

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            // Retorna todos os detalhes da validação.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }

            // Negação própria do portão de assinatura: o cliente deve ver "renove seu plano".
            AppError::SubscriptionInactive { status, expires_at } => {
                let body = Json(json!({
                    "error": "Sua assinatura não está ativa. Renove seu plano para continuar.",
                    "status": status,
                    "expiresAt": expires_at,
                }));
                return (StatusCode::PAYMENT_REQUIRED, body).into_response();
            }

            AppError::Forbidden(reason) => {
                let body = Json(json!({ "error": reason }));
                return (StatusCode::FORBIDDEN, body).into_response();
            }

            AppError::NotFound(entity) => {
                let body = Json(json!({ "error": format!("{} não encontrado.", entity) }));
                return (StatusCode::NOT_FOUND, body).into_response();
            }

            AppError::ContactAlreadyExists => (StatusCode::CONFLICT, "Este e-mail ou telefone já está em uso."),
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "Login ou senha inválidos."),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "Token de autenticação inválido ou ausente."),
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, "Autenticação necessária."),
            AppError::AccountDisabled => (StatusCode::FORBIDDEN, "Esta conta está desativada."),
            AppError::MissingTenantId => (StatusCode::BAD_REQUEST, "Informe o tenantId ao gravar como operador."),
            AppError::SubscriptionNotCurrent(_) => (StatusCode::CONFLICT, "Apenas a assinatura atual pode ser renovada."),
            AppError::PlanUnavailable(_) => (StatusCode::UNPROCESSABLE_ENTITY, "Plano inexistente ou inativo."),
            AppError::NoDefaultPlan => {
                tracing::error!("🔥 Nenhum plano padrão ativo configurado");
                (StatusCode::INTERNAL_SERVER_ERROR, "Nenhum plano padrão configurado. Contate o suporte.")
            }

            // Todos os outros erros (DatabaseError, InternalServerError...) viram 500.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Ocorreu um erro inesperado.")
            }
        };

        // Resposta padrão para erros simples que só têm uma mensagem.
        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
