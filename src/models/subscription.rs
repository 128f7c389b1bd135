// src/models/subscription.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "subscription_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum SubscriptionStatus {
    Trial,
    Active,
    Expired,
    Cancelled,
}

impl SubscriptionStatus {
    /// TRIAL e ACTIVE dão acesso; EXPIRED e CANCELLED são terminais.
    pub fn is_live(self) -> bool {
        matches!(self, SubscriptionStatus::Trial | SubscriptionStatus::Active)
    }
}

// ---
// Direitos do plano (JSONB)
// ---
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Entitlements {
    /// Limite por funcionalidade. Ausente = ilimitado.
    #[serde(default)]
    #[schema(example = json!({"products": 100}))]
    pub features: BTreeMap<String, i64>,

    #[serde(default)]
    #[schema(example = json!(["products", "projects"]))]
    pub modules: Vec<String>,
}

impl Entitlements {
    pub fn has_module(&self, module: &str) -> bool {
        self.modules.iter().any(|m| m == module)
    }

    pub fn limit(&self, feature: &str) -> FeatureLimit {
        match self.features.get(feature) {
            Some(limit) => FeatureLimit::Limited(*limit),
            None => FeatureLimit::Unbounded,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FeatureLimit {
    Limited(i64),
    Unbounded,
}

// ---
// Plano
// ---
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPlan {
    pub id: Uuid,

    #[schema(example = "Profissional")]
    pub name: String,

    #[schema(example = 99.9)]
    pub price: Decimal,

    #[schema(example = "BRL")]
    pub currency: String,

    #[schema(example = 30)]
    pub duration_days: i32,

    #[schema(example = 7)]
    pub trial_days: i32,

    #[schema(value_type = Entitlements)]
    pub entitlements: Json<Entitlements>,

    pub is_default: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn validate_price(price: &Decimal) -> Result<(), validator::ValidationError> {
    if price.is_sign_negative() {
        let mut err = validator::ValidationError::new("range");
        err.message = Some("O preço não pode ser negativo.".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlanPayload {
    #[validate(length(min = 1, message = "O nome do plano é obrigatório."))]
    pub name: String,

    #[validate(custom(function = "validate_price"))]
    pub price: Decimal,

    #[validate(length(equal = 3, message = "A moeda deve ter 3 letras (ISO 4217)."))]
    #[schema(example = "BRL")]
    pub currency: String,

    #[validate(range(min = 1, max = 36_500, message = "A duração deve ficar entre 1 e 36500 dias."))]
    pub duration_days: i32,

    #[validate(range(min = 0, max = 36_500, message = "Os dias de teste devem ficar entre 0 e 36500."))]
    #[serde(default)]
    pub trial_days: i32,

    #[serde(default)]
    pub entitlements: Entitlements,

    #[serde(default)]
    pub is_default: bool,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Correção administrativa de um plano. Campos ausentes ficam como estão.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlanPayload {
    #[validate(length(min = 1, message = "O nome do plano é obrigatório."))]
    pub name: Option<String>,

    #[validate(custom(function = "validate_price"))]
    pub price: Option<Decimal>,

    #[validate(length(equal = 3, message = "A moeda deve ter 3 letras (ISO 4217)."))]
    pub currency: Option<String>,

    #[validate(range(min = 1, max = 36_500, message = "A duração deve ficar entre 1 e 36500 dias."))]
    pub duration_days: Option<i32>,

    #[validate(range(min = 0, max = 36_500, message = "Os dias de teste devem ficar entre 0 e 36500."))]
    pub trial_days: Option<i32>,

    pub entitlements: Option<Entitlements>,
    pub is_default: Option<bool>,
    pub is_active: Option<bool>,
}

// ---
// Assinatura
// ---
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub plan_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: SubscriptionStatus,
    pub auto_renew: bool,
    pub created_at: DateTime<Utc>,
}

/// Registro a ser gravado (o serviço calcula datas e status).
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub tenant_id: Uuid,
    pub plan_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: SubscriptionStatus,
    pub auto_renew: bool,
}

/// Resultado da avaliação de validade (já com a expiração preguiçosa aplicada).
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionCheck {
    pub active: bool,
    pub status: Option<SubscriptionStatus>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionOverview {
    pub subscription: Subscription,
    pub plan: SubscriptionPlan,
    pub active: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignSubscriptionPayload {
    pub tenant_id: Uuid,
    pub plan_id: Uuid,

    #[validate(range(min = 1, max = 36_500, message = "A duração deve ficar entre 1 e 36500 dias."))]
    pub duration_days: Option<i32>,
}

/// Evento opaco "pagamento confirmado" enviado pelo gateway.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmedPayload {
    pub tenant_id: Uuid,
    pub plan_id: Uuid,

    #[schema(example = "pay_01HZX")]
    pub reference: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_feature_limit_means_unbounded() {
        let entitlements = Entitlements {
            features: BTreeMap::from([("products".to_string(), 10)]),
            modules: vec!["products".into()],
        };

        assert_eq!(entitlements.limit("products"), FeatureLimit::Limited(10));
        assert_eq!(entitlements.limit("projects"), FeatureLimit::Unbounded);
        assert!(entitlements.has_module("products"));
        assert!(!entitlements.has_module("blog"));
    }

    #[test]
    fn status_serializes_uppercase() {
        assert_eq!(
            serde_json::to_value(SubscriptionStatus::Expired).unwrap(),
            json!("EXPIRED")
        );
    }

    #[test]
    fn plan_periods_are_bounded() {
        let payload: CreatePlanPayload = serde_json::from_value(json!({
            "name": "Eterno",
            "price": 10.0,
            "currency": "BRL",
            "durationDays": 200_000_000,
        }))
        .unwrap();
        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("duration_days"));

        let update = UpdatePlanPayload {
            trial_days: Some(i32::MAX),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }
}
