// src/models/product.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// Conteúdo de exemplo pertencente ao tenant (o "módulo de produtos").
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub tenant_id: Uuid,

    #[schema(example = "Consultoria Mensal")]
    pub name: String,

    pub description: Option<String>,

    #[schema(example = 1500.0)]
    pub price: Decimal,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Campos gravados na criação. O `tenant_id` é decidido pela camada de escopo.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductPayload {
    /// Ignorado para clientes; obrigatório para operadores.
    pub tenant_id: Option<Uuid>,

    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    pub name: String,

    pub description: Option<String>,

    #[serde(default)]
    pub price: Decimal,
}

impl CreateProductPayload {
    pub fn into_parts(self) -> (Option<Uuid>, NewProduct) {
        (
            self.tenant_id,
            NewProduct {
                name: self.name,
                description: self.description,
                price: self.price,
            },
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductPayload {
    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
}
