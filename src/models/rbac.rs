// src/models/rbac.rs

use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

// Cargo com as permissões que concede (checagem grossa por rota).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    #[schema(example = "admin")]
    pub name: String,

    pub description: Option<String>,

    #[schema(example = json!(["plans:manage", "subscriptions:manage"]))]
    pub permissions: Vec<String>,
}
