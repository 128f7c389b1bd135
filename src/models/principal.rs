// src/models/principal.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::AppError;

/// Estado de aprovação do cadastro (alterado apenas por um operador).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "approval_state", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ApprovalState {
    Pending,
    Approved,
    Rejected,
}

/// Discriminador gravado na tabela `principals`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "principal_type", rename_all = "lowercase")]
pub enum PrincipalType {
    Operator,
    Tenant,
}

// ---
// Contato (o `sub` do token)
// ---
// Ou e-mail ou telefone. O enum garante que exatamente um existe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum Contact {
    Email(String),
    Phone(String),
}

impl Contact {
    /// Normaliza o texto recebido: `@` indica e-mail (minúsculo),
    /// caso contrário ficam só os dígitos do telefone.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.contains('@') {
            return Some(Contact::Email(raw.to_lowercase()));
        }

        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            None
        } else {
            Some(Contact::Phone(digits))
        }
    }

    pub fn subject(&self) -> &str {
        match self {
            Contact::Email(value) | Contact::Phone(value) => value,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            Contact::Email(email) => Some(email),
            Contact::Phone(_) => None,
        }
    }

    pub fn phone(&self) -> Option<&str> {
        match self {
            Contact::Phone(phone) => Some(phone),
            Contact::Email(_) => None,
        }
    }
}

// ---
// Variantes do Principal
// ---
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PrincipalKind {
    /// Operador da plataforma: ignora o filtro de tenant.
    Operator {
        department: Option<String>,
        position: Option<String>,
    },
    /// Cliente: o próprio `id` é o `tenant_id` das suas linhas.
    #[serde(rename_all = "camelCase")]
    Tenant { customer_type_id: Option<Uuid> },
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: Uuid,
    pub contact: Contact,

    #[serde(skip_serializing)]
    pub password_hash: String,

    pub is_active: bool,
    pub approval: ApprovalState,
    pub roles: Vec<String>,

    #[serde(flatten)]
    pub kind: PrincipalKind,

    /// Última redefinição de senha; invalida tokens emitidos antes dela.
    #[serde(skip_serializing)]
    pub password_changed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Principal {
    pub fn is_privileged(&self) -> bool {
        matches!(self.kind, PrincipalKind::Operator { .. })
    }

    /// `Some(id)` apenas para a variante tenant.
    pub fn tenant_id(&self) -> Option<Uuid> {
        match self.kind {
            PrincipalKind::Tenant { .. } => Some(self.id),
            PrincipalKind::Operator { .. } => None,
        }
    }
}

/// Dados para criar um principal (cadastro ou provisionamento pelo admin).
#[derive(Debug, Clone)]
pub struct NewPrincipal {
    pub contact: Contact,
    pub password_hash: String,
    pub approval: ApprovalState,
    pub roles: Vec<String>,
    pub kind: PrincipalKind,
}

// Linha "achatada" como vem do banco.
#[derive(Debug, FromRow)]
pub struct PrincipalRow {
    pub id: Uuid,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: String,
    pub is_active: bool,
    pub approval: ApprovalState,
    pub principal_type: PrincipalType,
    pub department: Option<String>,
    pub position: Option<String>,
    pub customer_type_id: Option<Uuid>,
    pub roles: Vec<String>,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PrincipalRow> for Principal {
    type Error = AppError;

    fn try_from(row: PrincipalRow) -> Result<Self, Self::Error> {
        let contact = match (row.email, row.phone) {
            (Some(email), None) => Contact::Email(email),
            (None, Some(phone)) => Contact::Phone(phone),
            _ => {
                return Err(anyhow::anyhow!(
                    "principal {} deve ter exatamente um contato (e-mail ou telefone)",
                    row.id
                )
                .into());
            }
        };

        let kind = match row.principal_type {
            PrincipalType::Operator => PrincipalKind::Operator {
                department: row.department,
                position: row.position,
            },
            PrincipalType::Tenant => PrincipalKind::Tenant {
                customer_type_id: row.customer_type_id,
            },
        };

        Ok(Principal {
            id: row.id,
            contact,
            password_hash: row.password_hash,
            is_active: row.is_active,
            approval: row.approval,
            roles: row.roles,
            kind,
            password_changed_at: row.password_changed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// Payloads dos endpoints de administração
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateApprovalPayload {
    #[schema(example = "approved")]
    pub approval: ApprovalState,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActivePayload {
    pub is_active: bool,
}
