// src/db/principal_repo.rs

use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::{db_utils::map_unique_violation, error::AppError},
    models::principal::{
        ApprovalState, Contact, NewPrincipal, Principal, PrincipalKind, PrincipalRow, PrincipalType,
    },
};

/// Acesso aos principals (operadores e clientes).
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, AppError>;

    /// Busca por e-mail OU telefone, conforme a variante do contato.
    async fn find_by_contact(&self, contact: &Contact) -> Result<Option<Principal>, AppError>;

    async fn create(&self, new: NewPrincipal) -> Result<Principal, AppError>;

    async fn set_approval(
        &self,
        id: Uuid,
        approval: ApprovalState,
    ) -> Result<Option<Principal>, AppError>;

    async fn set_active(&self, id: Uuid, is_active: bool) -> Result<Option<Principal>, AppError>;

    /// Grava o novo hash e carimba `password_changed_at`.
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool, AppError>;

    /// Remove um principal recém-criado (desfaz um cadastro incompleto).
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

// Os cargos vêm da tabela-ponte, agregados num array.
const SELECT_PRINCIPAL: &str = r#"
    SELECT
        p.id, p.email, p.phone, p.password_hash, p.is_active, p.approval,
        p.principal_type, p.department, p.position, p.customer_type_id,
        p.password_changed_at,
        COALESCE(
            array_agg(pr.role_name) FILTER (WHERE pr.role_name IS NOT NULL),
            '{}'
        ) AS roles,
        p.created_at, p.updated_at
    FROM principals p
    LEFT JOIN principal_roles pr ON pr.principal_id = p.id
"#;

#[derive(Clone)]
pub struct PrincipalRepository {
    pool: PgPool,
}

impl PrincipalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where<T>(
        &self,
        condition: &str,
        value: T,
    ) -> Result<Option<Principal>, AppError>
    where
        T: for<'q> sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres> + Send + 'static,
    {
        let sql = format!("{SELECT_PRINCIPAL} WHERE {condition} GROUP BY p.id");
        let row = sqlx::query_as::<_, PrincipalRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Principal::try_from).transpose()
    }
}

#[async_trait]
impl PrincipalStore for PrincipalRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, AppError> {
        self.fetch_one_where("p.id = $1", id).await
    }

    async fn find_by_contact(&self, contact: &Contact) -> Result<Option<Principal>, AppError> {
        match contact {
            Contact::Email(email) => self.fetch_one_where("p.email = $1", email.clone()).await,
            Contact::Phone(phone) => self.fetch_one_where("p.phone = $1", phone.clone()).await,
        }
    }

    async fn create(&self, new: NewPrincipal) -> Result<Principal, AppError> {
        let (principal_type, department, position, customer_type_id) = match &new.kind {
            PrincipalKind::Operator { department, position } => {
                (PrincipalType::Operator, department.clone(), position.clone(), None)
            }
            PrincipalKind::Tenant { customer_type_id } => {
                (PrincipalType::Tenant, None, None, *customer_type_id)
            }
        };

        // Principal + cargos na mesma transação
        let mut tx = self.pool.begin().await?;

        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO principals (
                email, phone, password_hash, approval,
                principal_type, department, position, customer_type_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(new.contact.email())
        .bind(new.contact.phone())
        .bind(&new.password_hash)
        .bind(new.approval)
        .bind(principal_type)
        .bind(department)
        .bind(position)
        .bind(customer_type_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, AppError::ContactAlreadyExists))?;

        if !new.roles.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO principal_roles (principal_id, role_name)
                SELECT $1, unnest($2::text[])
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(id)
            .bind(&new.roles)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("principal {} sumiu logo após o insert", id).into())
    }

    async fn set_approval(
        &self,
        id: Uuid,
        approval: ApprovalState,
    ) -> Result<Option<Principal>, AppError> {
        let updated = sqlx::query("UPDATE principals SET approval = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(approval)
            .execute(&self.pool)
            .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> Result<Option<Principal>, AppError> {
        let updated = sqlx::query("UPDATE principals SET is_active = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(is_active)
            .execute(&self.pool)
            .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool, AppError> {
        let updated = sqlx::query(
            "UPDATE principals
             SET password_hash = $2, password_changed_at = now(), updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let deleted = sqlx::query("DELETE FROM principals WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(deleted.rows_affected() > 0)
    }
}
