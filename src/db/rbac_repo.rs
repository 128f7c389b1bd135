// src/db/rbac_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{common::error::AppError, models::rbac::Role};

#[async_trait]
pub trait RbacStore: Send + Sync {
    /// União das permissões concedidas pelos cargos informados.
    async fn permissions_for_roles(&self, roles: &[String]) -> Result<Vec<String>, AppError>;

    /// Cria ou substitui o cargo e a sua lista de permissões.
    async fn save_role(&self, role: &Role) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct RbacRepository {
    pool: PgPool,
}

impl RbacRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RbacStore for RbacRepository {
    async fn permissions_for_roles(&self, roles: &[String]) -> Result<Vec<String>, AppError> {
        if roles.is_empty() {
            return Ok(Vec::new());
        }

        let permissions: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT permission_name
            FROM role_permissions
            WHERE role_name = ANY($1)
            ORDER BY permission_name
            "#,
        )
        .bind(roles)
        .fetch_all(&self.pool)
        .await?;

        Ok(permissions)
    }

    async fn save_role(&self, role: &Role) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        // 1. O cargo
        sqlx::query(
            r#"
            INSERT INTO roles (name, description) VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET description = EXCLUDED.description
            "#,
        )
        .bind(&role.name)
        .bind(&role.description)
        .execute(&mut *tx)
        .await?;

        // 2. As permissões (catálogo)
        sqlx::query("INSERT INTO permissions (name) SELECT unnest($1::text[]) ON CONFLICT DO NOTHING")
            .bind(&role.permissions)
            .execute(&mut *tx)
            .await?;

        // 3. Substitui o vínculo Cargo <-> Permissão
        sqlx::query("DELETE FROM role_permissions WHERE role_name = $1")
            .bind(&role.name)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO role_permissions (role_name, permission_name)
            SELECT $1, unnest($2::text[])
            "#,
        )
        .bind(&role.name)
        .bind(&role.permissions)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
