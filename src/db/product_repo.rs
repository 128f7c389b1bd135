// src/db/product_repo.rs

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{db_utils::scoped_connection, error::AppError},
    db::scoped::{Pagination, ReadScope, ScopedBackend, TenantScoped},
    middleware::tenancy::TenantContext,
    models::product::{NewProduct, Product, UpdateProductPayload},
};

/// Backend de produtos como objeto dinâmico (Postgres ou memória).
pub type ProductBackend =
    dyn ScopedBackend<Entity = Product, NewFields = NewProduct, Changes = UpdateProductPayload>;

/// O que os handlers usam: produtos com isolamento de tenant.
pub type ProductRepository = TenantScoped<ProductBackend>;

const PRODUCT_COLUMNS: &str = "id, tenant_id, name, description, price, created_at, updated_at";

#[derive(Clone)]
pub struct ProductStore {
    pool: PgPool,
}

impl ProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScopedBackend for ProductStore {
    type Entity = Product;
    type NewFields = NewProduct;
    type Changes = UpdateProductPayload;

    fn entity_name(&self) -> &'static str {
        "Produto"
    }

    async fn fetch(
        &self,
        ctx: &TenantContext,
        scope: ReadScope,
        id: Uuid,
    ) -> Result<Option<Product>, AppError> {
        let mut conn = scoped_connection(&self.pool, ctx).await?;

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE id = $1 AND ($2::uuid IS NULL OR tenant_id = $2)"
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .bind(scope.tenant_filter())
            .fetch_optional(&mut *conn)
            .await?;

        Ok(product)
    }

    async fn fetch_page(
        &self,
        ctx: &TenantContext,
        scope: ReadScope,
        page: Pagination,
    ) -> Result<Vec<Product>, AppError> {
        let mut conn = scoped_connection(&self.pool, ctx).await?;

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE ($1::uuid IS NULL OR tenant_id = $1) \
             ORDER BY created_at, id OFFSET $2 LIMIT $3"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(scope.tenant_filter())
            .bind(page.offset)
            .bind(page.limit)
            .fetch_all(&mut *conn)
            .await?;

        Ok(products)
    }

    async fn insert(
        &self,
        ctx: &TenantContext,
        tenant_id: Uuid,
        fields: NewProduct,
    ) -> Result<Product, AppError> {
        let mut conn = scoped_connection(&self.pool, ctx).await?;

        let sql = format!(
            "INSERT INTO products (tenant_id, name, description, price) \
             VALUES ($1, $2, $3, $4) RETURNING {PRODUCT_COLUMNS}"
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(tenant_id)
            .bind(&fields.name)
            .bind(&fields.description)
            .bind(fields.price)
            .fetch_one(&mut *conn)
            .await?;

        Ok(product)
    }

    async fn write(
        &self,
        ctx: &TenantContext,
        id: Uuid,
        changes: UpdateProductPayload,
    ) -> Result<Option<Product>, AppError> {
        let mut conn = scoped_connection(&self.pool, ctx).await?;

        let sql = format!(
            r#"
            UPDATE products SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                updated_at = $5
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .bind(&changes.name)
            .bind(&changes.description)
            .bind(changes.price)
            .bind(Utc::now())
            .fetch_optional(&mut *conn)
            .await?;

        Ok(product)
    }

    async fn remove(&self, ctx: &TenantContext, id: Uuid) -> Result<bool, AppError> {
        let mut conn = scoped_connection(&self.pool, ctx).await?;

        let deleted = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(deleted.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    const MIGRATION: &str = include_str!("../../migrations/0001_init.sql");

    #[test]
    fn row_level_security_binds_the_table_owner() {
        assert!(MIGRATION.contains("ALTER TABLE products ENABLE ROW LEVEL SECURITY;"));
        assert!(MIGRATION.contains("ALTER TABLE products FORCE ROW LEVEL SECURITY;"));
        assert!(MIGRATION.contains("CREATE POLICY products_tenant_isolation ON products"));
    }
}
