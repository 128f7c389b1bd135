// src/db/subscription_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::subscription::{NewSubscription, Subscription},
};

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// O registro criado mais recentemente para o tenant.
    async fn current_for_tenant(&self, tenant_id: Uuid) -> Result<Option<Subscription>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Subscription>, AppError>;

    /// Quantos registros (inclusive histórico) o tenant já teve.
    async fn count_for_tenant(&self, tenant_id: Uuid) -> Result<i64, AppError>;

    /// Cancela qualquer registro TRIAL/ACTIVE do tenant e insere o novo, atomicamente.
    async fn replace_current(&self, new: NewSubscription) -> Result<Subscription, AppError>;

    /// TRIAL/ACTIVE -> EXPIRED. Retorna `false` se nada mudou (idempotente).
    async fn mark_expired(&self, id: Uuid) -> Result<bool, AppError>;

    /// `end_date = max(end_date, now) + days`, status ACTIVE, numa única escrita.
    /// `None` se o registro não existe ou já não é o atual do tenant.
    async fn extend(
        &self,
        id: Uuid,
        days: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, AppError>;

    /// Status CANCELLED e `auto_renew = false`.
    async fn cancel(&self, id: Uuid) -> Result<Option<Subscription>, AppError>;
}

const SUBSCRIPTION_COLUMNS: &str =
    "id, tenant_id, plan_id, start_date, end_date, status, auto_renew, created_at";

#[derive(Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for SubscriptionRepository {
    async fn current_for_tenant(&self, tenant_id: Uuid) -> Result<Option<Subscription>, AppError> {
        // `seq` desempata registros criados no mesmo instante
        let sql = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
             WHERE tenant_id = $1 ORDER BY created_at DESC, seq DESC LIMIT 1"
        );
        let subscription = sqlx::query_as::<_, Subscription>(&sql)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(subscription)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Subscription>, AppError> {
        let sql = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = $1");
        let subscription = sqlx::query_as::<_, Subscription>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(subscription)
    }

    async fn count_for_tenant(&self, tenant_id: Uuid) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn replace_current(&self, new: NewSubscription) -> Result<Subscription, AppError> {
        // 1. Inicia a transação e serializa as escritas do tenant
        let mut tx = self.pool.begin().await?;
        lock_tenant(&mut tx, new.tenant_id).await?;

        // 2. No máximo um registro vivo por tenant
        let cancelled = sqlx::query(
            "UPDATE subscriptions SET status = 'CANCELLED' \
             WHERE tenant_id = $1 AND status IN ('ACTIVE', 'TRIAL')",
        )
        .bind(new.tenant_id)
        .execute(&mut *tx)
        .await?;

        if cancelled.rows_affected() > 0 {
            tracing::info!(tenant_id = %new.tenant_id, "Assinatura anterior cancelada pela nova atribuição");
        }

        // 3. Insere o novo registro
        let sql = format!(
            r#"
            INSERT INTO subscriptions (tenant_id, plan_id, start_date, end_date, status, auto_renew)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        );
        let subscription = sqlx::query_as::<_, Subscription>(&sql)
            .bind(new.tenant_id)
            .bind(new.plan_id)
            .bind(new.start_date)
            .bind(new.end_date)
            .bind(new.status)
            .bind(new.auto_renew)
            .fetch_one(&mut *tx)
            .await?;

        // 4. Commit
        tx.commit().await?;

        Ok(subscription)
    }

    async fn mark_expired(&self, id: Uuid) -> Result<bool, AppError> {
        let updated = sqlx::query(
            "UPDATE subscriptions SET status = 'EXPIRED' \
             WHERE id = $1 AND status IN ('ACTIVE', 'TRIAL')",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() > 0)
    }

    async fn extend(
        &self,
        id: Uuid,
        days: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, AppError> {
        let mut tx = self.pool.begin().await?;

        // 1. Dono do registro
        let tenant_id: Option<Uuid> =
            sqlx::query_scalar("SELECT tenant_id FROM subscriptions WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(tenant_id) = tenant_id else {
            return Ok(None);
        };

        // 2. Mesmo lock do `replace_current`: nenhuma troca de plano no meio
        lock_tenant(&mut tx, tenant_id).await?;

        // 3. Conta e escrita num único UPDATE, só se ainda for o registro atual
        let sql = format!(
            r#"
            UPDATE subscriptions
            SET end_date = GREATEST(end_date, $3) + make_interval(days => $2),
                status = 'ACTIVE'
            WHERE id = $1
              AND id = (
                  SELECT id FROM subscriptions
                  WHERE tenant_id = $4
                  ORDER BY created_at DESC, seq DESC
                  LIMIT 1
              )
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        );
        let subscription = sqlx::query_as::<_, Subscription>(&sql)
            .bind(id)
            .bind(days)
            .bind(now)
            .bind(tenant_id)
            .fetch_optional(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(subscription)
    }

    async fn cancel(&self, id: Uuid) -> Result<Option<Subscription>, AppError> {
        let sql = format!(
            "UPDATE subscriptions SET status = 'CANCELLED', auto_renew = false \
             WHERE id = $1 RETURNING {SUBSCRIPTION_COLUMNS}"
        );
        let subscription = sqlx::query_as::<_, Subscription>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(subscription)
    }
}

/// Lock transacional por tenant para as escritas que mexem no registro atual.
async fn lock_tenant(tx: &mut Transaction<'_, Postgres>, tenant_id: Uuid) -> Result<(), AppError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1::text))")
        .bind(tenant_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
