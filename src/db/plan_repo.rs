// src/db/plan_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{common::error::AppError, models::subscription::SubscriptionPlan};

#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<SubscriptionPlan>, AppError>;

    /// O plano marcado como padrão E ativo.
    async fn find_default(&self) -> Result<Option<SubscriptionPlan>, AppError>;

    async fn list(&self, include_inactive: bool) -> Result<Vec<SubscriptionPlan>, AppError>;

    /// Insere ou atualiza. Se `is_default`, desmarca todos os outros planos
    /// na mesma unidade atômica (o último a gravar vence).
    async fn save(&self, plan: &SubscriptionPlan) -> Result<SubscriptionPlan, AppError>;
}

const PLAN_COLUMNS: &str = "id, name, price, currency, duration_days, trial_days, \
     entitlements, is_default, is_active, created_at, updated_at";

#[derive(Clone)]
pub struct PlanRepository {
    pool: PgPool,
}

impl PlanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanStore for PlanRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<SubscriptionPlan>, AppError> {
        let sql = format!("SELECT {PLAN_COLUMNS} FROM subscription_plans WHERE id = $1");
        let plan = sqlx::query_as::<_, SubscriptionPlan>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(plan)
    }

    async fn find_default(&self) -> Result<Option<SubscriptionPlan>, AppError> {
        let sql = format!(
            "SELECT {PLAN_COLUMNS} FROM subscription_plans WHERE is_default AND is_active LIMIT 1"
        );
        let plan = sqlx::query_as::<_, SubscriptionPlan>(&sql)
            .fetch_optional(&self.pool)
            .await?;

        Ok(plan)
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<SubscriptionPlan>, AppError> {
        let sql = format!(
            "SELECT {PLAN_COLUMNS} FROM subscription_plans \
             WHERE is_active OR $1 ORDER BY price, name"
        );
        let plans = sqlx::query_as::<_, SubscriptionPlan>(&sql)
            .bind(include_inactive)
            .fetch_all(&self.pool)
            .await?;

        Ok(plans)
    }

    async fn save(&self, plan: &SubscriptionPlan) -> Result<SubscriptionPlan, AppError> {
        // 1. Inicia a transação: "desmarcar os outros" + "gravar este" são uma coisa só
        let mut tx = self.pool.begin().await?;

        // 2. Garante no máximo um padrão
        if plan.is_default {
            sqlx::query(
                "UPDATE subscription_plans SET is_default = false, updated_at = now() \
                 WHERE is_default AND id <> $1",
            )
            .bind(plan.id)
            .execute(&mut *tx)
            .await?;
        }

        // 3. Upsert do plano
        let sql = format!(
            r#"
            INSERT INTO subscription_plans (
                id, name, price, currency, duration_days, trial_days,
                entitlements, is_default, is_active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price = EXCLUDED.price,
                currency = EXCLUDED.currency,
                duration_days = EXCLUDED.duration_days,
                trial_days = EXCLUDED.trial_days,
                entitlements = EXCLUDED.entitlements,
                is_default = EXCLUDED.is_default,
                is_active = EXCLUDED.is_active,
                updated_at = EXCLUDED.updated_at
            RETURNING {PLAN_COLUMNS}
            "#
        );
        let saved = sqlx::query_as::<_, SubscriptionPlan>(&sql)
            .bind(plan.id)
            .bind(&plan.name)
            .bind(plan.price)
            .bind(&plan.currency)
            .bind(plan.duration_days)
            .bind(plan.trial_days)
            .bind(&plan.entitlements)
            .bind(plan.is_default)
            .bind(plan.is_active)
            .bind(plan.created_at)
            .bind(plan.updated_at)
            .fetch_one(&mut *tx)
            .await?;

        // 4. Commit
        tx.commit().await?;

        if saved.is_default {
            tracing::info!(plan_id = %saved.id, "⭐ Plano '{}' agora é o padrão", saved.name);
        }

        Ok(saved)
    }
}
