// src/services/plan_service.rs

use std::sync::Arc;

use chrono::Utc;
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::PlanStore,
    models::subscription::{CreatePlanPayload, SubscriptionPlan, UpdatePlanPayload},
};

#[derive(Clone)]
pub struct PlanService {
    plans: Arc<dyn PlanStore>,
}

impl PlanService {
    pub fn new(plans: Arc<dyn PlanStore>) -> Self {
        Self { plans }
    }

    pub async fn create_plan(&self, payload: CreatePlanPayload) -> Result<SubscriptionPlan, AppError> {
        let now = Utc::now();
        let plan = SubscriptionPlan {
            id: Uuid::new_v4(),
            name: payload.name,
            price: payload.price,
            currency: payload.currency.to_uppercase(),
            duration_days: payload.duration_days,
            trial_days: payload.trial_days,
            entitlements: Json(payload.entitlements),
            is_default: payload.is_default,
            is_active: payload.is_active,
            created_at: now,
            updated_at: now,
        };

        self.plans.save(&plan).await
    }

    /// Correção administrativa: aplica só os campos enviados.
    pub async fn update_plan(
        &self,
        id: Uuid,
        payload: UpdatePlanPayload,
    ) -> Result<SubscriptionPlan, AppError> {
        let mut plan = self.get_plan(id).await?;

        if let Some(name) = payload.name {
            plan.name = name;
        }
        if let Some(price) = payload.price {
            plan.price = price;
        }
        if let Some(currency) = payload.currency {
            plan.currency = currency.to_uppercase();
        }
        if let Some(duration_days) = payload.duration_days {
            plan.duration_days = duration_days;
        }
        if let Some(trial_days) = payload.trial_days {
            plan.trial_days = trial_days;
        }
        if let Some(entitlements) = payload.entitlements {
            plan.entitlements = Json(entitlements);
        }
        if let Some(is_default) = payload.is_default {
            plan.is_default = is_default;
        }
        if let Some(is_active) = payload.is_active {
            plan.is_active = is_active;
        }
        plan.updated_at = Utc::now();

        self.plans.save(&plan).await
    }

    pub async fn get_plan(&self, id: Uuid) -> Result<SubscriptionPlan, AppError> {
        self.plans.find_by_id(id).await?.ok_or(AppError::NotFound("Plano"))
    }

    pub async fn list_plans(&self, include_inactive: bool) -> Result<Vec<SubscriptionPlan>, AppError> {
        self.plans.list(include_inactive).await
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::db::MemoryStore;
    use crate::models::subscription::Entitlements;

    fn payload(name: &str, is_default: bool) -> CreatePlanPayload {
        CreatePlanPayload {
            name: name.into(),
            price: Decimal::new(9990, 2),
            currency: "brl".into(),
            duration_days: 30,
            trial_days: 0,
            entitlements: Entitlements::default(),
            is_default,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn marking_a_plan_default_unmarks_every_other() {
        let service = PlanService::new(Arc::new(MemoryStore::new()));

        let basic = service.create_plan(payload("Básico", true)).await.unwrap();
        let pro = service.create_plan(payload("Pro", true)).await.unwrap();

        let defaults: Vec<_> = service
            .list_plans(true)
            .await
            .unwrap()
            .into_iter()
            .filter(|p| p.is_default)
            .collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id, pro.id);

        let basic = service
            .update_plan(
                basic.id,
                UpdatePlanPayload {
                    is_default: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let defaults: Vec<_> = service
            .list_plans(true)
            .await
            .unwrap()
            .into_iter()
            .filter(|p| p.is_default)
            .map(|p| p.id)
            .collect();
        assert_eq!(defaults, vec![basic.id]);
    }

    #[tokio::test]
    async fn update_applies_only_sent_fields() {
        let service = PlanService::new(Arc::new(MemoryStore::new()));
        let plan = service.create_plan(payload("Básico", false)).await.unwrap();
        assert_eq!(plan.currency, "BRL");

        let updated = service
            .update_plan(
                plan.id,
                UpdatePlanPayload {
                    trial_days: Some(14),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.trial_days, 14);
        assert_eq!(updated.name, "Básico");
        assert_eq!(updated.duration_days, 30);

        assert!(matches!(
            service.get_plan(Uuid::new_v4()).await,
            Err(AppError::NotFound("Plano"))
        ));
    }

    #[tokio::test]
    async fn inactive_plans_are_hidden_by_default() {
        let service = PlanService::new(Arc::new(MemoryStore::new()));
        let mut hidden = payload("Legado", false);
        hidden.is_active = false;
        service.create_plan(hidden).await.unwrap();
        service.create_plan(payload("Atual", false)).await.unwrap();

        assert_eq!(service.list_plans(false).await.unwrap().len(), 1);
        assert_eq!(service.list_plans(true).await.unwrap().len(), 2);
    }
}
