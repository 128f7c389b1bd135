// src/services/subscription_service.rs

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{PlanStore, PrincipalStore, SubscriptionStore},
    models::subscription::{
        FeatureLimit, NewSubscription, Subscription, SubscriptionCheck, SubscriptionOverview,
        SubscriptionPlan, SubscriptionStatus,
    },
};

// Dono de todas as transições de status de uma assinatura.
#[derive(Clone)]
pub struct SubscriptionService {
    plans: Arc<dyn PlanStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    principals: Arc<dyn PrincipalStore>,
}

impl SubscriptionService {
    pub fn new(
        plans: Arc<dyn PlanStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        principals: Arc<dyn PrincipalStore>,
    ) -> Self {
        Self {
            plans,
            subscriptions,
            principals,
        }
    }

    /// Plano padrão e ativo, ou erro de configuração.
    pub async fn default_plan(&self) -> Result<SubscriptionPlan, AppError> {
        self.plans.find_default().await?.ok_or(AppError::NoDefaultPlan)
    }

    /// Primeira assinatura de um tenant recém-cadastrado.
    /// Os dias de teste só entram se o tenant nunca teve registro algum.
    pub async fn assign_default(&self, tenant_id: Uuid) -> Result<Subscription, AppError> {
        // 1. Sem plano padrão, nada é criado
        let plan = self.default_plan().await?;

        // 2. Trial apenas na primeira atribuição
        let first_assignment = self.subscriptions.count_for_tenant(tenant_id).await? == 0;
        let trial_days = if first_assignment { plan.trial_days.max(0) } else { 0 };

        let status = if trial_days > 0 {
            SubscriptionStatus::Trial
        } else {
            SubscriptionStatus::Active
        };

        // 3. Grava (cancelando qualquer registro vivo)
        let now = Utc::now();
        let total_days = plan
            .duration_days
            .checked_add(trial_days)
            .ok_or_else(|| period_overflow(plan.duration_days))?;
        let subscription = self
            .subscriptions
            .replace_current(NewSubscription {
                tenant_id,
                plan_id: plan.id,
                start_date: now,
                end_date: period_end(now, total_days)?,
                status,
                auto_renew: true,
            })
            .await?;

        tracing::info!(
            %tenant_id,
            plan_id = %plan.id,
            status = ?subscription.status,
            "📝 Plano padrão atribuído até {}",
            subscription.end_date
        );

        Ok(subscription)
    }

    /// Atribui um plano explícito (admin ou pagamento confirmado).
    pub async fn assign(
        &self,
        tenant_id: Uuid,
        plan_id: Uuid,
        duration_days: Option<i32>,
    ) -> Result<Subscription, AppError> {
        // 1. O destino precisa ser um tenant
        let is_tenant = self
            .principals
            .find_by_id(tenant_id)
            .await?
            .is_some_and(|p| p.tenant_id().is_some());
        if !is_tenant {
            return Err(AppError::NotFound("Tenant"));
        }

        // 2. Plano existente e ativo
        let plan = self
            .plans
            .find_by_id(plan_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or(AppError::PlanUnavailable(plan_id))?;

        // 3. Cancela o vivo e cria o novo ACTIVE numa única unidade atômica
        let now = Utc::now();
        let subscription = self
            .subscriptions
            .replace_current(NewSubscription {
                tenant_id,
                plan_id: plan.id,
                start_date: now,
                end_date: period_end(now, duration_days.unwrap_or(plan.duration_days))?,
                status: SubscriptionStatus::Active,
                auto_renew: true,
            })
            .await?;

        tracing::info!(%tenant_id, %plan_id, "📝 Plano atribuído até {}", subscription.end_date);

        Ok(subscription)
    }

    /// Avalia a assinatura atual. Se a data final já passou, o registro vira
    /// EXPIRED aqui mesmo (transição preguiçosa e idempotente).
    pub async fn evaluate(&self, tenant_id: Uuid) -> Result<SubscriptionCheck, AppError> {
        let Some(mut current) = self.subscriptions.current_for_tenant(tenant_id).await? else {
            return Ok(SubscriptionCheck {
                active: false,
                status: None,
                expires_at: None,
            });
        };

        if current.end_date < Utc::now() {
            if self.subscriptions.mark_expired(current.id).await? {
                tracing::info!(%tenant_id, subscription_id = %current.id, "⌛ Assinatura expirada");
            }
            if current.status.is_live() {
                current.status = SubscriptionStatus::Expired;
            }
            return Ok(SubscriptionCheck {
                active: false,
                status: Some(current.status),
                expires_at: Some(current.end_date),
            });
        }

        Ok(SubscriptionCheck {
            active: current.status.is_live(),
            status: Some(current.status),
            expires_at: Some(current.end_date),
        })
    }

    pub async fn is_active(&self, tenant_id: Uuid) -> Result<bool, AppError> {
        Ok(self.evaluate(tenant_id).await?.active)
    }

    /// Estende a partir do maior entre "agora" e o fim atual: renovar cedo não
    /// encurta o período pago.
    pub async fn renew(&self, subscription_id: Uuid) -> Result<Subscription, AppError> {
        // 1. O registro precisa existir
        let subscription = self
            .subscriptions
            .find_by_id(subscription_id)
            .await?
            .ok_or(AppError::NotFound("Assinatura"))?;

        let plan = self
            .plans
            .find_by_id(subscription.plan_id)
            .await?
            .ok_or(AppError::PlanUnavailable(subscription.plan_id))?;

        // 2. Conta + escrita numa única operação do store, que só toca o
        // registro atual do tenant (senão teríamos dois vivos)
        let now = Utc::now();
        period_end(subscription.end_date.max(now), plan.duration_days)?;

        let renewed = self
            .subscriptions
            .extend(subscription.id, plan.duration_days, now)
            .await?
            .ok_or(AppError::SubscriptionNotCurrent(subscription.id))?;

        tracing::info!(
            tenant_id = %renewed.tenant_id,
            subscription_id = %renewed.id,
            "🔁 Assinatura renovada até {}",
            renewed.end_date
        );

        Ok(renewed)
    }

    pub async fn cancel(&self, subscription_id: Uuid) -> Result<Subscription, AppError> {
        let cancelled = self
            .subscriptions
            .cancel(subscription_id)
            .await?
            .ok_or(AppError::NotFound("Assinatura"))?;

        tracing::info!(tenant_id = %cancelled.tenant_id, subscription_id = %cancelled.id, "🛑 Assinatura cancelada");

        Ok(cancelled)
    }

    /// Contrato com o gateway de pagamento: renova se o pagamento é do plano
    /// atual (e o registro ainda não foi cancelado), senão atribui o plano pago.
    pub async fn confirm_payment(
        &self,
        tenant_id: Uuid,
        plan_id: Uuid,
    ) -> Result<Subscription, AppError> {
        let current = self.subscriptions.current_for_tenant(tenant_id).await?;

        match current {
            Some(current)
                if current.plan_id == plan_id && current.status != SubscriptionStatus::Cancelled =>
            {
                self.renew(current.id).await
            }
            _ => self.assign(tenant_id, plan_id, None).await,
        }
    }

    pub async fn has_module(&self, tenant_id: Uuid, module: &str) -> Result<bool, AppError> {
        Ok(self
            .current_plan(tenant_id)
            .await?
            .is_some_and(|plan| plan.entitlements.has_module(module)))
    }

    /// `None` = sem assinatura (sem acesso). Limite ausente no plano = ilimitado.
    pub async fn feature_limit(
        &self,
        tenant_id: Uuid,
        feature: &str,
    ) -> Result<Option<FeatureLimit>, AppError> {
        Ok(self
            .current_plan(tenant_id)
            .await?
            .map(|plan| plan.entitlements.limit(feature)))
    }

    /// Assinatura atual + plano + validade, para o próprio tenant.
    pub async fn overview(&self, tenant_id: Uuid) -> Result<Option<SubscriptionOverview>, AppError> {
        let check = self.evaluate(tenant_id).await?;

        let Some(subscription) = self.subscriptions.current_for_tenant(tenant_id).await? else {
            return Ok(None);
        };
        let plan = self
            .plans
            .find_by_id(subscription.plan_id)
            .await?
            .ok_or(AppError::PlanUnavailable(subscription.plan_id))?;

        Ok(Some(SubscriptionOverview {
            subscription,
            plan,
            active: check.active,
        }))
    }

    async fn current_plan(&self, tenant_id: Uuid) -> Result<Option<SubscriptionPlan>, AppError> {
        let Some(subscription) = self.subscriptions.current_for_tenant(tenant_id).await? else {
            return Ok(None);
        };
        self.plans.find_by_id(subscription.plan_id).await
    }
}

/// `from + days`, ou erro quando o período sai do calendário suportado.
pub(crate) fn period_end(from: DateTime<Utc>, days: i32) -> Result<DateTime<Utc>, AppError> {
    Duration::try_days(i64::from(days))
        .and_then(|delta| from.checked_add_signed(delta))
        .ok_or_else(|| period_overflow(days))
}

fn period_overflow(days: i32) -> AppError {
    anyhow::anyhow!("período de {days} dias fora do intervalo suportado").into()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;
    use sqlx::types::Json;

    use super::*;
    use crate::{
        db::MemoryStore,
        models::{
            principal::{ApprovalState, Contact, NewPrincipal, PrincipalKind},
            subscription::Entitlements,
        },
    };

    struct Fixture {
        store: MemoryStore,
        service: SubscriptionService,
    }

    fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let service = SubscriptionService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
        );
        Fixture { store, service }
    }

    fn plan(duration_days: i32, trial_days: i32, is_default: bool) -> SubscriptionPlan {
        let now = Utc::now();
        SubscriptionPlan {
            id: Uuid::new_v4(),
            name: format!("Plano {duration_days}d"),
            price: Decimal::new(4990, 2),
            currency: "BRL".into(),
            duration_days,
            trial_days,
            entitlements: Json(Entitlements {
                features: BTreeMap::from([("products".to_string(), 5)]),
                modules: vec!["products".into()],
            }),
            is_default,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    async fn tenant(store: &MemoryStore) -> Uuid {
        PrincipalStore::create(
            store,
            NewPrincipal {
                contact: Contact::Email(format!("{}@example.com", Uuid::new_v4())),
                password_hash: "hash".into(),
                approval: ApprovalState::Approved,
                roles: vec![],
                kind: PrincipalKind::Tenant {
                    customer_type_id: None,
                },
            },
        )
        .await
        .unwrap()
        .id
    }

    fn assert_close(actual: DateTime<Utc>, expected: DateTime<Utc>) {
        let drift = (actual - expected).num_seconds().abs();
        assert!(drift <= 5, "esperado ~{expected}, veio {actual}");
    }

    #[tokio::test]
    async fn assign_default_without_default_plan_is_a_configuration_error() {
        let f = fixture();
        f.store.save(&plan(30, 0, false)).await.unwrap();
        let tenant_id = tenant(&f.store).await;

        let result = f.service.assign_default(tenant_id).await;

        assert!(matches!(result, Err(AppError::NoDefaultPlan)));
        assert!(f.store.current_for_tenant(tenant_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn first_assignment_of_trial_plan_adds_trial_days() {
        let f = fixture();
        f.store.save(&plan(30, 7, true)).await.unwrap();
        let tenant_id = tenant(&f.store).await;

        let subscription = f.service.assign_default(tenant_id).await.unwrap();

        assert_eq!(subscription.status, SubscriptionStatus::Trial);
        assert_close(subscription.end_date, Utc::now() + Duration::days(37));
    }

    #[tokio::test]
    async fn later_default_assignment_gets_no_trial() {
        let f = fixture();
        f.store.save(&plan(30, 7, true)).await.unwrap();
        let tenant_id = tenant(&f.store).await;

        f.service.assign_default(tenant_id).await.unwrap();
        let second = f.service.assign_default(tenant_id).await.unwrap();

        assert_eq!(second.status, SubscriptionStatus::Active);
        assert_close(second.end_date, Utc::now() + Duration::days(30));
    }

    #[tokio::test]
    async fn assign_cancels_the_live_record_and_uses_custom_duration() {
        let f = fixture();
        let default = plan(30, 7, true);
        let premium = plan(90, 0, false);
        f.store.save(&default).await.unwrap();
        f.store.save(&premium).await.unwrap();
        let tenant_id = tenant(&f.store).await;

        let first = f.service.assign_default(tenant_id).await.unwrap();
        let second = f.service.assign(tenant_id, premium.id, Some(10)).await.unwrap();

        assert_eq!(second.status, SubscriptionStatus::Active);
        assert_close(second.end_date, Utc::now() + Duration::days(10));

        let first = SubscriptionStore::find_by_id(&f.store, first.id).await.unwrap().unwrap();
        assert_eq!(first.status, SubscriptionStatus::Cancelled);
    }

    #[tokio::test]
    async fn assign_rejects_inactive_or_missing_plans() {
        let f = fixture();
        let mut inactive = plan(30, 0, false);
        inactive.is_active = false;
        f.store.save(&inactive).await.unwrap();
        let tenant_id = tenant(&f.store).await;

        assert!(matches!(
            f.service.assign(tenant_id, inactive.id, None).await,
            Err(AppError::PlanUnavailable(_))
        ));
        assert!(matches!(
            f.service.assign(tenant_id, Uuid::new_v4(), None).await,
            Err(AppError::PlanUnavailable(_))
        ));
        assert!(matches!(
            f.service.assign(Uuid::new_v4(), inactive.id, None).await,
            Err(AppError::NotFound("Tenant"))
        ));
    }

    async fn insert_ending_at(f: &Fixture, tenant_id: Uuid, plan_id: Uuid, end: DateTime<Utc>) -> Subscription {
        let subscription = Subscription {
            id: Uuid::new_v4(),
            tenant_id,
            plan_id,
            start_date: end - Duration::days(30),
            end_date: end,
            status: SubscriptionStatus::Active,
            auto_renew: true,
            created_at: Utc::now(),
        };
        f.store.insert_subscription(subscription.clone()).await;
        subscription
    }

    #[tokio::test]
    async fn expired_subscription_transitions_once() {
        let f = fixture();
        let p = plan(30, 0, true);
        f.store.save(&p).await.unwrap();
        let tenant_id = tenant(&f.store).await;
        let yesterday = Utc::now() - Duration::days(1);
        insert_ending_at(&f, tenant_id, p.id, yesterday).await;

        let first = f.service.evaluate(tenant_id).await.unwrap();
        assert!(!first.active);
        assert_eq!(first.status, Some(SubscriptionStatus::Expired));
        assert_eq!(first.expires_at, Some(yesterday));

        // Segunda leitura: nada muda
        assert!(!f.service.is_active(tenant_id).await.unwrap());
        let current = f.store.current_for_tenant(tenant_id).await.unwrap().unwrap();
        assert_eq!(current.status, SubscriptionStatus::Expired);
    }

    #[tokio::test]
    async fn no_subscription_is_inactive_without_status() {
        let f = fixture();
        let check = f.service.evaluate(Uuid::new_v4()).await.unwrap();
        assert_eq!(
            check,
            SubscriptionCheck {
                active: false,
                status: None,
                expires_at: None
            }
        );
    }

    #[tokio::test]
    async fn cancelled_subscription_is_inactive_and_stays_cancelled() {
        let f = fixture();
        f.store.save(&plan(30, 0, true)).await.unwrap();
        let tenant_id = tenant(&f.store).await;

        let subscription = f.service.assign_default(tenant_id).await.unwrap();
        let cancelled = f.service.cancel(subscription.id).await.unwrap();
        assert_eq!(cancelled.status, SubscriptionStatus::Cancelled);
        assert!(!cancelled.auto_renew);

        let check = f.service.evaluate(tenant_id).await.unwrap();
        assert!(!check.active);
        assert_eq!(check.status, Some(SubscriptionStatus::Cancelled));
    }

    #[tokio::test]
    async fn renewal_never_shortens_the_paid_period() {
        let f = fixture();
        let p = plan(30, 0, true);
        f.store.save(&p).await.unwrap();

        // Ainda vigente: estende a partir do fim atual
        let early_tenant = tenant(&f.store).await;
        let future_end = Utc::now() + Duration::days(10);
        let early = insert_ending_at(&f, early_tenant, p.id, future_end).await;
        let renewed = f.service.renew(early.id).await.unwrap();
        assert_eq!(renewed.end_date, future_end + Duration::days(30));
        assert_eq!(renewed.status, SubscriptionStatus::Active);

        // Já vencida: estende a partir de agora
        let late_tenant = tenant(&f.store).await;
        let past_end = Utc::now() - Duration::days(10);
        let late = insert_ending_at(&f, late_tenant, p.id, past_end).await;
        f.service.evaluate(late_tenant).await.unwrap();
        let renewed = f.service.renew(late.id).await.unwrap();
        assert!(renewed.end_date >= past_end.max(Utc::now()));
        assert_close(renewed.end_date, Utc::now() + Duration::days(30));
        assert!(f.service.is_active(late_tenant).await.unwrap());
    }

    #[tokio::test]
    async fn renew_of_missing_or_old_record_fails() {
        let f = fixture();
        let p = plan(30, 0, true);
        f.store.save(&p).await.unwrap();
        let tenant_id = tenant(&f.store).await;

        assert!(matches!(
            f.service.renew(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));

        let old = f.service.assign_default(tenant_id).await.unwrap();
        f.service.assign(tenant_id, p.id, None).await.unwrap();
        assert!(matches!(
            f.service.renew(old.id).await,
            Err(AppError::SubscriptionNotCurrent(_))
        ));
    }

    #[tokio::test]
    async fn entitlements_follow_the_current_plan() {
        let f = fixture();
        f.store.save(&plan(30, 0, true)).await.unwrap();
        let tenant_id = tenant(&f.store).await;

        assert!(!f.service.has_module(tenant_id, "products").await.unwrap());
        assert_eq!(f.service.feature_limit(tenant_id, "products").await.unwrap(), None);

        f.service.assign_default(tenant_id).await.unwrap();

        assert!(f.service.has_module(tenant_id, "products").await.unwrap());
        assert!(!f.service.has_module(tenant_id, "blog").await.unwrap());
        assert_eq!(
            f.service.feature_limit(tenant_id, "products").await.unwrap(),
            Some(FeatureLimit::Limited(5))
        );
        assert_eq!(
            f.service.feature_limit(tenant_id, "projects").await.unwrap(),
            Some(FeatureLimit::Unbounded)
        );
    }

    #[tokio::test]
    async fn payment_for_current_plan_renews_otherwise_assigns() {
        let f = fixture();
        let basic = plan(30, 0, true);
        let premium = plan(365, 0, false);
        f.store.save(&basic).await.unwrap();
        f.store.save(&premium).await.unwrap();
        let tenant_id = tenant(&f.store).await;

        let first = f.service.assign_default(tenant_id).await.unwrap();
        let renewed = f.service.confirm_payment(tenant_id, basic.id).await.unwrap();
        assert_eq!(renewed.id, first.id);
        assert_eq!(renewed.end_date, first.end_date + Duration::days(30));

        let upgraded = f.service.confirm_payment(tenant_id, premium.id).await.unwrap();
        assert_ne!(upgraded.id, first.id);
        assert_eq!(upgraded.plan_id, premium.id);
    }

    #[tokio::test]
    async fn oversized_periods_fail_without_panicking() {
        let f = fixture();
        let huge = plan(200_000_000, 0, true);
        f.store.save(&huge).await.unwrap();
        let tenant_id = tenant(&f.store).await;

        assert!(matches!(
            f.service.assign_default(tenant_id).await,
            Err(AppError::InternalServerError(_))
        ));
        assert!(f.service.assign(tenant_id, huge.id, Some(i32::MAX)).await.is_err());
        assert!(f.store.current_for_tenant(tenant_id).await.unwrap().is_none());

        // Soma de duração + trial que estoura i32
        let overflowing = plan(i32::MAX, 10, true);
        f.store.save(&overflowing).await.unwrap();
        assert!(f.service.assign_default(tenant_id).await.is_err());

        // Renovação de um registro cujo plano tem duração absurda
        let current = insert_ending_at(&f, tenant_id, huge.id, Utc::now()).await;
        assert!(f.service.renew(current.id).await.is_err());
        let untouched = SubscriptionStore::find_by_id(&f.store, current.id).await.unwrap().unwrap();
        assert_eq!(untouched.end_date, current.end_date);
    }

    #[tokio::test]
    async fn superseded_record_is_never_revived_by_extend() {
        let f = fixture();
        let p = plan(30, 0, true);
        f.store.save(&p).await.unwrap();
        let tenant_id = tenant(&f.store).await;

        let old = f.service.assign_default(tenant_id).await.unwrap();
        let new = f.service.assign(tenant_id, p.id, None).await.unwrap();

        // Escrita direta no store, como se a checagem do serviço tivesse corrido antes do assign
        assert!(f.store.extend(old.id, 30, Utc::now()).await.unwrap().is_none());

        let old = SubscriptionStore::find_by_id(&f.store, old.id).await.unwrap().unwrap();
        assert_eq!(old.status, SubscriptionStatus::Cancelled);
        let current = f.store.current_for_tenant(tenant_id).await.unwrap().unwrap();
        assert_eq!(current.id, new.id);
    }
}
