// src/db/memory.rs
//
// Backend em memória: usado quando não há DATABASE_URL (desenvolvimento local)
// e pelos testes. Cada operação multi-passo roda sob uma única escrita do lock,
// o equivalente das transações do Postgres.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{
        plan_repo::PlanStore,
        principal_repo::PrincipalStore,
        rbac_repo::RbacStore,
        scoped::{Pagination, ReadScope, ScopedBackend},
        subscription_repo::SubscriptionStore,
    },
    middleware::tenancy::TenantContext,
    models::{
        principal::{ApprovalState, Contact, NewPrincipal, Principal},
        product::{NewProduct, Product, UpdateProductPayload},
        rbac::Role,
        subscription::{NewSubscription, Subscription, SubscriptionPlan, SubscriptionStatus},
    },
};

#[derive(Default)]
struct MemoryState {
    principals: HashMap<Uuid, Principal>,
    plans: HashMap<Uuid, SubscriptionPlan>,
    // Em ordem de criação: o último de cada tenant é o atual.
    subscriptions: Vec<Subscription>,
    roles: HashMap<String, Role>,
    products: HashMap<Uuid, Product>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grava um registro de assinatura como está (datas e status incluídos).
    /// Útil para montar cenários, por exemplo uma assinatura já vencida.
    pub async fn insert_subscription(&self, subscription: Subscription) {
        self.state.write().await.subscriptions.push(subscription);
    }
}

#[async_trait]
impl PrincipalStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, AppError> {
        Ok(self.state.read().await.principals.get(&id).cloned())
    }

    async fn find_by_contact(&self, contact: &Contact) -> Result<Option<Principal>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .principals
            .values()
            .find(|p| &p.contact == contact)
            .cloned())
    }

    async fn create(&self, new: NewPrincipal) -> Result<Principal, AppError> {
        let mut state = self.state.write().await;

        if state.principals.values().any(|p| p.contact == new.contact) {
            return Err(AppError::ContactAlreadyExists);
        }

        let now = Utc::now();
        let principal = Principal {
            id: Uuid::new_v4(),
            contact: new.contact,
            password_hash: new.password_hash,
            is_active: true,
            approval: new.approval,
            roles: new.roles,
            kind: new.kind,
            password_changed_at: None,
            created_at: now,
            updated_at: now,
        };
        state.principals.insert(principal.id, principal.clone());

        Ok(principal)
    }

    async fn set_approval(
        &self,
        id: Uuid,
        approval: ApprovalState,
    ) -> Result<Option<Principal>, AppError> {
        let mut state = self.state.write().await;
        Ok(state.principals.get_mut(&id).map(|p| {
            p.approval = approval;
            p.updated_at = Utc::now();
            p.clone()
        }))
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> Result<Option<Principal>, AppError> {
        let mut state = self.state.write().await;
        Ok(state.principals.get_mut(&id).map(|p| {
            p.is_active = is_active;
            p.updated_at = Utc::now();
            p.clone()
        }))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        match state.principals.get_mut(&id) {
            Some(p) => {
                let now = Utc::now();
                p.password_hash = password_hash.to_string();
                p.password_changed_at = Some(now);
                p.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        Ok(state.principals.remove(&id).is_some())
    }
}

#[async_trait]
impl PlanStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<SubscriptionPlan>, AppError> {
        Ok(self.state.read().await.plans.get(&id).cloned())
    }

    async fn find_default(&self) -> Result<Option<SubscriptionPlan>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .plans
            .values()
            .find(|p| p.is_default && p.is_active)
            .cloned())
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<SubscriptionPlan>, AppError> {
        let state = self.state.read().await;
        let mut plans: Vec<SubscriptionPlan> = state
            .plans
            .values()
            .filter(|p| include_inactive || p.is_active)
            .cloned()
            .collect();
        plans.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.name.cmp(&b.name)));
        Ok(plans)
    }

    async fn save(&self, plan: &SubscriptionPlan) -> Result<SubscriptionPlan, AppError> {
        let mut state = self.state.write().await;

        if plan.is_default {
            for other in state.plans.values_mut().filter(|p| p.id != plan.id) {
                other.is_default = false;
            }
        }
        state.plans.insert(plan.id, plan.clone());

        Ok(plan.clone())
    }
}

fn current_of(subscriptions: &[Subscription], tenant_id: Uuid) -> Option<&Subscription> {
    subscriptions.iter().rev().find(|s| s.tenant_id == tenant_id)
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn current_for_tenant(&self, tenant_id: Uuid) -> Result<Option<Subscription>, AppError> {
        let state = self.state.read().await;
        Ok(current_of(&state.subscriptions, tenant_id).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Subscription>, AppError> {
        let state = self.state.read().await;
        Ok(state.subscriptions.iter().find(|s| s.id == id).cloned())
    }

    async fn count_for_tenant(&self, tenant_id: Uuid) -> Result<i64, AppError> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .iter()
            .filter(|s| s.tenant_id == tenant_id)
            .count() as i64)
    }

    async fn replace_current(&self, new: NewSubscription) -> Result<Subscription, AppError> {
        let mut state = self.state.write().await;

        for live in state
            .subscriptions
            .iter_mut()
            .filter(|s| s.tenant_id == new.tenant_id && s.status.is_live())
        {
            live.status = SubscriptionStatus::Cancelled;
        }

        let subscription = Subscription {
            id: Uuid::new_v4(),
            tenant_id: new.tenant_id,
            plan_id: new.plan_id,
            start_date: new.start_date,
            end_date: new.end_date,
            status: new.status,
            auto_renew: new.auto_renew,
            created_at: Utc::now(),
        };
        state.subscriptions.push(subscription.clone());

        Ok(subscription)
    }

    async fn mark_expired(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        match state.subscriptions.iter_mut().find(|s| s.id == id) {
            Some(s) if s.status.is_live() => {
                s.status = SubscriptionStatus::Expired;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn extend(
        &self,
        id: Uuid,
        days: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, AppError> {
        let mut state = self.state.write().await;

        // Checagem e escrita sob o mesmo lock: só o registro atual é estendido
        let Some(tenant_id) = state.subscriptions.iter().find(|s| s.id == id).map(|s| s.tenant_id)
        else {
            return Ok(None);
        };
        if current_of(&state.subscriptions, tenant_id).map(|s| s.id) != Some(id) {
            return Ok(None);
        }

        let Some(subscription) = state.subscriptions.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        let end_date = Duration::try_days(i64::from(days))
            .and_then(|delta| subscription.end_date.max(now).checked_add_signed(delta))
            .ok_or_else(|| anyhow::anyhow!("período de {days} dias fora do intervalo suportado"))?;

        subscription.end_date = end_date;
        subscription.status = SubscriptionStatus::Active;
        Ok(Some(subscription.clone()))
    }

    async fn cancel(&self, id: Uuid) -> Result<Option<Subscription>, AppError> {
        let mut state = self.state.write().await;
        Ok(state.subscriptions.iter_mut().find(|s| s.id == id).map(|s| {
            s.status = SubscriptionStatus::Cancelled;
            s.auto_renew = false;
            s.clone()
        }))
    }
}

#[async_trait]
impl RbacStore for MemoryStore {
    async fn permissions_for_roles(&self, roles: &[String]) -> Result<Vec<String>, AppError> {
        let state = self.state.read().await;
        let mut permissions: Vec<String> = roles
            .iter()
            .filter_map(|name| state.roles.get(name))
            .flat_map(|role| role.permissions.iter().cloned())
            .collect();
        permissions.sort();
        permissions.dedup();
        Ok(permissions)
    }

    async fn save_role(&self, role: &Role) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        state.roles.insert(role.name.clone(), role.clone());
        Ok(())
    }
}

#[async_trait]
impl ScopedBackend for MemoryStore {
    type Entity = Product;
    type NewFields = NewProduct;
    type Changes = UpdateProductPayload;

    fn entity_name(&self) -> &'static str {
        "Produto"
    }

    async fn fetch(
        &self,
        _ctx: &TenantContext,
        scope: ReadScope,
        id: Uuid,
    ) -> Result<Option<Product>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .products
            .get(&id)
            .filter(|p| scope.allows(p.tenant_id))
            .cloned())
    }

    async fn fetch_page(
        &self,
        _ctx: &TenantContext,
        scope: ReadScope,
        page: Pagination,
    ) -> Result<Vec<Product>, AppError> {
        let state = self.state.read().await;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| scope.allows(p.tenant_id))
            .cloned()
            .collect();
        products.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        Ok(products
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn insert(
        &self,
        _ctx: &TenantContext,
        tenant_id: Uuid,
        fields: NewProduct,
    ) -> Result<Product, AppError> {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            tenant_id,
            name: fields.name,
            description: fields.description,
            price: fields.price,
            created_at: now,
            updated_at: now,
        };
        self.state
            .write()
            .await
            .products
            .insert(product.id, product.clone());

        Ok(product)
    }

    async fn write(
        &self,
        _ctx: &TenantContext,
        id: Uuid,
        changes: UpdateProductPayload,
    ) -> Result<Option<Product>, AppError> {
        let mut state = self.state.write().await;
        Ok(state.products.get_mut(&id).map(|p| {
            if let Some(name) = changes.name {
                p.name = name;
            }
            if let Some(description) = changes.description {
                p.description = Some(description);
            }
            if let Some(price) = changes.price {
                p.price = price;
            }
            p.updated_at = Utc::now();
            p.clone()
        }))
    }

    async fn remove(&self, _ctx: &TenantContext, id: Uuid) -> Result<bool, AppError> {
        Ok(self.state.write().await.products.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::db::scoped::TenantScoped;
    use crate::models::principal::PrincipalKind;

    fn products(store: &MemoryStore) -> TenantScoped<MemoryStore> {
        TenantScoped::new(Arc::new(store.clone()), Arc::new(store.clone()))
    }

    async fn principal(store: &MemoryStore, kind: PrincipalKind) -> Uuid {
        PrincipalStore::create(
            store,
            NewPrincipal {
                contact: Contact::Email(format!("{}@example.com", Uuid::new_v4())),
                password_hash: "hash".into(),
                approval: ApprovalState::Approved,
                roles: vec![],
                kind,
            },
        )
        .await
        .unwrap()
        .id
    }

    fn new_product(name: &str) -> NewProduct {
        NewProduct {
            name: name.into(),
            description: None,
            price: Decimal::new(1000, 2),
        }
    }

    #[tokio::test]
    async fn cross_tenant_lookup_is_indistinguishable_from_missing() {
        let repo = products(&MemoryStore::new());
        let t1 = TenantContext::for_tenant(Uuid::new_v4());
        let t2 = TenantContext::for_tenant(Uuid::new_v4());

        let product = repo.create(&t1, None, new_product("Mesa")).await.unwrap();

        let foreign = repo.find_by_id(&t2, product.id).await.unwrap();
        let missing = repo.find_by_id(&t2, Uuid::new_v4()).await.unwrap();
        assert!(foreign.is_none());
        assert!(missing.is_none());

        assert!(repo.find_by_id(&t1, product.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn update_and_delete_of_foreign_rows_look_like_not_found() {
        let repo = products(&MemoryStore::new());
        let t1 = TenantContext::for_tenant(Uuid::new_v4());
        let t2 = TenantContext::for_tenant(Uuid::new_v4());

        let product = repo.create(&t1, None, new_product("Cadeira")).await.unwrap();

        let changes = UpdateProductPayload {
            name: Some("Invadido".into()),
            ..Default::default()
        };
        assert!(repo.update(&t2, product.id, changes).await.unwrap().is_none());
        assert!(!repo.delete(&t2, product.id).await.unwrap());

        let untouched = repo.find_by_id(&t1, product.id).await.unwrap().unwrap();
        assert_eq!(untouched.name, "Cadeira");
        assert!(repo.delete(&t1, product.id).await.unwrap());
    }

    #[tokio::test]
    async fn list_is_filtered_and_privileged_sees_all() {
        let store = MemoryStore::new();
        let repo = products(&store);
        let t1 = Uuid::new_v4();
        let t2 = principal(&store, PrincipalKind::Tenant { customer_type_id: None }).await;

        repo.create(&TenantContext::for_tenant(t1), None, new_product("A")).await.unwrap();
        repo.create(&TenantContext::for_tenant(t2), None, new_product("B")).await.unwrap();
        repo.create(&TenantContext::privileged(), Some(t2), new_product("C")).await.unwrap();

        let own = repo
            .list(&TenantContext::for_tenant(t2), Pagination::default())
            .await
            .unwrap();
        assert_eq!(own.len(), 2);
        assert!(own.iter().all(|p| p.tenant_id == t2));

        let all = repo
            .list(&TenantContext::privileged(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 3);

        let anonymous = repo
            .list(&TenantContext::default(), Pagination::default())
            .await
            .unwrap();
        assert!(anonymous.is_empty());
    }

    #[tokio::test]
    async fn privileged_write_must_target_an_existing_tenant() {
        let store = MemoryStore::new();
        let repo = products(&store);
        let operator = principal(
            &store,
            PrincipalKind::Operator {
                department: None,
                position: None,
            },
        )
        .await;
        let ctx = TenantContext::privileged();

        for target in [operator, Uuid::new_v4()] {
            let result = repo.create(&ctx, Some(target), new_product("Órfão")).await;
            assert!(matches!(result, Err(AppError::NotFound("Tenant"))));
        }

        let all = repo.list(&ctx, Pagination::default()).await.unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn replace_current_keeps_a_single_live_record() {
        let store = MemoryStore::new();
        let tenant_id = Uuid::new_v4();
        let now = Utc::now();

        let new = |plan_id| NewSubscription {
            tenant_id,
            plan_id,
            start_date: now,
            end_date: now + Duration::days(30),
            status: SubscriptionStatus::Active,
            auto_renew: true,
        };

        let first = store.replace_current(new(Uuid::new_v4())).await.unwrap();
        let second = store.replace_current(new(Uuid::new_v4())).await.unwrap();

        let first = SubscriptionStore::find_by_id(&store, first.id).await.unwrap().unwrap();
        assert_eq!(first.status, SubscriptionStatus::Cancelled);

        let current = store.current_for_tenant(tenant_id).await.unwrap().unwrap();
        assert_eq!(current.id, second.id);
        assert_eq!(store.count_for_tenant(tenant_id).await.unwrap(), 2);
    }
}
