// src/middleware/rbac.rs

use std::marker::PhantomData;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use crate::{common::error::AppError, config::AppState, middleware::auth::AuthenticatedPrincipal};

/// 1. O Trait que define o que é uma Permissão
pub trait PermissionDef: Send + Sync + 'static {
    fn slug() -> &'static str;
}

/// 2. O Extractor (Guardião)
pub struct RequirePermission<T>(pub PhantomData<T>);

// 3. Implementação do FromRequestParts
impl<T, S> FromRequestParts<S> for RequirePermission<T>
where
    T: PermissionDef,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        // A. Extrai o principal (preenchido pelo middleware de escopo)
        let AuthenticatedPrincipal(principal) = parts
            .extensions
            .get::<AuthenticatedPrincipal>()
            .cloned()
            .ok_or(AppError::Unauthenticated)?;

        // B. Pega o slug da permissão
        let required_perm = T::slug();

        // C. Verifica os cargos do principal
        let granted = app_state
            .rbac_repo
            .permissions_for_roles(&principal.roles)
            .await?;

        if !granted.iter().any(|p| p == required_perm) {
            return Err(AppError::Forbidden(format!(
                "Você precisa da permissão '{}' para realizar esta ação.",
                required_perm
            )));
        }

        Ok(RequirePermission(PhantomData))
    }
}

// ---
// DEFINIÇÃO DAS PERMISSÕES (TIPOS)
// ---

pub struct PermPlansManage;
impl PermissionDef for PermPlansManage {
    fn slug() -> &'static str { "plans:manage" }
}

pub struct PermSubscriptionsManage;
impl PermissionDef for PermSubscriptionsManage {
    fn slug() -> &'static str { "subscriptions:manage" }
}

pub struct PermPrincipalsManage;
impl PermissionDef for PermPrincipalsManage {
    fn slug() -> &'static str { "principals:manage" }
}

/// Tudo que o cargo `admin` recebe na inicialização.
pub const ADMIN_PERMISSIONS: &[&str] = &["plans:manage", "subscriptions:manage", "principals:manage"];
