// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{
        MemoryStore, PlanRepository, PlanStore, PrincipalRepository, PrincipalStore, ProductBackend,
        ProductRepository, ProductStore, RbacRepository, RbacStore, SubscriptionRepository,
        SubscriptionStore, TenantScoped,
    },
    middleware::rbac::ADMIN_PERMISSIONS,
    services::{AuthService, PlanService, SubscriptionService, TokenService},
};

/// Rotas que não passam pelo escopo de request (prefixo).
const DEFAULT_PUBLIC_ROUTES: &[&str] = &[
    "/api/auth/login",
    "/api/auth/register",
    "/api/auth/forgot-password",
    "/api/auth/reset-password",
    "/api/health",
    "/docs",
    "/api-docs",
    "/api/webhooks",
];

/// Módulos de conteúdo do tenant que exigem assinatura válida (prefixo).
const DEFAULT_GATED_PREFIXES: &[&str] = &["/api/products"];

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub session_token_ttl: chrono::Duration,
    pub reset_token_ttl: chrono::Duration,
    pub bcrypt_cost: u32,
    pub public_routes: Vec<String>,
    pub gated_prefixes: Vec<String>,
    pub payment_webhook_secret: Option<String>,
    /// (login, senha) do operador criado na inicialização.
    pub bootstrap_operator: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?;

        let bootstrap_operator = match (env::var("OPERATOR_LOGIN"), env::var("OPERATOR_PASSWORD")) {
            (Ok(login), Ok(password)) => Some((login, password)),
            _ => None,
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok(),
            jwt_secret,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            session_token_ttl: chrono::Duration::hours(parse_var("SESSION_TOKEN_TTL_HOURS", 168)?),
            reset_token_ttl: chrono::Duration::minutes(parse_var("RESET_TOKEN_TTL_MINUTES", 15)?),
            bcrypt_cost: parse_var("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            public_routes: list_var("PUBLIC_ROUTES", DEFAULT_PUBLIC_ROUTES),
            gated_prefixes: list_var("SUBSCRIPTION_GATED_PREFIXES", DEFAULT_GATED_PREFIXES),
            payment_webhook_secret: env::var("PAYMENT_WEBHOOK_SECRET").ok(),
            bootstrap_operator,
        })
    }

    /// Configuração mínima, sem banco (memória), para testes e desenvolvimento.
    pub fn in_memory(jwt_secret: &str) -> Self {
        Self {
            database_url: None,
            jwt_secret: jwt_secret.to_string(),
            bind_addr: "127.0.0.1:3000".to_string(),
            session_token_ttl: chrono::Duration::hours(168),
            reset_token_ttl: chrono::Duration::minutes(15),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            public_routes: DEFAULT_PUBLIC_ROUTES.iter().map(|r| r.to_string()).collect(),
            gated_prefixes: DEFAULT_GATED_PREFIXES.iter().map(|r| r.to_string()).collect(),
            payment_webhook_secret: None,
            bootstrap_operator: None,
        }
    }

    pub fn is_public_route(&self, path: &str) -> bool {
        self.public_routes.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    pub fn is_gated_route(&self, path: &str) -> bool {
        self.gated_prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{name} inválido: {raw}")),
        Err(_) => Ok(default),
    }
}

fn list_var(name: &str, default: &[&str]) -> Vec<String> {
    match env::var(name) {
        Ok(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}

/// Os stores de cada agregado, já como objetos dinâmicos.
#[derive(Clone)]
pub struct Stores {
    pub principals: Arc<dyn PrincipalStore>,
    pub plans: Arc<dyn PlanStore>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub rbac: Arc<dyn RbacStore>,
    pub products: Arc<ProductBackend>,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            principals: Arc::new(PrincipalRepository::new(pool.clone())),
            plans: Arc::new(PlanRepository::new(pool.clone())),
            subscriptions: Arc::new(SubscriptionRepository::new(pool.clone())),
            rbac: Arc::new(RbacRepository::new(pool.clone())),
            products: Arc::new(ProductStore::new(pool)),
        }
    }

    pub fn in_memory(store: MemoryStore) -> Self {
        Self {
            principals: Arc::new(store.clone()),
            plans: Arc::new(store.clone()),
            subscriptions: Arc::new(store.clone()),
            rbac: Arc::new(store.clone()),
            products: Arc::new(store),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tokens: TokenService,
    pub auth_service: AuthService,
    pub plan_service: PlanService,
    pub subscription_service: SubscriptionService,
    pub principals: Arc<dyn PrincipalStore>,
    pub rbac_repo: Arc<dyn RbacStore>,
    pub products: ProductRepository,
}

impl AppState {
    /// Conecta ao banco (ou cai para memória), roda as migrações e monta o grafo.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let stores = match config.database_url.as_deref() {
            Some(database_url) => {
                let db_pool = PgPoolOptions::new()
                    .max_connections(5)
                    .acquire_timeout(Duration::from_secs(3))
                    .connect(database_url)
                    .await
                    .context("Falha ao conectar ao banco de dados")?;
                tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

                sqlx::migrate!()
                    .run(&db_pool)
                    .await
                    .context("Falha ao rodar as migrações do banco de dados")?;
                tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

                Stores::postgres(db_pool)
            }
            None => {
                tracing::warn!("⚠️ DATABASE_URL ausente: usando armazenamento em memória");
                Stores::in_memory(MemoryStore::new())
            }
        };

        let state = Self::from_stores(config, stores);

        if let Some((login, password)) = state.config.bootstrap_operator.clone() {
            state
                .auth_service
                .ensure_operator(&login, &password, ADMIN_PERMISSIONS)
                .await
                .map_err(|e| anyhow::anyhow!("Falha ao criar o operador inicial: {e}"))?;
        }

        Ok(state)
    }

    /// Monta o grafo de dependências sobre stores já prontos.
    pub fn from_stores(config: Config, stores: Stores) -> Self {
        let tokens = TokenService::new(
            &config.jwt_secret,
            config.session_token_ttl,
            config.reset_token_ttl,
        );

        let subscription_service = SubscriptionService::new(
            stores.plans.clone(),
            stores.subscriptions.clone(),
            stores.principals.clone(),
        );
        let plan_service = PlanService::new(stores.plans.clone());
        let auth_service = AuthService::new(
            stores.principals.clone(),
            stores.rbac.clone(),
            subscription_service.clone(),
            tokens.clone(),
            config.bcrypt_cost,
        );

        Self {
            config: Arc::new(config),
            tokens,
            auth_service,
            plan_service,
            subscription_service,
            products: TenantScoped::new(stores.products, stores.principals.clone()),
            principals: stores.principals,
            rbac_repo: stores.rbac,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_matching_is_by_prefix() {
        let config = Config::in_memory("segredo");

        assert!(config.is_public_route("/api/auth/login"));
        assert!(config.is_public_route("/api/webhooks/payments"));
        assert!(config.is_public_route("/docs/index.html"));
        assert!(!config.is_public_route("/api/products"));
        assert!(!config.is_public_route("/api/me"));

        assert!(config.is_gated_route("/api/products/123"));
        assert!(!config.is_gated_route("/api/admin/plans"));
    }
}
