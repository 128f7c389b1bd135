// src/router.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::AppState,
    docs::ApiDoc,
    handlers,
    middleware::{auth::scope_request, subscription::subscription_gate},
};

/// Monta o router completo. A ordem das camadas importa: o escopo do
/// request (mais externo) roda antes do portão de assinatura.
pub fn build_router(app_state: AppState) -> Router {
    // Rotas de autenticação (públicas)
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/forgot-password", post(handlers::auth::forgot_password))
        .route("/reset-password", post(handlers::auth::reset_password));

    // Administração da plataforma (cada handler exige a sua permissão)
    let admin_routes = Router::new()
        .route(
            "/plans",
            post(handlers::plans::create_plan).get(handlers::plans::list_plans),
        )
        .route("/plans/{id}", put(handlers::plans::update_plan))
        .route(
            "/subscriptions",
            post(handlers::subscriptions::assign_subscription),
        )
        .route(
            "/subscriptions/{id}/renew",
            post(handlers::subscriptions::renew_subscription),
        )
        .route(
            "/subscriptions/{id}/cancel",
            post(handlers::subscriptions::cancel_subscription),
        )
        .route(
            "/principals/{id}/approval",
            put(handlers::principals::update_approval),
        )
        .route(
            "/principals/{id}/active",
            put(handlers::principals::update_active),
        );

    // Conteúdo do tenant (atrás do portão de assinatura)
    let product_routes = Router::new()
        .route(
            "/api/products",
            post(handlers::products::create_product).get(handlers::products::list_products),
        )
        .route(
            "/api/products/{id}",
            get(handlers::products::get_product)
                .put(handlers::products::update_product)
                .delete(handlers::products::delete_product),
        );

    Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/me", get(handlers::auth::get_me))
        .route(
            "/api/subscription",
            get(handlers::subscriptions::get_my_subscription),
        )
        .route(
            "/api/webhooks/payments",
            post(handlers::webhooks::payment_confirmed),
        )
        .nest("/api/auth", auth_routes)
        .nest("/api/admin", admin_routes)
        .merge(product_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            subscription_gate,
        ))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            scope_request,
        ))
        .with_state(app_state)
}
