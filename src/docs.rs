// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::forgot_password,
        handlers::auth::reset_password,

        // --- Users ---
        handlers::auth::get_me,

        // --- Subscriptions ---
        handlers::subscriptions::get_my_subscription,
        handlers::subscriptions::assign_subscription,
        handlers::subscriptions::renew_subscription,
        handlers::subscriptions::cancel_subscription,

        // --- Plans ---
        handlers::plans::create_plan,
        handlers::plans::list_plans,
        handlers::plans::update_plan,

        // --- Principals ---
        handlers::principals::update_approval,
        handlers::principals::update_active,

        // --- Products ---
        handlers::products::create_product,
        handlers::products::list_products,
        handlers::products::get_product,
        handlers::products::update_product,
        handlers::products::delete_product,

        // --- Webhooks ---
        handlers::webhooks::payment_confirmed,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::RegisterPayload,
            models::auth::LoginPayload,
            models::auth::ForgotPasswordPayload,
            models::auth::ResetPasswordPayload,
            models::auth::AuthResponse,
            models::auth::MeResponse,

            // --- Principals ---
            models::principal::ApprovalState,
            models::principal::Contact,
            models::principal::PrincipalKind,
            models::principal::Principal,
            models::principal::UpdateApprovalPayload,
            models::principal::UpdateActivePayload,

            // --- Subscriptions ---
            models::subscription::SubscriptionStatus,
            models::subscription::Entitlements,
            models::subscription::FeatureLimit,
            models::subscription::SubscriptionPlan,
            models::subscription::CreatePlanPayload,
            models::subscription::UpdatePlanPayload,
            models::subscription::Subscription,
            models::subscription::SubscriptionCheck,
            models::subscription::SubscriptionOverview,
            models::subscription::AssignSubscriptionPayload,
            models::subscription::PaymentConfirmedPayload,

            // --- Products ---
            models::product::Product,
            models::product::CreateProductPayload,
            models::product::UpdateProductPayload,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação, Registro e Recuperação de Senha"),
        (name = "Users", description = "Principal autenticado"),
        (name = "Subscriptions", description = "Assinaturas dos Tenants"),
        (name = "Plans", description = "Catálogo de Planos"),
        (name = "Principals", description = "Aprovação e Ativação de Contas"),
        (name = "Products", description = "Conteúdo do Tenant (exige assinatura)"),
        (name = "Webhooks", description = "Eventos do Gateway de Pagamento")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
