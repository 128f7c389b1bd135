pub mod auth;
pub use auth::AuthService;
pub mod plan_service;
pub use plan_service::PlanService;
pub mod subscription_service;
pub use subscription_service::SubscriptionService;
pub mod token;
pub use token::TokenService;
