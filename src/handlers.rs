pub mod auth;
pub mod plans;
pub mod principals;
pub mod products;
pub mod subscriptions;
pub mod webhooks;
