pub mod auth;
pub mod rbac;
pub mod subscription;
pub mod tenancy;
