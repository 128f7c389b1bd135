pub mod auth;
pub mod principal;
pub mod product;
pub mod rbac;
pub mod subscription;
