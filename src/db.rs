pub mod memory;
pub use memory::MemoryStore;
pub mod principal_repo;
pub use principal_repo::{PrincipalRepository, PrincipalStore};
pub mod plan_repo;
pub use plan_repo::{PlanRepository, PlanStore};
pub mod subscription_repo;
pub use subscription_repo::{SubscriptionRepository, SubscriptionStore};
pub mod rbac_repo;
pub use rbac_repo::{RbacRepository, RbacStore};
pub mod product_repo;
pub use product_repo::{ProductBackend, ProductRepository, ProductStore};
pub mod scoped;
pub use scoped::{Pagination, ReadScope, ScopedBackend, TenantScoped};
