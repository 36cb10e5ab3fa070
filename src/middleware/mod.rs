pub mod identity;
pub mod oidc;
pub mod rbac;
