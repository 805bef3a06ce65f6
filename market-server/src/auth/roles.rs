//! Role Definitions
//!
//! Flat role model: buyers negotiate and order, sellers list and fulfill,
//! admins moderate. Role checks happen in middleware ([`super::middleware`])
//! and per-resource ownership checks happen in handlers.

pub const ROLE_BUYER: &str = "buyer";
pub const ROLE_SELLER: &str = "seller";
pub const ROLE_ADMIN: &str = "admin";

/// Roles a user may pick at registration. Admin accounts are seeded from
/// configuration, never self-registered.
pub const SELF_REGISTER_ROLES: &[&str] = &[ROLE_BUYER, ROLE_SELLER];

pub fn can_self_register(role: &str) -> bool {
    SELF_REGISTER_ROLES.contains(&role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_cannot_self_register() {
        assert!(can_self_register(ROLE_BUYER));
        assert!(can_self_register(ROLE_SELLER));
        assert!(!can_self_register(ROLE_ADMIN));
        assert!(!can_self_register("superuser"));
    }
}
