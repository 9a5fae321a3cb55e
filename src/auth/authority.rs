use std::collections::BTreeSet;

use crate::models::Role;

const AUTHORITY_PREFIX: &str = "ROLE_";

/// AuthoritySet
///
/// Canonical authority strings (`ROLE_ADMIN`, `ROLE_USER`) derived from a member's stored roles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthoritySet(BTreeSet<String>);

impl AuthoritySet {
    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&authority_name(role.as_str()))
    }

    pub fn is_admin(&self) -> bool {
        self.contains(Role::Admin)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

fn authority_name(role: &str) -> String {
    format!("{AUTHORITY_PREFIX}{role}")
}

/// authorities_from_roles
///
/// Prefixes every stored role string with `ROLE_`.
pub fn authorities_from_roles<S: AsRef<str>>(roles: &[S]) -> AuthoritySet {
    AuthoritySet(roles.iter().map(|r| authority_name(r.as_ref())).collect())
}

/// AuthorityResolver
///
/// Decides which roles a member gets at registration. Only the configured admin
/// address is granted ADMIN.
#[derive(Debug, Clone)]
pub struct AuthorityResolver {
    admin_email: String,
}

impl AuthorityResolver {
    pub fn new(admin_email: impl Into<String>) -> Self {
        Self {
            admin_email: admin_email.into(),
        }
    }

    // Exact comparison: no trimming or case folding.
    pub fn roles_for_email(&self, email: &str) -> Vec<Role> {
        if email == self.admin_email {
            vec![Role::Admin, Role::User]
        } else {
            vec![Role::User]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_email_gets_admin_and_user() {
        let resolver = AuthorityResolver::new("admin@gmail.com");
        assert_eq!(resolver.roles_for_email("admin@gmail.com"), vec![Role::Admin, Role::User]);
    }

    #[test]
    fn other_emails_never_get_admin() {
        let resolver = AuthorityResolver::new("admin@gmail.com");
        for email in ["hgd@gmail.com", "Admin@gmail.com", " admin@gmail.com", ""] {
            assert_eq!(resolver.roles_for_email(email), vec![Role::User], "{email}");
        }
    }

    #[test]
    fn stored_roles_are_prefixed() {
        let set = authorities_from_roles(&["ADMIN", "USER"]);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["ROLE_ADMIN", "ROLE_USER"]);
        assert!(set.is_admin());
        assert!(!authorities_from_roles(&["USER"]).is_admin());
    }
}
