//! Role normalization.
//!
//! The identity provider sometimes reports organizational admins with no
//! role or with the generic `user` role, and occasionally sends values
//! outside the role set. [`normalize`] repairs both before any
//! authorization decision is made.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::Role;

/// Identity attributes consulted when the role claim is suspect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityHints {
    pub email: Option<String>,
}

impl IdentityHints {
    #[must_use]
    pub fn email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
        }
    }
}

fn default_org_admin_patterns() -> Vec<String> {
    vec!["orgadmin*@*".to_string()]
}

/// Patterns identifying organizational admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRules {
    /// Email globs; `*` matches any run of characters, case is ignored.
    #[serde(default = "default_org_admin_patterns")]
    pub org_admin_patterns: Vec<String>,
}

impl Default for RoleRules {
    fn default() -> Self {
        Self {
            org_admin_patterns: default_org_admin_patterns(),
        }
    }
}

impl RoleRules {
    #[must_use]
    pub fn is_org_admin(&self, hints: &IdentityHints) -> bool {
        let Some(email) = hints.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) else {
            return false;
        };
        self.org_admin_patterns
            .iter()
            .any(|pattern| glob_match(pattern, email))
    }
}

/// Resolve a raw role claim to a defined [`Role`].
///
/// Unknown values resolve to [`Role::User`]. A missing or `user` role is
/// upgraded to [`Role::OrgAdmin`] when the hints match an org-admin
/// pattern. Every other defined role passes through. Feeding the result
/// back in yields the same role.
#[must_use]
pub fn normalize(raw: Option<&str>, hints: &IdentityHints, rules: &RoleRules) -> Role {
    let parsed = match raw.map(str::trim).filter(|r| !r.is_empty()) {
        None => None,
        Some(text) => Some(Role::from_str(text).unwrap_or_else(|_| {
            tracing::warn!(role = text, "undefined role claim, using least privilege");
            Role::User
        })),
    };

    match parsed {
        None | Some(Role::User) if rules.is_org_admin(hints) => Role::OrgAdmin,
        other => other.unwrap_or_default(),
    }
}

/// Case-insensitive glob match supporting only `*`.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    let text: Vec<char> = text.to_lowercase().chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn org() -> IdentityHints {
        IdentityHints::email("OrgAdmin.north@campus.edu")
    }

    #[test]
    fn upgrades_missing_or_generic_role_for_org_admins() {
        let rules = RoleRules::default();
        assert_eq!(normalize(None, &org(), &rules), Role::OrgAdmin);
        assert_eq!(normalize(Some("user"), &org(), &rules), Role::OrgAdmin);
        assert_eq!(normalize(Some(""), &org(), &rules), Role::OrgAdmin);
    }

    #[test]
    fn defined_roles_pass_through() {
        let rules = RoleRules::default();
        assert_eq!(normalize(Some("hallAdmin"), &org(), &rules), Role::HallAdmin);
        assert_eq!(normalize(Some("guest"), &org(), &rules), Role::Guest);
        let plain = IdentityHints::email("ana@campus.edu");
        assert_eq!(normalize(Some("superAdmin"), &plain, &rules), Role::SuperAdmin);
        assert_eq!(normalize(None, &plain, &rules), Role::User);
    }

    #[test]
    fn undefined_roles_fall_to_least_privilege() {
        let rules = RoleRules::default();
        let plain = IdentityHints::email("ana@campus.edu");
        assert_eq!(normalize(Some("root"), &plain, &rules), Role::User);
        assert_eq!(normalize(Some("root"), &org(), &rules), Role::OrgAdmin);
        assert_eq!(normalize(Some("root"), &IdentityHints::default(), &rules), Role::User);
    }

    #[test]
    fn glob_matching() {
        assert!(glob_match("orgadmin*@*", "orgadmin@x.org"));
        assert!(glob_match("*@admin.campus.edu", "Bob@ADMIN.campus.edu"));
        assert!(glob_match("a*b*c", "aXXbYYc"));
        assert!(!glob_match("a*b*c", "aXXbYY"));
        assert!(!glob_match("orgadmin*@*", "user@orgadmin.org"));
    }

    fn raw_role() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            prop::sample::select(Role::ALL.to_vec()).prop_map(|r| Some(r.as_str().to_string())),
            "[a-zA-Z_ -]{0,12}".prop_map(Some),
        ]
    }

    fn hints() -> impl Strategy<Value = IdentityHints> {
        prop_oneof![
            Just(IdentityHints::default()),
            "[a-z]{1,8}@[a-z]{1,6}\\.edu".prop_map(IdentityHints::email),
            "orgadmin[a-z]{0,4}@[a-z]{1,6}\\.edu".prop_map(IdentityHints::email),
        ]
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(raw in raw_role(), hints in hints()) {
            let rules = RoleRules::default();
            let once = normalize(raw.as_deref(), &hints, &rules);
            let twice = normalize(Some(once.as_str()), &hints, &rules);
            prop_assert_eq!(once, twice);
        }
    }
}
