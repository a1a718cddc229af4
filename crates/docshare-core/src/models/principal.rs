use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// User role for authorization
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl Display for UserRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UserRole::User => write!(f, "user"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Authenticated identity snapshot.
///
/// Built once when credentials are verified and never mutated afterwards; a role
/// change only takes effect on the next sign-in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub subject_id: String,
    pub display_name: String,
    pub email: String,
    pub role: UserRole,
    pub authenticated_at: DateTime<Utc>,
}

/// Resolves a [`UserRole`] from the configured admin e-mail allow-list.
#[derive(Debug, Clone, Default)]
pub struct RoleResolver {
    admin_emails: HashSet<String>,
}

impl RoleResolver {
    pub fn new<I, S>(admin_emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            admin_emails: admin_emails
                .into_iter()
                .map(|e| normalize_email(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn resolve(&self, email: &str) -> UserRole {
        if self.admin_emails.contains(&normalize_email(email)) {
            UserRole::Admin
        } else {
            UserRole::User
        }
    }

    /// Snapshot a verified identity into a [`Principal`].
    pub fn principal(
        &self,
        subject_id: impl Into<String>,
        display_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Principal {
        let email = email.into();
        Principal {
            subject_id: subject_id.into(),
            display_name: display_name.into(),
            role: self.resolve(&email),
            email,
            authenticated_at: Utc::now(),
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_display_and_parse() {
        assert_eq!(UserRole::Admin.to_string(), "admin");
        assert_eq!(UserRole::User.to_string(), "user");
        assert_eq!("ADMIN".parse::<UserRole>(), Ok(UserRole::Admin));
        assert!("owner".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&UserRole::Admin).unwrap();
        assert_eq!(json, "\"admin\"");
    }

    #[test]
    fn test_admin_allow_list_is_case_insensitive() {
        let resolver = RoleResolver::new(["Admin@Example.com ", ""]);
        assert_eq!(resolver.resolve("admin@example.com"), UserRole::Admin);
        assert_eq!(resolver.resolve("someone@example.com"), UserRole::User);
        assert_eq!(resolver.resolve(""), UserRole::User);
    }

    #[test]
    fn test_principal_role_resolved_once() {
        let resolver = RoleResolver::new(["boss@example.com"]);
        let principal = resolver.principal("42", "Boss", "boss@example.com");
        assert_eq!(principal.role, UserRole::Admin);
        assert_eq!(principal.subject_id, "42");

        let other = RoleResolver::default().principal("7", "Guest", "guest@example.com");
        assert_eq!(other.role, UserRole::User);
    }
}
