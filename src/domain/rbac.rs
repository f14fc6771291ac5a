//! Role-based access control
//!
//! A request is gated by an [`AuthPolicy`]: whether an identity is required,
//! which permissions and roles it must hold, and whether every listed grant is
//! needed (ALL-of) or just one (ANY-of). Evaluation is pure and allocates a
//! fresh [`AuthContext`] per call, so one policy can be shared across requests.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DomainError;

/// Authenticated user as carried by the session, already enriched with its
/// flattened role names and effective permission set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: i32,
    pub email: String,
    pub name: Option<String>,
    pub roles: BTreeSet<String>,
    pub permissions: BTreeSet<String>,
    pub is_staff: bool,
    pub email_verified: Option<DateTime<Utc>>,
}

impl SessionUser {
    pub fn has_permission(&self, action: &str) -> bool {
        self.permissions.contains(action)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Identity presented with a request. `user` is `None` when the identity
/// could not be resolved into a usable payload.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub user: Option<SessionUser>,
}

impl Session {
    pub fn new(user: SessionUser) -> Self {
        Self { user: Some(user) }
    }

    pub fn unusable() -> Self {
        Self { user: None }
    }
}

/// Requirements for a single operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPolicy {
    pub require_auth: bool,
    pub require_permissions: BTreeSet<String>,
    pub require_roles: BTreeSet<String>,
    /// `false` means ANY-of
    pub require_all_permissions: bool,
    /// `false` means ANY-of
    pub require_all_roles: bool,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            require_auth: true,
            require_permissions: BTreeSet::new(),
            require_roles: BTreeSet::new(),
            require_all_permissions: false,
            require_all_roles: false,
        }
    }
}

impl AuthPolicy {
    /// Anonymous access allowed
    pub fn public() -> Self {
        Self {
            require_auth: false,
            ..Self::default()
        }
    }

    /// Any signed-in user
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn permissions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.require_permissions = actions.into_iter().map(Into::into).collect();
        self
    }

    pub fn roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.require_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn require_all_permissions(mut self) -> Self {
        self.require_all_permissions = true;
        self
    }

    pub fn require_all_roles(mut self) -> Self {
        self.require_all_roles = true;
        self
    }
}

/// Outcome of a successful authorization
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    user: Option<SessionUser>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    /// The signed-in user, or `Unauthorized` for anonymous access
    pub fn require_user(&self) -> Result<&SessionUser, DomainError> {
        self.user.as_ref().ok_or(DomainError::Unauthorized)
    }
}

/// Decide whether `session` satisfies `policy`.
pub fn authorize(session: Option<&Session>, policy: &AuthPolicy) -> Result<AuthContext, DomainError> {
    let Some(session) = session else {
        if policy.require_auth {
            return Err(DomainError::Unauthorized);
        }
        return Ok(AuthContext::anonymous());
    };

    let user = session.user.as_ref().ok_or(DomainError::InvalidSession)?;

    if !policy.require_permissions.is_empty()
        && !satisfies(
            &user.permissions,
            &policy.require_permissions,
            policy.require_all_permissions,
        )
    {
        return Err(DomainError::MissingPermissions {
            required: policy.require_permissions.iter().cloned().collect(),
            require_all: policy.require_all_permissions,
        });
    }

    if !policy.require_roles.is_empty()
        && !satisfies(&user.roles, &policy.require_roles, policy.require_all_roles)
    {
        return Err(DomainError::MissingRoles {
            required: policy.require_roles.iter().cloned().collect(),
            require_all: policy.require_all_roles,
        });
    }

    Ok(AuthContext {
        user: Some(user.clone()),
    })
}

fn satisfies(held: &BTreeSet<String>, required: &BTreeSet<String>, require_all: bool) -> bool {
    if require_all {
        required.is_subset(held)
    } else {
        required.iter().any(|r| held.contains(r))
    }
}

/// Per-HTTP-method policies for one resource. Methods that were never
/// configured allow anonymous access.
#[derive(Debug, Clone, Default)]
pub struct MethodPolicies {
    policies: HashMap<String, AuthPolicy>,
}

impl MethodPolicies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, method: &str, policy: AuthPolicy) -> Self {
        self.policies.insert(method.to_ascii_uppercase(), policy);
        self
    }

    pub fn get(self, policy: AuthPolicy) -> Self {
        self.on("GET", policy)
    }

    pub fn post(self, policy: AuthPolicy) -> Self {
        self.on("POST", policy)
    }

    pub fn put(self, policy: AuthPolicy) -> Self {
        self.on("PUT", policy)
    }

    pub fn patch(self, policy: AuthPolicy) -> Self {
        self.on("PATCH", policy)
    }

    pub fn delete(self, policy: AuthPolicy) -> Self {
        self.on("DELETE", policy)
    }

    /// Policy applied to the given method
    pub fn for_method(&self, method: &str) -> AuthPolicy {
        self.policies
            .get(&method.to_ascii_uppercase())
            .cloned()
            .unwrap_or_else(AuthPolicy::public)
    }

    pub fn authorize(&self, method: &str, session: Option<&Session>) -> Result<AuthContext, DomainError> {
        authorize(session, &self.for_method(method))
    }
}

/// Union of the permissions granted through every role a user holds
pub fn effective_permissions<I, S>(grants: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    grants.into_iter().map(|s| s.as_ref().to_owned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with(permissions: &[&str], roles: &[&str]) -> Session {
        Session::new(SessionUser {
            id: 1,
            email: "reader@example.com".into(),
            name: None,
            roles: roles.iter().map(|s| s.to_string()).collect(),
            permissions: permissions.iter().map(|s| s.to_string()).collect(),
            is_staff: false,
            email_verified: None,
        })
    }

    #[test]
    fn anonymous_rejected_when_auth_required() {
        let err = authorize(None, &AuthPolicy::authenticated()).unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized));
    }

    #[test]
    fn anonymous_allowed_on_public_policy() {
        let ctx = authorize(None, &AuthPolicy::public()).unwrap();
        assert!(ctx.user().is_none());
    }

    #[test]
    fn unusable_session_is_invalid() {
        let session = Session::unusable();
        let err = authorize(Some(&session), &AuthPolicy::public()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidSession));
    }

    #[test]
    fn any_of_versus_all_of_permissions() {
        let session = user_with(&["a"], &[]);

        let any = AuthPolicy::authenticated().permissions(["a", "b"]);
        assert!(authorize(Some(&session), &any).is_ok());

        let all = any.clone().require_all_permissions();
        match authorize(Some(&session), &all) {
            Err(DomainError::MissingPermissions {
                required,
                require_all,
            }) => {
                assert_eq!(required, vec!["a".to_string(), "b".to_string()]);
                assert!(require_all);
            }
            other => panic!("expected MissingPermissions, got {:?}", other),
        }
    }

    #[test]
    fn role_requirements_checked_after_permissions() {
        let session = user_with(&["book:read"], &["Editor"]);

        let policy = AuthPolicy::authenticated().roles(["Admin", "Editor"]);
        assert!(authorize(Some(&session), &policy).is_ok());

        let policy = policy.require_all_roles();
        assert!(matches!(
            authorize(Some(&session), &policy),
            Err(DomainError::MissingRoles { require_all: true, .. })
        ));

        let policy = AuthPolicy::authenticated()
            .permissions(["book:create"])
            .roles(["Admin"]);
        assert!(matches!(
            authorize(Some(&session), &policy),
            Err(DomainError::MissingPermissions { .. })
        ));
    }

    #[test]
    fn unconfigured_methods_are_public() {
        let policies = MethodPolicies::new()
            .post(AuthPolicy::authenticated().permissions(["book:create"]));

        assert!(policies.authorize("get", None).is_ok());
        assert!(matches!(
            policies.authorize("POST", None),
            Err(DomainError::Unauthorized)
        ));
        assert!(!policies.for_method("DELETE").require_auth);
    }

    #[test]
    fn effective_permissions_collapse_duplicates() {
        let perms = effective_permissions(["book:read", "checkout:create", "book:read"]);
        assert_eq!(perms.len(), 2);
        assert!(perms.contains("checkout:create"));
    }
}
