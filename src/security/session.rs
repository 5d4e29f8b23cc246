//! Known identity of the current actor
//!
//! [`SessionState`] is plain data: it holds whatever identity record the
//! backend last reported and answers two predicates about it. It is owned
//! by the [`AuthCoordinator`](super::coordinator::AuthCoordinator) and is
//! never mutated by guards or UI code directly.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Identity record returned by the backend for the logged-in user.
///
/// Only `admin` is interpreted by the gatekeeper. The remaining fields are
/// carried for display, and any attribute the backend adds is preserved in
/// `extra`.
///
/// # Examples
///
/// ```
/// use gatekeeper::security::session::Identity;
///
/// let json = r#"{"id": "42", "email": "jo@example.com", "admin": true, "team": "ops"}"#;
/// let identity: Identity = serde_json::from_str(json).unwrap();
///
/// assert!(identity.admin);
/// assert_eq!(identity.email.as_deref(), Some("jo@example.com"));
/// assert_eq!(identity.extra["team"], "ops");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Backend identifier of the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Login identifier (e-mail address).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(
        default,
        rename = "firstName",
        alias = "first_name",
        skip_serializing_if = "Option::is_none"
    )]
    pub first_name: Option<String>,

    #[serde(
        default,
        rename = "lastName",
        alias = "last_name",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_name: Option<String>,

    /// Administrator attribute.
    #[serde(default)]
    pub admin: bool,

    /// Any additional attributes reported by the backend.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Identity {
    /// Builds a minimal identity with only an e-mail address.
    ///
    /// # Examples
    ///
    /// ```
    /// use gatekeeper::security::session::Identity;
    ///
    /// let user = Identity::with_email("jo@example.com");
    /// assert!(!user.admin);
    /// ```
    pub fn with_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Self::default()
        }
    }

    /// Marks this identity as an administrator.
    pub fn into_admin(mut self) -> Self {
        self.admin = true;
        self
    }

    /// Human-readable name for log lines and prompts.
    ///
    /// Prefers "first last", then the e-mail address, then the id.
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            _ => self
                .email
                .clone()
                .or_else(|| self.id.clone())
                .unwrap_or_else(|| "(anonymous)".to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The currently known identity, if any.
///
/// # Examples
///
/// ```
/// use gatekeeper::security::session::{Identity, SessionState};
///
/// let mut session = SessionState::new();
/// assert!(!session.is_authenticated());
///
/// session.update(Some(Identity::with_email("jo@example.com").into_admin()));
/// assert!(session.is_authenticated());
/// assert!(session.is_admin());
///
/// session.clear();
/// assert!(!session.is_admin());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    identity: Option<Identity>,
}

impl SessionState {
    /// Creates an empty session with no known identity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the held identity wholesale.
    ///
    /// `None` means the backend reported no logged-in user.
    pub fn update(&mut self, identity: Option<Identity>) {
        self.identity = identity;
    }

    /// Forgets the held identity. Same as `update(None)`.
    pub fn clear(&mut self) {
        self.update(None);
    }

    /// Returns the held identity, if any.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// `true` when an identity is held.
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// `true` when an identity is held and carries the admin attribute.
    pub fn is_admin(&self) -> bool {
        self.identity.as_ref().map_or(false, |identity| identity.admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_anonymous() {
        let session = SessionState::new();
        assert!(!session.is_authenticated());
        assert!(!session.is_admin());
        assert!(session.identity().is_none());
    }

    #[test]
    fn test_update_with_plain_user_is_authenticated_not_admin() {
        let mut session = SessionState::new();
        session.update(Some(Identity::with_email("jo@example.com")));
        assert!(session.is_authenticated());
        assert!(!session.is_admin());
    }

    #[test]
    fn test_update_with_none_drops_identity() {
        let mut session = SessionState::new();
        session.update(Some(Identity::with_email("jo@example.com").into_admin()));
        session.update(None);
        assert!(!session.is_authenticated());
        assert!(!session.is_admin());
    }

    #[test]
    fn test_update_replaces_wholesale() {
        let mut session = SessionState::new();
        session.update(Some(Identity::with_email("admin@example.com").into_admin()));
        session.update(Some(Identity::with_email("user@example.com")));
        assert!(!session.is_admin());
        assert_eq!(
            session.identity().and_then(|i| i.email.as_deref()),
            Some("user@example.com")
        );
    }

    #[test]
    fn test_admin_implies_authenticated() {
        let candidates = [
            None,
            Some(Identity::default()),
            Some(Identity::default().into_admin()),
        ];
        for identity in candidates {
            let mut session = SessionState::new();
            session.update(identity);
            assert!(!session.is_admin() || session.is_authenticated());
        }
    }

    #[test]
    fn test_identity_deserializes_camel_case_names() {
        let json = r#"{"id": "1", "email": "a@b.c", "firstName": "Ada", "lastName": "L", "admin": false}"#;
        let identity: Identity = serde_json::from_str(json).unwrap();
        assert_eq!(identity.first_name.as_deref(), Some("Ada"));
        assert_eq!(identity.display_name(), "Ada L");
        assert!(identity.extra.is_empty());
    }

    #[test]
    fn test_identity_missing_admin_defaults_false() {
        let identity: Identity = serde_json::from_str(r#"{"email": "a@b.c"}"#).unwrap();
        assert!(!identity.admin);
        assert_eq!(identity.display_name(), "a@b.c");
    }

    #[test]
    fn test_display_name_falls_back_to_anonymous() {
        assert_eq!(Identity::default().display_name(), "(anonymous)");
    }
}
