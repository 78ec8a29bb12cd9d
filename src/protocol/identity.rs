//! Identity and filter types
//!
//! An [`Identity`] is the attribute tuple a connection registers under. A
//! [`Filter`] is a partial identity used to select the recipients of a
//! broadcast: every attribute it specifies must match exactly, attributes it
//! leaves out are ignored.

use serde::{Deserialize, Serialize};

/// The attribute tuple a connection is registered under
///
/// All attributes are opaque strings. `first_name` is display-only and is
/// never consulted by filter matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Tenant/domain the client belongs to
    #[serde(default)]
    pub domain: String,

    /// Client platform (e.g. "web", "ios")
    #[serde(default)]
    pub platform: String,

    /// User identifier; empty means anonymous
    #[serde(default)]
    pub user_id: String,

    /// Display name, never matched against
    #[serde(default)]
    pub first_name: String,

    /// Role within the domain (e.g. "admin")
    #[serde(default)]
    pub role: String,
}

impl Identity {
    /// Whether this identity carries no user id
    ///
    /// Anonymous registrations are accepted but can only be reached by
    /// filters that do not specify a `user_id`.
    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_empty()
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.domain, self.platform, self.user_id)
    }
}

/// A partial identity selecting broadcast recipients
///
/// Each attribute is either a concrete value or unspecified (`None` or the
/// empty string, which the wire format does not distinguish). A filter with
/// every attribute unspecified matches every registered identity, making an
/// all-wildcard broadcast a send to every connected client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// True when the filter attribute is either unspecified or equal to the
/// identity attribute.
fn attr_matches(wanted: &Option<String>, actual: &str) -> bool {
    match wanted.as_deref() {
        None | Some("") => true,
        Some(value) => value == actual,
    }
}

/// True when the filter attribute carries no concrete value.
fn attr_unspecified(attr: &Option<String>) -> bool {
    matches!(attr.as_deref(), None | Some(""))
}

impl Filter {
    /// Build a filter that matches a single user id
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Default::default()
        }
    }

    /// Whether every attribute is unspecified
    pub fn is_wildcard(&self) -> bool {
        attr_unspecified(&self.domain)
            && attr_unspecified(&self.platform)
            && attr_unspecified(&self.user_id)
            && attr_unspecified(&self.role)
    }

    /// Check whether `identity` satisfies this filter
    ///
    /// Exact equality on every specified attribute, attribute order
    /// irrelevant, no partial or case-insensitive matching. Pure function,
    /// safe to call from any number of concurrent callers.
    pub fn matches(&self, identity: &Identity) -> bool {
        attr_matches(&self.domain, &identity.domain)
            && attr_matches(&self.platform, &identity.platform)
            && attr_matches(&self.user_id, &identity.user_id)
            && attr_matches(&self.role, &identity.role)
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fmt_attr = |a: &Option<String>| match a.as_deref() {
            None | Some("") => "*".to_string(),
            Some(v) => v.to_string(),
        };
        write!(
            f,
            "{}/{}/{}/{}",
            fmt_attr(&self.domain),
            fmt_attr(&self.platform),
            fmt_attr(&self.user_id),
            fmt_attr(&self.role)
        )
    }
}
