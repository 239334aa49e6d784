//! Scope requirements and per-caller capability authorization.
//!
//! [`ScopeRequirement`] is the set of scopes one tool needs (AND semantics).
//! [`ScopeAuthorizer`] checks a caller's verified token against the
//! requirements held in a [`ScopeRegistry`], both when a tool is invoked and
//! when the catalog is listed. [`ScopeCatalog`] advertises every scope the
//! server may ask for.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::error::OAuthError;
use super::token::AccessToken;
use crate::filter::Filterable;
use crate::registry::ScopeRegistry;

/// Scopes every deployment advertises regardless of its tools.
pub const BASELINE_SCOPES: [&str; 3] = ["openid", "profile", "email"];

/// A set of required OAuth scopes for an operation.
///
/// All scopes must be present in the token for access to be granted. The
/// declaration order is kept so error messages list missing scopes the way
/// they were declared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeRequirement {
    required: Vec<String>,
}

impl ScopeRequirement {
    /// Create an empty scope requirement (no scopes needed).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn one(scope: impl Into<String>) -> Self {
        Self::all([scope])
    }

    /// Create a requirement from multiple scopes; duplicates and blank
    /// entries are dropped.
    pub fn all(scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut required: Vec<String> = Vec::new();
        for scope in scopes {
            let scope = scope.into();
            let scope = scope.trim();
            if !scope.is_empty() && !required.iter().any(|s| s == scope) {
                required.push(scope.to_string());
            }
        }
        Self { required }
    }

    /// Add a required scope to this requirement.
    pub fn require(mut self, scope: impl Into<String>) -> Self {
        let scope = scope.into();
        if !scope.trim().is_empty() && !self.required.contains(&scope) {
            self.required.push(scope);
        }
        self
    }

    pub fn scopes(&self) -> &[String] {
        &self.required
    }

    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
    }

    pub fn is_satisfied_by(&self, granted: &BTreeSet<String>) -> bool {
        self.required.iter().all(|s| granted.contains(s))
    }

    /// Required scopes absent from `granted`, in declaration order.
    pub fn missing_from(&self, granted: &BTreeSet<String>) -> Vec<String> {
        self.required
            .iter()
            .filter(|s| !granted.contains(*s))
            .cloned()
            .collect()
    }

    /// Check a verified token against this requirement.
    pub fn check(&self, token: &AccessToken) -> Result<(), OAuthError> {
        let missing = self.missing_from(token.scopes());
        if missing.is_empty() {
            Ok(())
        } else {
            Err(OAuthError::InsufficientScope {
                missing,
                provided: token.scopes().iter().cloned().collect(),
            })
        }
    }
}

/// Check `caller_scopes` against `required`.
///
/// Returns whether every required scope is present, plus the missing ones.
pub fn check_scopes<S: AsRef<str>>(
    caller_scopes: &BTreeSet<String>,
    required: &[S],
) -> (bool, BTreeSet<String>) {
    let missing: BTreeSet<String> = required
        .iter()
        .map(|s| s.as_ref())
        .filter(|s| !caller_scopes.contains(*s))
        .map(String::from)
        .collect();
    (missing.is_empty(), missing)
}

/// Authorizes tool use against the requirements in a [`ScopeRegistry`].
///
/// Every check takes the caller's token explicitly. A `None` token means the
/// server runs without OAuth, and everything is allowed.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use mcp_oauth_gate::{AccessToken, ScopeAuthorizer, ScopeRegistry};
///
/// let authorizer = ScopeAuthorizer::new(Arc::new(ScopeRegistry::new()));
/// authorizer.declare_requirement("notes_create_note", ["notes:write"]);
///
/// let reader = AccessToken::new("t", "alice", ["notes:read"], u64::MAX).unwrap();
/// assert!(authorizer.enforce_tool("notes_create_note", Some(&reader)).is_err());
/// assert!(authorizer.enforce_tool("notes_create_note", None).is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScopeAuthorizer {
    registry: Arc<ScopeRegistry>,
}

impl ScopeAuthorizer {
    pub fn new(registry: Arc<ScopeRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ScopeRegistry> {
        &self.registry
    }

    /// Record the scopes `tool_id` requires. See
    /// [`ScopeRegistry::declare_requirement`].
    pub fn declare_requirement(
        &self,
        tool_id: impl Into<String>,
        scopes: impl IntoIterator<Item = impl Into<String>>,
    ) -> bool {
        self.registry.declare_requirement(tool_id, scopes)
    }

    /// Enforce an explicit requirement against the caller's token.
    pub fn enforce(
        &self,
        required: &ScopeRequirement,
        token: Option<&AccessToken>,
    ) -> Result<(), OAuthError> {
        let Some(token) = token else {
            return Ok(());
        };

        required.check(token).inspect_err(|_| {
            tracing::info!(
                subject = %token.subject(),
                required = ?required.scopes(),
                "Insufficient scope"
            );
        })
    }

    /// Enforce the requirement declared for `tool_id`.
    pub fn enforce_tool(&self, tool_id: &str, token: Option<&AccessToken>) -> Result<(), OAuthError> {
        let Some(token) = token else {
            return Ok(());
        };

        let requirement = self.registry.requirement(tool_id);
        requirement.check(token).inspect_err(|_| {
            tracing::info!(
                tool = %tool_id,
                subject = %token.subject(),
                required = ?requirement.scopes(),
                "Tool call denied: insufficient scope"
            );
        })
    }

    /// Whether the caller may see `tool_id` in the catalog.
    pub fn is_visible(&self, tool_id: &str, token: Option<&AccessToken>) -> bool {
        match token {
            None => true,
            Some(token) => self.registry.has_required_scopes(tool_id, token.scopes()),
        }
    }

    /// Keep only the tools the caller may use.
    ///
    /// Computed fresh for every call, since concurrent callers hold
    /// different grants.
    pub fn filter_catalog<T: Filterable>(&self, tools: Vec<T>, token: Option<&AccessToken>) -> Vec<T> {
        let Some(token) = token else {
            return tools;
        };

        let total = tools.len();
        let visible: Vec<T> = tools
            .into_iter()
            .filter(|tool| self.is_visible(tool.tool_id(), Some(token)))
            .collect();

        tracing::debug!(
            subject = %token.subject(),
            visible = visible.len(),
            hidden = total - visible.len(),
            "Filtered tool catalog"
        );
        visible
    }
}

/// Discovery of every scope the server may request.
#[derive(Debug, Clone, Copy)]
pub struct ScopeCatalog;

impl ScopeCatalog {
    /// Union of all declared requirements and [`BASELINE_SCOPES`], sorted and
    /// deduplicated.
    pub fn discover_all(registry: &ScopeRegistry) -> Vec<String> {
        let mut scopes = registry.declared_scopes();
        scopes.extend(BASELINE_SCOPES.iter().map(|s| s.to_string()));
        scopes.into_iter().collect()
    }
}
