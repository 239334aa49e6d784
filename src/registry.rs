//! Scope requirement side-table.
//!
//! The [`ScopeRegistry`] maps a stable tool identifier to the
//! [`ScopeRequirement`] declared for it when the tool was registered. Tool
//! implementations themselves live elsewhere; this table is queryable before
//! any invocation so catalog listing can filter without calling a tool.
//!
//! # Example
//!
//! ```rust
//! use std::collections::BTreeSet;
//! use mcp_oauth_gate::ScopeRegistry;
//!
//! let registry = ScopeRegistry::new();
//! registry.declare_requirement("notes_create_note", ["notes:write"]);
//! registry.declare_requirement("notes_get_note", ["notes:read"]);
//!
//! let granted: BTreeSet<String> = ["notes:read".to_string()].into();
//! assert!(registry.has_required_scopes("notes_get_note", &granted));
//! assert!(!registry.has_required_scopes("notes_create_note", &granted));
//! ```

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use crate::oauth::scope::ScopeRequirement;

/// Thread-safe map from tool identifier to its scope requirement.
///
/// Requirements are immutable once declared: a second declaration for the
/// same tool is ignored and logged.
#[derive(Debug, Default)]
pub struct ScopeRegistry {
    requirements: RwLock<HashMap<String, ScopeRequirement>>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the scopes `tool_id` requires.
    ///
    /// Returns `false` (and leaves the existing requirement in place) if the
    /// tool already has one.
    pub fn declare_requirement(
        &self,
        tool_id: impl Into<String>,
        scopes: impl IntoIterator<Item = impl Into<String>>,
    ) -> bool {
        let tool_id = tool_id.into();
        let requirement = ScopeRequirement::all(scopes);

        let mut requirements = self
            .requirements
            .write()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = requirements.get(&tool_id) {
            tracing::warn!(
                tool = %tool_id,
                existing = ?existing.scopes(),
                ignored = ?requirement.scopes(),
                "Scope requirement already declared, keeping the first"
            );
            return false;
        }

        tracing::debug!(tool = %tool_id, scopes = ?requirement.scopes(), "Declared scope requirement");
        requirements.insert(tool_id, requirement);
        true
    }

    /// The requirement for `tool_id`; undeclared tools require nothing.
    pub fn requirement(&self, tool_id: &str) -> ScopeRequirement {
        self.requirements
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(tool_id)
            .cloned()
            .unwrap_or_default()
    }

    /// The declared scope list for `tool_id`, in declaration order.
    pub fn get_requirement(&self, tool_id: &str) -> Vec<String> {
        self.requirement(tool_id).scopes().to_vec()
    }

    pub fn has_required_scopes(&self, tool_id: &str, caller_scopes: &BTreeSet<String>) -> bool {
        self.requirement(tool_id).is_satisfied_by(caller_scopes)
    }

    pub fn contains(&self, tool_id: &str) -> bool {
        self.requirements
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(tool_id)
    }

    /// Identifiers of every tool with a declared requirement, sorted.
    pub fn tool_ids(&self) -> Vec<String> {
        let requirements = self.requirements.read().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = requirements.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Union of every declared scope.
    pub fn declared_scopes(&self) -> BTreeSet<String> {
        self.requirements
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .flat_map(|r| r.scopes().iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.requirements
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
