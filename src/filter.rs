//! Per-caller catalog filtering.
//!
//! Anything with a stable tool identifier can be filtered by
//! [`ScopeAuthorizer::filter_catalog`](crate::oauth::ScopeAuthorizer::filter_catalog).
//! The filter runs on every listing call; callers connected at the same time
//! may hold tokens with different grants, so nothing is cached.

use std::sync::Arc;

use serde::Serialize;

/// Something that can appear in a tool catalog.
pub trait Filterable {
    /// The identifier the tool's scope requirement was declared under.
    fn tool_id(&self) -> &str;
}

impl Filterable for String {
    fn tool_id(&self) -> &str {
        self
    }
}

impl Filterable for &str {
    fn tool_id(&self) -> &str {
        self
    }
}

impl<T: Filterable + ?Sized> Filterable for Arc<T> {
    fn tool_id(&self) -> &str {
        (**self).tool_id()
    }
}

/// A catalog entry as shown to a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required_scopes: Vec<String>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            required_scopes: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn required_scopes(mut self, scopes: Vec<String>) -> Self {
        self.required_scopes = scopes;
        self
    }
}

impl Filterable for ToolDescriptor {
    fn tool_id(&self) -> &str {
        &self.name
    }
}
