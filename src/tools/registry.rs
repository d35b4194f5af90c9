//! Tool lookup by name.

use std::fmt;
use std::sync::Arc;

use super::tool::Tool;
use crate::error::{DeltaError, Result};
use crate::provider::ToolDefinition;

/// A tool the provider executes itself (web search, file search, ...).
///
/// It is advertised to the provider but has no local executor.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeTool {
    pub name: String,
    pub description: String,
    pub options: serde_json::Value,
}

#[derive(Clone)]
enum RegisteredTool {
    Local(Arc<dyn Tool>),
    Native(NativeTool),
}

impl RegisteredTool {
    fn name(&self) -> &str {
        match self {
            Self::Local(tool) => tool.name(),
            Self::Native(tool) => &tool.name,
        }
    }
}

/// Tools available to one run, in registration order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.tools.iter().map(RegisteredTool::name))
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a locally executed tool.
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.register(Arc::new(tool));
        self
    }

    /// Builder: add a provider-executed tool.
    pub fn with_native(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.register_native(NativeTool {
            name: name.into(),
            description: description.into(),
            options: serde_json::Value::Null,
        });
        self
    }

    /// Add a tool, replacing any tool registered under the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.insert(RegisteredTool::Local(tool));
    }

    pub fn register_native(&mut self, tool: NativeTool) {
        self.insert(RegisteredTool::Native(tool));
    }

    fn insert(&mut self, entry: RegisteredTool) {
        match self.tools.iter().position(|t| t.name() == entry.name()) {
            Some(position) => self.tools[position] = entry,
            None => self.tools.push(entry),
        }
    }

    /// Resolve the local executor for `name`.
    ///
    /// Provider-executed tools resolve to [`DeltaError::ToolNotExecutable`].
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>> {
        match self.tools.iter().find(|t| t.name() == name) {
            Some(RegisteredTool::Local(tool)) => Ok(tool.clone()),
            Some(RegisteredTool::Native(_)) => Err(DeltaError::ToolNotExecutable(name.to_string())),
            None => Err(DeltaError::ToolNotFound(name.to_string())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name() == name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions advertised to the provider with each request.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|entry| match entry {
                RegisteredTool::Local(tool) => ToolDefinition {
                    name: tool.name().to_string(),
                    description: tool.description().to_string(),
                    parameters: tool.parameters().schema.clone(),
                    native: false,
                },
                RegisteredTool::Native(tool) => ToolDefinition {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.options.clone(),
                    native: true,
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{FnTool, ToolParameters};

    fn echo() -> FnTool {
        FnTool::new("echo", "Echo input", ToolParameters::empty(), |args, _ctx| async move {
            Ok(serde_json::Value::Object(args.into_inner()))
        })
    }

    #[test]
    fn resolves_local_tools() {
        let registry = ToolRegistry::new().with_tool(echo());
        assert_eq!(registry.resolve("echo").unwrap().name(), "echo");
    }

    #[test]
    fn missing_and_native_tools_do_not_resolve() {
        let registry = ToolRegistry::new().with_native("web_search", "Search the web");
        assert!(matches!(
            registry.resolve("web_search"),
            Err(DeltaError::ToolNotExecutable(_))
        ));
        assert!(matches!(
            registry.resolve("nope"),
            Err(DeltaError::ToolNotFound(_))
        ));
    }

    #[test]
    fn definitions_keep_registration_order() {
        let registry = ToolRegistry::new()
            .with_native("web_search", "Search the web")
            .with_tool(echo());
        let names: Vec<_> = registry.definitions().into_iter().map(|d| (d.name, d.native)).collect();
        assert_eq!(
            names,
            vec![("web_search".to_string(), true), ("echo".to_string(), false)]
        );
    }

    #[test]
    fn re_registering_replaces_in_place() {
        let mut registry = ToolRegistry::new().with_tool(echo());
        registry.register_native(NativeTool {
            name: "echo".into(),
            description: String::new(),
            options: serde_json::Value::Null,
        });
        assert_eq!(registry.len(), 1);
        assert!(registry.resolve("echo").is_err());
    }
}
