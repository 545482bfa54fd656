use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::errors::{RegistryError, ToolResult};

lazy_static! {
    static ref VALID_NAME: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// A side-effecting operation the model can trigger through an inline marker.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The name the model writes between the marker tags
    fn name(&self) -> &str;

    /// A description of what the tool does, shown to the model
    fn description(&self) -> &str;

    /// Run the tool with the marker's argument text and return the text
    /// that replaces the marker in the reply.
    async fn invoke(&self, argument: &str) -> ToolResult<String>;
}

/// The set of tools the processor can dispatch to, keyed by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if !VALID_NAME.is_match(&name) {
            return Err(RegistryError::InvalidName(name));
        }
        if self.by_name.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        self.by_name.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn with(mut self, tool: Arc<dyn Tool>) -> Result<Self, RegistryError> {
        self.register(tool)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.by_name.get(name).map(|&i| &self.tools[i])
    }

    /// Tools in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.iter()
    }
}

impl Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.tools.iter().map(|t| t.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(&'static str);

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "Echoes its argument"
        }

        async fn invoke(&self, argument: &str) -> ToolResult<String> {
            Ok(argument.to_string())
        }
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = ToolRegistry::new().with(Arc::new(Echo("echo"))).unwrap();

        let tool = registry.get("echo").expect("registered tool");
        assert_eq!(tool.invoke("hi").await.unwrap(), "hi");
        assert!(registry.get("missing").is_none());
        assert_eq!(format!("{:?}", registry), r#"["echo"]"#);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo("echo"))).unwrap();

        let err = registry.register(Arc::new(Echo("echo"))).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateTool("echo".to_string()));
        assert_eq!(err.to_string(), "Duplicate tool name: echo");
    }

    #[test]
    fn test_invalid_name_rejected() {
        let result = ToolRegistry::new().with(Arc::new(Echo("web browser")));
        assert!(matches!(result, Err(RegistryError::InvalidName(_))));
    }
}
