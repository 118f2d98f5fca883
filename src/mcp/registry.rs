//! Immutable registry of tools and prompts served by [`McpServer`](super::McpServer).
//!
//! Built once at startup through [`RegistryBuilder`]; the serving loop only
//! ever borrows it.

use super::protocol::{GetPromptResult, PromptDescriptor};
use super::ToolDescriptor;
use crate::tools::ToolError;
use crate::value::Arguments;
use serde_json::Value;
use thiserror::Error;

/// A named, schema-described callable
pub trait ToolHandler: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the argument object
    fn input_schema(&self) -> Value;

    fn call(&self, args: &Arguments) -> Result<String, ToolError>;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// A named prompt template
pub trait PromptHandler: Send + Sync {
    fn descriptor(&self) -> PromptDescriptor;

    fn render(&self, args: &Arguments) -> Result<GetPromptResult, ToolError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("tool already registered: {0}")]
    DuplicateTool(String),
    #[error("prompt already registered: {0}")]
    DuplicatePrompt(String),
}

#[derive(Default)]
pub struct Registry {
    tools: Vec<Box<dyn ToolHandler>>,
    prompts: Vec<Box<dyn PromptHandler>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Descriptors in registration order
    pub fn tools(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor()).collect()
    }

    pub fn tool(&self, name: &str) -> Option<&dyn ToolHandler> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn prompts(&self) -> Vec<PromptDescriptor> {
        self.prompts.iter().map(|p| p.descriptor()).collect()
    }

    pub fn prompt(&self, name: &str) -> Option<&dyn PromptHandler> {
        self.prompts
            .iter()
            .find(|p| p.descriptor().name == name)
            .map(|p| p.as_ref())
    }

    pub fn has_prompts(&self) -> bool {
        !self.prompts.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field(
                "tools",
                &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .field(
                "prompts",
                &self
                    .prompts
                    .iter()
                    .map(|p| p.descriptor().name)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    pub fn tool(mut self, handler: impl ToolHandler + 'static) -> Result<Self, RegistryError> {
        if self.registry.tool(handler.name()).is_some() {
            return Err(RegistryError::DuplicateTool(handler.name().to_string()));
        }
        self.registry.tools.push(Box::new(handler));
        Ok(self)
    }

    pub fn prompt(mut self, handler: impl PromptHandler + 'static) -> Result<Self, RegistryError> {
        let name = handler.descriptor().name;
        if self.registry.prompt(&name).is_some() {
            return Err(RegistryError::DuplicatePrompt(name));
        }
        self.registry.prompts.push(Box::new(handler));
        Ok(self)
    }

    pub fn build(self) -> Registry {
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::hello::Hello;
    use crate::tools::prompt_test::PromptTest;

    #[test]
    fn test_registration_order_and_lookup() {
        let registry = Registry::builder()
            .tool(Hello)
            .unwrap()
            .prompt(PromptTest)
            .unwrap()
            .build();

        let names: Vec<String> = registry.tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["hello".to_string()]);
        assert!(registry.tool("hello").is_some());
        assert!(registry.tool("missing").is_none());
        assert!(registry.has_prompts());
        assert!(registry.prompt("prompt_test").is_some());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = Registry::builder()
            .tool(Hello)
            .unwrap()
            .tool(Hello)
            .err()
            .unwrap();
        assert_eq!(err, RegistryError::DuplicateTool("hello".to_string()));

        let err = Registry::builder()
            .prompt(PromptTest)
            .unwrap()
            .prompt(PromptTest)
            .err()
            .unwrap();
        assert_eq!(err, RegistryError::DuplicatePrompt("prompt_test".to_string()));
    }
}
