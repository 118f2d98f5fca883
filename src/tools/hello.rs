//! `hello` tool: greets a person by name.

use super::ToolError;
use crate::mcp::ToolHandler;
use crate::value::{ArgumentError, Arguments, FromArguments};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloArgs {
    pub name: String,
}

impl FromArguments for HelloArgs {
    fn from_arguments(args: &Arguments) -> Result<Self, ArgumentError> {
        Ok(Self {
            name: args.required_str("name")?.to_string(),
        })
    }
}

pub struct Hello;

impl ToolHandler for Hello {
    fn name(&self) -> &str {
        "hello"
    }

    fn description(&self) -> &str {
        "Say hello to a person"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "The name to say hello to"
                }
            },
            "required": ["name"]
        })
    }

    fn call(&self, args: &Arguments) -> Result<String, ToolError> {
        let args = HelloArgs::from_arguments(args)?;
        Ok(format!("Hello {}", args.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting() {
        let args = Arguments::new().with("name", "World!");
        assert_eq!(Hello.call(&args).unwrap(), "Hello World!");
    }

    #[test]
    fn test_missing_name() {
        let err = Hello.call(&Arguments::new()).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(ArgumentError::Missing(_))));
    }
}
