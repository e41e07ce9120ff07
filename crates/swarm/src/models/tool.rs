use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A model-issued request to invoke a named function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRequest {
    /// Provider-issued id, echoed back in the matching tool-role message
    pub id: String,
    /// The name of the function to invoke
    pub name: String,
    /// Raw JSON text of the arguments, parsed only at dispatch time
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new<I, N, A>(id: I, name: N, arguments: A) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        A: Into<String>,
    {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// Provider-neutral tool schema.
///
/// Serializes to `{"type": "function", "function": {name, description, parameters}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: ParametersSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParametersSchema {
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: Map<String, Value>,
    pub required: Vec<String>,
}

impl ToolSchema {
    pub fn new<N, D>(name: N, description: D, parameters: ParametersSchema) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        ToolSchema {
            kind: "function".to_string(),
            function: FunctionSchema {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// Remove a parameter from both `properties` and `required`
    pub fn without_parameter(mut self, parameter: &str) -> Self {
        let parameters = &mut self.function.parameters;
        parameters.properties.remove(parameter);
        parameters.required.retain(|name| name != parameter);
        self
    }

    pub fn to_value(&self) -> Value {
        // A struct of strings, maps and vectors cannot fail to serialize
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl ParametersSchema {
    pub fn new(properties: Map<String, Value>, required: Vec<String>) -> Self {
        Self {
            kind: "object".to_string(),
            properties,
            required,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_schema_wire_shape() {
        let mut properties = Map::new();
        properties.insert("location".to_string(), json!({"type": "string"}));
        let schema = ToolSchema::new(
            "get_weather",
            "Get the weather",
            ParametersSchema::new(properties, vec!["location".to_string()]),
        );

        assert_eq!(
            schema.to_value(),
            json!({
                "type": "function",
                "function": {
                    "name": "get_weather",
                    "description": "Get the weather",
                    "parameters": {
                        "type": "object",
                        "properties": {"location": {"type": "string"}},
                        "required": ["location"]
                    }
                }
            })
        );
    }

    #[test]
    fn test_without_parameter() {
        let mut properties = Map::new();
        properties.insert("query".to_string(), json!({"type": "string"}));
        properties.insert("context_variables".to_string(), json!({"type": "object"}));
        let schema = ToolSchema::new(
            "search",
            "",
            ParametersSchema::new(
                properties,
                vec!["query".to_string(), "context_variables".to_string()],
            ),
        )
        .without_parameter("context_variables");

        assert!(!schema.function.parameters.properties.contains_key("context_variables"));
        assert_eq!(schema.function.parameters.required, vec!["query".to_string()]);
    }
}
