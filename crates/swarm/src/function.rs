//! Agent functions and the introspection that turns them into tool schemas.
//!
//! Rust closures carry no runtime signature, so each function is built with an explicit
//! declaration of its parameters. That declaration is the signature `describe` inspects.
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use crate::agent::Agent;
use crate::context::ContextVariables;
use crate::errors::IntrospectionError;
use crate::models::tool::{ParametersSchema, ToolSchema};

/// Reserved parameter name through which context variables are injected
pub const CONTEXT_VARIABLES_PARAM: &str = "context_variables";

lazy_static! {
    static ref FUNCTION_NAME: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// Primitive JSON types a parameter can be annotated with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Null,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
            ParamType::Null => "null",
        }
    }
}

/// Maps a Rust type onto the JSON type used in tool schemas
pub trait JsonType {
    const PARAM_TYPE: ParamType;
}

macro_rules! json_type {
    ($param:expr => $($ty:ty),+) => {
        $(impl JsonType for $ty {
            const PARAM_TYPE: ParamType = $param;
        })+
    };
}

json_type!(ParamType::String => String, &str, char);
json_type!(ParamType::Integer => i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
json_type!(ParamType::Number => f32, f64);
json_type!(ParamType::Boolean => bool);
json_type!(ParamType::Object => Map<String, Value>, ContextVariables);
json_type!(ParamType::Null => ());

impl<T> JsonType for Vec<T> {
    const PARAM_TYPE: ParamType = ParamType::Array;
}

impl<V> JsonType for HashMap<String, V> {
    const PARAM_TYPE: ParamType = ParamType::Object;
}

impl<T: JsonType> JsonType for Option<T> {
    const PARAM_TYPE: ParamType = T::PARAM_TYPE;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    /// `None` for unannotated parameters, which are described as strings
    pub param_type: Option<ParamType>,
    pub default: Option<Value>,
}

impl Parameter {
    pub fn json_type(&self) -> ParamType {
        self.param_type.unwrap_or(ParamType::String)
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// Normalized result of a tool invocation
#[derive(Debug, Clone, Default)]
pub struct ToolResult {
    pub value: String,
    pub context_variables: ContextVariables,
    pub agent: Option<Arc<Agent>>,
}

impl ToolResult {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn with_context_variable<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.context_variables.insert(key, value);
        self
    }

    pub fn with_agent(mut self, agent: Arc<Agent>) -> Self {
        self.agent = Some(agent);
        self
    }
}

/// What an agent function hands back to the dispatcher
pub enum FunctionOutput {
    /// A plain value, coerced to text through its `Display` impl
    Value(Box<dyn fmt::Display + Send + Sync>),
    Result(ToolResult),
    /// Hand the conversation off to another agent
    Handoff(Arc<Agent>),
}

impl FunctionOutput {
    pub fn value<T: fmt::Display + Send + Sync + 'static>(value: T) -> Self {
        FunctionOutput::Value(Box::new(value))
    }
}

impl fmt::Debug for FunctionOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionOutput::Value(_) => f.write_str("Value(..)"),
            FunctionOutput::Result(result) => f.debug_tuple("Result").field(result).finish(),
            FunctionOutput::Handoff(agent) => f.debug_tuple("Handoff").field(&agent.name).finish(),
        }
    }
}

impl From<String> for FunctionOutput {
    fn from(value: String) -> Self {
        FunctionOutput::value(value)
    }
}

impl From<&str> for FunctionOutput {
    fn from(value: &str) -> Self {
        FunctionOutput::value(value.to_string())
    }
}

impl From<Value> for FunctionOutput {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => FunctionOutput::value(text),
            other => FunctionOutput::value(other),
        }
    }
}

impl From<ToolResult> for FunctionOutput {
    fn from(result: ToolResult) -> Self {
        FunctionOutput::Result(result)
    }
}

impl From<Arc<Agent>> for FunctionOutput {
    fn from(agent: Arc<Agent>) -> Self {
        FunctionOutput::Handoff(agent)
    }
}

/// Keyword arguments handed to an agent function
#[derive(Debug, Clone, Default)]
pub struct FunctionArgs {
    arguments: Map<String, Value>,
    context_variables: Option<ContextVariables>,
}

impl FunctionArgs {
    pub fn new(arguments: Map<String, Value>) -> Self {
        Self {
            arguments,
            context_variables: None,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name)
    }

    /// Read a string argument, failing if it is missing or not a string
    pub fn str(&self, name: &str) -> Result<&str> {
        self.arguments
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("argument '{}' must be a string", name))
    }

    /// Deserialize an argument into any owned type
    pub fn parse<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self
            .arguments
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("missing argument '{}'", name))?;
        Ok(serde_json::from_value(value)?)
    }

    /// The injected context variables, present only for functions that declare them
    pub fn context_variables(&self) -> Option<&ContextVariables> {
        self.context_variables.as_ref()
    }
}

type Handler = Arc<dyn Fn(FunctionArgs) -> BoxFuture<'static, Result<FunctionOutput>> + Send + Sync>;

/// A callable an agent exposes to the model as a tool
#[derive(Clone)]
pub struct AgentFunction {
    name: String,
    description: String,
    parameters: Vec<Parameter>,
    takes_context_variables: bool,
    handler: Handler,
}

impl fmt::Debug for AgentFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentFunction")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("takes_context_variables", &self.takes_context_variables)
            .finish()
    }
}

impl AgentFunction {
    pub fn builder<S: Into<String>>(name: S) -> FunctionBuilder {
        FunctionBuilder {
            name: name.into(),
            description: None,
            parameters: Vec::new(),
            takes_context_variables: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn takes_context_variables(&self) -> bool {
        self.takes_context_variables
    }

    /// Describe the function as a provider-neutral tool schema.
    ///
    /// The reserved context variables parameter is included; strip it with
    /// [`strip_context_variables`] before showing the schema to a provider.
    pub fn describe(&self) -> Result<ToolSchema, IntrospectionError> {
        if !FUNCTION_NAME.is_match(&self.name) {
            return Err(IntrospectionError::InvalidName(self.name.clone()));
        }

        let mut seen = HashSet::new();
        let mut properties = Map::new();
        let mut required = Vec::new();
        for parameter in self.declared_parameters() {
            if !seen.insert(parameter.name.clone()) {
                return Err(IntrospectionError::DuplicateParameter {
                    function: self.name.clone(),
                    parameter: parameter.name,
                });
            }
            properties.insert(
                parameter.name.clone(),
                json!({ "type": parameter.json_type().as_str() }),
            );
            if parameter.is_required() {
                required.push(parameter.name);
            }
        }

        Ok(ToolSchema::new(
            &self.name,
            &self.description,
            ParametersSchema::new(properties, required),
        ))
    }

    /// The full signature, including the reserved context variables parameter
    fn declared_parameters(&self) -> Vec<Parameter> {
        let mut parameters = self.parameters.clone();
        if self.takes_context_variables {
            parameters.push(Parameter {
                name: CONTEXT_VARIABLES_PARAM.to_string(),
                param_type: Some(ParamType::Object),
                default: None,
            });
        }
        parameters
    }

    /// Bind keyword arguments to the declared signature and invoke the function.
    ///
    /// Missing optional arguments take their defaults. Missing required arguments and
    /// undeclared arguments fail the call, as does any error raised by the function.
    pub async fn call(
        &self,
        mut arguments: Map<String, Value>,
        context_variables: &ContextVariables,
    ) -> Result<FunctionOutput> {
        // Only functions that declare the reserved parameter have it bound from the run
        if self.takes_context_variables {
            arguments.remove(CONTEXT_VARIABLES_PARAM);
        }

        if let Some(unexpected) = arguments
            .keys()
            .find(|key| !self.parameters.iter().any(|p| &p.name == *key))
        {
            return Err(anyhow!(
                "{}() got an unexpected keyword argument '{}'",
                self.name,
                unexpected
            ));
        }

        for parameter in &self.parameters {
            if arguments.contains_key(&parameter.name) {
                continue;
            }
            match &parameter.default {
                Some(default) => {
                    arguments.insert(parameter.name.clone(), default.clone());
                }
                None => {
                    return Err(anyhow!(
                        "{}() missing required argument '{}'",
                        self.name,
                        parameter.name
                    ))
                }
            }
        }

        let args = FunctionArgs {
            arguments,
            context_variables: self
                .takes_context_variables
                .then(|| context_variables.clone()),
        };
        (self.handler)(args).await
    }
}

/// Hide the context variables parameter from a schema shown to a provider
pub fn strip_context_variables(schema: ToolSchema) -> ToolSchema {
    schema.without_parameter(CONTEXT_VARIABLES_PARAM)
}

pub struct FunctionBuilder {
    name: String,
    description: Option<String>,
    parameters: Vec<Parameter>,
    takes_context_variables: bool,
}

impl FunctionBuilder {
    /// Documentation shown to the model as the tool description
    pub fn description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare a required parameter annotated with `T`'s JSON type
    pub fn param<T: JsonType>(self, name: &str) -> Self {
        self.push(name, Some(T::PARAM_TYPE), None)
    }

    /// Declare an optional parameter annotated with `T`'s JSON type
    pub fn param_with_default<T: JsonType>(self, name: &str, default: Value) -> Self {
        self.push(name, Some(T::PARAM_TYPE), Some(default))
    }

    /// Declare a required parameter with no type annotation
    pub fn untyped_param(self, name: &str) -> Self {
        self.push(name, None, None)
    }

    /// Ask for the run's context variables to be injected on each call
    pub fn context_variables(mut self) -> Self {
        self.takes_context_variables = true;
        self
    }

    fn push(mut self, name: &str, param_type: Option<ParamType>, default: Option<Value>) -> Self {
        self.parameters.push(Parameter {
            name: name.to_string(),
            param_type,
            default,
        });
        self
    }

    /// Finish with a synchronous handler
    pub fn build<F, O>(self, handler: F) -> AgentFunction
    where
        F: Fn(FunctionArgs) -> Result<O> + Send + Sync + 'static,
        O: Into<FunctionOutput>,
    {
        self.build_async(move |args| {
            let output: Result<FunctionOutput> = handler(args).map(Into::into);
            async move { output }
        })
    }

    /// Finish with an asynchronous handler
    pub fn build_async<F, Fut, O>(self, handler: F) -> AgentFunction
    where
        F: Fn(FunctionArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
        O: Into<FunctionOutput>,
    {
        let handler: Handler = Arc::new(
            move |args| -> BoxFuture<'static, Result<FunctionOutput>> {
                let future = handler(args);
                Box::pin(async move { future.await.map(Into::into) })
            },
        );
        AgentFunction {
            name: self.name,
            description: self.description.unwrap_or_default(),
            parameters: self.parameters,
            takes_context_variables: self.takes_context_variables,
            handler,
        }
    }
}
