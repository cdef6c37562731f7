pub mod reasoning;

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::{Map, Value, json};
use tracing::{debug, error, info};

use crate::config::ToolFilter;
use crate::error::RegistryError;
use crate::invocation::{InvocationOutcome, InvocationRequest};

type ToolHandler = dyn Fn(InvocationRequest) -> BoxFuture<'static, InvocationOutcome> + Send + Sync;

/// One declared parameter of a capability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamSpec {
    name: String,
    description: String,
    kind: String,
    required: bool,
    non_empty: bool,
}

impl ParamSpec {
    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind: "string".to_string(),
            required: false,
            non_empty: false,
        }
    }

    /// Advertised as required in the schema. Absent values still decode to an
    /// empty string unless [`ParamSpec::non_empty`] is also set.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn non_empty(mut self) -> Self {
        self.required = true;
        self.non_empty = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_non_empty(&self) -> bool {
        self.non_empty
    }
}

/// Text payload handed back to the transport. Failures travel here too, so
/// the transport call itself only fails for unknown capabilities.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallToolResult {
    pub text: String,
    pub is_error: bool,
}

impl From<InvocationOutcome> for CallToolResult {
    fn from(outcome: InvocationOutcome) -> Self {
        match outcome {
            InvocationOutcome::Success(result) => Self {
                text: result.text,
                is_error: false,
            },
            InvocationOutcome::Failure { message, .. } => Self {
                text: message,
                is_error: true,
            },
        }
    }
}

#[derive(Clone)]
pub struct ToolSpec {
    name: String,
    description: String,
    gate_key: String,
    params: Vec<ParamSpec>,
    handler: Arc<ToolHandler>,
}

impl std::fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("gate_key", &self.gate_key)
            .field("params", &self.params)
            .finish()
    }
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            gate_key: name.clone(),
            name,
            description: description.into(),
            params: Vec::new(),
            handler: Arc::new(|_request| {
                Box::pin(async { InvocationOutcome::internal("tool handler not configured") })
            }),
        }
    }

    /// Key matched against the enable list. Defaults to the tool name.
    pub fn with_gate_key(mut self, gate_key: impl Into<String>) -> Self {
        self.gate_key = gate_key.into();
        self
    }

    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(InvocationRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = InvocationOutcome> + Send + 'static,
    {
        self.handler = Arc::new(move |request| Box::pin(handler(request)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn gate_key(&self) -> &str {
        &self.gate_key
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            properties.insert(
                param.name().to_string(),
                json!({"type": param.kind(), "description": param.description()}),
            );
        }

        let required = self
            .params
            .iter()
            .filter(|param| param.is_required())
            .map(|param| Value::String(param.name().to_string()))
            .collect::<Vec<_>>();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Validates the arguments and runs the handler. A panic anywhere inside
    /// is caught and reported as an internal failure.
    pub async fn execute(&self, arguments: Value) -> InvocationOutcome {
        let run = async {
            match InvocationRequest::from_arguments(&self.params, &arguments) {
                Ok(request) => (self.handler)(request).await,
                Err(err) => {
                    debug!(tool = %self.name, error = %err, "rejected invalid arguments");
                    InvocationOutcome::invalid(&err)
                }
            }
        };

        match AssertUnwindSafe(run).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(tool = %self.name, panic = %message, "tool handler panicked");
                InvocationOutcome::internal(message)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Capabilities exposed in this process, after the enable list is applied.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    filter: ToolFilter,
    tools: Vec<ToolSpec>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new(filter: ToolFilter) -> Self {
        Self {
            filter,
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn is_enabled(&self, gate_key: &str) -> bool {
        self.filter.is_enabled(gate_key)
    }

    /// Registers `tool` if its gate key passes the filter. Returns whether it
    /// was registered.
    pub fn register(&mut self, tool: ToolSpec) -> Result<bool, RegistryError> {
        if self.index.contains_key(tool.name()) {
            return Err(RegistryError::DuplicateCapability(tool.name().to_string()));
        }

        if !self.is_enabled(tool.gate_key()) {
            info!(tool = %tool.name(), gate = %tool.gate_key(), "capability disabled");
            return Ok(false);
        }

        info!(tool = %tool.name(), "registering capability");
        self.index.insert(tool.name().to_string(), self.tools.len());
        self.tools.push(tool);
        Ok(true)
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.index.get(name).map(|position| &self.tools[*position])
    }

    pub fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    pub async fn call(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<CallToolResult, RegistryError> {
        let tool = self
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

        debug!(tool = %name, "invoking capability");
        let outcome = tool.execute(arguments).await;
        debug!(tool = %name, success = outcome.is_success(), "capability finished");

        Ok(outcome.into())
    }
}
