use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;

use crate::errors::{AgentError, AgentResult};
use crate::models::message::{InvocationState, Message, MessagePart, ToolInvocation};
use crate::models::tool::Tool;
use crate::schema;

/// Server-side implementation of a tool. Executors run against in-memory data and are
/// expected to return quickly.
pub trait ToolExecutor: Send + Sync {
    fn execute(&self, args: Value) -> AgentResult<Value>;
}

impl<F> ToolExecutor for F
where
    F: Fn(Value) -> AgentResult<Value> + Send + Sync,
{
    fn execute(&self, args: Value) -> AgentResult<Value> {
        self(args)
    }
}

/// A tool as registered with the agent. Having an executor makes it a server tool;
/// without one it is a client tool whose result comes back from the user interface.
#[derive(Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    executor: Option<Arc<dyn ToolExecutor>>,
    result_schema: Option<Value>,
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("server_side", &self.is_server_side())
            .finish()
    }
}

impl ToolDefinition {
    pub fn server<N, D, F>(name: N, description: D, parameters: Value, executor: F) -> Self
    where
        N: Into<String>,
        D: Into<String>,
        F: Fn(Value) -> AgentResult<Value> + Send + Sync + 'static,
    {
        Self::with_executor(name, description, parameters, Arc::new(executor))
    }

    pub fn with_executor<N, D>(
        name: N,
        description: D,
        parameters: Value,
        executor: Arc<dyn ToolExecutor>,
    ) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            executor: Some(executor),
            result_schema: None,
        }
    }

    /// A tool the model can call but only the user can answer. `result_schema` is the
    /// shape the interface is allowed to submit back.
    pub fn client<N, D>(name: N, description: D, parameters: Value, result_schema: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            executor: None,
            result_schema: Some(result_schema),
        }
    }

    pub fn is_server_side(&self) -> bool {
        self.executor.is_some()
    }

    pub fn result_schema(&self) -> Option<&Value> {
        self.result_schema.as_ref()
    }

    pub fn as_tool(&self) -> Tool {
        Tool::new(&self.name, &self.description, self.parameters.clone())
    }
}

/// What dispatching a proposed call produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// The call has a result already, which may be an in-band `{error}`.
    Resolved(Value),
    /// A client tool: the call stays in `call` state until the interface answers.
    Pending,
}

/// Tools available to one workflow, kept in registration order.
#[derive(Default, Clone, Debug)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: ToolDefinition) -> AgentResult<()> {
        if self.index.contains_key(&definition.name) {
            return Err(AgentError::DuplicateTool(definition.name));
        }
        self.index.insert(definition.name.clone(), self.tools.len());
        self.tools.push(definition);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> AgentResult<&ToolDefinition> {
        self.index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))
    }

    /// The tools as shown to the model, in the order they were registered.
    pub fn list_for_prompt(&self) -> Vec<Tool> {
        self.tools.iter().map(ToolDefinition::as_tool).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Dispatch one call proposed by the model. Every failure becomes a resolved `{error}`
    /// result so the model can recover.
    pub fn dispatch(&self, name: &str, args: &Value) -> Dispatch {
        match self.try_dispatch(name, args) {
            Ok(Some(result)) => Dispatch::Resolved(result),
            Ok(None) => Dispatch::Pending,
            Err(err) => {
                tracing::warn!(tool = name, error = %err, "tool call failed");
                Dispatch::Resolved(err.to_tool_result())
            }
        }
    }

    fn try_dispatch(&self, name: &str, args: &Value) -> AgentResult<Option<Value>> {
        let definition = self.resolve(name)?;
        schema::validate(&definition.parameters, args)?;

        let Some(executor) = &definition.executor else {
            return Ok(None);
        };

        let args = args.clone();
        match catch_unwind(AssertUnwindSafe(|| executor.execute(args))) {
            Ok(result) => result.map(Some),
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "executor panicked".to_string());
                Err(AgentError::ExecutionError(reason))
            }
        }
    }

    /// Check a result the interface submitted for a client tool.
    pub fn validate_client_result(&self, invocation: &ToolInvocation) -> AgentResult<()> {
        let (Ok(definition), Some(result)) =
            (self.resolve(&invocation.tool_name), invocation.result())
        else {
            return Ok(());
        };
        match definition.result_schema() {
            Some(shape) if result.get("error").is_none() => schema::validate(shape, result),
            _ => Ok(()),
        }
    }

    /// Build the model's view of a replayed history.
    ///
    /// The history itself is never modified. In the returned copy, repeated tool call ids
    /// keep only their first occurrence, unresolved calls are left out, and client results
    /// that fail their shape check are replaced by the validation error.
    pub fn model_context(&self, messages: &[Message]) -> Vec<Message> {
        let mut seen = HashSet::new();
        messages
            .iter()
            .map(|message| {
                let mut copy = message.clone();
                copy.parts = message
                    .parts
                    .iter()
                    .filter_map(|part| self.reconcile_part(part, &mut seen))
                    .collect();
                copy
            })
            .filter(|m| !m.parts.is_empty())
            .collect()
    }

    fn reconcile_part(&self, part: &MessagePart, seen: &mut HashSet<String>) -> Option<MessagePart> {
        let MessagePart::ToolInvocation { tool_invocation } = part else {
            return match part {
                MessagePart::Text { text } if text.is_empty() => None,
                _ => Some(part.clone()),
            };
        };

        if !seen.insert(tool_invocation.tool_call_id.clone()) {
            tracing::info!(
                tool_call_id = %tool_invocation.tool_call_id,
                "ignoring repeated tool invocation in history"
            );
            return None;
        }
        if tool_invocation.is_pending() {
            return None;
        }

        let mut invocation = tool_invocation.clone();
        if let Err(err) = self.validate_client_result(&invocation) {
            tracing::warn!(
                tool_call_id = %invocation.tool_call_id,
                error = %err,
                "client submitted a result with the wrong shape"
            );
            invocation.state = InvocationState::Result {
                result: err.to_tool_result(),
            };
        }
        Some(invocation.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo() -> ToolDefinition {
        ToolDefinition::server(
            "echo",
            "Echoes back the input",
            json!({"type": "object", "properties": {"message": {"type": "string"}}, "required": ["message"]}),
            |args: Value| Ok(json!({"echo": args["message"]})),
        )
    }

    fn confirm() -> ToolDefinition {
        ToolDefinition::client(
            "confirm",
            "Ask the user to approve",
            json!({"type": "object"}),
            json!({
                "anyOf": [
                    {"type": "object", "required": ["approvedActionId"]},
                    {"type": "object", "required": ["cancelled"]}
                ]
            }),
        )
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(echo()).unwrap();
        registry.register(confirm()).unwrap();
        registry
    }

    #[test]
    fn test_list_for_prompt_keeps_registration_order() {
        let mut registry = ToolRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry
                .register(ToolDefinition::server(name, "d", json!({}), |_: Value| Ok(json!({}))))
                .unwrap();
        }
        let names: Vec<String> = registry.list_for_prompt().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = registry();
        assert_eq!(
            registry.register(echo()),
            Err(AgentError::DuplicateTool("echo".to_string()))
        );
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_dispatch_server_tool() {
        assert_eq!(
            registry().dispatch("echo", &json!({"message": "hi"})),
            Dispatch::Resolved(json!({"echo": "hi"}))
        );
    }

    #[test]
    fn test_dispatch_client_tool_is_pending() {
        assert_eq!(registry().dispatch("confirm", &json!({})), Dispatch::Pending);
    }

    #[test]
    fn test_dispatch_errors_are_in_band() {
        let registry = registry();
        assert_eq!(
            registry.dispatch("nope", &json!({})),
            Dispatch::Resolved(json!({"error": "Tool not found: nope"}))
        );
        assert_eq!(
            registry.dispatch("echo", &json!({})),
            Dispatch::Resolved(json!({"error": "Invalid parameters: $.message is required"}))
        );
    }

    #[test]
    fn test_dispatch_catches_panics() {
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDefinition::server("boom", "d", json!({}), |_: Value| -> AgentResult<Value> {
                panic!("exploded")
            }))
            .unwrap();
        assert_eq!(
            registry.dispatch("boom", &json!({})),
            Dispatch::Resolved(json!({"error": "Tool execution failed: exploded"}))
        );
    }

    #[test]
    fn test_model_context_reconciles_history() {
        let registry = registry();
        let history = vec![
            Message::user().with_text("go"),
            Message::assistant()
                .with_tool_invocation(
                    ToolInvocation::call("1", "echo", json!({"message": "a"})).with_result(json!({"echo": "a"})),
                )
                .with_tool_invocation(
                    ToolInvocation::call("2", "confirm", json!({})).with_result(json!({"approved": "yes"})),
                ),
            Message::assistant()
                .with_tool_invocation(
                    ToolInvocation::call("1", "echo", json!({"message": "a"})).with_result(json!({"echo": "a"})),
                )
                .with_tool_invocation(ToolInvocation::call("3", "confirm", json!({}))),
        ];

        let context = registry.model_context(&history);
        assert_eq!(context.len(), 2);
        let invocations: Vec<&ToolInvocation> = context[1].tool_invocations().collect();
        assert_eq!(invocations.len(), 2);
        let rejected = invocations[1].result().unwrap();
        assert!(rejected["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid parameters: $ matches no allowed shape"));
        // the history the caller holds is untouched
        assert_eq!(history[1].tool_invocations().nth(1).unwrap().result(), Some(&json!({"approved": "yes"})));
    }
}
