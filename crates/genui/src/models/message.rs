use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::role::Role;

/// Where a tool invocation is in its lifecycle. `Call` can move to `Result` exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum InvocationState {
    #[serde(alias = "partial-call")]
    Call,
    Result { result: Value },
}

/// The outcome of trying to resolve an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    AlreadyResolved,
}

/// One occurrence of a tool call within a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub args: Value,
    #[serde(flatten)]
    pub state: InvocationState,
}

impl ToolInvocation {
    pub fn call<I: Into<String>, N: Into<String>>(tool_call_id: I, tool_name: N, args: Value) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            args,
            state: InvocationState::Call,
        }
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.resolve(result);
        self
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, InvocationState::Call)
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.state {
            InvocationState::Call => None,
            InvocationState::Result { result } => Some(result),
        }
    }

    /// Move from `call` to `result`. A second resolution leaves the stored result untouched.
    pub fn resolve(&mut self, result: Value) -> Resolution {
        match self.state {
            InvocationState::Call => {
                self.state = InvocationState::Result { result };
                Resolution::Applied
            }
            InvocationState::Result { .. } => Resolution::AlreadyResolved,
        }
    }

    pub fn state_name(&self) -> &'static str {
        match self.state {
            InvocationState::Call => "call",
            InvocationState::Result { .. } => "result",
        }
    }
}

/// Content passed inside a message, in emission order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessagePart {
    Text {
        text: String,
    },
    ToolInvocation {
        #[serde(rename = "toolInvocation")]
        tool_invocation: ToolInvocation,
    },
    StepStart,
    #[serde(other)]
    Unsupported,
}

impl MessagePart {
    pub fn text<S: Into<String>>(text: S) -> Self {
        MessagePart::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessagePart::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn as_tool_invocation(&self) -> Option<&ToolInvocation> {
        match self {
            MessagePart::ToolInvocation { tool_invocation } => Some(tool_invocation),
            _ => None,
        }
    }
}

impl From<ToolInvocation> for MessagePart {
    fn from(tool_invocation: ToolInvocation) -> Self {
        MessagePart::ToolInvocation { tool_invocation }
    }
}

/// A message to or from an LLM, in the shape the chat client exchanges with the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "WireMessage")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub parts: Vec<MessagePart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Accepts both the parts-based message shape and the older `content` + `toolInvocations` one.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    #[serde(default = "generate_id")]
    id: String,
    role: Role,
    #[serde(default)]
    content: String,
    #[serde(default)]
    parts: Vec<MessagePart>,
    #[serde(default)]
    tool_invocations: Vec<ToolInvocation>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl From<WireMessage> for Message {
    fn from(wire: WireMessage) -> Self {
        let mut parts: Vec<MessagePart> = wire
            .parts
            .into_iter()
            .filter(|part| !matches!(part, MessagePart::Unsupported))
            .collect();

        if parts.is_empty() {
            if !wire.content.is_empty() {
                parts.push(MessagePart::text(wire.content.clone()));
            }
            parts.extend(wire.tool_invocations.into_iter().map(MessagePart::from));
        }

        Message {
            id: wire.id,
            role: wire.role,
            content: wire.content,
            parts,
            created_at: wire.created_at,
        }
    }
}

pub fn generate_id() -> String {
    nanoid::nanoid!(16)
}

impl Message {
    fn new(role: Role) -> Self {
        Message {
            id: generate_id(),
            role,
            content: String::new(),
            parts: Vec::new(),
            created_at: Some(Utc::now()),
        }
    }

    /// Create a new user message with the current timestamp
    pub fn user() -> Self {
        Self::new(Role::User)
    }

    /// Create a new assistant message with the current timestamp
    pub fn assistant() -> Self {
        Self::new(Role::Assistant)
    }

    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = id.into();
        self
    }

    /// Add text content to the message
    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        let text = text.into();
        self.content.push_str(&text);
        self.parts.push(MessagePart::Text { text });
        self
    }

    pub fn with_tool_invocation(mut self, invocation: ToolInvocation) -> Self {
        self.parts.push(invocation.into());
        self
    }

    pub fn with_step_start(mut self) -> Self {
        self.parts.push(MessagePart::StepStart);
        self
    }

    /// Append a streamed text delta, extending the trailing text part if there is one.
    pub fn push_text(&mut self, delta: &str) {
        self.content.push_str(delta);
        if let Some(MessagePart::Text { text }) = self.parts.last_mut() {
            text.push_str(delta);
        } else {
            self.parts.push(MessagePart::text(delta));
        }
    }

    pub fn push_part(&mut self, part: MessagePart) {
        self.parts.push(part);
    }

    pub fn text(&self) -> String {
        self.parts.iter().filter_map(MessagePart::as_text).collect()
    }

    pub fn tool_invocations(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.parts.iter().filter_map(MessagePart::as_tool_invocation)
    }

    pub fn tool_invocation_mut(&mut self, tool_call_id: &str) -> Option<&mut ToolInvocation> {
        self.parts.iter_mut().find_map(|part| match part {
            MessagePart::ToolInvocation { tool_invocation }
                if tool_invocation.tool_call_id == tool_call_id =>
            {
                Some(tool_invocation)
            }
            _ => None,
        })
    }

    pub fn has_pending_tool_call(&self) -> bool {
        self.tool_invocations().any(ToolInvocation::is_pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_parts_message() {
        let raw = json!({
            "id": "msg-1",
            "role": "assistant",
            "content": "Here you go",
            "parts": [
                {"type": "step-start"},
                {"type": "text", "text": "Here you go"},
                {"type": "tool-invocation", "toolInvocation": {
                    "state": "result",
                    "toolCallId": "call_1",
                    "toolName": "query_data",
                    "args": {"dataSource": "employees"},
                    "result": {"rows": []}
                }},
                {"type": "reasoning", "reasoning": "ignored"}
            ]
        });

        let message: Message = serde_json::from_value(raw).unwrap();
        assert_eq!(message.parts.len(), 3);
        let invocation = message.tool_invocations().next().unwrap();
        assert_eq!(invocation.tool_call_id, "call_1");
        assert_eq!(invocation.result(), Some(&json!({"rows": []})));
    }

    #[test]
    fn test_parses_legacy_tool_invocations() {
        let raw = json!({
            "id": "msg-2",
            "role": "assistant",
            "content": "Pick one",
            "toolInvocations": [{
                "state": "call",
                "toolCallId": "call_2",
                "toolName": "confirm_action",
                "args": {"summary": "Proceed?"}
            }]
        });

        let message: Message = serde_json::from_value(raw).unwrap();
        assert_eq!(message.text(), "Pick one");
        assert!(message.has_pending_tool_call());
    }

    #[test]
    fn test_partial_call_reads_as_call() {
        let invocation: ToolInvocation = serde_json::from_value(json!({
            "state": "partial-call",
            "toolCallId": "call_3",
            "toolName": "show_table",
            "args": {}
        }))
        .unwrap();
        assert!(invocation.is_pending());
    }

    #[test]
    fn test_invocation_serializes_state_inline() {
        let invocation = ToolInvocation::call("call_4", "confirm_action", json!({"risk": "low"}))
            .with_result(json!({"cancelled": true}));
        assert_eq!(
            serde_json::to_value(&invocation).unwrap(),
            json!({
                "toolCallId": "call_4",
                "toolName": "confirm_action",
                "args": {"risk": "low"},
                "state": "result",
                "result": {"cancelled": true}
            })
        );
    }

    #[test]
    fn test_second_resolution_is_ignored() {
        let mut invocation = ToolInvocation::call("call_5", "confirm_action", json!({}));
        assert_eq!(
            invocation.resolve(json!({"approvedActionId": "approve", "cancelled": false})),
            Resolution::Applied
        );
        assert_eq!(
            invocation.resolve(json!({"cancelled": true})),
            Resolution::AlreadyResolved
        );
        assert_eq!(
            invocation.result(),
            Some(&json!({"approvedActionId": "approve", "cancelled": false}))
        );
    }

    #[test]
    fn test_push_text_extends_trailing_part() {
        let mut message = Message::assistant();
        message.push_text("Hel");
        message.push_text("lo");
        message.push_part(ToolInvocation::call("c", "t", json!({})).into());
        message.push_text("!");
        assert_eq!(message.parts.len(), 3);
        assert_eq!(message.text(), "Hello!");
        assert_eq!(message.content, "Hello!");
    }
}
