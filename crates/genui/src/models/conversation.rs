use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::{Message, Resolution, ToolInvocation};
use super::role::Role;
use crate::errors::ConversationError;

/// The full ordered transcript. It is append-only; resolved invocations are never rewritten.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The trailing assistant message, created if the transcript does not end with one.
    pub fn last_assistant_mut(&mut self) -> &mut Message {
        let needs_new = !matches!(self.messages.last(), Some(m) if m.role == Role::Assistant);
        if needs_new {
            self.messages.push(Message::assistant());
        }
        let last = self.messages.len() - 1;
        &mut self.messages[last]
    }

    pub fn find_invocation(&self, tool_call_id: &str) -> Option<&ToolInvocation> {
        self.messages
            .iter()
            .flat_map(Message::tool_invocations)
            .find(|inv| inv.tool_call_id == tool_call_id)
    }

    /// Resolve a pending client-side invocation with a user-supplied result.
    ///
    /// Submitting a result for an invocation that already holds one is a no-op and
    /// reports `AlreadyResolved`, so client retries never create a second transition.
    pub fn add_tool_result(
        &mut self,
        tool_call_id: &str,
        result: Value,
    ) -> Result<Resolution, ConversationError> {
        self.messages
            .iter_mut()
            .rev()
            .find_map(|m| m.tool_invocation_mut(tool_call_id))
            .map(|inv| inv.resolve(result))
            .ok_or_else(|| ConversationError::UnknownToolCall(tool_call_id.to_string()))
    }

    pub fn pending_client_calls(&self) -> Vec<&ToolInvocation> {
        self.messages
            .iter()
            .flat_map(Message::tool_invocations)
            .filter(|inv| inv.is_pending())
            .collect()
    }

    /// Remove messages from the end back to and including the last user message.
    /// Returns the text of the removed user message.
    pub fn rewind_last_user(&mut self) -> Option<String> {
        let idx = self.messages.iter().rposition(|m| m.role == Role::User)?;
        let removed = self.messages.split_off(idx);
        removed.first().map(Message::text)
    }
}

impl From<Vec<Message>> for Conversation {
    fn from(messages: Vec<Message>) -> Self {
        Conversation { messages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pending_conversation() -> Conversation {
        Conversation::from(vec![
            Message::user().with_text("Delete the stale trades"),
            Message::assistant()
                .with_step_start()
                .with_text("Please confirm.")
                .with_tool_invocation(ToolInvocation::call(
                    "call_confirm",
                    "confirm_action",
                    json!({
                        "summary": "Delete 3 trades",
                        "risk": "high",
                        "actions": [{"id": "approve", "label": "Approve"}, {"id": "deny", "label": "Deny"}]
                    }),
                )),
        ])
    }

    #[test]
    fn test_add_tool_result_is_idempotent() {
        let mut conversation = pending_conversation();
        let first = json!({"approvedActionId": "approve", "cancelled": false});

        assert_eq!(
            conversation.add_tool_result("call_confirm", first.clone()),
            Ok(Resolution::Applied)
        );
        let snapshot = conversation.clone();

        assert_eq!(
            conversation.add_tool_result("call_confirm", json!({"cancelled": true})),
            Ok(Resolution::AlreadyResolved)
        );
        assert_eq!(conversation, snapshot);
        assert_eq!(
            conversation.find_invocation("call_confirm").unwrap().result(),
            Some(&first)
        );
        assert!(conversation.pending_client_calls().is_empty());
    }

    #[test]
    fn test_unknown_tool_call_is_an_error() {
        let mut conversation = pending_conversation();
        assert_eq!(
            conversation.add_tool_result("call_missing", json!({})),
            Err(ConversationError::UnknownToolCall("call_missing".to_string()))
        );
    }

    #[test]
    fn test_round_trip_preserves_invocations() {
        let mut conversation = pending_conversation();
        conversation.push(
            Message::assistant().with_tool_invocation(
                ToolInvocation::call("call_query", "query_data", json!({"dataSource": "employees"}))
                    .with_result(json!({"rows": [{"Name": "Ada"}], "totalMatches": 1})),
            ),
        );

        let wire = serde_json::to_string(&conversation).unwrap();
        let parsed: Conversation = serde_json::from_str(&wire).unwrap();
        assert_eq!(parsed, conversation);
    }

    #[test]
    fn test_rewind_last_user() {
        let mut conversation = pending_conversation();
        assert_eq!(
            conversation.rewind_last_user().as_deref(),
            Some("Delete the stale trades")
        );
        assert!(conversation.is_empty());
    }

    #[test]
    fn test_last_assistant_mut_appends_when_needed() {
        let mut conversation = Conversation::from(vec![Message::user().with_text("hi")]);
        conversation.last_assistant_mut().push_text("hello");
        conversation.last_assistant_mut().push_text(" there");
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.last().unwrap().text(), "hello there");
    }
}
