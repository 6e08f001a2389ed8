pub mod session_file;

use anyhow::Result;
use futures::StreamExt;
use std::collections::HashSet;
use std::path::PathBuf;

use crate::client::ChatClient;
use crate::prompt::{InputType, Prompt};
use genui::models::conversation::Conversation;
use genui::models::message::{Message, MessagePart};
use genui::models::role::Role;
use genui::protocol::StreamReducer;
use genui::renderer::{RendererRegistry, UserAction};
use session_file::persist_messages;

/// How a submitted turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Finished,
    Failed(String),
    Interrupted,
}

pub struct Session<'a> {
    client: ChatClient,
    prompt: Box<dyn Prompt + 'a>,
    conversation: Conversation,
    renderer: RendererRegistry,
    session_file: Option<PathBuf>,
    /// Invocations the user has already been asked about.
    prompted: HashSet<String>,
}

impl<'a> Session<'a> {
    pub fn new(
        client: ChatClient,
        prompt: Box<dyn Prompt + 'a>,
        messages: Vec<Message>,
        session_file: Option<PathBuf>,
    ) -> Self {
        let conversation = Conversation::from(messages);
        let prompted = conversation
            .messages()
            .iter()
            .flat_map(Message::tool_invocations)
            .map(|inv| inv.tool_call_id.clone())
            .collect();
        Session {
            client,
            prompt,
            conversation,
            renderer: RendererRegistry::new(),
            session_file,
            prompted,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub async fn start(&mut self) -> Result<()> {
        if let Some(path) = &self.session_file {
            let note = format!(
                "Starting {} session with {} messages. Recording to {}\n",
                self.client.workflow().name(),
                self.conversation.len(),
                path.display()
            );
            self.prompt.render_text(&note);
        }
        self.prompt.genui_ready();

        loop {
            let input = self.prompt.get_input()?;
            match input.input_type {
                InputType::Message => {
                    if let Some(content) = input.content {
                        self.conversation.push(Message::user().with_text(content));
                        self.persist();
                    }
                }
                InputType::Exit => break,
                InputType::AskAgain => continue,
            }

            self.process().await?;
        }
        self.close_session();
        Ok(())
    }

    /// Submit the conversation until a reply needs nothing more from the user.
    pub async fn process(&mut self) -> Result<TurnOutcome> {
        loop {
            let rendered = self.rendered_parts();
            self.prompt.show_busy();
            let outcome = self.submit().await;
            self.prompt.hide_busy();

            match outcome {
                TurnOutcome::Finished => {}
                TurnOutcome::Failed(error) => {
                    self.render_new_parts(rendered);
                    self.prompt.render_text(&format!("Error: {}\n", error));
                    self.persist();
                    return Ok(TurnOutcome::Failed(error));
                }
                TurnOutcome::Interrupted => {
                    self.prompt.render_text(
                        " Interrupt: Resetting conversation to before the last sent message...\n",
                    );
                    self.persist();
                    return Ok(TurnOutcome::Interrupted);
                }
            }

            self.render_new_parts(rendered);
            self.persist();

            match self.next_action()? {
                Some(action) => {
                    action.apply(&mut self.conversation)?;
                    self.persist();
                }
                None => return Ok(TurnOutcome::Finished),
            }
        }
    }

    async fn submit(&mut self) -> TurnOutcome {
        let mut frames = match self.client.send(self.conversation.messages()).await {
            Ok(frames) => frames,
            Err(e) => return TurnOutcome::Failed(e.to_string()),
        };

        let mut reducer = StreamReducer::new();
        loop {
            tokio::select! {
                frame = frames.next() => {
                    match frame {
                        Some(Ok(frame)) => {
                            if let Err(e) = reducer.apply(&mut self.conversation, frame) {
                                return TurnOutcome::Failed(e.to_string());
                            }
                        }
                        Some(Err(e)) => return TurnOutcome::Failed(e.to_string()),
                        None => break,
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    drop(frames);
                    self.conversation.rewind_last_user();
                    return TurnOutcome::Interrupted;
                }
            }
        }

        match (reducer.error(), reducer.is_finished()) {
            (Some(error), _) => TurnOutcome::Failed(error.to_string()),
            (None, true) => {
                if let Some(steps) = reducer.truncated_after() {
                    self.prompt
                        .render_text(&format!("_Stopped after {} steps._\n", steps));
                }
                TurnOutcome::Finished
            }
            (None, false) => TurnOutcome::Failed("The reply ended unexpectedly".to_string()),
        }
    }

    /// Parts already shown from the trailing assistant message.
    fn rendered_parts(&self) -> usize {
        match self.conversation.last() {
            Some(message) if message.role == Role::Assistant => message.parts.len(),
            _ => 0,
        }
    }

    fn render_new_parts(&mut self, from: usize) {
        let Some(message) = self.conversation.last() else {
            return;
        };
        if message.role != Role::Assistant {
            return;
        }
        for part in message.parts.iter().skip(from) {
            match part {
                MessagePart::Text { text } => self.prompt.render_text(text),
                MessagePart::ToolInvocation { tool_invocation } => {
                    let widget = self.renderer.render(tool_invocation);
                    if !widget.is_interactive() {
                        self.prompt.render_widget(&widget);
                    }
                }
                _ => {}
            }
        }
    }

    /// Ask about the first invocation of the reply that wants input, once per invocation.
    fn next_action(&mut self) -> Result<Option<UserAction>> {
        let Some(message) = self.conversation.last() else {
            return Ok(None);
        };
        for invocation in message.tool_invocations() {
            if self.prompted.contains(&invocation.tool_call_id) {
                continue;
            }
            let widget = self.renderer.render(invocation);
            let wants_input = widget.is_interactive()
                || matches!(widget, genui::renderer::Widget::EntityPicker { .. });
            if !wants_input {
                continue;
            }
            self.prompted.insert(invocation.tool_call_id.clone());
            if let Some(action) = self.prompt.interact(&widget)? {
                return Ok(Some(action));
            }
        }
        Ok(None)
    }

    fn persist(&self) {
        if let Some(path) = &self.session_file {
            persist_messages(path, self.conversation.messages())
                .unwrap_or_else(|e| eprintln!("Failed to persist messages: {}", e));
        }
    }

    fn close_session(&mut self) {
        if let Some(path) = &self.session_file {
            let note = format!("Closing session. Recorded to {}\n", path.display());
            self.prompt.render_text(&note);
        }
        self.prompt.close();
    }
}
