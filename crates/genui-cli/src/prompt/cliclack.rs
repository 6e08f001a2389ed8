use std::collections::BTreeMap;
use std::io::{self, Write};

use anyhow::Result;
use bat::WrappingMode;
use cliclack::{input, select, spinner};
use console::style;
use genui::renderer::{Approval, EntityCandidate, FieldKind, FilterForm, UserAction, Widget};

use super::{Input, InputType, Prompt, Theme};
use crate::display::widget_markdown;

pub struct CliclackPrompt {
    spinner: cliclack::ProgressBar,
    input_mode: InputMode,
    theme: Theme,
}

enum InputMode {
    Singleline,
    Multiline,
}

impl Default for CliclackPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl CliclackPrompt {
    pub fn new() -> Self {
        CliclackPrompt {
            spinner: spinner(),
            input_mode: InputMode::Singleline,
            theme: Theme::Dark,
        }
    }

    fn theme_name(&self) -> &'static str {
        match self.theme {
            Theme::Light => "GitHub",
            Theme::Dark => "zenburn",
        }
    }
}

fn print(content: &str, theme: &str) {
    let printed = bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()))
        .theme(theme)
        .language("Markdown")
        .wrapping_mode(WrappingMode::Character)
        .print();
    if printed.is_err() {
        println!("{}", content);
    }
}

fn fill_form(form: &FilterForm) -> Result<BTreeMap<String, String>> {
    println!("{}", style(&form.title).bold());
    let mut values = BTreeMap::new();
    for field in &form.fields {
        let value: String = match field.kind {
            FieldKind::Select if !field.options.is_empty() => {
                let mut choice = select(&field.label);
                for option in &field.options {
                    choice = choice.item(option.clone(), option, "");
                }
                if field.options.contains(&field.default_value) {
                    choice = choice.initial_value(field.default_value.clone());
                }
                choice.interact()?
            }
            _ => {
                let mut text = input(&field.label).required(false);
                if field.kind == FieldKind::Date {
                    text = text.placeholder("YYYY-MM-DD");
                }
                if !field.default_value.is_empty() {
                    text = text.default_input(&field.default_value);
                }
                text.interact()?
            }
        };
        values.insert(field.key.clone(), value);
    }
    Ok(values)
}

fn choose_action(approval: &Approval) -> Result<Option<String>> {
    let mut choice = select(format!("{} (risk: {})", approval.summary, approval.risk));
    for action in &approval.actions {
        choice = choice.item(Some(action.id.clone()), &action.label, "");
    }
    choice = choice.item(None, "Cancel", "");
    Ok(choice.interact()?)
}

fn choose_entity(candidates: &[EntityCandidate]) -> Result<Option<usize>> {
    let mut choice = select("Which issuer did you mean?");
    for (index, candidate) in candidates.iter().enumerate() {
        choice = choice.item(Some(index), candidate.display_name(), &candidate.id);
    }
    choice = choice.item(None, "None of these", "");
    Ok(choice.interact()?)
}

impl Prompt for CliclackPrompt {
    fn render_text(&mut self, text: &str) {
        print(text, self.theme_name());
        let _ = io::stdout().flush();
    }

    fn render_widget(&mut self, widget: &Widget) {
        if let Widget::ErrorNotice { tool_name, message } = widget {
            println!("{} {}", style(format!("{} failed:", tool_name)).red(), message);
            return;
        }
        print(&widget_markdown(widget), self.theme_name());
    }

    fn interact(&mut self, widget: &Widget) -> Result<Option<UserAction>> {
        match widget {
            Widget::FilterForm { tool_call_id, form } => Ok(Some(UserAction::submit_filters(
                tool_call_id,
                fill_form(form)?,
            ))),
            Widget::Approval {
                tool_call_id,
                approval,
            } => Ok(Some(match choose_action(approval)? {
                Some(action_id) => UserAction::approve(tool_call_id, &action_id),
                None => UserAction::cancel(tool_call_id),
            })),
            Widget::EntityPicker { candidates, .. } => Ok(choose_entity(candidates)?
                .and_then(|index| candidates.get(index))
                .map(EntityCandidate::choose)),
            _ => Ok(None),
        }
    }

    fn get_input(&mut self) -> Result<Input> {
        let mut input = input("genui:                   [Help: /?]").placeholder("");
        match self.input_mode {
            InputMode::Multiline => input = input.multiline(),
            InputMode::Singleline => (),
        }
        let message_text: String = input.interact()?;
        let message_text = message_text.trim();

        if message_text.eq_ignore_ascii_case("/exit") || message_text.eq_ignore_ascii_case("/quit")
        {
            return Ok(Input {
                input_type: InputType::Exit,
                content: None,
            });
        }
        if message_text.eq_ignore_ascii_case("/m") {
            self.input_mode = InputMode::Multiline;
        } else if message_text.eq_ignore_ascii_case("/s") {
            self.input_mode = InputMode::Singleline;
        } else if message_text.eq_ignore_ascii_case("/t") {
            self.theme = match self.theme {
                Theme::Light => Theme::Dark,
                Theme::Dark => Theme::Light,
            };
        } else if message_text.eq_ignore_ascii_case("/?") {
            println!("Commands:");
            println!("/exit - Exit the session");
            println!("/m - Switch to multiline input mode");
            println!("/s - Switch to singleline input mode");
            println!("/t - Toggle Light/Dark theme");
            println!("/? - Display this help message");
            println!("Ctrl+C - Interrupt the reply (resets the conversation to before the interrupted message)");
        } else if !message_text.is_empty() {
            return Ok(Input {
                input_type: InputType::Message,
                content: Some(message_text.to_string()),
            });
        }
        Ok(Input {
            input_type: InputType::AskAgain,
            content: None,
        })
    }

    fn show_busy(&mut self) {
        self.spinner = spinner();
        self.spinner.start("awaiting reply");
    }

    fn hide_busy(&self) {
        self.spinner.stop("");
    }

    fn close(&self) {
        // No cleanup required
    }
}
