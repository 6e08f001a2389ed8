use anyhow::Result;
use genui::renderer::{UserAction, Widget};

pub mod cliclack;

pub trait Prompt {
    fn render_text(&mut self, text: &str);
    fn render_widget(&mut self, widget: &Widget);
    /// Let the user act on a widget. `None` when there is nothing to do or they declined.
    fn interact(&mut self, widget: &Widget) -> Result<Option<UserAction>>;
    fn get_input(&mut self) -> Result<Input>;
    fn show_busy(&mut self);
    fn hide_busy(&self);
    fn close(&self);
    fn genui_ready(&self) {
        println!("\n");
        println!("genui is running! Ask about your data, or try \"show me recent BMW deals\".");
        println!("\n");
    }
}

pub struct Input {
    pub input_type: InputType,
    pub content: Option<String>, // Optional content as sometimes the user may be issuing a command eg. (Exit)
}

pub enum InputType {
    AskAgain, // Ask the user for input again. Control flow command.
    Message,  // User sent a message
    Exit,     // User wants to exit the session
}

pub enum Theme {
    Light,
    Dark,
}
