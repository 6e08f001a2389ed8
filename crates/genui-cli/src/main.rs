use anyhow::{bail, Result};
use clap::Parser;
use cliclack::password;
use std::path::PathBuf;

mod client;
mod display;
mod prompt;
mod session;

use client::{ChatClient, Workflow};
use prompt::cliclack::CliclackPrompt;
use session::session_file::{load_messages, new_session_file};
use session::Session;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the genui server
    #[arg(short, long, default_value = "http://127.0.0.1:3000")]
    server: String,

    /// Which assistant to talk to
    #[arg(short, long, value_enum, default_value = "chat")]
    workflow: Workflow,

    /// Resume (or record to) this session file
    #[arg(long)]
    session: Option<PathBuf>,

    /// Access password; prompted for when --ask-password is set
    #[arg(long, env = "GENUI_PASSWORD")]
    password: Option<String>,

    /// Prompt for the access password before starting
    #[arg(long)]
    ask_password: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = ChatClient::new(&cli.server, cli.workflow);

    let password = match (cli.password, cli.ask_password) {
        (Some(password), _) => Some(password),
        (None, true) => Some(password("Password:").interact()?),
        (None, false) => None,
    };
    if let Some(password) = password {
        if !client.verify_password(&password).await? {
            bail!("Invalid password");
        }
    }

    let session_file = match cli.session {
        Some(path) => path,
        None => new_session_file(cli.workflow.name())?,
    };
    let messages = load_messages(&session_file)?;

    let mut session = Session::new(
        client,
        Box::new(CliclackPrompt::new()),
        messages,
        Some(session_file),
    );
    session.start().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["genui"]);
        assert_eq!(cli.server, "http://127.0.0.1:3000");
        assert_eq!(cli.workflow, Workflow::Chat);
        assert!(cli.session.is_none());
    }

    #[test]
    fn test_cli_dcm_workflow() {
        let cli = Cli::parse_from(["genui", "--workflow", "dcm", "--session", "deals.jsonl"]);
        assert_eq!(cli.workflow, Workflow::Dcm);
        assert_eq!(cli.session, Some(PathBuf::from("deals.jsonl")));
    }
}
