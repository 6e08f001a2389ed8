use anyhow::{anyhow, Result};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use genui::models::message::{generate_id, Message};

pub fn ensure_session_dir() -> Result<PathBuf> {
    let home_dir = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
    let session_dir = home_dir.join(".config").join("genui").join("sessions");

    if !session_dir.exists() {
        fs::create_dir_all(&session_dir)?;
    }

    Ok(session_dir)
}

pub fn new_session_file(workflow: &str) -> Result<PathBuf> {
    Ok(ensure_session_dir()?.join(format!("{}-{}.jsonl", workflow, generate_id())))
}

/// Write the whole conversation, one message per line.
pub fn persist_messages(session_file: &Path, messages: &[Message]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(session_file)?);

    for message in messages {
        serde_json::to_writer(&mut writer, &message)?;
        writeln!(writer)?;
    }

    writer.flush()?;
    Ok(())
}

/// Read a session back. A missing file is an empty session.
pub fn load_messages(session_file: &Path) -> Result<Vec<Message>> {
    if !session_file.exists() {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(session_file)?);
    let mut messages = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let message = serde_json::from_str(&line).map_err(|e| {
            anyhow!(
                "Invalid message on line {} of {}: {}",
                number + 1,
                session_file.display(),
                e
            )
        })?;
        messages.push(message);
    }
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use genui::models::message::ToolInvocation;
    use serde_json::json;
    use tempfile::NamedTempFile;

    #[test]
    fn test_persist_and_load_conversation() -> Result<()> {
        let messages = vec![
            Message::user().with_text("Export my trades"),
            Message::assistant()
                .with_step_start()
                .with_tool_invocation(
                    ToolInvocation::call(
                        "call_c",
                        "confirm_action",
                        json!({"summary": "Export", "risk": "low", "actions": []}),
                    )
                    .with_result(json!({"cancelled": true})),
                )
                .with_text("Cancelled."),
        ];

        let temp_file = NamedTempFile::new()?;
        persist_messages(temp_file.path(), &messages)?;

        let loaded = load_messages(temp_file.path())?;
        assert_eq!(loaded, messages);
        Ok(())
    }

    #[test]
    fn test_missing_file_is_empty_session() -> Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(load_messages(&dir.path().join("none.jsonl"))?.is_empty());
        Ok(())
    }

    #[test]
    fn test_corrupt_line_is_reported() -> Result<()> {
        let temp_file = NamedTempFile::new()?;
        fs::write(temp_file.path(), "{\"role\":\"user\",\"content\":\"hi\"}\nnot json\n")?;

        let err = load_messages(temp_file.path()).unwrap_err();
        assert!(err.to_string().starts_with("Invalid message on line 2"));
        Ok(())
    }
}
