use include_dir::{include_dir, Dir};
use serde::Serialize;
use tera::{Context, Error as TeraError, Tera};

use crate::data::DataCatalog;
use crate::models::tool::Tool;

static PROMPTS: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/prompts");

pub const DATA_ASSISTANT: &str = "data_assistant.md";
pub const DCM_ASSISTANT: &str = "dcm_assistant.md";

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

/// Render one of the prompts compiled into the crate.
pub fn load_embedded_prompt<T: Serialize>(name: &str, context_data: &T) -> Result<String, TeraError> {
    let template = PROMPTS
        .get_file(name)
        .and_then(|f| f.contents_utf8())
        .ok_or_else(|| TeraError::msg(format!("Template not found: {}", name)))?;
    load_prompt(template, context_data)
}

/// The prompt view of a tool: the first line of its description is enough for the model
/// to pick it, the full text travels with the tool definition.
#[derive(Serialize)]
struct ToolLine<'a> {
    name: &'a str,
    description: &'a str,
}

fn tool_lines(tools: &[Tool]) -> Vec<ToolLine<'_>> {
    tools
        .iter()
        .map(|t| ToolLine {
            name: &t.name,
            description: t.description.lines().next().unwrap_or_default().trim(),
        })
        .collect()
}

#[derive(Serialize)]
struct DataAssistantContext<'a> {
    sources: String,
    tools: Vec<ToolLine<'a>>,
}

#[derive(Serialize)]
struct DcmAssistantContext<'a> {
    tools: Vec<ToolLine<'a>>,
}

pub fn data_assistant_prompt(catalog: &DataCatalog, tools: &[Tool]) -> Result<String, TeraError> {
    let context = DataAssistantContext {
        sources: catalog.describe(),
        tools: tool_lines(tools),
    };
    load_embedded_prompt(DATA_ASSISTANT, &context)
}

pub fn dcm_assistant_prompt(tools: &[Tool]) -> Result<String, TeraError> {
    load_embedded_prompt(DCM_ASSISTANT, &DcmAssistantContext { tools: tool_lines(tools) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dcm::DcmDataset;
    use crate::toolkits;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[test]
    fn test_load_prompt() {
        let template = "Hello, {{ name }}! You have {{ count }} sources.";
        let mut context = HashMap::new();
        context.insert("name".to_string(), "Alice".to_string());
        context.insert("count".to_string(), 3.to_string());

        let result = load_prompt(template, &context).unwrap();
        assert_eq!(result, "Hello, Alice! You have 3 sources.");
    }

    #[test]
    fn test_load_prompt_missing_variable() {
        let template = "Hello, {{ name }}! You have {{ count }} sources.";
        let mut context = HashMap::new();
        context.insert("name".to_string(), "Alice".to_string());
        assert!(load_prompt(template, &context).is_err());
    }

    #[test]
    fn test_prompt_ignores_files_in_working_directory() {
        let catalog = Arc::new(crate::data::DataCatalog::demo());
        let tools = toolkits::chat_tools(Arc::clone(&catalog))
            .unwrap()
            .list_for_prompt();
        let before = data_assistant_prompt(&catalog, &tools).unwrap();

        let decoy = std::env::current_dir().unwrap().join(DATA_ASSISTANT);
        std::fs::write(&decoy, "Replaced {{ sources | length }}").unwrap();
        let after = data_assistant_prompt(&catalog, &tools);
        std::fs::remove_file(&decoy).unwrap();

        assert_eq!(after.unwrap(), before);
        assert!(before.starts_with("You are a helpful data assistant"));
    }

    #[test]
    fn test_load_embedded_prompt_missing_file() {
        let context: HashMap<String, String> = HashMap::new();
        assert!(load_embedded_prompt("non_existent_template.md", &context).is_err());
    }

    #[test]
    fn test_tool_lines_keep_first_line() {
        let tools = vec![Tool::new("query_data", "Query data.\n\nMore detail", json!({}))];
        let lines = tool_lines(&tools);
        assert_eq!(lines[0].description, "Query data.");
    }

    #[test]
    fn test_data_assistant_prompt_lists_sources_and_tools() {
        let catalog = Arc::new(crate::data::DataCatalog::demo());
        let registry = toolkits::chat_tools(Arc::clone(&catalog)).unwrap();
        let prompt = data_assistant_prompt(&catalog, &registry.list_for_prompt()).unwrap();
        assert!(prompt.contains("**bond_trades**"));
        assert!(prompt.contains("- **collect_filters**"));
        assert_eq!(
            prompt,
            data_assistant_prompt(&catalog, &registry.list_for_prompt()).unwrap()
        );
    }

    #[test]
    fn test_dcm_prompt_keeps_example_braces() {
        let registry = toolkits::dcm_tools(Arc::new(DcmDataset::load())).unwrap();
        let prompt = dcm_assistant_prompt(&registry.list_for_prompt()).unwrap();
        assert!(prompt.contains("- **resolve_entity**"));
        assert!(prompt.contains("...availableFilters.sectors"));
    }
}
