//! System prompt templates for the agent.

use serde_json::Value;

use crate::store::AgentConfig;

const TOOL_RULES: &str = "CRITICAL RULES FOR TOOL USE (follow these without exception):
1. NEVER ask the user for a URL or any other input if your instructions already specify a website, URL, or data source. Extract the URL from your instructions and call web_scraper_tool immediately.
2. If the task involves producing a document or report, call pdf_report_tool with the collected content. Do not just describe the output.
3. ALWAYS call tools by emitting a valid function call (or a JSON block with {\"tool\": \"<name>\", \"arguments\": {...}}). Never describe what you would do; execute it.
4. After receiving a tool observation, synthesise a clear final answer for the user.";

const REACT_PROTOCOL: &str = "Follow the ReAct loop strictly: THINK → ACT (call a tool) → OBSERVE → repeat until done → give a concise final answer.";

/// Parse the stored tool selection.
///
/// Accepts a JSON list (`["pdf_tool", "web_scraper"]`), a JSON string, or a
/// bare name. Anything that is not valid JSON is taken as a single name.
pub fn parse_tool_names(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Vec::new();
    };

    let names = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
        Ok(Value::String(one)) => vec![one],
        Ok(_) => Vec::new(),
        Err(_) => vec![raw.to_string()],
    };

    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect()
}

/// Build the system prompt for an agent and the tool names it declares.
pub fn build_system_prompt(agent: &AgentConfig, tool_names: &[String]) -> String {
    let mut parts = vec![format!(
        "You are an AI agent named '{}' with the role '{}'.",
        agent.name, agent.role
    )];

    if let Some(backstory) = agent.backstory.as_deref().filter(|b| !b.trim().is_empty()) {
        parts.push(format!("Background and instructions: {}", backstory));
    }

    if !tool_names.is_empty() {
        parts.push(format!(
            "You have access to these tools: {}.",
            tool_names.join(", ")
        ));
        parts.push(TOOL_RULES.to_string());
    }

    parts.push(REACT_PROTOCOL.to_string());
    parts.join("\n")
}

/// The user turn, optionally annotated with the path of an uploaded image.
pub fn build_user_message(prompt: &str, image_path: Option<&str>) -> String {
    match image_path {
        Some(path) => format!(
            "{}\n\n[Note: an image is available at the server path below. Call the vision tool if you need to inspect it.]\nimage_path: {}",
            prompt, path
        ),
        None => prompt.to_string(),
    }
}
