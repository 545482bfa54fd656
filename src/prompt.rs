use crate::processor::marker;
use crate::tool::ToolRegistry;

/// Build the instruction preamble sent ahead of the conversation. It lists
/// the registered tools and teaches the model the inline marker syntax.
pub fn system_prompt(tools: &ToolRegistry) -> String {
    let listing = tools
        .iter()
        .map(|tool| format!("- {}: {}", tool.name(), tool.description()))
        .collect::<Vec<_>>()
        .join("\n");

    let example_tool = tools
        .iter()
        .next()
        .map(|tool| tool.name().to_string())
        .unwrap_or_else(|| "web_browser".to_string());

    format!(
        r#"You have access to the following tools:
{listing}

To use a tool, write your response in this format:
1. Explain what you're going to do
2. Use the tool on its own line in this format: {usage}
   IMPORTANT: Always use complete domain names with .com:
   - Use: weather.com (NOT just "weather")
   - Use: google.com (NOT just "google")
   - Use: amazon.com (NOT just "amazon")
3. Wait for the result and continue the conversation

Example:
Let me check the weather website for you.
{example}
Based on the website content...
"#,
        listing = listing,
        usage = marker(&example_tool, "website_url"),
        example = marker(&example_tool, "weather.com"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ToolResult;
    use crate::tool::Tool;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Browser;

    #[async_trait]
    impl Tool for Browser {
        fn name(&self) -> &str {
            "web_browser"
        }

        fn description(&self) -> &str {
            "Fetches the text of a web page"
        }

        async fn invoke(&self, _argument: &str) -> ToolResult<String> {
            Ok(String::new())
        }
    }

    #[test]
    fn test_prompt_lists_tools_and_marker_syntax() {
        let tools = ToolRegistry::new().with(Arc::new(Browser)).unwrap();

        let prompt = system_prompt(&tools);

        assert!(prompt.contains("- web_browser: Fetches the text of a web page"));
        assert!(prompt.contains("<tool>web_browser</tool>website_url"));
        assert!(prompt.contains("\n<tool>web_browser</tool>weather.com\n"));
    }
}
