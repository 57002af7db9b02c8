//! Prompt rendering.

use crate::types::PromptDefinition;
use handlebars::Handlebars;
use serde::Serialize;
use wikivoice_core::{AppError, AppResult};

/// Render a prompt definition with the given variables.
///
/// Variables can be any serializable value, so templates may iterate over
/// lists (`{{#each articles}}`). HTML escaping is disabled since the output
/// goes to a language model, not a browser.
///
/// # Example
/// ```no_run
/// use wikivoice_prompt::{render_prompt, PromptDefinition};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let def = PromptDefinition::new("greet", "Greeting", "Hello {{name}}");
/// let text = render_prompt(&def, &serde_json::json!({"name": "Ada"}))?;
/// assert_eq!(text, "Hello Ada");
/// # Ok(())
/// # }
/// ```
pub fn render_prompt<T: Serialize>(
    definition: &PromptDefinition,
    variables: &T,
) -> AppResult<String> {
    tracing::trace!("Rendering prompt: {}", definition.id);
    render_template(&definition.id, &definition.template, variables)
}

/// Render a Handlebars template with variables.
fn render_template<T: Serialize>(name: &str, template: &str, variables: &T) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Disable HTML escaping for plain text
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string(name, template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template {}: {}", name, e)))?;

    handlebars
        .render(name, variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template {}: {}", name, e)))
}

/// Check that a template parses, without rendering it.
pub(crate) fn check_template(name: &str, template: &str) -> AppResult<()> {
    let mut handlebars = Handlebars::new();
    handlebars
        .register_template_string(name, template)
        .map_err(|e| AppError::Prompt(format!("Invalid template {}: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_simple_template() {
        let def = PromptDefinition::new("t", "Test", "Question: {{prompt}}");
        let result = render_prompt(&def, &json!({"prompt": "Hello, world!"})).unwrap();
        assert_eq!(result, "Question: Hello, world!");
    }

    #[test]
    fn test_render_does_not_escape() {
        let def = PromptDefinition::new("t", "Test", "{{text}}");
        let result = render_prompt(&def, &json!({"text": "AT&T <b>"})).unwrap();
        assert_eq!(result, "AT&T <b>");
    }

    #[test]
    fn test_render_list() {
        let def = PromptDefinition::new("t", "Test", "{{#each items}}[{{this}}]{{/each}}");
        let result = render_prompt(&def, &json!({"items": ["a", "b"]})).unwrap();
        assert_eq!(result, "[a][b]");
    }

    #[test]
    fn test_render_template_missing_variable() {
        let def = PromptDefinition::new("t", "Test", "Question: {{missing}}");
        // Handlebars renders missing variables as empty string
        let result = render_prompt(&def, &json!({})).unwrap();
        assert_eq!(result, "Question: ");
    }

    #[test]
    fn test_check_template_rejects_unclosed_block() {
        assert!(check_template("bad", "{{#each items}}").is_err());
    }
}
