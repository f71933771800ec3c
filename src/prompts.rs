pub const EDIT_INSTRUCTION: &str = include_str!("../data/prompts/edit_instruction.txt");
pub const DESCRIBE_ARCHITECTURE: &str = include_str!("../data/prompts/describe_architecture.txt");

/// Prompt the session starts with before the user types their own.
pub const DEFAULT_EDIT_PROMPT: &str = "Make the photo look like a vibrant watercolor painting";

/// Replace `{{key}}` placeholders in a template string.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{{{}}}}}", key), value);
    }
    result
}
