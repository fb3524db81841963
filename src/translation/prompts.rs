/*!
 * System prompt construction.
 */

use crate::language_utils;

const INSTRUCTIONS: &[&str] = &[
    "Translate the provided text keeping its original meaning, tone and style",
    "Preserve formatting, line breaks and the structure of the text",
    "Keep proper names, titles of works and technical terms where appropriate",
    "Use natural, fluent language",
    "Do NOT add comments, explanations or any text besides the translation",
];

const CLOSING_LINE: &str = "Translate the following text:";

/// Builds the system prompt sent with every fragment
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    target_language: String,
    context: Option<String>,
    custom_instructions: Option<String>,
}

impl PromptBuilder {
    /// `target_language` is a tag such as `pt-BR`; unknown tags are used verbatim
    pub fn new(target_language: &str) -> Self {
        let target_language =
            language_utils::get_language_name(target_language).unwrap_or_else(|_| target_language.to_string());

        Self {
            target_language,
            context: None,
            custom_instructions: None,
        }
    }

    /// Background on the whole book
    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn with_custom_instructions(mut self, instructions: Option<String>) -> Self {
        self.custom_instructions = instructions.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    /// System prompt for one fragment
    pub fn system_prompt(&self, fragment_context: &str) -> String {
        let mut prompt = format!(
            "You are a professional translator specialized in translating texts into {}.\n\nMAIN INSTRUCTIONS:\n",
            self.target_language
        );
        for (i, instruction) in INSTRUCTIONS.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 1, instruction));
        }
        prompt.push('\n');

        if let Some(context) = &self.context {
            prompt.push_str(&format!("ADDITIONAL CONTEXT:\n{}\n\n", context.trim()));
        }
        if !fragment_context.trim().is_empty() {
            prompt.push_str(&format!("FRAGMENT CONTEXT:\n{}\n\n", fragment_context.trim()));
        }
        if let Some(instructions) = &self.custom_instructions {
            prompt.push_str(&format!("SPECIFIC INSTRUCTIONS:\n{}\n\n", instructions.trim()));
        }

        prompt.push_str(CLOSING_LINE);
        prompt
    }
}
