//! Instruction formatting for query inputs

/// Retrieval task the instruction prefix describes.
pub const DEFAULT_TASK_DESCRIPTION: &str =
    "Given a web search query, retrieve relevant passages that answer the query";

/// Format text for embedding based on whether it's a query or a passage.
///
/// Queries get the two-line `Instruct: ...\nQuery: ` prefix, passages are
/// returned unchanged.
pub fn format_text_for_embedding(text: &str, is_query: bool) -> String {
    TextFormatter::default().format(text, is_query)
}

/// Prepends the instruction template to queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFormatter {
    task_description: String,
}

impl TextFormatter {
    pub fn new(task_description: impl Into<String>) -> Self {
        Self {
            task_description: task_description.into(),
        }
    }

    pub fn task_description(&self) -> &str {
        &self.task_description
    }

    pub fn format(&self, text: &str, is_query: bool) -> String {
        if is_query {
            format!("Instruct: {}\nQuery: {}", self.task_description, text)
        } else {
            text.to_string()
        }
    }
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_TASK_DESCRIPTION)
    }
}
