use notewell_common::Chunk;

pub const DEFAULT_TEMPLATE: &str = "\
Use the following pieces of context to answer the question at the end.
If you don't know the answer from the context, just say that you don't know. Do not try to make up an answer.
Keep the answer concise and helpful.

Context: {context}

Question: {question}

Helpful Answer:
";

/// Prompt with `{context}` and `{question}` slots.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Stuffs every retrieved chunk into the context, separated by blank lines.
    pub fn render(&self, chunks: &[Chunk], question: &str) -> String {
        let context = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        // Question first so braces inside the context are left alone.
        self.template
            .replace("{question}", question)
            .replace("{context}", &context)
    }
}
