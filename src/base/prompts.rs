//! Prompt templates for the summarizer.

/// Placeholder in [`SUMMARIZER_DIRECTIVE`] that is replaced by the user's question.
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Summarizer directive.
pub const SUMMARIZER_DIRECTIVE: &str = r#####"Generate a response for the question: "{query}" by using knowledge from the provided comments.
Each comment is in the format: <text : upvotes : url>.

Prefer comments with more upvotes when they disagree.  Keep the answer short enough for a chat message, and link the most useful comments inline.  If the comments do not answer the question, say so instead of guessing."#####;

/// Render the directive for a specific question.
pub fn render_directive(directive: &str, query: &str) -> String {
    directive.replace(QUERY_PLACEHOLDER, query)
}

/// Wrap formatted evidence lines in the comment block markers.
pub fn render_evidence_block(evidence: &str) -> String {
    format!("COMMENTS BEGIN\n{evidence}\nCOMMENTS END")
}
