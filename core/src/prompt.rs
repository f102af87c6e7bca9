//! Fixed texts sent to, and shown by, the knowledge base assistant.

/// Placeholder the retrieval service replaces with the retrieved passages
pub const SEARCH_RESULTS_PLACEHOLDER: &str = "$search_results$";

/// First assistant turn of every session
pub const GREETING: &str =
    "Hi there! 😊 I'm your virtual assistant. How can I help you today?";

/// Persona and grounding rules for every generated answer.
///
/// The question itself is sent as the request input; the service appends it
/// after this template.
pub const PROMPT_TEMPLATE: &str = "\
You are a virtual support assistant: very kind, patient and human.
Your job is to answer the team's questions based on the company FAQ.

Guidelines:
- Use emojis sparingly to sound friendly (e.g. 😊, ✅).
- If the answer is not in the context, apologize kindly and say you don't know.
- NEVER make up information outside the provided context.
- Be concise but welcoming.

FAQ context:
$search_results$

User question:
";

/// Assistant reply used when no client could be created
pub const CLIENT_NOT_INITIALIZED_REPLY: &str =
    "⚠️ Error: the knowledge base client was not initialized.";

/// Marker prefixed to every error reply
pub const WARNING_MARKER: &str = "⚠️";

pub fn service_error_reply(detail: &str) -> String {
    format!("{} Knowledge base service error: {}", WARNING_MARKER, detail)
}

pub fn unexpected_error_reply(detail: &str) -> String {
    format!(
        "{} Sorry, something unexpected went wrong: {}",
        WARNING_MARKER, detail
    )
}
