/// Prompt used when the index holds at least one chunk.
pub const CONTEXT_TEMPLATE: &str = "You are an intelligent assistant for UniVault. \
Use the following context to answer the user's question.
If the answer is not in the context, say so, but try to be helpful with general knowledge.

Context:
{{CONTEXT}}

User Question: {{QUERY}}

Answer:";

/// Prompt used before anything has been uploaded.
pub const NO_DOCUMENTS_TEMPLATE: &str = "You are an intelligent assistant for UniVault.
The user has not uploaded any documents yet.
Answer their question to the best of your general knowledge, \
but inform them they should upload a document in the Materials section for better context.

User Question: {{QUERY}}

Answer:";

pub const NO_CONTEXT_FOUND: &str = "No relevant context found.";

/// Substitute `{{CONTEXT}}` and `{{QUERY}}` in one pass, so placeholder
/// text inside a document or a question is never expanded.
pub fn render(template: &str, context: &str, query: &str) -> String {
    let mut out = String::with_capacity(template.len() + context.len() + query.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        if let Some(after) = tail.strip_prefix("{{CONTEXT}}") {
            out.push_str(context);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{{QUERY}}") {
            out.push_str(query);
            rest = after;
        } else {
            out.push_str("{{");
            rest = &tail[2..];
        }
    }

    out.push_str(rest);
    out
}

/// Join retrieved chunks into the context block.
pub fn join_context<S: AsRef<str>>(chunks: &[S]) -> String {
    if chunks.is_empty() {
        return NO_CONTEXT_FOUND.to_string();
    }

    chunks
        .iter()
        .map(|c| c.as_ref())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn context_prompt(context: &str, query: &str) -> String {
    render(CONTEXT_TEMPLATE, context, query)
}

pub fn no_documents_prompt(query: &str) -> String {
    render(NO_DOCUMENTS_TEMPLATE, "", query)
}
