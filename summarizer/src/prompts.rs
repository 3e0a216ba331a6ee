// Prompt templates sent to the completion endpoint

pub const ABSTRACT_SYSTEM_PROMPT: &str = "You are a pharmacology researcher summarizing \
publication abstracts. Condense the following abstract to a single sentence.";

pub fn edge_system_prompt(sentence: &str) -> String {
    format!(
        "Summarize the following edge publication abstracts listed in the knowledge graph. \
         Make sure the summary supports the statement '{sentence}'. Only use information \
         explicitly stated in the publication abstracts. I repeat, do not make up any \
         information. Include a bulleted list of key facts from the abstracts that support \
         the statement '{sentence}'."
    )
}

pub fn edge_user_content(sentence: &str, evidence: &str) -> String {
    format!("Statement: {sentence}\n\nSupporting evidence:\n{evidence}")
}

pub fn no_evidence_message(sentence: &str) -> String {
    format!(
        "The edge '{sentence}' contains no publications or supporting sentences for an LLM to summarize."
    )
}

pub fn example_banner() -> String {
    let rule = "*".repeat(50);
    format!("{rule}\nNo edge passed - loading example\n{rule}\n")
}
