// Prompt builders for the AI generation endpoint.
// Reuses cross-cutting fragments from llm_client::prompts.

pub use crate::llm_client::prompts::{JSON_ONLY_SYSTEM, NEWSROOM_SYSTEM};

pub fn titles(subject: &str, count: usize) -> String {
    format!(
        "Suggest {count} headline options for a crypto news article about:\n\n{subject}\n\n\
         Return a JSON array of strings, most compelling first. Each headline at most 80 characters."
    )
}

pub fn summary(title: Option<&str>, content: &str) -> String {
    let heading = title.map(|t| format!("Title: {t}\n\n")).unwrap_or_default();
    format!(
        "{heading}Summarize the following article in two or three sentences \
         for a news list preview.\n\n{content}"
    )
}

pub fn article(subject: &str, keywords: &[String]) -> String {
    let keyword_line = if keywords.is_empty() {
        String::new()
    } else {
        format!("\nWork in these keywords where natural: {}.", keywords.join(", "))
    };
    format!(
        "Write a news article as simple HTML (<h2>, <p>, <ul> only) about:\n\n{subject}\n{keyword_line}"
    )
}

pub fn keywords(content: &str, count: usize) -> String {
    format!(
        "Extract up to {count} search keywords from the article below. \
         Return a JSON array of lowercase strings without duplicates.\n\n{content}"
    )
}

pub fn cover(subject: &str) -> String {
    format!(
        "Editorial cover illustration for a cryptocurrency news story: {subject}. \
         Clean, modern, no text or logos."
    )
}
