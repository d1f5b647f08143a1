//! Template answers used when no chat backend is available
//!
//! Output is a pure function of the ranked matches, so the same input always
//! yields the same text.

use kbchat_kernel::rag::RankedMatch;

/// Characters of each matched document shown in a fallback answer
pub const PREVIEW_CHARS: usize = 300;

/// Answer given when nothing in the knowledge base passed the threshold
pub const NO_MATCH_ANSWER: &str = "Hey there! I checked my knowledge base but couldn't find specific information about that. \
Here's what might help:\n\n\
• Try rephrasing your question in a different way\n\
• Add the information you're looking for to the knowledge base\n\
• Ask about topics that are already in the knowledge base\n\n\
I'm here to help with anything else you need! 😊\n\n\
💡 Tip: For smarter, more conversational responses, configure an OpenAI API key. \
Set OPENAI_API_KEY in your environment or in the [llm] section of kbchat.toml.";

const MATCH_HEADER: &str = "Great question! Here's what I found for you:\n\n";

const MATCH_FOOTER: &str = "Hope this helps! Let me know if you need anything else. 😊\n\n\
---\n\
💡 For smarter, more conversational responses, configure an OpenAI API key.\n\
Set OPENAI_API_KEY or add it to the [llm] section of kbchat.toml.";

/// Build the template answer for `matches`, in rank order.
pub fn fallback_answer(matches: &[RankedMatch]) -> String {
    if matches.is_empty() {
        return NO_MATCH_ANSWER.to_string();
    }

    let mut answer = String::from(MATCH_HEADER);
    for m in matches {
        answer.push_str("📄 **");
        answer.push_str(&m.title);
        answer.push_str("**");
        if !m.category.is_empty() {
            answer.push_str(" (");
            answer.push_str(&m.category);
            answer.push(')');
        }
        answer.push('\n');
        answer.push_str(&preview(&m.content));
        answer.push_str("\n\n");
    }
    answer.push_str(MATCH_FOOTER);
    answer
}

/// First [`PREVIEW_CHARS`] characters of the trimmed content, with "..."
/// appended when anything was cut.
fn preview(content: &str) -> String {
    let content = content.trim();
    let mut chars = content.chars();
    let mut out: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        out.push_str("...");
    }
    out
}

/// Split text into word fragments for simulated streaming.
///
/// Every fragment except the last keeps its trailing space, so concatenating
/// the fragments gives back the input exactly.
pub fn word_fragments(text: &str) -> Vec<String> {
    text.split_inclusive(' ')
        .filter(|fragment| !fragment.is_empty())
        .map(str::to_string)
        .collect()
}
