//! Prompt assembly
//!
//! Turns a query, its ranked matches and the session's recent turns into the
//! ordered message list sent to the chat backend.

use kbchat_kernel::llm::GenerationRequest;
use kbchat_kernel::rag::{ConversationTurn, RankedMatch};

/// Number of past turns replayed into the prompt
pub const DEFAULT_HISTORY_WINDOW: usize = 5;

/// Persona and answering guidelines sent as the first message
pub const SYSTEM_PROMPT: &str = "You are a friendly and helpful customer support representative. \
Your goal is to assist customers in a warm, conversational, and natural way. \
Speak like a real person would - use a smooth, approachable tone and avoid sounding robotic or overly formal. \
\n\n\
Guidelines:\n\
- Be warm and empathetic - show you care about helping them\n\
- Use natural language - contractions (I'm, you'll, it's) and casual phrases are great\n\
- Keep responses concise but helpful - get to the point while being friendly\n\
- Use the knowledge base information provided, but present it naturally in your own words\n\
- If you don't have enough information, be honest and offer to help in other ways\n\
- Add personality - use phrases like 'Happy to help!', 'Great question!', 'I've got you covered'\n\
- Break up longer responses with bullet points or short paragraphs for easy reading\n\
- End with a helpful note or ask if they need anything else when appropriate";

/// Builds [`GenerationRequest`]s.
///
/// The message order is always: system prompt, then each of the last
/// `history_window` turns as a user/assistant pair (oldest first), then the
/// final user message.
#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    history_window: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self {
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }
}

impl ContextAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_window(mut self, turns: usize) -> Self {
        self.history_window = turns;
        self
    }

    pub fn history_window(&self) -> usize {
        self.history_window
    }

    pub fn build(
        &self,
        query: &str,
        matches: &[RankedMatch],
        history: &[ConversationTurn],
    ) -> GenerationRequest {
        let mut request = GenerationRequest::new().system(SYSTEM_PROMPT);

        let skip = history.len().saturating_sub(self.history_window);
        for turn in &history[skip..] {
            request = request
                .user(turn.user_message.as_str())
                .assistant(turn.bot_response.as_str());
        }

        request.user(user_message(query, matches))
    }
}

/// The final user message: the query, wrapped in the retrieved context when
/// there is any.
pub fn user_message(query: &str, matches: &[RankedMatch]) -> String {
    if matches.is_empty() {
        return query.to_string();
    }

    let context = matches
        .iter()
        .map(|m| format!("[{}]\n{}", m.title, m.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("Context from knowledge base:\n\n{context}\n\n---\n\nUser question: {query}")
}
