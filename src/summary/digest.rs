//! Model-free summarizer.
//!
//! Pulls the `- User: … | Bot: …` lines out of the prompt and keeps the user
//! side of each, clipped, joined into one sentence. Good enough for offline
//! runs and deterministic for tests.

use anyhow::Result;

use super::SummaryProvider;

const DEFAULT_MAX_ITEMS: usize = 5;
const DEFAULT_MAX_CHARS: usize = 80;

#[derive(Debug, Clone)]
pub struct DigestSummarizer {
    max_items: usize,
    max_chars: usize,
}

impl Default for DigestSummarizer {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_MAX_ITEMS,
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

impl DigestSummarizer {
    pub fn new(max_items: usize, max_chars: usize) -> Self {
        Self {
            max_items: max_items.max(1),
            max_chars: max_chars.max(1),
        }
    }

    fn clip(&self, text: &str) -> String {
        if text.chars().count() <= self.max_chars {
            return text.to_string();
        }
        let mut clipped: String = text.chars().take(self.max_chars).collect();
        clipped.push('…');
        clipped
    }
}

impl SummaryProvider for DigestSummarizer {
    fn summarize(&self, prompt: &str) -> Result<String> {
        let topics: Vec<String> = prompt
            .lines()
            .filter_map(|line| line.trim().strip_prefix("- User: "))
            .map(|rest| rest.split(" | Bot: ").next().unwrap_or(rest).trim())
            .filter(|user| !user.is_empty())
            .take(self.max_items)
            .map(|user| self.clip(user))
            .collect();

        if topics.is_empty() {
            anyhow::bail!("prompt contains no conversation lines");
        }
        Ok(format!("Previously discussed: {}.", topics.join("; ")))
    }

    fn name(&self) -> &str {
        "digest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_user_turns() {
        let prompt = "Summarize these past conversations:\n\
                      - User: I love hiking | Bot: Tell me more!\n\
                      - User: Any trail tips? | Bot: Start early.";
        let summary = DigestSummarizer::default().summarize(prompt).unwrap();
        assert_eq!(summary, "Previously discussed: I love hiking; Any trail tips?.");
    }

    #[test]
    fn clips_long_turns_and_caps_items() {
        let prompt = "x\n- User: abcdefghij | Bot: b\n- User: second | Bot: b\n- User: third | Bot: b";
        let summary = DigestSummarizer::new(2, 4).summarize(prompt).unwrap();
        assert_eq!(summary, "Previously discussed: abcd…; seco….");
    }

    #[test]
    fn empty_prompt_is_an_error() {
        assert!(DigestSummarizer::default()
            .summarize("Summarize these past conversations:")
            .is_err());
    }
}
