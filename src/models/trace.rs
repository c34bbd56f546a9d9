use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Plan;

pub const PREVIEW_MAX_CHARS: usize = 400;

// Full observable record of one request: how it was classified, which
// tool ran with which normalized arguments, and bounded previews of what
// came back. Never mutated after the dispatcher hands it out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub user_query: String,
    pub plan: Plan,
    pub selected_tool: String,
    pub tool_input: serde_json::Map<String, Value>,
    pub tool_output_preview: String,
    pub patient_memory_used: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub answer: String,
    pub trace: ExecutionTrace,
}

// Counts characters, not bytes, so multi-byte content never splits
// mid-scalar.
pub fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_to_limit() {
        let long = "x".repeat(1000);
        assert_eq!(preview(&long).chars().count(), PREVIEW_MAX_CHARS);
    }

    #[test]
    fn test_preview_keeps_short_text_whole() {
        assert_eq!(preview("short answer"), "short answer");
    }

    #[test]
    fn test_preview_counts_chars_not_bytes() {
        let text = "é".repeat(PREVIEW_MAX_CHARS + 10);
        let p = preview(&text);
        assert_eq!(p.chars().count(), PREVIEW_MAX_CHARS);
    }
}
