//! System prompt for the shopping assistant.

use askama::Template;
use chrono::{DateTime, SecondsFormat, Utc};

#[derive(Template)]
#[template(path = "agent/system_prompt.txt")]
struct SystemPromptTemplate<'a> {
    time: &'a str,
}

const FALLBACK_PROMPT: &str = "You are a helpful e-commerce assistant for a furniture store. Always use the item_lookup tool to answer product questions.";

/// Render the system prompt for a generation step at `now`.
#[must_use]
pub fn render_system_prompt(now: DateTime<Utc>) -> String {
    let time = now.to_rfc3339_opts(SecondsFormat::Secs, true);
    SystemPromptTemplate { time: &time }.render().unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to render system prompt");
        format!("{FALLBACK_PROMPT}\n\nCurrent time: {time}")
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_prompt_includes_timestamp() {
        let now = Utc
            .with_ymd_and_hms(2025, 6, 1, 12, 30, 0)
            .single()
            .expect("valid timestamp");
        let prompt = render_system_prompt(now);
        assert!(prompt.contains("Current time: 2025-06-01T12:30:00Z"));
    }

    #[test]
    fn test_prompt_mandates_tool_use() {
        let prompt = render_system_prompt(Utc::now());
        assert!(prompt.contains("e-commerce assistant"));
        assert!(prompt.contains("item_lookup"));
        assert!(prompt.contains("even if an earlier lookup"));
        assert!(prompt.contains("inventory is empty"));
    }
}
