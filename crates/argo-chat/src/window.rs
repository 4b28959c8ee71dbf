//! Lookback window extraction.
//!
//! Asks the model to turn phrases like "last month" into a day count. The
//! model is told to answer with `{"days": number | null}` but is not
//! trusted to: any answer that cannot be read as a number becomes `None`.

use std::sync::{Arc, LazyLock};

use chrono::NaiveDate;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::llm::{LanguageModel, ModelMessage, ModelRequest};

static JSON_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{[^{}]*\}").expect("valid regex")
});

/// Build the single-purpose extraction prompt.
pub fn extraction_prompt(message: &str, today: NaiveDate) -> String {
    format!(
        r#"
    You are a helper API. Your job is to extract the time period in "number of days" from the user's message relative to today.

    Current Date: {today}

    Rules:
    - Return ONLY a valid JSON object: {{ "days": number | null }}
    - If the user specifies a period (e.g., "last week", "last 3 months", "past year"), calculate the approximate days.
    - "Last week" = 7
    - "Last month" = 30
    - "Last year" = 365
    - If no specific time period is mentioned, return {{ "days": null }}.
    - Do not output any other text or markdown formatting.

    User Message: "{message}"
    "#,
        today = today.format("%Y-%m-%d"),
        message = message,
    )
}

/// Read a day count out of raw model output.
///
/// Tries the first brace-delimited substring, then the whole text. A
/// fractional count is rounded.
pub fn parse_days(raw: &str) -> Option<i64> {
    let parsed = JSON_OBJECT
        .find(raw)
        .and_then(|m| serde_json::from_str::<Value>(m.as_str()).ok())
        .or_else(|| serde_json::from_str::<Value>(raw.trim()).ok())?;

    let days = parsed.get("days")?;
    if let Some(n) = days.as_i64() {
        return Some(n);
    }
    days.as_f64()
        .filter(|f| f.is_finite())
        .map(|f| f.round() as i64)
}

/// Extracts a lookback window from user text.
pub struct WindowExtractor {
    model: Arc<dyn LanguageModel>,
    max_tokens: u32,
}

impl WindowExtractor {
    pub fn new(model: Arc<dyn LanguageModel>, max_tokens: u32) -> Self {
        Self { model, max_tokens }
    }

    /// Day count named by `text`, or `None` if it names no period or the
    /// model cannot be reached.
    pub async fn extract_days(&self, text: &str, today: NaiveDate) -> Option<i64> {
        let request = ModelRequest {
            system: None,
            messages: vec![ModelMessage::user(extraction_prompt(text, today))],
            max_tokens: self.max_tokens,
        };

        let raw = match self.model.complete(&request).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Window extraction failed: {}", e);
                return None;
            }
        };

        let days = parse_days(&raw);
        if days.is_none() {
            debug!(raw = %raw, "no day count in extraction output");
        }
        days
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::ChatError;

    /// Model double that replays canned replies and records requests.
    #[derive(Default)]
    pub(crate) struct ScriptedModel {
        pub replies: Mutex<VecDeque<Result<String, String>>>,
        pub requests: Mutex<Vec<ModelRequest>>,
    }

    impl ScriptedModel {
        pub fn with(replies: Vec<Result<&str, &str>>) -> Self {
            Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                requests: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(&self, request: &ModelRequest) -> Result<String, ChatError> {
            self.requests.lock().unwrap().push(request.clone());
            match self.replies.lock().unwrap().pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(e)) => Err(ChatError::Model(e)),
                None => Err(ChatError::Model("no scripted reply".into())),
            }
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn test_parse_plain_object() {
        assert_eq!(parse_days(r#"{"days": 30}"#), Some(30));
        assert_eq!(parse_days(r#"{ "days": null }"#), None);
    }

    #[test]
    fn test_parse_object_embedded_in_prose() {
        assert_eq!(
            parse_days("Sure! Here it is: {\"days\": 90} Let me know."),
            Some(90)
        );
    }

    #[test]
    fn test_parse_rounds_fractions() {
        assert_eq!(parse_days(r#"{"days": 91.3}"#), Some(91));
        assert_eq!(parse_days(r#"{"days": 4.5}"#), Some(5));
    }

    #[test]
    fn test_parse_rejects_non_numbers() {
        assert_eq!(parse_days(r#"{"days": "thirty"}"#), None);
        assert_eq!(parse_days(r#"{"period": 30}"#), None);
        assert_eq!(parse_days("I am not sure"), None);
        assert_eq!(parse_days(""), None);
    }

    #[test]
    fn test_prompt_contains_date_and_message() {
        let prompt = extraction_prompt("show me last month's spending", today());
        assert!(prompt.contains("Current Date: 2024-03-15"));
        assert!(prompt.contains("User Message: \"show me last month's spending\""));
        assert!(prompt.contains("{ \"days\": number | null }"));
    }

    #[tokio::test]
    async fn test_last_month_is_thirty() {
        let model = Arc::new(ScriptedModel::with(vec![Ok(r#"{"days": 30}"#)]));
        let extractor = WindowExtractor::new(model.clone(), 100);

        let days = extractor
            .extract_days("show me last month's spending", today())
            .await;
        assert_eq!(days, Some(30));

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[0].max_tokens, 100);
        assert!(requests[0].system.is_none());
    }

    #[tokio::test]
    async fn test_no_period_is_none() {
        let model = Arc::new(ScriptedModel::with(vec![Ok(r#"{"days": null}"#)]));
        let extractor = WindowExtractor::new(model, 100);
        assert_eq!(extractor.extract_days("what's my balance", today()).await, None);
    }

    #[tokio::test]
    async fn test_model_failure_is_none() {
        let model = Arc::new(ScriptedModel::with(vec![Err("throttled")]));
        let extractor = WindowExtractor::new(model, 100);
        assert_eq!(extractor.extract_days("last year", today()).await, None);
    }
}
