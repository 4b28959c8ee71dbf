//! Assistant invocation and chart extraction.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, warn};

use argo_core::types::ChartSpec;

use crate::context::AssembledContext;
use crate::llm::{LanguageModel, ModelRequest};

/// Reply shown when the model cannot be reached.
pub const MODEL_UNAVAILABLE_REPLY: &str =
    "I'm having trouble connecting to my brain right now. Please check the model credentials and try again.";

static CHART_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<chart>(.*?)</chart>").expect("Invalid chart regex")
});

/// Assistant text with the chart directive split out.
#[derive(Clone, Debug, PartialEq)]
pub struct AssistantReply {
    pub text: String,
    pub chart: Option<ChartSpec>,
}

/// Split the first `<chart>` block out of `raw`.
///
/// On a parse failure the text is returned untouched with no chart.
pub fn extract_chart(raw: &str) -> AssistantReply {
    let Some(caps) = CHART_BLOCK.captures(raw) else {
        return AssistantReply {
            text: raw.to_string(),
            chart: None,
        };
    };

    let (Some(block), Some(body)) = (caps.get(0), caps.get(1)) else {
        return AssistantReply {
            text: raw.to_string(),
            chart: None,
        };
    };

    match serde_json::from_str::<ChartSpec>(body.as_str().trim()) {
        Ok(chart) => {
            let mut text = String::with_capacity(raw.len());
            text.push_str(&raw[..block.start()]);
            text.push_str(&raw[block.end()..]);
            AssistantReply {
                text: text.trim().to_string(),
                chart: Some(chart),
            }
        }
        Err(e) => {
            warn!("Failed to parse chart JSON: {}", e);
            AssistantReply {
                text: raw.to_string(),
                chart: None,
            }
        }
    }
}

/// Runs the main assistant call.
pub struct AssistantInvoker {
    model: Arc<dyn LanguageModel>,
    max_tokens: u32,
}

impl AssistantInvoker {
    pub fn new(model: Arc<dyn LanguageModel>, max_tokens: u32) -> Self {
        Self { model, max_tokens }
    }

    /// Call the model. Transport failures become a fixed apology.
    pub async fn invoke(&self, context: AssembledContext) -> AssistantReply {
        let request = ModelRequest {
            system: Some(context.system),
            messages: context.messages,
            max_tokens: self.max_tokens,
        };

        match self.model.complete(&request).await {
            Ok(raw) => {
                let reply = extract_chart(&raw);
                debug!(chart = reply.chart.is_some(), "assistant replied");
                reply
            }
            Err(e) => {
                warn!("Assistant call failed: {}", e);
                AssistantReply {
                    text: MODEL_UNAVAILABLE_REPLY.to_string(),
                    chart: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argo_core::types::ChartKind;

    use crate::llm::ModelMessage;
    use crate::window::tests::ScriptedModel;

    fn context() -> AssembledContext {
        AssembledContext {
            system: "sys".into(),
            messages: vec![ModelMessage::user("chart my spending")],
        }
    }

    #[test]
    fn test_chart_block_is_extracted_and_stripped() {
        let raw = r##"Here is your spending.
<chart>
{"type": "pie", "title": "Spending", "data": [{"label": "Food", "value": 120.5, "color": "#10b981"}, {"label": "Rent", "value": 900}]}
</chart>
Food is your second largest category."##;

        let reply = extract_chart(raw);
        let chart = reply.chart.unwrap();
        assert_eq!(chart.kind, ChartKind::Pie);
        assert_eq!(chart.title.as_deref(), Some("Spending"));
        assert_eq!(chart.data.len(), 2);
        assert_eq!(chart.data[1].color, None);
        assert_eq!(
            reply.text,
            "Here is your spending.\n\nFood is your second largest category."
        );
    }

    #[test]
    fn test_malformed_chart_leaves_text_untouched() {
        let raw = "Summary <chart>{\"type\": \"pie\", data: oops}</chart> end";
        let reply = extract_chart(raw);
        assert!(reply.chart.is_none());
        assert_eq!(reply.text, raw);
    }

    #[test]
    fn test_unknown_chart_kind_is_malformed() {
        let raw = "<chart>{\"type\": \"radar\", \"data\": []}</chart>";
        let reply = extract_chart(raw);
        assert!(reply.chart.is_none());
        assert_eq!(reply.text, raw);
    }

    #[test]
    fn test_only_first_block_is_removed() {
        let raw = "a <chart>{\"type\":\"bar\",\"data\":[]}</chart> b <chart>{\"type\":\"line\",\"data\":[]}</chart>";
        let reply = extract_chart(raw);
        assert_eq!(reply.chart.unwrap().kind, ChartKind::Bar);
        assert!(reply.text.contains("<chart>{\"type\":\"line\""));
    }

    #[test]
    fn test_plain_text_untouched() {
        let reply = extract_chart("  Your balance is $1,200.  ");
        assert!(reply.chart.is_none());
        assert_eq!(reply.text, "  Your balance is $1,200.  ");
    }

    #[tokio::test]
    async fn test_invoke_sends_system_and_bound() {
        let model = Arc::new(ScriptedModel::with(vec![Ok("Sure.")]));
        let invoker = AssistantInvoker::new(model.clone(), 1000);

        let reply = invoker.invoke(context()).await;
        assert_eq!(reply.text, "Sure.");

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[0].system.as_deref(), Some("sys"));
        assert_eq!(requests[0].max_tokens, 1000);
    }

    #[tokio::test]
    async fn test_model_failure_returns_apology() {
        let model = Arc::new(ScriptedModel::with(vec![Err("401 invalid x-api-key")]));
        let invoker = AssistantInvoker::new(model, 1000);

        let reply = invoker.invoke(context()).await;
        assert_eq!(reply.text, MODEL_UNAVAILABLE_REPLY);
        assert!(reply.chart.is_none());
        assert!(!reply.text.contains("x-api-key"));
    }
}
