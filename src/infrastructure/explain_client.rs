use crate::infrastructure::error::PlannerError;
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

pub const SYSTEM_PROMPT: &str = "You are a helpful planner for youth growth and study.";

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[async_trait]
pub trait ChatCompletionClient: Send + Sync {
    /// Returns the first choice's message content.
    async fn complete(
        &self,
        api_key: &str,
        request: &ChatCompletionRequest,
    ) -> Result<String, PlannerError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestChatCompletionClient {
    client: Client,
    endpoint: Url,
}

impl ReqwestChatCompletionClient {
    pub fn new(endpoint: &str) -> Result<Self, PlannerError> {
        let endpoint = Url::parse(endpoint.trim())
            .map_err(|error| PlannerError::InvalidConfig(format!("invalid explain endpoint: {error}")))?;
        Ok(Self {
            client: Client::new(),
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), PlannerError> {
        if value.trim().is_empty() {
            return Err(PlannerError::Explain(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn http_error(status: reqwest::StatusCode, body: &str) -> PlannerError {
        let message = if body.trim().is_empty() {
            format!("chat completion api error: http {}", status.as_u16())
        } else {
            format!("chat completion api error: http {}; body={body}", status.as_u16())
        };
        PlannerError::Explain(message)
    }
}

#[derive(Debug, serde::Deserialize)]
struct CompletionResponse {
    choices: Option<Vec<CompletionChoice>>,
}

#[derive(Debug, serde::Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Debug, serde::Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

pub fn extract_reply(body: &str) -> Result<String, PlannerError> {
    let parsed: CompletionResponse = serde_json::from_str(body).map_err(|error| {
        PlannerError::Explain(format!("invalid chat completion payload: {error}; body={body}"))
    })?;
    parsed
        .choices
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| PlannerError::Explain("chat completion returned no content".to_string()))
}

#[async_trait]
impl ChatCompletionClient for ReqwestChatCompletionClient {
    async fn complete(
        &self,
        api_key: &str,
        request: &ChatCompletionRequest,
    ) -> Result<String, PlannerError> {
        Self::ensure_non_empty(api_key, "api key")?;
        Self::ensure_non_empty(&request.model, "model")?;

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|error| PlannerError::Explain(format!("network error while requesting explanation: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| PlannerError::Explain(format!("failed reading explanation response: {error}")))?;

        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }
        extract_reply(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_carries_model_messages_and_limits() {
        let request = ChatCompletionRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user("why?")],
            temperature: 0.7,
            max_tokens: 300,
        };
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "why?");
        assert_eq!(json["max_tokens"], 300);
    }

    #[test]
    fn reply_is_first_choice_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  Because music.  "}},{"message":{"content":"second"}}]}"#;
        assert_eq!(extract_reply(body).expect("reply"), "Because music.");
    }

    #[test]
    fn empty_or_malformed_reply_is_an_error() {
        assert!(matches!(extract_reply(r#"{"choices":[]}"#), Err(PlannerError::Explain(_))));
        assert!(matches!(extract_reply("<html>"), Err(PlannerError::Explain(_))));
    }

    #[test]
    fn client_rejects_invalid_endpoint() {
        assert!(matches!(
            ReqwestChatCompletionClient::new("not a url"),
            Err(PlannerError::InvalidConfig(_))
        ));
        let client = ReqwestChatCompletionClient::new("https://api.openai.com/v1/chat/completions")
            .expect("valid endpoint");
        assert_eq!(client.endpoint().host_str(), Some("api.openai.com"));
    }

    #[tokio::test]
    async fn blank_api_key_fails_before_network() {
        let client = ReqwestChatCompletionClient::new("http://127.0.0.1:9/v1/chat/completions")
            .expect("valid endpoint");
        let request = ChatCompletionRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ChatMessage::user("hi")],
            temperature: 0.7,
            max_tokens: 10,
        };
        match client.complete("  ", &request).await {
            Err(PlannerError::Explain(message)) => assert!(message.contains("api key")),
            other => panic!("expected explain error, got {other:?}"),
        }
    }
}
