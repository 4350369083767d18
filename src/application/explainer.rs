use crate::domain::models::CandidateTask;
use crate::infrastructure::config::ExplainerConfig;
use crate::infrastructure::error::PlannerError;
use crate::infrastructure::explain_client::{
    ChatCompletionClient, ChatCompletionRequest, ChatMessage, SYSTEM_PROMPT,
};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

#[async_trait]
pub trait TaskExplainer: Send + Sync {
    async fn explain(&self, task: &CandidateTask) -> Result<String, PlannerError>;
}

pub fn rule_based_reason(task: &CandidateTask) -> String {
    let tags = task.tags.iter().cloned().collect::<Vec<_>>().join(", ");
    format!(
        "The task '{}' is recommended based on your interests: {tags}.",
        task.title
    )
}

#[derive(Debug, Clone, Default)]
pub struct RuleBasedExplainer;

#[async_trait]
impl TaskExplainer for RuleBasedExplainer {
    async fn explain(&self, task: &CandidateTask) -> Result<String, PlannerError> {
        Ok(rule_based_reason(task))
    }
}

pub struct RemoteExplainer<C>
where
    C: ChatCompletionClient + ?Sized,
{
    client: Arc<C>,
    api_key: String,
    config: ExplainerConfig,
}

impl<C> RemoteExplainer<C>
where
    C: ChatCompletionClient + ?Sized,
{
    pub fn new(client: Arc<C>, api_key: impl Into<String>, config: ExplainerConfig) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            config,
        }
    }

    pub fn build_request(&self, task: &CandidateTask) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(build_prompt(task))],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }
}

fn build_prompt(task: &CandidateTask) -> String {
    format!(
        "A planner proposed the task '{}' for the free time slot {} ({} minutes). \
         Its tags are: {}. Please explain in natural English why this task suits the user's \
         interests and available time.",
        task.title,
        task.scheduled_slot.label(),
        task.duration_minutes,
        task.joined_tags()
    )
}

#[async_trait]
impl<C> TaskExplainer for RemoteExplainer<C>
where
    C: ChatCompletionClient + ?Sized,
{
    async fn explain(&self, task: &CandidateTask) -> Result<String, PlannerError> {
        let request = self.build_request(task);
        self.client.complete(&self.api_key, &request).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplanationSource {
    Rule,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explanation {
    pub text: String,
    pub source: ExplanationSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

/// Tries the remote explainer once and falls back to the rule-based text.
pub struct ExplanationService {
    remote: Option<Arc<dyn TaskExplainer>>,
}

impl ExplanationService {
    pub fn rule_only() -> Self {
        Self { remote: None }
    }

    pub fn with_remote(remote: Arc<dyn TaskExplainer>) -> Self {
        Self {
            remote: Some(remote),
        }
    }

    pub async fn explain(&self, task: &CandidateTask) -> Explanation {
        let Some(remote) = &self.remote else {
            return Explanation {
                text: rule_based_reason(task),
                source: ExplanationSource::Rule,
                fallback_reason: None,
            };
        };
        match remote.explain(task).await {
            Ok(text) => Explanation {
                text,
                source: ExplanationSource::Remote,
                fallback_reason: None,
            },
            Err(error) => Explanation {
                text: rule_based_reason(task),
                source: ExplanationSource::Rule,
                fallback_reason: Some(error.to_string()),
            },
        }
    }
}
