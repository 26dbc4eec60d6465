//! Role-bound model handles.
//!
//! Each pipeline stage talks to either the worker or the critic model. A
//! [`RoleModel`] pins a backend to a model name and the generation settings
//! shared by every call made in that role.

use docent_config::ModelRole;
use docent_llm::{CompletionRequest, Message, ResponseFormat, SharedBackend};

use crate::error::Result;

/// Default output budget per call.
pub const DEFAULT_MAX_TOKENS: u32 = 8192;

/// A backend bound to one model and role.
#[derive(Clone)]
pub struct RoleModel {
    backend: SharedBackend,
    model: String,
    role: ModelRole,
    include_thoughts: bool,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl RoleModel {
    pub fn new(backend: SharedBackend, model: impl Into<String>, role: ModelRole) -> Self {
        Self {
            backend,
            model: model.into(),
            role,
            include_thoughts: false,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
        }
    }

    pub fn with_thoughts(mut self, include: bool) -> Self {
        self.include_thoughts = include;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn role(&self) -> ModelRole {
        self.role
    }

    /// Free-text call.
    pub async fn invoke(&self, instruction: &str, input: &str) -> Result<String> {
        self.call(instruction, input, ResponseFormat::Text).await
    }

    /// Call with a structured output constraint. Returns the raw text for the
    /// caller to validate.
    pub async fn invoke_structured(
        &self,
        instruction: &str,
        input: &str,
        format: ResponseFormat,
    ) -> Result<String> {
        self.call(instruction, input, format).await
    }

    async fn call(&self, instruction: &str, input: &str, format: ResponseFormat) -> Result<String> {
        let mut request =
            CompletionRequest::new(&self.model, vec![Message::user(input)], self.max_tokens)
                .with_system(instruction)
                .with_response_format(format)
                .with_thoughts(self.include_thoughts);
        if let Some(t) = self.temperature {
            request = request.with_temperature(t);
        }

        let response = self.backend.complete(request).await?;

        if let Some(thinking) = response.thinking() {
            tracing::debug!(role = %self.role, thinking = %thinking, "Model reasoning");
        }
        if response.is_truncated() {
            tracing::warn!(role = %self.role, model = %self.model, "Response hit the token limit");
        }
        tracing::debug!(
            role = %self.role,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Model call complete"
        );

        Ok(response.text())
    }
}

/// The two model roles used by the pipeline.
#[derive(Clone)]
pub struct Models {
    pub worker: RoleModel,
    pub critic: RoleModel,
}

impl Models {
    pub fn new(worker: RoleModel, critic: RoleModel) -> Self {
        Self { worker, critic }
    }

    /// Both roles on one backend handle.
    pub fn shared(backend: SharedBackend, worker_model: &str, critic_model: &str) -> Self {
        Self {
            worker: RoleModel::new(backend.clone(), worker_model, ModelRole::Worker),
            critic: RoleModel::new(backend, critic_model, ModelRole::Critic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docent_llm::MockBackend;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_invoke_builds_request() {
        let mock = Arc::new(MockBackend::with_text("hello"));
        let model = RoleModel::new(mock.clone(), "flash", ModelRole::Worker)
            .with_thoughts(true)
            .with_temperature(0.2);

        let text = model.invoke("Be brief.", "Say hi").await.unwrap();
        assert_eq!(text, "hello");

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "flash");
        assert_eq!(requests[0].system.as_deref(), Some("Be brief."));
        assert_eq!(requests[0].messages[0].content, "Say hi");
        assert!(requests[0].include_thoughts);
        assert_eq!(requests[0].temperature, Some(0.2));
        assert!(!requests[0].response_format.is_structured());
    }

    #[tokio::test]
    async fn test_invoke_structured_sets_format() {
        let mock = Arc::new(MockBackend::with_text("{}"));
        let model = RoleModel::new(mock.clone(), "pro", ModelRole::Critic);
        let format = ResponseFormat::json_schema("feedback", serde_json::json!({"type": "object"}));

        model.invoke_structured("grade", "findings", format).await.unwrap();
        assert!(mock.requests()[0].response_format.is_structured());
    }

    #[tokio::test]
    async fn test_backend_error_propagates() {
        let mock = Arc::new(MockBackend::new(vec![]));
        let model = RoleModel::new(mock, "flash", ModelRole::Worker);
        assert!(model.invoke("x", "y").await.is_err());
    }

    #[test]
    fn test_shared_models() {
        let mock: SharedBackend = Arc::new(MockBackend::new(vec![]));
        let models = Models::shared(mock, "flash", "pro");
        assert_eq!(models.worker.model(), "flash");
        assert_eq!(models.critic.role(), ModelRole::Critic);
    }
}
