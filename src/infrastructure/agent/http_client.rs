use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AgentClientConfig;
use crate::domain::{
    Action, AgentId, AgentInvocation, AgentInvoker, AgentJudge, DomainError, EvaluationContext,
    JudgmentRequest,
};

const PROVIDER: &str = "agent";

#[derive(Debug, Deserialize)]
struct InvokeResponse {
    #[serde(default)]
    action: Option<Action>,
}

#[derive(Debug, Serialize)]
struct JudgeBody<'a> {
    step_id: &'a str,
    prompt: &'a str,
    context: &'a EvaluationContext,
}

#[derive(Debug, Deserialize)]
struct JudgeResponse {
    verdict: bool,
}

/// Agent service client over HTTP.
///
/// - `POST {base_url}/agents/{agent_id}/invoke` with the invocation, answering
///   `{"action": <action> | null}`
/// - `POST {base_url}/agents/{agent_id}/judge`, answering `{"verdict": bool}`
#[derive(Debug, Clone)]
pub struct HttpAgentClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpAgentClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        })
    }

    pub fn from_config(config: &AgentClientConfig) -> Result<Self, DomainError> {
        let base_url = config
            .base_url
            .as_deref()
            .ok_or_else(|| DomainError::configuration("agent.base_url is not set"))?;

        let client = Self::new(base_url, Duration::from_millis(config.timeout_ms))?;
        Ok(match &config.api_key {
            Some(key) => client.with_api_key(key.clone()),
            None => client,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn url(&self, agent_id: &AgentId, operation: &str) -> String {
        format!("{}/agents/{}/{}", self.base_url, agent_id, operation)
    }

    async fn post<B, R>(&self, url: &str, body: &B) -> Result<R, DomainError>
    where
        B: Serialize + ?Sized + Sync,
        R: for<'de> Deserialize<'de>,
    {
        let mut request = self.client.post(url).json(body);

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DomainError::provider(PROVIDER, format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            return Err(DomainError::provider(
                PROVIDER,
                format!("HTTP {}: {}", status, error_body),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| DomainError::provider(PROVIDER, format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl AgentInvoker for HttpAgentClient {
    async fn invoke(&self, invocation: &AgentInvocation) -> Result<Option<Action>, DomainError> {
        let url = self.url(&invocation.agent_id, "invoke");
        debug!("Invoking agent '{}' with model '{}'", invocation.agent_id, invocation.model);

        let response: InvokeResponse = self.post(&url, invocation).await?;
        Ok(response.action)
    }
}

#[async_trait]
impl AgentJudge for HttpAgentClient {
    async fn judge(
        &self,
        request: &JudgmentRequest,
        context: &EvaluationContext,
    ) -> Result<bool, DomainError> {
        let url = self.url(&request.agent_id, "judge");
        debug!("Asking agent '{}' to judge step '{}'", request.agent_id, request.step_id);

        let body = JudgeBody {
            step_id: request.step_id.as_str(),
            prompt: &request.prompt,
            context,
        };
        let response: JudgeResponse = self.post(&url, &body).await?;
        Ok(response.verdict)
    }
}
