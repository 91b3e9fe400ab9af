//! HTTP implementation of the collaborator against a messages-style LLM API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use vibeforge_common::Artifact;

use super::prompts::{
    ANALYST_SYSTEM_PROMPT, CODER_SYSTEM_PROMPT, PLANNER_SYSTEM_PROMPT, REFACTOR_SYSTEM_PROMPT,
    REFINER_SYSTEM_PROMPT, REPORTER_SYSTEM_PROMPT, analyze_prompt, generate_prompt, plan_prompt,
    refactor_prompt, refine_prompt, report_prompt,
};
use super::{AnalysisResponse, Collaborator, PlanResponse, RefineResponse, strip_code_fence};
use crate::errors::CollaboratorError;

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct HttpCollaboratorConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

pub struct HttpCollaborator {
    config: HttpCollaboratorConfig,
    http: reqwest::Client,
}

impl HttpCollaborator {
    pub fn new(config: HttpCollaboratorConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { config, http })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    /// Single-turn completion; returns the concatenated text blocks.
    async fn complete(
        &self,
        operation: &'static str,
        system: &str,
        prompt: &str,
    ) -> Result<String, CollaboratorError> {
        let body = serde_json::json!({
            "model": &self.config.model,
            "max_tokens": self.config.max_tokens,
            "system": system,
            "messages": [{ "role": "user", "content": prompt }],
        });

        tracing::debug!(operation, chars = prompt.len(), "sending collaborator request");

        let resp = self
            .http
            .post(self.endpoint())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CollaboratorError::Timeout {
                        operation,
                        seconds: self.config.timeout.as_secs(),
                    }
                } else {
                    CollaboratorError::service(operation, e)
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CollaboratorError::service(
                operation,
                format!("API error {}: {}", status, body.chars().take(300).collect::<String>()),
            ));
        }

        let parsed: ApiResponse = resp
            .json()
            .await
            .map_err(|e| CollaboratorError::validation(operation, e))?;

        let text = parsed
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(CollaboratorError::validation(operation, "empty response"));
        }
        Ok(text)
    }
}

#[async_trait]
impl Collaborator for HttpCollaborator {
    async fn plan(&self, goal: &str) -> Result<PlanResponse, CollaboratorError> {
        let text = self
            .complete("plan", PLANNER_SYSTEM_PROMPT, &plan_prompt(goal))
            .await?;
        PlanResponse::parse(&text)
    }

    async fn generate_file(
        &self,
        name: &str,
        goal: &str,
        siblings: &[Artifact],
    ) -> Result<String, CollaboratorError> {
        let text = self
            .complete(
                "generate_file",
                CODER_SYSTEM_PROMPT,
                &generate_prompt(name, goal, siblings),
            )
            .await?;
        Ok(strip_code_fence(&text))
    }

    async fn analyze(&self, files: &[Artifact]) -> Result<AnalysisResponse, CollaboratorError> {
        let text = self
            .complete("analyze", ANALYST_SYSTEM_PROMPT, &analyze_prompt(files))
            .await?;
        AnalysisResponse::parse(&text)
    }

    async fn refactor(&self, file: &Artifact, issues: &str) -> Result<String, CollaboratorError> {
        let text = self
            .complete(
                "refactor",
                REFACTOR_SYSTEM_PROMPT,
                &refactor_prompt(file, issues),
            )
            .await?;
        Ok(strip_code_fence(&text))
    }

    async fn report(&self, summary: &str) -> Result<String, CollaboratorError> {
        self.complete("report", REPORTER_SYSTEM_PROMPT, &report_prompt(summary))
            .await
    }

    async fn refine(
        &self,
        request: &str,
        files: &[Artifact],
    ) -> Result<RefineResponse, CollaboratorError> {
        let text = self
            .complete("refine", REFINER_SYSTEM_PROMPT, &refine_prompt(request, files))
            .await?;
        RefineResponse::parse(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> HttpCollaboratorConfig {
        HttpCollaboratorConfig {
            base_url: base_url.to_string(),
            model: "test-model".into(),
            api_key: "key".into(),
            max_tokens: 100,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = HttpCollaborator::new(config("http://localhost:9999/")).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:9999/v1/messages");
    }

    #[test]
    fn test_api_response_ignores_unknown_blocks() {
        let resp: ApiResponse = serde_json::from_str(
            r#"{"content": [{"type": "thinking", "thinking": "hmm"}, {"type": "text", "text": "ok"}]}"#,
        )
        .unwrap();
        assert_eq!(resp.content.len(), 2);
        assert!(matches!(&resp.content[1], ContentBlock::Text { text } if text == "ok"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_service_error() {
        // Port 9 (discard) is closed on test machines; the connect fails fast.
        let client = HttpCollaborator::new(config("http://127.0.0.1:9")).unwrap();
        let err = client.report("summary").await.unwrap_err();
        assert_eq!(err.operation(), "report");
        assert!(!err.is_validation());
    }
}
