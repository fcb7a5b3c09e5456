//! Blind estimator backed by the hosted model provider.
//!
//! Single-shot estimation runs the Messages API with a bounded
//! web-search tool and a `pause_turn` continuation loop. Batch mode
//! submits one Message Batches job, polls it to completion, and parses
//! each succeeded entry like a single-shot response at batch-tier
//! pricing.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::adapter::outbound::http;
use crate::domain::estimate::{BlindMarketInput, EstimateOutput};
use crate::error::{Error, ResearchError, Result};
use crate::port::outbound::estimator::Estimator;

use super::parse::parse_estimate;
use super::pricing::estimate_cost;
use super::prompts::{
    build_research_prompt, build_screen_prompt, SCREEN_SYSTEM_PROMPT, SYSTEM_PROMPT,
};
use super::wire::{
    BatchRequest, BatchRequestItem, BatchResultLine, BatchStatus, MessageParam,
    MessagesRequest, MessagesResponse, SystemBlock, WebSearchTool,
};

/// API version header value.
const API_VERSION: &str = "2023-06-01";

/// Upper bound on `pause_turn` continuation rounds.
const MAX_CONTINUATIONS: usize = 8;

/// Researcher configuration, resolved from the environment at startup.
#[derive(Debug, Clone)]
pub struct ResearcherConfig {
    pub api_key: String,
    pub base_url: String,
    pub default_model: String,
    pub premium_model: String,
    pub screen_model: String,
    /// Volume at or above which the premium model is selected.
    pub premium_volume_threshold: f64,
    pub web_search_max_uses: u32,
    pub max_tokens: u32,
    pub batch_poll_interval: Duration,
    pub batch_timeout: Duration,
}

impl Default for ResearcherConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.anthropic.com".to_string(),
            default_model: "claude-sonnet-4-5".to_string(),
            premium_model: "claude-opus-4-6".to_string(),
            screen_model: "claude-haiku-4-5".to_string(),
            premium_volume_threshold: 100_000.0,
            web_search_max_uses: 3,
            max_tokens: 4096,
            batch_poll_interval: Duration::from_secs(10),
            batch_timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// Model-provider client implementing the [`Estimator`] port.
pub struct AnthropicResearcher {
    http: reqwest::Client,
    config: ResearcherConfig,
}

impl AnthropicResearcher {
    #[must_use]
    pub fn new(config: ResearcherConfig) -> Self {
        Self {
            http: http::client(),
            config,
        }
    }

    fn research_request(&self, model: &str, prompt: String) -> MessagesRequest {
        MessagesRequest {
            model: model.to_string(),
            max_tokens: self.config.max_tokens,
            system: vec![SystemBlock::cached(SYSTEM_PROMPT)],
            tools: vec![WebSearchTool::new(self.config.web_search_max_uses)],
            messages: vec![MessageParam {
                role: "user",
                content: Value::String(prompt),
            }],
        }
    }

    async fn send_messages(&self, request: &MessagesRequest) -> Result<MessagesResponse> {
        let url = format!("{}/v1/messages", self.config.base_url);
        http::json_with_retry(|| {
            Ok(self
                .http
                .post(&url)
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", API_VERSION)
                .header("content-type", "application/json")
                .json(request))
        })
        .await
    }

    /// Run the conversation to a terminal response, appending the
    /// partial assistant turn and re-invoking on every `pause_turn`.
    /// Returns the final response and the summed usage over all rounds.
    async fn complete_with_continuation(
        &self,
        mut request: MessagesRequest,
    ) -> Result<(MessagesResponse, u64, u64)> {
        let mut response = self.send_messages(&request).await?;
        let mut input_tokens = response.usage.input_tokens;
        let mut output_tokens = response.usage.output_tokens;

        let mut rounds = 0;
        while response.stop_reason.as_deref() == Some("pause_turn") {
            rounds += 1;
            if rounds > MAX_CONTINUATIONS {
                warn!(rounds, "pause_turn continuation cap hit, using partial turn");
                break;
            }
            debug!(rounds, "pause_turn received, continuing conversation");
            request.messages.push(MessageParam {
                role: "assistant",
                content: Value::Array(response.content.clone()),
            });
            response = self.send_messages(&request).await?;
            input_tokens += response.usage.input_tokens;
            output_tokens += response.usage.output_tokens;
        }

        Ok((response, input_tokens, output_tokens))
    }

    fn parse_response_text(
        text: &str,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        batch: bool,
    ) -> Result<EstimateOutput> {
        if text.trim().is_empty() {
            return Err(ResearchError::EmptyResponse.into());
        }
        let mut output = parse_estimate(text)?;
        output.input_tokens = input_tokens;
        output.output_tokens = output_tokens;
        output.estimated_cost = estimate_cost(model, input_tokens, output_tokens, batch);
        Ok(output)
    }

    async fn batch_status(&self, batch_id: &str) -> Result<BatchStatus> {
        let url = format!("{}/v1/messages/batches/{batch_id}", self.config.base_url);
        http::json_with_retry(|| {
            Ok(self
                .http
                .get(&url)
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", API_VERSION))
        })
        .await
    }

    async fn cancel_batch(&self, batch_id: &str) {
        let url = format!(
            "{}/v1/messages/batches/{batch_id}/cancel",
            self.config.base_url
        );
        let result = http::send_with_retry(|| {
            Ok(self
                .http
                .post(&url)
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", API_VERSION))
        })
        .await;
        if let Err(e) = result {
            warn!(batch_id, error = %e, "batch cancel failed");
        }
    }

    async fn fetch_batch_results(&self, results_url: &str) -> Result<Vec<BatchResultLine>> {
        let response = http::send_with_retry(|| {
            Ok(self
                .http
                .get(results_url)
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", API_VERSION))
        })
        .await?;
        let body = response.text().await?;

        let mut lines = Vec::new();
        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<BatchResultLine>(line) {
                Ok(parsed) => lines.push(parsed),
                Err(e) => warn!(error = %e, "skipping unparseable batch result line"),
            }
        }
        Ok(lines)
    }
}

#[async_trait]
impl Estimator for AnthropicResearcher {
    /// Manual/premium override wins; then the volume threshold; else
    /// the default model. Volume is consumed here and nowhere else.
    fn select_model(&self, volume: Option<f64>, premium: bool) -> String {
        if premium {
            return self.config.premium_model.clone();
        }
        match volume {
            Some(v) if v >= self.config.premium_volume_threshold => {
                self.config.premium_model.clone()
            }
            _ => self.config.default_model.clone(),
        }
    }

    async fn estimate(
        &self,
        input: &BlindMarketInput,
        volume: Option<f64>,
        premium: bool,
    ) -> Result<EstimateOutput> {
        let model = self.select_model(volume, premium);
        let prompt = build_research_prompt(input);

        info!(
            question = %input.question.chars().take(80).collect::<String>(),
            model = %model,
            "estimating"
        );

        let request = self.research_request(&model, prompt);
        let (response, input_tokens, output_tokens) =
            self.complete_with_continuation(request).await?;

        let output = Self::parse_response_text(
            &response.text(),
            &model,
            input_tokens,
            output_tokens,
            false,
        )?;

        info!(
            probability = output.probability,
            confidence = output.confidence.as_str(),
            input_tokens,
            output_tokens,
            cost = output.estimated_cost,
            "estimate complete"
        );
        Ok(output)
    }

    async fn estimate_batch(
        &self,
        items: &[(String, BlindMarketInput)],
    ) -> Result<HashMap<String, EstimateOutput>> {
        if items.is_empty() {
            return Ok(HashMap::new());
        }

        let model = self.config.default_model.clone();
        let batch = BatchRequest {
            requests: items
                .iter()
                .map(|(custom_id, input)| BatchRequestItem {
                    custom_id: custom_id.clone(),
                    params: self.research_request(&model, build_research_prompt(input)),
                })
                .collect(),
        };

        let url = format!("{}/v1/messages/batches", self.config.base_url);
        let created: BatchStatus = http::json_with_retry(|| {
            Ok(self
                .http
                .post(&url)
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", API_VERSION)
                .header("content-type", "application/json")
                .json(&batch))
        })
        .await?;

        info!(batch_id = %created.id, requests = items.len(), "batch submitted");

        let deadline = tokio::time::Instant::now() + self.config.batch_timeout;
        let status = loop {
            if tokio::time::Instant::now() >= deadline {
                warn!(batch_id = %created.id, "batch timed out, cancelling");
                self.cancel_batch(&created.id).await;
                return Err(ResearchError::BatchTimeout {
                    timeout_secs: self.config.batch_timeout.as_secs(),
                }
                .into());
            }
            tokio::time::sleep(self.config.batch_poll_interval).await;
            let status = self.batch_status(&created.id).await?;
            debug!(batch_id = %created.id, status = %status.processing_status, "batch poll");
            if status.processing_status == "ended" {
                break status;
            }
        };

        let results_url = status.results_url.ok_or_else(|| {
            Error::Research(ResearchError::BatchFailed(
                "batch ended without a results URL".to_string(),
            ))
        })?;

        let mut outputs = HashMap::new();
        for line in self.fetch_batch_results(&results_url).await? {
            if line.result.result_type != "succeeded" {
                warn!(
                    custom_id = %line.custom_id,
                    result = %line.result.result_type,
                    "batch entry did not succeed"
                );
                continue;
            }
            let Some(message) = line.result.message else {
                continue;
            };
            match Self::parse_response_text(
                &message.text(),
                &model,
                message.usage.input_tokens,
                message.usage.output_tokens,
                true,
            ) {
                Ok(output) => {
                    outputs.insert(line.custom_id, output);
                }
                Err(e) => {
                    warn!(custom_id = %line.custom_id, error = %e, "batch entry unparseable");
                }
            }
        }

        info!(
            batch_id = %created.id,
            succeeded = outputs.len(),
            submitted = items.len(),
            "batch complete"
        );
        Ok(outputs)
    }

    /// Cheap worth-researching gate. Fails open so a broken screen
    /// model never blocks the pipeline.
    async fn screen(&self, input: &BlindMarketInput) -> bool {
        let request = MessagesRequest {
            model: self.config.screen_model.clone(),
            max_tokens: 16,
            system: vec![SystemBlock::cached(SCREEN_SYSTEM_PROMPT)],
            tools: Vec::new(),
            messages: vec![MessageParam {
                role: "user",
                content: Value::String(build_screen_prompt(input)),
            }],
        };

        match self.send_messages(&request).await {
            Ok(response) => {
                let verdict = response.text().trim().to_ascii_uppercase();
                let worth = !verdict.starts_with("NO");
                if !worth {
                    debug!(
                        question = %input.question.chars().take(60).collect::<String>(),
                        "screen rejected market"
                    );
                }
                worth
            }
            Err(e) => {
                warn!(error = %e, "screen call failed, failing open");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn researcher() -> AnthropicResearcher {
        AnthropicResearcher::new(ResearcherConfig {
            api_key: "test-key".to_string(),
            ..ResearcherConfig::default()
        })
    }

    #[test]
    fn model_selection_policy() {
        let r = researcher();
        // Premium override wins regardless of volume.
        assert_eq!(r.select_model(Some(10.0), true), r.config.premium_model);
        assert_eq!(r.select_model(None, true), r.config.premium_model);
        // Volume threshold escalates.
        assert_eq!(
            r.select_model(Some(100_000.0), false),
            r.config.premium_model
        );
        assert_eq!(
            r.select_model(Some(99_999.0), false),
            r.config.default_model
        );
        assert_eq!(r.select_model(None, false), r.config.default_model);
    }

    #[test]
    fn parse_response_text_fills_cost() {
        let text = "```json\n{\"probability\": 0.6, \"confidence\": \"high\", \
                    \"reasoning\": \"r\"}\n```";
        let output = AnthropicResearcher::parse_response_text(
            text,
            "claude-sonnet-4-5",
            1_000,
            1_000,
            false,
        )
        .unwrap();
        assert!((output.estimated_cost - 0.018).abs() < 1e-9);
        assert_eq!(output.input_tokens, 1_000);

        let batched = AnthropicResearcher::parse_response_text(
            text,
            "claude-sonnet-4-5",
            1_000,
            1_000,
            true,
        )
        .unwrap();
        assert!((batched.estimated_cost - 0.009).abs() < 1e-9);
    }

    #[test]
    fn empty_response_is_an_error() {
        let err = AnthropicResearcher::parse_response_text("  \n", "m", 0, 0, false)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Research(ResearchError::EmptyResponse)
        ));
    }

    #[test]
    fn research_request_carries_tool_and_cache() {
        let r = researcher();
        let request = r.research_request("claude-sonnet-4-5", "prompt".to_string());
        assert_eq!(request.tools.len(), 1);
        assert_eq!(request.tools[0].max_uses, 3);
        assert!(request.system[0].cache_control.is_some());
    }
}
