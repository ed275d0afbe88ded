// src/generate/openai.rs
//! OpenAI-compatible Chat Completions client with the `optimized_search` tool loop.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{GenerateFuture, GenerationRequest, Generator, TOOL_NAME};
use crate::config::ai::AiConfig;
use crate::search::SearchOrchestrator;
use crate::text::truncate_chars;

#[derive(Debug, Deserialize)]
struct ChatResp {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMsg,
}

#[derive(Debug, Deserialize)]
struct AssistantMsg {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct ToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: ToolFunction,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct ToolFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    #[serde(default)]
    queries: Vec<String>,
}

pub struct OpenAiGenerator {
    http: reqwest::Client,
    api_key: String,
    model: String,
    url: String,
    temperature: f32,
    max_tool_rounds: u32,
    provider: &'static str,
}

impl OpenAiGenerator {
    pub fn new(cfg: &AiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("evidence-auditor/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .context("building chat http client")?;
        let provider = if cfg.provider == "openai" { "openai" } else { "groq" };
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            url: cfg.chat_url(),
            temperature: cfg.temperature,
            max_tool_rounds: cfg.max_tool_rounds,
            provider,
        })
    }

    fn tool_spec() -> Value {
        json!([{
            "type": "function",
            "function": {
                "name": TOOL_NAME,
                "description": "Search trusted academic and clinical sources. Pass up to 3 queries at once.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "queries": { "type": "array", "items": { "type": "string" } }
                    },
                    "required": ["queries"]
                }
            }
        }])
    }

    async fn complete(&self, messages: &[Value], tools: bool, final_round: bool) -> Result<AssistantMsg> {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });
        if tools {
            body["tools"] = Self::tool_spec();
            body["tool_choice"] = json!(if final_round { "none" } else { "auto" });
        }

        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("chat completions post()")?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "chat completions returned HTTP {status}: {}",
                truncate_chars(&text, 200)
            ));
        }
        let parsed: ChatResp = resp.json().await.context("chat completions .json()")?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| anyhow!("chat completions returned no choices"))
    }

    async fn run_tool(&self, call: &ToolCall, tool: &SearchOrchestrator) -> String {
        if call.function.name != TOOL_NAME {
            return json!({ "error": format!("unknown tool {}", call.function.name) }).to_string();
        }
        let args: SearchArgs = match serde_json::from_str(&call.function.arguments) {
            Ok(a) => a,
            Err(e) => return json!({ "error": format!("bad arguments: {e}") }).to_string(),
        };
        let results = tool.search(args.queries.as_slice()).await;
        serde_json::to_string(&results).unwrap_or_else(|_| "[]".to_string())
    }

    async fn generate_impl(
        &self,
        req: &GenerationRequest,
        tool: Option<&SearchOrchestrator>,
    ) -> Result<Option<String>> {
        let mut messages = vec![
            json!({ "role": "system", "content": req.system_prompt }),
            json!({ "role": "user", "content": req.user_message }),
        ];

        let rounds = self.max_tool_rounds.max(1);
        for round in 0..=rounds {
            let final_round = round == rounds;
            let msg = self.complete(&messages, tool.is_some(), final_round).await?;
            let calls = msg.tool_calls.unwrap_or_default();

            let orch = match tool {
                Some(t) if !calls.is_empty() && !final_round => t,
                _ => {
                    let text = msg.content.unwrap_or_default();
                    let text = text.trim();
                    return Ok((!text.is_empty()).then(|| text.to_string()));
                }
            };

            tracing::info!(target: "pipeline", round, calls = calls.len(), "model requested search");
            messages.push(json!({
                "role": "assistant",
                "content": msg.content,
                "tool_calls": calls,
            }));
            for call in &calls {
                let content = self.run_tool(call, orch).await;
                messages.push(json!({
                    "role": "tool",
                    "tool_call_id": call.id,
                    "content": content,
                }));
            }
        }
        Ok(None)
    }
}

impl Generator for OpenAiGenerator {
    fn generate<'a>(
        &'a self,
        req: &'a GenerationRequest,
        tool: Option<&'a SearchOrchestrator>,
    ) -> GenerateFuture<'a> {
        Box::pin(self.generate_impl(req, tool))
    }

    fn provider_name(&self) -> &'static str {
        self.provider
    }
}
