//! OpenAI 兼容的 chat completions 客户端
//!
//! OpenAI、Anthropic、Mistral、Fireworks 都提供兼容接口，
//! 按 `ModelSpec::provider` 选择地址和密钥。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;

use crate::config::Provider;
use crate::config::config::LlmConfig;
use crate::error::{AppError, Result};
use crate::llm::{CompletionRequest, LanguageModel, ToolSchema};
use crate::models::{Message, Role, ToolCallRequest};

#[derive(Debug, Clone)]
struct Endpoint {
    base_url: String,
    api_key: String,
}

/// 基于 HTTP 的聊天模型客户端
pub struct HttpChatModel {
    client: reqwest::Client,
    openai: Endpoint,
    anthropic: Endpoint,
    mistral: Endpoint,
    fireworks: Endpoint,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn endpoint(base_url: &str, api_key: &str) -> Endpoint {
    Endpoint {
        base_url: base_url.trim_end_matches('/').to_string(),
        api_key: api_key.to_string(),
    }
}

fn message_to_wire(message: &Message) -> Value {
    match message.role {
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id,
            "content": message.content,
        }),
        Role::Assistant if message.has_tool_calls() => {
            let calls: Vec<Value> = message
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": call.arguments.to_string(),
                        },
                    })
                })
                .collect();
            json!({
                "role": "assistant",
                "content": if message.content.is_empty() { Value::Null } else { json!(message.content) },
                "tool_calls": calls,
            })
        }
        role => {
            let role = match role {
                Role::System => "system",
                Role::User => "user",
                _ => "assistant",
            };
            json!({ "role": role, "content": message.content })
        }
    }
}

fn tool_to_wire(tool: &ToolSchema) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        },
    })
}

/// 工具参数以 JSON 字符串传回；无法解析时原样保留，由工具层报告参数错误
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

impl HttpChatModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout.max(1)))
            .build()?;

        Ok(Self {
            client,
            openai: endpoint(&config.openai_base_url, &config.openai_api_key),
            anthropic: endpoint(&config.anthropic_base_url, &config.anthropic_api_key),
            mistral: endpoint(&config.mistral_base_url, &config.mistral_api_key),
            fireworks: endpoint(&config.fireworks_base_url, &config.fireworks_api_key),
        })
    }

    fn endpoint_for(&self, provider: Provider) -> &Endpoint {
        match provider {
            Provider::OpenAi => &self.openai,
            Provider::Anthropic => &self.anthropic,
            Provider::Mistral => &self.mistral,
            Provider::Fireworks => &self.fireworks,
        }
    }
}

#[async_trait]
impl LanguageModel for HttpChatModel {
    async fn complete(&self, request: CompletionRequest) -> Result<Message> {
        let endpoint = self.endpoint_for(request.model.provider);
        if endpoint.api_key.is_empty() {
            return Err(AppError::Config(format!(
                "No API key configured for provider {}",
                request.model.provider
            )));
        }

        let body = WireRequest {
            model: &request.model.model_id,
            temperature: request.temperature,
            messages: request.messages.iter().map(message_to_wire).collect(),
            tools: request.tools.iter().map(tool_to_wire).collect(),
        };

        tracing::debug!(
            "Requesting completion from {} ({} messages, {} tools)",
            request.model.model_id,
            body.messages.len(),
            body.tools.len()
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", endpoint.base_url))
            .bearer_auth(&endpoint.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(format!("Model request timed out: {}", e))
                } else {
                    AppError::ModelInvocation(format!("Model request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::ModelInvocation(format!(
                "Model returned {}: {}",
                status, error_text
            )));
        }

        let body: WireResponse = response
            .json()
            .await
            .map_err(|e| AppError::ModelInvocation(format!("Malformed model response: {}", e)))?;

        let message = body
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| AppError::ModelInvocation("Model response has no choices".into()))?;

        let calls: Vec<ToolCallRequest> = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCallRequest {
                id: call.id,
                name: call.function.name,
                arguments: parse_arguments(&call.function.arguments),
            })
            .collect();

        Ok(Message::assistant_tool_calls(
            message.content.unwrap_or_default(),
            calls,
        ))
    }
}
