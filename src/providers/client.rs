use super::{ChatRequest, ChatTransport, ChunkStream};
use crate::config::{Config, Provider};
use crate::core::error::ChatError;
use crate::transcript::Message;
use futures::stream::StreamExt;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

/// Content of the first choice, as the service sent it.
fn reply_content(body: &str) -> Result<String, ChatError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)?;
    parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.unwrap_or_default())
        .ok_or_else(|| ChatError::Call("No choices in API response".to_string()))
}

/// Where and how to reach one provider.
#[derive(Debug, Clone)]
struct Endpoint {
    base_url: String,
    api_key: String,
    extra_headers: HashMap<String, String>,
}

/// OpenAI-style `chat/completions` transport over HTTP.
///
/// Endpoints are resolved per request so a mid-session provider switch
/// takes effect on the next turn.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    config: Config,
}

impl HttpTransport {
    pub fn new(config: Config) -> Result<Self, ChatError> {
        let client = Client::builder().build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, provider: Provider) -> Result<Endpoint, ChatError> {
        let provider_config = self.config.provider_config(provider);

        let api_key = match provider_config.api_key {
            Some(key) => key,
            None => std::env::var(provider.api_key_env()).map_err(|_| {
                ChatError::Config(format!(
                    "{} must be set in the config file or environment",
                    provider.api_key_env()
                ))
            })?,
        };
        if api_key.trim().is_empty() {
            return Err(ChatError::Config(format!(
                "{} cannot be empty",
                provider.api_key_env()
            )));
        }

        let mut extra_headers = HashMap::new();
        if provider == Provider::OpenRouter {
            if let Some(site_url) = provider_config.site_url {
                extra_headers.insert("HTTP-Referer".to_string(), site_url);
            }
            extra_headers.insert("X-Title".to_string(), env!("CARGO_PKG_NAME").to_string());
        }

        Ok(Endpoint {
            base_url: provider_config
                .base_url
                .unwrap_or_else(|| provider.default_base_url().to_string()),
            api_key,
            extra_headers,
        })
    }

    async fn post(&self, request: &ChatRequest, stream: bool) -> Result<Response, ChatError> {
        let endpoint = self.endpoint(request.provider)?;
        let url = format!("{}/chat/completions", endpoint.base_url.trim_end_matches('/'));
        let messages = request.wire_messages();

        let payload = ChatCompletionRequest {
            model: &request.model,
            messages: &messages,
            stream: stream.then_some(true),
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
        };

        debug!(
            provider = %request.provider,
            model = %request.model,
            messages = messages.len(),
            stream,
            "posting chat completion"
        );

        let mut builder = self
            .client
            .post(&url)
            .bearer_auth(&endpoint.api_key)
            .header("Content-Type", "application/json");
        for (key, value) in &endpoint.extra_headers {
            builder = builder.header(key, value);
        }

        let response = builder.json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = body.split_whitespace().collect::<Vec<_>>().join(" ");
            return Err(ChatError::Call(format!("{} {}", status, body)));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl ChatTransport for HttpTransport {
    async fn send(&self, request: &ChatRequest) -> Result<String, ChatError> {
        let response = self.post(request, false).await?;
        let response_body = response.text().await?;
        reply_content(&response_body)
    }

    async fn send_streaming(&self, request: &ChatRequest) -> Result<ChunkStream, ChatError> {
        let response = self.post(request, true).await?;
        let chunks = response.bytes_stream().map(|item| {
            item.map_err(|e| ChatError::StreamTransport(format!("Error in HTTP stream: {}", e)))
        });
        Ok(chunks.boxed())
    }
}
