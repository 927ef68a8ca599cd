use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use crate::client::{CompletionClient, CompletionError, CompletionRequest};
use crate::config::ProviderConfig;

/// Chat-completions client for any OpenAI-compatible endpoint (Groq, OpenAI, llama.cpp, ...).
///
/// The key may be absent at construction; calls fail with
/// `CompletionError::MissingApiKey` until one is supplied with `set_api_key`.
pub struct OpenAiCompatClient {
	http: Client,
	base_url: String,
	model: String,
	api_key: RwLock<Option<String>>,
}

impl OpenAiCompatClient {
	pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
		Self {
			http: Client::new(),
			base_url: base_url.into().trim_end_matches('/').to_string(),
			model: model.into(),
			api_key: RwLock::new(None),
		}
	}

	pub fn from_config(config: &ProviderConfig) -> Result<Self, CompletionError> {
		let http = Client::builder()
			.timeout(Duration::from_secs(config.timeout_secs))
			.build()?;
		Ok(Self {
			http,
			base_url: config.base_url.trim_end_matches('/').to_string(),
			model: config.model.clone(),
			api_key: RwLock::new(config.resolve_api_key()),
		})
	}

	pub fn with_api_key(self, key: impl Into<String>) -> Self {
		self.set_api_key(key);
		self
	}

	pub fn set_api_key(&self, key: impl Into<String>) {
		let key = key.into();
		if let Ok(mut slot) = self.api_key.write() {
			*slot = if key.trim().is_empty() { None } else { Some(key) };
		}
	}

	pub fn has_api_key(&self) -> bool {
		self.api_key.read().map(|k| k.is_some()).unwrap_or(false)
	}

	pub fn model(&self) -> &str {
		&self.model
	}

	fn request_body(&self, request: &CompletionRequest) -> Value {
		let mut messages = Vec::with_capacity(2);
		if let Some(system) = &request.system {
			messages.push(json!({ "role": "system", "content": system }));
		}
		messages.push(json!({ "role": "user", "content": request.prompt }));

		let mut body = json!({
			"model": self.model,
			"messages": messages,
			"temperature": request.temperature,
			"max_tokens": request.max_tokens,
			"stream": false,
		});
		if request.json_mode {
			body["response_format"] = json!({ "type": "json_object" });
		}
		body
	}
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
	async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
		let key = self
			.api_key
			.read()
			.ok()
			.and_then(|k| k.clone())
			.ok_or(CompletionError::MissingApiKey)?;

		let url = format!("{}/chat/completions", self.base_url);
		debug!(model = %self.model, json_mode = request.json_mode, "sending completion request");

		let resp = self
			.http
			.post(&url)
			.bearer_auth(key)
			.json(&self.request_body(request))
			.send()
			.await?;

		let status = resp.status();
		if !status.is_success() {
			return Err(status_error(status, resp.text().await.unwrap_or_default()));
		}

		let payload: Value = resp
			.json()
			.await
			.map_err(|e| CompletionError::Malformed(e.to_string()))?;
		extract_content(&payload)
	}
}

// 429 maps to RateLimited, every other failure to Status
fn status_error(status: StatusCode, body: String) -> CompletionError {
	if status == StatusCode::TOO_MANY_REQUESTS {
		CompletionError::RateLimited(body)
	} else {
		CompletionError::Status { status: status.as_u16(), body }
	}
}

fn extract_content(payload: &Value) -> Result<String, CompletionError> {
	let choice = payload
		.get("choices")
		.and_then(|c| c.get(0))
		.ok_or_else(|| CompletionError::Malformed("missing choices[0]".to_string()))?;
	match choice["message"]["content"].as_str() {
		Some(content) if !content.is_empty() => Ok(content.to_string()),
		_ => Err(CompletionError::EmptyResponse),
	}
}
