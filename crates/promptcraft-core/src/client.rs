use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Prefix that marks a failed completion when it is recorded as response text.
pub const ERROR_PREFIX: &str = "Error:";

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
	pub system: Option<String>,
	pub prompt: String,
	pub temperature: f32,
	pub max_tokens: u32,
	pub json_mode: bool,
}

impl CompletionRequest {
	pub fn new(prompt: impl Into<String>) -> Self {
		Self {
			system: None,
			prompt: prompt.into(),
			temperature: 0.7,
			max_tokens: 1024,
			json_mode: false,
		}
	}

	pub fn system(mut self, system: impl Into<String>) -> Self {
		self.system = Some(system.into());
		self
	}

	pub fn temperature(mut self, temperature: f32) -> Self {
		self.temperature = temperature.clamp(0.0, 1.0);
		self
	}

	pub fn max_tokens(mut self, max_tokens: u32) -> Self {
		self.max_tokens = max_tokens;
		self
	}

	pub fn json_mode(mut self, json_mode: bool) -> Self {
		self.json_mode = json_mode;
		self
	}
}

#[derive(Debug, Clone, Error)]
pub enum CompletionError {
	#[error("no API key configured for the completion service")]
	MissingApiKey,
	#[error("request failed: {0}")]
	Transport(String),
	#[error("rate limited by the completion service: {0}")]
	RateLimited(String),
	#[error("completion service returned HTTP {status}: {body}")]
	Status { status: u16, body: String },
	#[error("malformed completion payload: {0}")]
	Malformed(String),
	#[error("completion service returned no content")]
	EmptyResponse,
}

impl From<reqwest::Error> for CompletionError {
	fn from(err: reqwest::Error) -> Self {
		Self::Transport(err.to_string())
	}
}

/// A text-completion backend. Implementations never panic on backend failure;
/// every failure comes back as a `CompletionError`.
#[async_trait]
pub trait CompletionClient: Send + Sync {
	async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

/// Render a completion outcome as response text, using the `"Error:"` prefix for failures.
pub fn completion_text(result: Result<String, CompletionError>) -> String {
	match result {
		Ok(text) => text,
		Err(err) => format!("{} {}", ERROR_PREFIX, err),
	}
}

pub fn is_error_response(text: &str) -> bool {
	text.starts_with(ERROR_PREFIX)
}

/// Wrap an async closure as a `CompletionClient`.
pub fn from_async_fn<F, Fut>(f: F) -> Arc<dyn CompletionClient>
where
	F: Send + Sync + 'static + Fn(CompletionRequest) -> Fut,
	Fut: Future<Output = Result<String, CompletionError>> + Send + 'static,
{
	struct ClosureClient<F> {
		f: F,
	}

	#[async_trait]
	impl<F, Fut> CompletionClient for ClosureClient<F>
	where
		F: Send + Sync + 'static + Fn(CompletionRequest) -> Fut,
		Fut: Future<Output = Result<String, CompletionError>> + Send + 'static,
	{
		async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
			(self.f)(request.clone()).await
		}
	}

	Arc::new(ClosureClient { f })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn failed_completion_renders_with_prefix() {
		let text = completion_text(Err(CompletionError::MissingApiKey));
		assert!(is_error_response(&text));
		assert_eq!(text, "Error: no API key configured for the completion service");
		assert_eq!(completion_text(Ok("fine".into())), "fine");
	}

	#[test]
	fn temperature_is_clamped() {
		let req = CompletionRequest::new("hi").temperature(1.7).json_mode(true);
		assert_eq!(req.temperature, 1.0);
		assert!(req.json_mode);
		assert_eq!(req.max_tokens, 1024);
	}

	#[tokio::test]
	async fn closure_client_sees_request() {
		let client = from_async_fn(|req: CompletionRequest| async move {
			Ok::<_, CompletionError>(format!("{}|{}", req.prompt, req.json_mode))
		});
		let out = client
			.complete(&CompletionRequest::new("ping").json_mode(true))
			.await
			.unwrap();
		assert_eq!(out, "ping|true");
	}
}
