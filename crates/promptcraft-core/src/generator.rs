use std::sync::Arc;

use promptcraft_types::{Difficulty, TestCase};
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::{CompletionClient, CompletionRequest};

const GENERATION_TEMPERATURE: f32 = 0.8;
const COMPARISON_TEMPERATURE: f32 = 0.7;
const GENERATION_MAX_TOKENS: u32 = 2048;
const MAX_FALLBACK_CASES: usize = 5;

/// Asks the completion service for test cases, degrading to stub cases on any failure.
#[derive(Clone)]
pub struct TestCaseGenerator {
	client: Arc<dyn CompletionClient>,
}

impl TestCaseGenerator {
	pub fn new(client: Arc<dyn CompletionClient>) -> Self {
		Self { client }
	}

	pub async fn generate_test_cases(
		&self,
		prompt: &str,
		use_case_description: &str,
		num_cases: usize,
	) -> Vec<TestCase> {
		let directive = generation_directive(prompt, use_case_description, num_cases);
		let request = CompletionRequest::new(directive)
			.temperature(GENERATION_TEMPERATURE)
			.max_tokens(GENERATION_MAX_TOKENS)
			.json_mode(true);
		self.request_cases(&request, use_case_description, num_cases).await
	}

	/// Cases meant to be shared by several prompt variants.
	pub async fn generate_comparison_cases(&self, use_case_description: &str, num_cases: usize) -> Vec<TestCase> {
		let directive = comparison_directive(use_case_description, num_cases);
		let request = CompletionRequest::new(directive)
			.temperature(COMPARISON_TEMPERATURE)
			.max_tokens(GENERATION_MAX_TOKENS)
			.json_mode(true);
		self.request_cases(&request, use_case_description, num_cases).await
	}

	async fn request_cases(&self, request: &CompletionRequest, use_case: &str, num_cases: usize) -> Vec<TestCase> {
		let reply = match self.client.complete(request).await {
			Ok(reply) => reply,
			Err(err) => {
				warn!(error = %err, "test case generation failed, using fallback cases");
				return fallback_cases(use_case, num_cases);
			}
		};

		match parse_test_cases(&reply) {
			Ok(mut cases) if !cases.is_empty() => {
				cases.truncate(num_cases);
				debug!(count = cases.len(), "generated test cases");
				cases
			}
			Ok(_) => {
				warn!("generator returned no usable test cases, using fallback cases");
				fallback_cases(use_case, num_cases)
			}
			Err(err) => {
				warn!(error = %err, reply = %preview(&reply), "could not parse generated test cases, using fallback cases");
				fallback_cases(use_case, num_cases)
			}
		}
	}
}

/// Accepts `{"test_cases": [...]}`, a bare array, or a single case object.
pub fn parse_test_cases(reply: &str) -> Result<Vec<TestCase>, serde_json::Error> {
	let value: Value = serde_json::from_str(reply.trim())?;
	let items = match value {
		Value::Object(mut obj) => match obj.remove("test_cases") {
			Some(Value::Array(items)) => items,
			Some(_) => Vec::new(),
			None => vec![Value::Object(obj)],
		},
		Value::Array(items) => items,
		_ => Vec::new(),
	};
	Ok(items.iter().filter_map(case_from_value).collect())
}

pub(crate) fn case_from_value(value: &Value) -> Option<TestCase> {
	let obj = value.as_object()?;
	let input = text_field(obj.get("input")?)?;
	let expected_criteria = obj
		.get("expected_criteria")
		.and_then(text_field)
		.unwrap_or_else(|| "General quality".to_string());
	let difficulty = obj
		.get("difficulty")
		.and_then(Value::as_str)
		.and_then(|d| d.parse::<Difficulty>().ok())
		.unwrap_or_default();
	let category = obj
		.get("category")
		.and_then(text_field)
		.filter(|c| !c.is_empty())
		.unwrap_or_else(|| "general".to_string());

	Some(TestCase { input, expected_criteria, difficulty, category })
}

// models sometimes put structured data where a string belongs
fn text_field(value: &Value) -> Option<String> {
	match value {
		Value::String(s) => Some(s.clone()),
		Value::Null => None,
		other => Some(other.to_string()),
	}
}

/// Deterministic stand-in cases: `min(num_cases, 5)` of them.
pub fn fallback_cases(use_case: &str, num_cases: usize) -> Vec<TestCase> {
	(1..=num_cases.min(MAX_FALLBACK_CASES))
		.map(|i| {
			TestCase::new(
				format!("Test input {} for {}", i, use_case),
				"Should produce relevant and coherent output",
			)
		})
		.collect()
}

fn preview(s: &str) -> String {
	s.chars().take(200).collect()
}

fn generation_directive(prompt: &str, use_case: &str, num_cases: usize) -> String {
	format!(
		r#"You are a test case generator for LLM prompt evaluation.

Given this prompt template:
{prompt}

Use case: {use_case}

Generate {num_cases} diverse test cases that will thoroughly evaluate this prompt's performance.

For each test case, provide:
1. "input": The actual input text/query to test
2. "expected_criteria": What makes a good response (e.g., "should classify as urgent", "should extract 3 dates", "should be professional tone")
3. "difficulty": easy, medium, or hard
4. "category": A category label for organizing results

Make test cases diverse:
- Include edge cases (empty input, very long input, ambiguous cases)
- Cover different difficulty levels
- Test various aspects of the prompt's requirements
- Include both expected successes and challenging scenarios

Return ONLY valid JSON in this exact format:
{{
  "test_cases": [
    {{
      "input": "test input here",
      "expected_criteria": "description of what good output looks like",
      "difficulty": "easy",
      "category": "basic"
    }}
  ]
}}"#
	)
}

fn comparison_directive(use_case: &str, num_cases: usize) -> String {
	format!(
		r#"Generate {num_cases} consistent test cases for comparing different prompt versions.

Use case: {use_case}

These test cases will be used to evaluate multiple prompt variants side-by-side.
Make them:
- Representative of real-world usage
- Challenging enough to differentiate prompt quality
- Consistent in difficulty distribution

Return ONLY valid JSON:
{{
  "test_cases": [
    {{
      "input": "test input",
      "expected_criteria": "evaluation criteria",
      "difficulty": "easy|medium|hard",
      "category": "category name"
    }}
  ]
}}"#
	)
}
