use std::sync::Arc;

use promptcraft_types::{EvaluationResult, ModelGrade, TestCase};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::client::{is_error_response, CompletionClient, CompletionRequest};

pub const CONNECTION_ISSUE: &str = "API connection issue";
pub const FORMAT_ISSUE: &str = "API response format issue";

/// Lower-cased weakness tags that describe infrastructure failures, not quality.
pub const TECHNICAL_WEAKNESSES: &[&str] = &[
    "grading error occurred",
    "grading error",
    "api connection issue",
    "api response format issue",
];

const JUDGE_TEMPERATURE: f32 = 0.3;
const JUDGE_MAX_TOKENS: u32 = 500;
const DEFAULT_SCORE: i64 = 5;

/// LLM-as-judge grading of one response against a test case's criteria.
pub struct ModelGrader {
    client: Arc<dyn CompletionClient>,
}

impl ModelGrader {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    pub async fn grade_response(&self, test_case: &TestCase, response: &str, custom_criteria: &str) -> ModelGrade {
        if is_error_response(response) {
            return ModelGrade::technical_error("API error prevented response generation", CONNECTION_ISSUE);
        }

        let request = CompletionRequest::new(grading_prompt(test_case, response, custom_criteria))
            .temperature(JUDGE_TEMPERATURE)
            .max_tokens(JUDGE_MAX_TOKENS)
            .json_mode(true);

        let reply = match self.client.complete(&request).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(error = %err, "judge call failed");
                return ModelGrade::technical_error("Grading service temporarily unavailable", CONNECTION_ISSUE);
            }
        };

        // adapters that still encode failures in-band
        if is_error_response(&reply) {
            warn!(reply = %reply, "judge call failed");
            return ModelGrade::technical_error("Grading service temporarily unavailable", CONNECTION_ISSUE);
        }

        match parse_grade(&reply) {
            Ok(grade) => grade,
            Err(GradeParseError::NotJson) => {
                warn!("judge reply was not JSON");
                ModelGrade::technical_error("Unable to parse grading response", FORMAT_ISSUE)
            }
            Err(err) => {
                warn!(error = %err, "judge reply could not be normalized");
                let reason: String = err.to_string().chars().take(50).collect();
                ModelGrade::technical_error(format!("Grading unavailable: {reason}"), CONNECTION_ISSUE)
            }
        }
    }

    /// Grade already-collected results in order, replacing any existing model grade.
    pub async fn batch_grade(&self, results: &[EvaluationResult], custom_criteria: &str) -> Vec<EvaluationResult> {
        let mut graded = Vec::with_capacity(results.len());
        for result in results {
            let grade = self.grade_response(&result.test_case, &result.response, custom_criteria).await;
            let mut result = result.clone();
            result.model_grade = Some(grade);
            graded.push(result);
        }
        graded
    }
}

/// Why a judge reply could not become a grade.
///
/// Only `NotJson` is a format issue; a reply that parses but cannot be normalized
/// is reported as a connection issue.
#[derive(Debug, Error, PartialEq)]
pub enum GradeParseError {
    #[error("reply is not valid JSON")]
    NotJson,
    #[error("reply is not a JSON object")]
    NotObject,
    #[error("score is not a number: {0}")]
    InvalidScore(String),
}

/// Normalize a judge reply: score defaults to 5 and is clamped to 1..=10,
/// missing text fields get placeholders.
pub fn parse_grade(reply: &str) -> Result<ModelGrade, GradeParseError> {
    let value: Value = serde_json::from_str(reply.trim()).map_err(|_| GradeParseError::NotJson)?;
    let obj = value.as_object().ok_or(GradeParseError::NotObject)?;

    let score = match obj.get("score") {
        None | Some(Value::Null) => DEFAULT_SCORE,
        Some(v) => numeric_score(v).ok_or_else(|| GradeParseError::InvalidScore(v.to_string()))?,
    };

    Ok(ModelGrade {
        score: score.clamp(1, 10) as u32,
        reason: obj
            .get("reason")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| "No specific reason provided".to_string()),
        strengths: string_list(obj, "strengths"),
        weaknesses: string_list(obj, "weaknesses"),
        is_technical_error: false,
    })
}

// fractional scores truncate toward zero
fn numeric_score(value: &Value) -> Option<i64> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    raw.is_finite().then(|| raw.trunc() as i64)
}

fn string_list(obj: &Map<String, Value>, key: &str) -> Vec<String> {
    match obj.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn grading_prompt(test_case: &TestCase, response: &str, custom_criteria: &str) -> String {
    let input = if test_case.input.is_empty() { "N/A" } else { test_case.input.as_str() };
    let criteria = if test_case.expected_criteria.is_empty() {
        "General quality"
    } else {
        test_case.expected_criteria.as_str()
    };
    let additional = if custom_criteria.is_empty() {
        String::new()
    } else {
        format!("ADDITIONAL CRITERIA: {}", custom_criteria)
    };

    format!(
        r#"Score this LLM response on a scale of 1-10.

INPUT: {input}

EXPECTED CRITERIA: {criteria}

{additional}

RESPONSE TO GRADE:
{response}

Evaluate based on:
1. Accuracy - Does it address the input correctly?
2. Completeness - Does it meet the expected criteria?
3. Format compliance - Is it properly formatted?
4. Clarity - Is it clear and coherent?

Return ONLY a JSON object with this exact structure:
{{
  "score": <number 1-10>,
  "reason": "<brief explanation of the score>",
  "strengths": ["strength 1", "strength 2"],
  "weaknesses": ["weakness 1", "weakness 2"]
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::CompletionError;
    use crate::testing::ScriptedClient;
    use chrono::Utc;

    fn case() -> TestCase {
        TestCase::new("Where is my refund?", "Should apologize and give a timeline")
    }

    #[tokio::test]
    async fn error_response_short_circuits_without_calling_judge() {
        let client = Arc::new(ScriptedClient::new(vec![]));
        let grader = ModelGrader::new(client.clone());

        let grade = grader.grade_response(&case(), "Error: rate limit", "").await;
        assert!(grade.is_technical_error);
        assert_eq!(grade.score, 0);
        assert_eq!(grade.weaknesses, vec![CONNECTION_ISSUE]);
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn judge_failure_is_a_connection_issue() {
        let client = Arc::new(ScriptedClient::new(vec![Err(CompletionError::Transport("reset".into()))]));
        let grade = ModelGrader::new(client).grade_response(&case(), "We are sorry...", "").await;
        assert!(grade.is_technical_error);
        assert_eq!(grade.score, 0);
        assert_eq!(grade.weaknesses, vec![CONNECTION_ISSUE]);
    }

    #[tokio::test]
    async fn malformed_reply_is_a_format_issue() {
        let client = Arc::new(ScriptedClient::new(vec![Ok("I'd give it an 8".to_string())]));
        let grade = ModelGrader::new(client).grade_response(&case(), "We are sorry...", "").await;
        assert!(grade.is_technical_error);
        assert_eq!(grade.weaknesses, vec![FORMAT_ISSUE]);
        assert_eq!(grade.reason, "Unable to parse grading response");
    }

    #[tokio::test]
    async fn non_numeric_score_is_a_connection_issue() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(r#"{"score": "great", "reason": "nice"}"#.to_string())]));
        let grade = ModelGrader::new(client).grade_response(&case(), "We are sorry...", "").await;
        assert!(grade.is_technical_error);
        assert_eq!(grade.score, 0);
        assert_eq!(grade.weaknesses, vec![CONNECTION_ISSUE]);
        assert!(grade.reason.starts_with("Grading unavailable: score is not a number"));
    }

    #[tokio::test]
    async fn judge_request_is_low_temperature_json() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(
            r#"{"score": 8, "reason": "good", "strengths": ["polite"], "weaknesses": ["no timeline"]}"#.to_string(),
        )]));
        let grade = ModelGrader::new(client.clone())
            .grade_response(&case(), "We are sorry, it is on its way.", "Must mention order id")
            .await;
        assert_eq!(grade.score, 8);
        assert!(!grade.is_technical_error);
        assert_eq!(grade.strengths, vec!["polite"]);

        let req = &client.requests()[0];
        assert!(req.json_mode);
        assert_eq!(req.temperature, JUDGE_TEMPERATURE);
        assert_eq!(req.max_tokens, JUDGE_MAX_TOKENS);
        assert!(req.prompt.contains("ADDITIONAL CRITERIA: Must mention order id"));
        assert!(req.prompt.contains("EXPECTED CRITERIA: Should apologize"));
    }

    #[test]
    fn normalizes_partial_replies() {
        let grade = parse_grade("{}").unwrap();
        assert_eq!(grade.score, 5);
        assert_eq!(grade.reason, "No specific reason provided");
        assert!(grade.strengths.is_empty() && grade.weaknesses.is_empty());

        assert_eq!(parse_grade(r#"{"score": 14}"#).unwrap().score, 10);
        assert_eq!(parse_grade(r#"{"score": -3}"#).unwrap().score, 1);
        assert_eq!(parse_grade(r#"{"score": 7.9}"#).unwrap().score, 7);
        assert_eq!(parse_grade(r#"{"score": "6"}"#).unwrap().score, 6);
        assert_eq!(
            parse_grade(r#"{"score": "great"}"#),
            Err(GradeParseError::InvalidScore(r#""great""#.to_string()))
        );
        assert_eq!(parse_grade("[1, 2]"), Err(GradeParseError::NotObject));
        assert_eq!(parse_grade("eight"), Err(GradeParseError::NotJson));
    }

    #[tokio::test]
    async fn batch_grade_keeps_order() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok(r#"{"score": 3}"#.to_string()),
            Ok(r#"{"score": 9}"#.to_string()),
        ]));
        let results: Vec<EvaluationResult> = ["first", "second"]
            .iter()
            .map(|r| EvaluationResult {
                test_case: case(),
                response: r.to_string(),
                timestamp: Utc::now(),
                code_grades: None,
                model_grade: None,
            })
            .collect();
        let graded = ModelGrader::new(client).batch_grade(&results, "").await;
        let scores: Vec<u32> = graded.iter().map(|r| r.model_grade.as_ref().unwrap().score).collect();
        assert_eq!(scores, vec![3, 9]);
    }
}
