use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use promptcraft_types::EvaluationRun;

use crate::client::{CompletionClient, CompletionError, CompletionRequest};

/// Assert that an evaluation's pass rate (percent, 0-100) meets a threshold.
///
/// Use this in your `#[tokio::test]` functions.
///
/// # Example
/// ```ignore
/// #[tokio::test]
/// async fn test_triage_prompt() -> Result<()> {
///     let engine = EvaluationEngine::builder().client(client).build()?;
///     let run = engine
///         .run_evaluation(PROMPT, &cases, &EvaluationOptions::default())
///         .await;
///
///     // Assert 80% of cases score 7 or better
///     assert_pass_rate(&run, 80.0)?;
///
///     Ok(())
/// }
/// ```
pub fn assert_pass_rate(run: &EvaluationRun, min_pass_rate: f64) -> Result<()> {
    ensure_measured(run)?;
    if run.stats.pass_rate < min_pass_rate {
        anyhow::bail!(
            "Evaluation failed: pass rate {:.1}% is below threshold {:.1}%\n{}",
            run.stats.pass_rate,
            min_pass_rate,
            run.summary_table()
        );
    }
    Ok(())
}

/// Assert that the average model score meets a threshold.
pub fn assert_average(run: &EvaluationRun, min_average: f64) -> Result<()> {
    ensure_measured(run)?;
    if run.stats.average < min_average {
        anyhow::bail!(
            "Evaluation failed: average score {:.2} is below threshold {:.2}\n{}",
            run.stats.average,
            min_average,
            run.summary_table()
        );
    }
    Ok(())
}

/// Assert that no case ended in a technical error.
pub fn assert_no_technical_errors(run: &EvaluationRun) -> Result<()> {
    let failed = run.technical_error_count();
    if failed > 0 {
        anyhow::bail!(
            "Evaluation had {}/{} technical errors\n{}",
            failed,
            run.results.len(),
            run.summary_table()
        );
    }
    Ok(())
}

fn ensure_measured(run: &EvaluationRun) -> Result<()> {
    if let Some(err) = &run.stats.error {
        anyhow::bail!("Evaluation produced no scores: {}", err);
    }
    Ok(())
}

/// A `CompletionClient` that replays canned replies in order and records every request.
///
/// Once the script runs out every call fails with a transport error.
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, CompletionError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<Result<String, CompletionError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front())
            .unwrap_or_else(|| Err(CompletionError::Transport("script exhausted".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use promptcraft_types::{EvaluationResult, ModelGrade, RunMetadata, Stats, TestCase};

    fn run_with(scores: &[u32], technical: usize) -> EvaluationRun {
        let mut results: Vec<EvaluationResult> = scores
            .iter()
            .map(|s| EvaluationResult {
                test_case: TestCase::new("in", "crit"),
                response: "resp".into(),
                timestamp: Utc::now(),
                code_grades: None,
                model_grade: Some(ModelGrade {
                    score: *s,
                    reason: String::new(),
                    strengths: vec![],
                    weaknesses: vec![],
                    is_technical_error: false,
                }),
            })
            .collect();
        for _ in 0..technical {
            results.push(EvaluationResult {
                test_case: TestCase::new("in", "crit"),
                response: "Error: down".into(),
                timestamp: Utc::now(),
                code_grades: None,
                model_grade: Some(ModelGrade::technical_error("down", "API connection issue")),
            });
        }
        let stats = EvaluationRun::summarize(&results);
        EvaluationRun {
            prompt: "p".into(),
            metadata: RunMetadata { total_cases: results.len(), timestamp: Utc::now(), duration_seconds: 0.0 },
            results,
            stats,
        }
    }

    #[test]
    fn pass_rate_threshold() {
        let run = run_with(&[9, 8, 3, 7], 0);
        assert!(assert_pass_rate(&run, 75.0).is_ok());
        assert!(assert_pass_rate(&run, 80.0).is_err());
    }

    #[test]
    fn average_threshold() {
        let run = run_with(&[6, 8], 0);
        assert!(assert_average(&run, 7.0).is_ok());
        assert!(assert_average(&run, 7.5).is_err());
    }

    #[test]
    fn failed_runs_never_satisfy_thresholds() {
        let run = run_with(&[], 2);
        assert_eq!(run.stats, Stats::all_failed());
        assert!(assert_average(&run, 0.0).is_err());
        assert!(assert_no_technical_errors(&run).is_err());
    }

    #[tokio::test]
    async fn scripted_client_replays_then_fails() {
        let client = ScriptedClient::new(vec![Ok("one".into())]);
        let req = CompletionRequest::new("q");
        assert_eq!(client.complete(&req).await.unwrap(), "one");
        assert!(client.complete(&req).await.is_err());
        assert_eq!(client.requests().len(), 2);
    }
}
