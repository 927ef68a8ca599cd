use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tabled::Tabled;

/// Minimum model score that counts as a pass.
pub const PASS_THRESHOLD: f64 = 7.0;

/// Message carried by `Stats::error` when no case produced a usable model grade.
pub const ALL_FAILED_MESSAGE: &str = "All evaluations failed. Please check your API key.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
	Easy,
	#[default]
	Medium,
	Hard,
}

impl fmt::Display for Difficulty {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Easy => write!(f, "easy"),
			Self::Medium => write!(f, "medium"),
			Self::Hard => write!(f, "hard"),
		}
	}
}

impl FromStr for Difficulty {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_lowercase().as_str() {
			"easy" => Ok(Self::Easy),
			"medium" => Ok(Self::Medium),
			"hard" => Ok(Self::Hard),
			other => Err(format!("unknown difficulty: {other}")),
		}
	}
}

/// A generated input/criteria pair used to exercise a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
	pub input: String,
	pub expected_criteria: String,
	#[serde(default)]
	pub difficulty: Difficulty,
	#[serde(default = "default_category")]
	pub category: String,
}

fn default_category() -> String {
	"general".to_string()
}

impl TestCase {
	pub fn new(input: impl Into<String>, expected_criteria: impl Into<String>) -> Self {
		Self {
			input: input.into(),
			expected_criteria: expected_criteria.into(),
			difficulty: Difficulty::default(),
			category: default_category(),
		}
	}

	pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
		self.difficulty = difficulty;
		self
	}

	pub fn with_category(mut self, category: impl Into<String>) -> Self {
		self.category = category.into();
		self
	}
}

/// Outcome of a single code grader applied to one response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeResult {
	pub score: u32,
	pub reason: String,
	pub passed: bool,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub details: Option<Value>,
}

impl GradeResult {
	pub fn new(score: u32, passed: bool, reason: impl Into<String>) -> Self {
		Self { score, reason: reason.into(), passed, details: None }
	}

	pub fn with_details(mut self, details: Value) -> Self {
		self.details = Some(details);
		self
	}
}

/// Verdict of the LLM judge.
///
/// A grade with `is_technical_error` set describes an infrastructure failure,
/// carries a score of 0 and never participates in quality statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelGrade {
	pub score: u32,
	pub reason: String,
	#[serde(default)]
	pub strengths: Vec<String>,
	#[serde(default)]
	pub weaknesses: Vec<String>,
	#[serde(default)]
	pub is_technical_error: bool,
}

impl ModelGrade {
	pub fn technical_error(reason: impl Into<String>, weakness: impl Into<String>) -> Self {
		Self {
			score: 0,
			reason: reason.into(),
			strengths: Vec::new(),
			weaknesses: vec![weakness.into()],
			is_technical_error: true,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
	pub test_case: TestCase,
	pub response: String,
	pub timestamp: DateTime<Utc>,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub code_grades: Option<BTreeMap<String, GradeResult>>,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub model_grade: Option<ModelGrade>,
}

impl EvaluationResult {
	/// Model score if the case was graded and the grade is not a technical error.
	pub fn quality_score(&self) -> Option<u32> {
		self.model_grade
			.as_ref()
			.filter(|g| !g.is_technical_error)
			.map(|g| g.score)
	}

	pub fn is_technical_error(&self) -> bool {
		self.model_grade.as_ref().is_some_and(|g| g.is_technical_error)
	}
}

/// Aggregate statistics over model scores.
///
/// When `error` is set the numeric fields are zero placeholders, not measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
	pub average: f64,
	pub min: f64,
	pub max: f64,
	pub count: usize,
	pub pass_rate: f64,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub failed_evaluations: Option<usize>,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub error: Option<String>,
}

impl Stats {
	pub fn empty() -> Self {
		Self {
			average: 0.0,
			min: 0.0,
			max: 0.0,
			count: 0,
			pass_rate: 0.0,
			failed_evaluations: None,
			error: None,
		}
	}

	pub fn all_failed() -> Self {
		Self { error: Some(ALL_FAILED_MESSAGE.to_string()), ..Self::empty() }
	}

	pub fn is_error(&self) -> bool {
		self.error.is_some()
	}
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
	let factor = 10f64.powi(decimals);
	(value * factor).round() / factor
}

/// Average (2 decimals), min, max, count and pass rate (percentage of scores >= 7, 1 decimal).
///
/// An empty slice yields all-zero stats with `pass_rate` present at 0.
pub fn calculate_stats(scores: &[f64]) -> Stats {
	if scores.is_empty() {
		return Stats::empty();
	}
	let count = scores.len();
	let sum: f64 = scores.iter().sum();
	let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
	let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
	let passing = scores.iter().filter(|s| **s >= PASS_THRESHOLD).count();

	Stats {
		// rounding can push the mean a hair outside the observed range
		average: round_to(sum / count as f64, 2).clamp(min, max),
		min,
		max,
		count,
		pass_rate: round_to(passing as f64 / count as f64 * 100.0, 1),
		failed_evaluations: None,
		error: None,
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
	pub total_cases: usize,
	pub timestamp: DateTime<Utc>,
	pub duration_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRun {
	pub prompt: String,
	pub results: Vec<EvaluationResult>,
	pub stats: Stats,
	pub metadata: RunMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tabled)]
struct ResultRow {
	#[tabled(rename = "#")]
	index: usize,
	difficulty: String,
	score: String,
	input: String,
	response: String,
	code_grades: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tabled)]
struct VariantRow {
	variant: String,
	average: String,
	min: String,
	max: String,
	pass_rate: String,
	failed: usize,
}

impl EvaluationRun {
	/// Aggregate model scores, leaving technical errors out of the numbers and
	/// counting them under `failed_evaluations`.
	pub fn summarize(results: &[EvaluationResult]) -> Stats {
		let scores: Vec<f64> = results
			.iter()
			.filter_map(|r| r.quality_score())
			.map(f64::from)
			.collect();

		if scores.is_empty() {
			return Stats::all_failed();
		}

		let mut stats = calculate_stats(&scores);
		let failed = results.iter().filter(|r| r.is_technical_error()).count();
		if failed > 0 {
			stats.failed_evaluations = Some(failed);
		}
		stats
	}

	pub fn technical_error_count(&self) -> usize {
		self.results.iter().filter(|r| r.is_technical_error()).count()
	}

	pub fn summary_table(&self) -> String {
		use tabled::Table;
		let rows: Vec<ResultRow> = self.results.iter().enumerate().map(|(i, r)| {
			let score = match &r.model_grade {
				Some(g) if g.is_technical_error => "error".to_string(),
				Some(g) => format!("{}/10", g.score),
				None => "-".to_string(),
			};
			let code_grades = r.code_grades.as_ref().map(|grades| {
				grades
					.iter()
					.map(|(name, g)| format!("{}:{}{}", name, g.score, if g.passed { "✓" } else { "✗" }))
					.collect::<Vec<_>>()
					.join(" ")
			}).unwrap_or_default();

			ResultRow {
				index: i + 1,
				difficulty: r.test_case.difficulty.to_string(),
				score,
				input: truncate(&r.test_case.input, 48),
				response: truncate(&r.response, 64),
				code_grades,
			}
		}).collect();

		let table = Table::new(rows);
		format!("{}\n\n{}\n", table, stats_line(&self.stats))
	}
}

fn stats_line(stats: &Stats) -> String {
	if let Some(err) = &stats.error {
		return format!("Evaluation failed: {}", err);
	}
	let mut line = format!(
		"Scored: {}  Avg: {:.2}  Min: {}  Max: {}  Pass rate: {:.1}%",
		stats.count, stats.average, stats.min, stats.max, stats.pass_rate
	);
	if let Some(failed) = stats.failed_evaluations {
		line.push_str(&format!("  Technical errors: {}", failed));
	}
	line
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptVariant {
	pub name: String,
	pub prompt: String,
}

impl PromptVariant {
	pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
		Self { name: name.into(), prompt: prompt.into() }
	}
}

/// Score movement for one test case between two runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreDelta {
	pub test_case_index: usize,
	pub input: String,
	pub magnitude: u32,
	/// Signed difference, second run minus first.
	pub score_change: i64,
	pub previous_score: u32,
	pub new_score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementAnalysis {
	pub improvements: Vec<ScoreDelta>,
	pub regressions: Vec<ScoreDelta>,
	pub net_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
	pub winner: Option<String>,
	pub summary: BTreeMap<String, Stats>,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub improvements: Option<ImprovementAnalysis>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRun {
	pub prompts: Vec<PromptVariant>,
	pub test_cases: Vec<TestCase>,
	pub evaluations: BTreeMap<String, EvaluationRun>,
	pub comparison: Comparison,
}

impl ComparisonRun {
	pub fn summary_table(&self) -> String {
		use tabled::Table;
		let rows: Vec<VariantRow> = self.prompts.iter().filter_map(|p| {
			let stats = self.comparison.summary.get(&p.name)?;
			let (average, min, max, pass_rate) = if stats.is_error() {
				("n/a".to_string(), "n/a".to_string(), "n/a".to_string(), "n/a".to_string())
			} else {
				(
					format!("{:.2}", stats.average),
					stats.min.to_string(),
					stats.max.to_string(),
					format!("{:.1}%", stats.pass_rate),
				)
			};
			Some(VariantRow {
				variant: p.name.clone(),
				average,
				min,
				max,
				pass_rate,
				failed: stats.failed_evaluations.unwrap_or(0),
			})
		}).collect();

		let mut out = Table::new(rows).to_string();
		out.push_str("\n\n");
		match &self.comparison.winner {
			Some(w) => out.push_str(&format!("Winner: {}\n", w)),
			None => out.push_str("Winner: none\n"),
		}
		if let Some(analysis) = &self.comparison.improvements {
			out.push_str(&format!(
				"Net change: {:+.2}  Improved cases: {}  Regressed cases: {}\n",
				analysis.net_change,
				analysis.improvements.len(),
				analysis.regressions.len()
			));
		}
		out
	}
}

fn truncate(s: &str, max_len: usize) -> String {
	let flat = s.replace('\n', " ");
	if flat.chars().count() <= max_len {
		return flat;
	}
	let mut truncated = flat.chars().take(max_len.saturating_sub(1)).collect::<String>();
	truncated.push('…');
	truncated
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn graded(score: u32) -> EvaluationResult {
		EvaluationResult {
			test_case: TestCase::new("in", "criteria"),
			response: "out".to_string(),
			timestamp: Utc::now(),
			code_grades: None,
			model_grade: Some(ModelGrade {
				score,
				reason: "ok".to_string(),
				strengths: vec![],
				weaknesses: vec![],
				is_technical_error: false,
			}),
		}
	}

	fn technical() -> EvaluationResult {
		EvaluationResult {
			model_grade: Some(ModelGrade::technical_error("down", "API connection issue")),
			..graded(0)
		}
	}

	#[test]
	fn stats_average_within_range_and_pass_rate() {
		let stats = calculate_stats(&[3.0, 7.0, 8.0, 10.0]);
		assert_eq!(stats.average, 7.0);
		assert_eq!(stats.min, 3.0);
		assert_eq!(stats.max, 10.0);
		assert_eq!(stats.count, 4);
		assert_eq!(stats.pass_rate, 75.0);
		assert!(stats.average >= stats.min && stats.average <= stats.max);
	}

	#[test]
	fn stats_round_average_and_pass_rate() {
		let stats = calculate_stats(&[7.0, 8.0, 4.0]);
		assert_eq!(stats.average, 6.33);
		assert_eq!(stats.pass_rate, 66.7);
	}

	#[test]
	fn empty_stats_keep_pass_rate_at_zero() {
		let stats = calculate_stats(&[]);
		assert_eq!(stats.count, 0);
		assert_eq!(stats.pass_rate, 0.0);
		let v = serde_json::to_value(&stats).unwrap();
		assert_eq!(v["pass_rate"], json!(0.0));
		assert!(v.get("error").is_none());
	}

	#[test]
	fn summarize_excludes_technical_errors() {
		let results = vec![graded(8), technical(), graded(6), technical()];
		let stats = EvaluationRun::summarize(&results);
		assert_eq!(stats.count, 2);
		assert_eq!(stats.failed_evaluations, Some(2));
		assert_eq!(stats.average, 7.0);
		assert_eq!(stats.min, 6.0);
		assert_eq!(stats.pass_rate, 50.0);
	}

	#[test]
	fn summarize_without_failures_omits_failed_count() {
		let stats = EvaluationRun::summarize(&[graded(9)]);
		assert_eq!(stats.failed_evaluations, None);
		let v = serde_json::to_value(&stats).unwrap();
		assert!(v.get("failed_evaluations").is_none());
	}

	#[test]
	fn summarize_all_failed_sets_error() {
		let stats = EvaluationRun::summarize(&[technical(), technical()]);
		assert!(stats.is_error());
		assert_eq!(stats.error.as_deref(), Some(ALL_FAILED_MESSAGE));
		assert_eq!(stats.average, 0.0);
		assert_eq!(stats.count, 0);
	}

	#[test]
	fn summarize_ungraded_results_reports_failure() {
		let mut r = graded(5);
		r.model_grade = None;
		assert!(EvaluationRun::summarize(&[r]).is_error());
	}

	#[test]
	fn difficulty_parses_leniently() {
		assert_eq!(" Hard ".parse::<Difficulty>().unwrap(), Difficulty::Hard);
		assert!("extreme".parse::<Difficulty>().is_err());
		let case: TestCase = serde_json::from_value(json!({
			"input": "x",
			"expected_criteria": "y"
		}))
		.unwrap();
		assert_eq!(case.difficulty, Difficulty::Medium);
		assert_eq!(case.category, "general");
	}

	#[test]
	fn truncate_respects_char_boundaries() {
		let s = "ééééé";
		assert_eq!(truncate(s, 3), "éé…");
		assert_eq!(truncate("a\nb", 10), "a b");
	}
}
