use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use promptcraft_types::{
	round_to, Comparison, ComparisonRun, EvaluationResult, EvaluationRun, GradeResult, PromptVariant,
	RunMetadata, TestCase,
};
use tracing::{debug, info, warn};

use crate::client::{completion_text, CompletionClient, CompletionRequest};
use crate::compare::{analyze_improvements, select_winner};
use crate::config::{EvaluationConfig, GraderConfig};
use crate::generator::TestCaseGenerator;
use crate::grader::Grader;
use crate::judge::ModelGrader;

const DEFAULT_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationOptions {
	pub use_model_grading: bool,
	pub graders: Vec<GraderConfig>,
	pub temperature: f32,
	pub custom_criteria: String,
}

impl Default for EvaluationOptions {
	fn default() -> Self {
		Self {
			use_model_grading: true,
			graders: Vec::new(),
			temperature: 0.7,
			custom_criteria: String::new(),
		}
	}
}

impl EvaluationOptions {
	pub fn from_config(config: &EvaluationConfig) -> Self {
		Self {
			use_model_grading: config.use_model_grading,
			graders: config.graders.clone(),
			temperature: config.temperature,
			custom_criteria: config.custom_criteria.clone(),
		}
	}

	pub fn use_model_grading(mut self, enabled: bool) -> Self {
		self.use_model_grading = enabled;
		self
	}

	pub fn graders<I>(mut self, graders: I) -> Self
	where
		I: IntoIterator<Item = GraderConfig>,
	{
		self.graders = graders.into_iter().collect();
		self
	}

	pub fn temperature(mut self, temperature: f32) -> Self {
		self.temperature = temperature;
		self
	}

	pub fn custom_criteria(mut self, criteria: impl Into<String>) -> Self {
		self.custom_criteria = criteria.into();
		self
	}
}

pub struct EvaluationEngineBuilder {
	client: Option<Arc<dyn CompletionClient>>,
	concurrency: usize,
	max_tokens: u32,
}

impl EvaluationEngineBuilder {
	pub fn new() -> Self {
		Self {
			client: None,
			concurrency: 1,
			max_tokens: DEFAULT_MAX_TOKENS,
		}
	}

	pub fn client(mut self, client: Arc<dyn CompletionClient>) -> Self {
		self.client = Some(client);
		self
	}

	/// Cases in flight at once. Results keep input order regardless.
	pub fn concurrency(mut self, n: usize) -> Self {
		self.concurrency = n.max(1);
		self
	}

	pub fn max_tokens(mut self, max_tokens: u32) -> Self {
		self.max_tokens = max_tokens;
		self
	}

	pub fn build(self) -> Result<EvaluationEngine> {
		let client = self.client.ok_or_else(|| anyhow::anyhow!("client must be set"))?;
		Ok(EvaluationEngine {
			generator: TestCaseGenerator::new(client.clone()),
			judge: ModelGrader::new(client.clone()),
			client,
			concurrency: self.concurrency,
			max_tokens: self.max_tokens,
		})
	}
}

impl Default for EvaluationEngineBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Runs prompts over test cases, grades the responses and compares variants.
///
/// The engine holds no state between calls; every run depends only on its
/// arguments and the completion client.
pub struct EvaluationEngine {
	client: Arc<dyn CompletionClient>,
	generator: TestCaseGenerator,
	judge: ModelGrader,
	concurrency: usize,
	max_tokens: u32,
}

impl EvaluationEngine {
	pub fn builder() -> EvaluationEngineBuilder {
		EvaluationEngineBuilder::new()
	}

	pub fn generator(&self) -> &TestCaseGenerator {
		&self.generator
	}

	pub fn judge(&self) -> &ModelGrader {
		&self.judge
	}

	pub async fn run_evaluation(
		&self,
		prompt: &str,
		test_cases: &[TestCase],
		options: &EvaluationOptions,
	) -> EvaluationRun {
		let started = Instant::now();
		let graders = build_graders(&options.graders);
		let total = test_cases.len();
		info!(cases = total, graders = graders.len(), model_grading = options.use_model_grading, "running evaluation");

		let graders = &graders;
		let results: Vec<EvaluationResult> = stream::iter(test_cases.iter().enumerate())
			.map(|(idx, case)| async move {
				debug!(case = idx + 1, total, "processing test case");
				self.run_case(prompt, case, graders, options).await
			})
			.buffered(self.concurrency)
			.collect()
			.await;

		let stats = EvaluationRun::summarize(&results);
		let duration_seconds = round_to(started.elapsed().as_secs_f64(), 2);
		match &stats.error {
			Some(err) => warn!(cases = total, duration_seconds, error = %err, "evaluation produced no scores"),
			None => info!(
				cases = total,
				duration_seconds,
				average = stats.average,
				pass_rate = stats.pass_rate,
				"evaluation complete"
			),
		}

		EvaluationRun {
			prompt: prompt.to_string(),
			results,
			stats,
			metadata: RunMetadata {
				total_cases: total,
				timestamp: Utc::now(),
				duration_seconds,
			},
		}
	}

	async fn run_case(
		&self,
		prompt: &str,
		case: &TestCase,
		graders: &[Box<dyn Grader>],
		options: &EvaluationOptions,
	) -> EvaluationResult {
		let request = CompletionRequest::new(format!("{}\n\n{}", prompt, case.input))
			.temperature(options.temperature)
			.max_tokens(self.max_tokens);
		let response = completion_text(self.client.complete(&request).await);

		let code_grades = (!graders.is_empty()).then(|| {
			graders
				.iter()
				.map(|g| (g.name().to_string(), g.grade(&response)))
				.collect::<BTreeMap<String, GradeResult>>()
		});

		let model_grade = if options.use_model_grading {
			Some(self.judge.grade_response(case, &response, &options.custom_criteria).await)
		} else {
			None
		};

		EvaluationResult {
			test_case: case.clone(),
			response,
			timestamp: Utc::now(),
			code_grades,
			model_grade,
		}
	}

	/// Evaluate each variant against the same cases, pick a winner, and diff the
	/// two runs when exactly two distinctly named variants are given.
	pub async fn compare_prompts(
		&self,
		prompts: &[PromptVariant],
		test_cases: &[TestCase],
		use_model_grading: bool,
	) -> ComparisonRun {
		info!(variants = prompts.len(), cases = test_cases.len(), "comparing prompt variants");
		let options = EvaluationOptions::default().use_model_grading(use_model_grading);

		let mut evaluations = BTreeMap::new();
		let mut order: Vec<&str> = Vec::with_capacity(prompts.len());
		for variant in prompts {
			info!(variant = %variant.name, "evaluating variant");
			let run = self.run_evaluation(&variant.prompt, test_cases, &options).await;
			if evaluations.insert(variant.name.clone(), run).is_some() {
				warn!(variant = %variant.name, "duplicate variant name, keeping the later run");
			} else {
				order.push(&variant.name);
			}
		}

		let summary: BTreeMap<_, _> = evaluations
			.iter()
			.map(|(name, run)| (name.clone(), run.stats.clone()))
			.collect();
		let winner = select_winner(order.iter().filter_map(|name| summary.get(*name).map(|s| (*name, s))));

		let improvements = match prompts {
			[first, second] if first.name != second.name => {
				match (evaluations.get(&first.name), evaluations.get(&second.name)) {
					(Some(a), Some(b)) => Some(analyze_improvements(a, b)),
					_ => None,
				}
			}
			_ => None,
		};

		if let Some(w) = &winner {
			info!(winner = %w, "comparison complete");
		}

		ComparisonRun {
			prompts: prompts.to_vec(),
			test_cases: test_cases.to_vec(),
			evaluations,
			comparison: Comparison { winner, summary, improvements },
		}
	}

	pub fn suggest_improvements(&self, run: &EvaluationRun) -> Vec<String> {
		crate::suggest::suggest_improvements(run)
	}

	/// Write a run or comparison under the store's results directory.
	#[cfg(feature = "persistence")]
	pub fn generate_report<T: serde::Serialize>(
		&self,
		report: &T,
		store: &promptcraft_store::ReportStore,
		filename: Option<&str>,
	) -> Result<std::path::PathBuf> {
		crate::report::generate_report(report, store, filename)
	}
}

// a grader that cannot be built is dropped with a warning, like an unknown name
fn build_graders(configs: &[GraderConfig]) -> Vec<Box<dyn Grader>> {
	configs
		.iter()
		.filter_map(|cfg| match cfg.build() {
			Ok(g) => Some(g),
			Err(err) => {
				warn!(grader = cfg.name(), error = %err, "skipping grader");
				None
			}
		})
		.collect()
}
