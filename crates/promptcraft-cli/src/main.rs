use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use promptcraft_core::{
	select_graders, CompletionClient, DataSource, EvaluationEngine, EvaluationOptions, EvaluationRun,
	GeneratedDataSource, GraderConfig, JsonlDataSource, OpenAiCompatClient, PromptVariant, PromptcraftConfig,
	Sentiment, TestCase,
};
use promptcraft_store::ReportStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "promptcraft", about = "Generate test cases, evaluate and compare LLM prompts")]
struct Cli {
	/// YAML config file (provider, evaluation and generation settings)
	#[arg(long, global = true, env = "PROMPTCRAFT_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
	/// Generate test cases and write them as JSONL
	Generate(GenerateArgs),
	/// Evaluate one prompt
	Eval(EvalArgs),
	/// Compare two or more prompt variants on the same cases
	Compare(CompareArgs),
	/// Run code graders on a single response, no model calls
	Grade(GradeArgs),
	/// Print a saved report, or list reports when no file is given
	Show(ShowArgs),
}

#[derive(Debug, Clone, Args)]
struct CaseArgs {
	/// JSONL file with lines like { "input": string, "expected_criteria"?: string }
	#[arg(long)]
	cases: Option<PathBuf>,

	/// Describe the use case so cases can be generated when --cases is absent
	#[arg(long)]
	use_case: Option<String>,

	/// Number of cases to generate (defaults to the config value)
	#[arg(long)]
	num_cases: Option<usize>,
}

#[derive(Debug, Clone, Args)]
struct GenerateArgs {
	#[arg(long)]
	use_case: String,

	/// Tailor cases to this prompt; without it, comparison cases are generated
	#[arg(long)]
	prompt: Option<String>,

	#[arg(long)]
	num_cases: Option<usize>,

	/// Output JSONL path (stdout when absent)
	#[arg(long)]
	out: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct EvalArgs {
	/// Prompt text
	#[arg(long, conflicts_with = "prompt_file")]
	prompt: Option<String>,

	/// Read the prompt from a file
	#[arg(long)]
	prompt_file: Option<PathBuf>,

	#[command(flatten)]
	cases: CaseArgs,

	/// Code grader by name (length_validator, json_validator, sentiment_analyzer); repeatable
	#[arg(long = "grader")]
	graders: Vec<String>,

	/// Skip the LLM judge
	#[arg(long, action = ArgAction::SetTrue)]
	no_model_grading: bool,

	#[arg(long)]
	temperature: Option<f32>,

	/// Extra criteria handed to the judge
	#[arg(long)]
	criteria: Option<String>,

	/// Save the run as a JSON report (optional file name)
	#[arg(long, num_args = 0..=1, default_missing_value = "")]
	save: Option<String>,
}

#[derive(Debug, Clone, Args)]
struct CompareArgs {
	/// Variant as NAME=PROMPT; repeat for each variant
	#[arg(long = "variant", value_parser = parse_variant, required = true, num_args = 1)]
	variants: Vec<PromptVariant>,

	#[command(flatten)]
	cases: CaseArgs,

	#[arg(long, action = ArgAction::SetTrue)]
	no_model_grading: bool,

	#[arg(long, num_args = 0..=1, default_missing_value = "")]
	save: Option<String>,
}

#[derive(Debug, Clone, Args)]
struct GradeArgs {
	/// Response text to grade; `-` reads stdin
	response: String,

	/// Grader by name; repeatable
	#[arg(long = "grader")]
	graders: Vec<String>,

	/// Keyword that must appear; repeatable
	#[arg(long = "keyword")]
	keywords: Vec<String>,

	#[arg(long)]
	pattern: Option<String>,

	/// Expected format: email, url, phone, date, number
	#[arg(long)]
	format: Option<String>,

	/// Expected sentiment: positive, negative, neutral
	#[arg(long)]
	sentiment: Option<Sentiment>,

	/// Word range as MIN-MAX
	#[arg(long, value_parser = parse_range)]
	words: Option<(usize, usize)>,

	/// Section heading that must appear; repeatable
	#[arg(long = "section")]
	sections: Vec<String>,
}

#[derive(Debug, Clone, Args)]
struct ShowArgs {
	file: Option<String>,
}

fn parse_variant(s: &str) -> Result<PromptVariant, String> {
	match s.split_once('=') {
		Some((name, prompt)) if !name.trim().is_empty() && !prompt.trim().is_empty() => {
			Ok(PromptVariant::new(name.trim(), prompt))
		}
		_ => Err(format!("expected NAME=PROMPT, got '{s}'")),
	}
}

fn parse_range(s: &str) -> Result<(usize, usize), String> {
	let (min, max) = s.split_once('-').ok_or_else(|| format!("expected MIN-MAX, got '{s}'"))?;
	let min = min.trim().parse().map_err(|e| format!("bad minimum: {e}"))?;
	let max = max.trim().parse().map_err(|e| format!("bad maximum: {e}"))?;
	Ok((min, max))
}

#[tokio::main]
async fn main() -> Result<()> {
	dotenvy::dotenv().ok();
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with_writer(std::io::stderr)
		.init();

	let cli = Cli::parse();
	let config = match &cli.config {
		Some(path) => PromptcraftConfig::from_yaml_file(path)?,
		None => PromptcraftConfig::default(),
	};

	match cli.command {
		Commands::Generate(args) => generate(&config, args).await?,
		Commands::Eval(args) => eval(&config, args).await?,
		Commands::Compare(args) => compare(&config, args).await?,
		Commands::Grade(args) => grade(args)?,
		Commands::Show(args) => show(&config, args)?,
	}
	Ok(())
}

fn engine(config: &PromptcraftConfig) -> Result<EvaluationEngine> {
	let client = OpenAiCompatClient::from_config(&config.provider).context("Failed to set up the completion client")?;
	if !client.has_api_key() {
		warn!(env = %config.provider.api_key_env, "no API key configured; every model call will fail");
	}
	let client: Arc<dyn CompletionClient> = Arc::new(client);
	EvaluationEngine::builder()
		.client(client)
		.concurrency(config.evaluation.concurrency)
		.max_tokens(config.evaluation.max_tokens)
		.build()
}

async fn load_cases(
	engine: &EvaluationEngine,
	args: &CaseArgs,
	prompt: Option<&str>,
	default_count: usize,
) -> Result<Vec<TestCase>> {
	let source: Box<dyn DataSource> = match (&args.cases, &args.use_case) {
		(Some(path), _) => Box::new(JsonlDataSource::new(path)),
		(None, Some(use_case)) => {
			let n = args.num_cases.unwrap_or(default_count);
			let generator = engine.generator().clone();
			match prompt {
				Some(p) => Box::new(GeneratedDataSource::for_prompt(generator, p, use_case.as_str(), n)),
				None => Box::new(GeneratedDataSource::for_comparison(generator, use_case.as_str(), n)),
			}
		}
		(None, None) => bail!("pass --cases FILE or --use-case DESCRIPTION"),
	};
	let cases = source.load().await?;
	if cases.is_empty() {
		bail!("no test cases to run");
	}
	info!(count = cases.len(), "loaded test cases");
	Ok(cases)
}

async fn generate(config: &PromptcraftConfig, args: GenerateArgs) -> Result<()> {
	let engine = engine(config)?;
	let cases = match &args.prompt {
		Some(prompt) => {
			let n = args.num_cases.unwrap_or(config.generation.num_cases);
			engine.generator().generate_test_cases(prompt, &args.use_case, n).await
		}
		None => {
			let n = args.num_cases.unwrap_or(config.generation.comparison_cases);
			engine.generator().generate_comparison_cases(&args.use_case, n).await
		}
	};

	let mut lines = String::new();
	for case in &cases {
		lines.push_str(&serde_json::to_string(case)?);
		lines.push('\n');
	}
	match args.out {
		Some(path) => {
			tokio::fs::write(&path, lines)
				.await
				.with_context(|| format!("Failed to write {:?}", path))?;
			println!("Wrote {} test cases to {}", cases.len(), path.display());
		}
		None => std::io::stdout().write_all(lines.as_bytes())?,
	}
	Ok(())
}

async fn eval(config: &PromptcraftConfig, args: EvalArgs) -> Result<()> {
	let prompt = match (&args.prompt, &args.prompt_file) {
		(Some(p), _) => p.clone(),
		(None, Some(path)) => tokio::fs::read_to_string(path)
			.await
			.with_context(|| format!("Failed to read {:?}", path))?,
		(None, None) => bail!("pass --prompt or --prompt-file"),
	};

	let engine = engine(config)?;
	let cases = load_cases(&engine, &args.cases, Some(&prompt), config.generation.num_cases).await?;

	let mut options = EvaluationOptions::from_config(&config.evaluation);
	if !args.graders.is_empty() {
		let selection = select_graders(&args.graders);
		for name in &selection.skipped {
			warn!(grader = %name, "unknown grader, skipping");
			eprintln!("Skipping unknown grader '{name}'");
		}
		options.graders.extend(selection.graders);
	}
	if args.no_model_grading {
		options.use_model_grading = false;
	}
	if let Some(t) = args.temperature {
		options.temperature = t;
	}
	if let Some(criteria) = args.criteria {
		options.custom_criteria = criteria;
	}

	let run = engine.run_evaluation(&prompt, &cases, &options).await;
	print_run(&run);
	println!("\nSuggestions:");
	for suggestion in engine.suggest_improvements(&run) {
		println!("  - {suggestion}");
	}

	if let Some(name) = args.save {
		let store = ReportStore::new(&config.results_dir);
		let path = engine.generate_report(&run, &store, non_empty(&name))?;
		println!("\nReport saved to {}", path.display());
	}
	Ok(())
}

async fn compare(config: &PromptcraftConfig, args: CompareArgs) -> Result<()> {
	if args.variants.len() < 2 {
		bail!("compare needs at least two --variant NAME=PROMPT");
	}
	let engine = engine(config)?;
	let cases = load_cases(&engine, &args.cases, None, config.generation.comparison_cases).await?;

	let use_model_grading = config.evaluation.use_model_grading && !args.no_model_grading;
	let comparison = engine.compare_prompts(&args.variants, &cases, use_model_grading).await;
	print!("{}", comparison.summary_table());
	if let Some(analysis) = &comparison.comparison.improvements {
		for delta in &analysis.improvements {
			println!("  + case {} ({:+}): {}", delta.test_case_index + 1, delta.score_change, delta.input);
		}
		for delta in &analysis.regressions {
			println!("  - case {} ({:+}): {}", delta.test_case_index + 1, delta.score_change, delta.input);
		}
	}

	if let Some(name) = args.save {
		let store = ReportStore::new(&config.results_dir);
		let path = engine.generate_report(&comparison, &store, non_empty(&name))?;
		println!("\nReport saved to {}", path.display());
	}
	Ok(())
}

fn grade(args: GradeArgs) -> Result<()> {
	let response = if args.response == "-" {
		std::io::read_to_string(std::io::stdin()).context("Failed to read response from stdin")?
	} else {
		args.response.clone()
	};

	let selection = select_graders(&args.graders);
	for name in &selection.skipped {
		eprintln!("Skipping unknown grader '{name}'");
	}
	let mut configs = selection.graders;
	if !args.keywords.is_empty() {
		configs.push(GraderConfig::KeywordChecker { keywords: args.keywords, case_sensitive: false });
	}
	if let Some(pattern) = args.pattern {
		configs.push(GraderConfig::RegexMatcher { pattern, should_match: true });
	}
	if let Some(format) = args.format {
		configs.push(GraderConfig::FormatValidator { format });
	}
	if let Some(expected) = args.sentiment {
		configs.push(GraderConfig::SentimentAnalyzer { expected });
	}
	if let Some((min_words, max_words)) = args.words {
		configs.push(GraderConfig::WordCountValidator { min_words, max_words });
	}
	if !args.sections.is_empty() {
		configs.push(GraderConfig::StructureValidator { sections: args.sections });
	}
	if configs.is_empty() {
		bail!("no graders selected");
	}

	for config in &configs {
		let grader = config.build()?;
		let result = grader.grade(&response);
		let mark = if result.passed { "PASS" } else { "FAIL" };
		println!("{:<22} {:>2}/10 {}  {}", grader.name(), result.score, mark, result.reason);
	}
	Ok(())
}

fn show(config: &PromptcraftConfig, args: ShowArgs) -> Result<()> {
	let store = ReportStore::new(&config.results_dir);
	let Some(file) = args.file else {
		let names = store.list()?;
		if names.is_empty() {
			println!("No reports in {}", store.dir().display());
		}
		for name in names {
			println!("{name}");
		}
		return Ok(());
	};

	let value = store.load_value(&file)?;
	if value.get("comparison").is_some() {
		let comparison = store.load_comparison(&file)?;
		print!("{}", comparison.summary_table());
	} else if value.get("results").is_some() {
		print_run(&store.load_evaluation(&file)?);
	} else {
		bail!("{} is not an evaluation or comparison report", file);
	}
	Ok(())
}

fn print_run(run: &EvaluationRun) {
	print!("{}", run.summary_table());
	println!("Finished {} cases in {:.2}s", run.metadata.total_cases, run.metadata.duration_seconds);
}

fn non_empty(name: &str) -> Option<&str> {
	(!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_compare_variants() {
		let cli = Cli::try_parse_from([
			"promptcraft",
			"compare",
			"--variant",
			"terse=Answer briefly.",
			"--variant",
			"warm=Be kind: answer=fully.",
			"--use-case",
			"support",
		])
		.unwrap();
		let Commands::Compare(args) = cli.command else {
			panic!("expected compare");
		};
		assert_eq!(args.variants.len(), 2);
		assert_eq!(args.variants[1].name, "warm");
		assert_eq!(args.variants[1].prompt, "Be kind: answer=fully.");
		assert_eq!(args.cases.use_case.as_deref(), Some("support"));
		assert!(args.save.is_none());
	}

	#[test]
	fn rejects_malformed_variant() {
		assert!(Cli::try_parse_from(["promptcraft", "compare", "--variant", "no-equals"]).is_err());
		assert!(parse_variant("=prompt").is_err());
	}

	#[test]
	fn eval_save_flag_takes_optional_name() {
		let cli = Cli::try_parse_from([
			"promptcraft",
			"eval",
			"--prompt",
			"Summarize:",
			"--cases",
			"cases.jsonl",
			"--grader",
			"json_validator",
			"--grader",
			"keyword_checker",
			"--save",
		])
		.unwrap();
		let Commands::Eval(args) = cli.command else {
			panic!("expected eval");
		};
		assert_eq!(args.graders, vec!["json_validator", "keyword_checker"]);
		assert_eq!(args.save.as_deref(), Some(""));
		assert_eq!(non_empty(""), None);
	}

	#[test]
	fn prompt_and_prompt_file_conflict() {
		let parsed = Cli::try_parse_from([
			"promptcraft",
			"eval",
			"--prompt",
			"a",
			"--prompt-file",
			"p.txt",
		]);
		assert!(parsed.is_err());
	}

	#[test]
	fn grade_parses_word_range_and_sentiment() {
		let cli = Cli::try_parse_from([
			"promptcraft",
			"grade",
			"Thanks, that was great",
			"--words",
			"3-10",
			"--sentiment",
			"positive",
		])
		.unwrap();
		let Commands::Grade(args) = cli.command else {
			panic!("expected grade");
		};
		assert_eq!(args.words, Some((3, 10)));
		assert_eq!(args.sentiment, Some(Sentiment::Positive));
		assert!(parse_range("10").is_err());
	}
}
