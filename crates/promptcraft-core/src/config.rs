use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::grader::Grader;
use crate::graders::{
    format::FormatValidator,
    json::JsonValidator,
    keyword::KeywordChecker,
    length::{LengthValidator, DEFAULT_MAX_LENGTH, DEFAULT_MIN_LENGTH},
    regex::RegexMatcher,
    sentiment::{Sentiment, SentimentAnalyzer},
    structure::StructureValidator,
    word_count::WordCountValidator,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptcraftConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
}

impl PromptcraftConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        serde_yaml::from_str(s).context("Invalid promptcraft config")
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        Self::from_yaml_str(&content).with_context(|| format!("Failed to parse {:?}", path))
    }
}

impl Default for PromptcraftConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            evaluation: EvaluationConfig::default(),
            generation: GenerationConfig::default(),
            results_dir: default_results_dir(),
        }
    }
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Inline key; takes precedence over `api_key_env`.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    /// Inline key, else the environment variable. `None` is not an error.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_true")]
    pub use_model_grading: bool,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub custom_criteria: String,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub graders: Vec<GraderConfig>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            use_model_grading: true,
            max_tokens: default_max_tokens(),
            custom_criteria: String::new(),
            concurrency: default_concurrency(),
            graders: Vec::new(),
        }
    }
}

fn default_temperature() -> f32 {
    0.7
}

fn default_true() -> bool {
    true
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_concurrency() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_num_cases")]
    pub num_cases: usize,
    #[serde(default = "default_comparison_cases")]
    pub comparison_cases: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            num_cases: default_num_cases(),
            comparison_cases: default_comparison_cases(),
        }
    }
}

fn default_num_cases() -> usize {
    15
}

fn default_comparison_cases() -> usize {
    10
}

/// The closed set of code graders, with their parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum GraderConfig {
    LengthValidator {
        #[serde(default = "default_min_length")]
        min_length: usize,
        #[serde(default = "default_max_length")]
        max_length: usize,
    },
    JsonValidator {
        #[serde(default)]
        schema: Option<Value>,
    },
    KeywordChecker {
        keywords: Vec<String>,
        #[serde(default)]
        case_sensitive: bool,
    },
    RegexMatcher {
        pattern: String,
        #[serde(default = "default_true")]
        should_match: bool,
    },
    SentimentAnalyzer {
        #[serde(default)]
        expected: Sentiment,
    },
    FormatValidator {
        format: String,
    },
    WordCountValidator {
        min_words: usize,
        max_words: usize,
    },
    StructureValidator {
        sections: Vec<String>,
    },
}

fn default_min_length() -> usize {
    DEFAULT_MIN_LENGTH
}

fn default_max_length() -> usize {
    DEFAULT_MAX_LENGTH
}

impl GraderConfig {
    /// Graders selectable by bare name, with default parameters.
    ///
    /// Graders that need parameters (keywords, a pattern, ...) and unknown names
    /// return `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "length_validator" => Some(Self::LengthValidator {
                min_length: DEFAULT_MIN_LENGTH,
                max_length: DEFAULT_MAX_LENGTH,
            }),
            "json_validator" => Some(Self::JsonValidator { schema: None }),
            "sentiment_analyzer" => Some(Self::SentimentAnalyzer { expected: Sentiment::Neutral }),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::LengthValidator { .. } => "length_validator",
            Self::JsonValidator { .. } => "json_validator",
            Self::KeywordChecker { .. } => "keyword_checker",
            Self::RegexMatcher { .. } => "regex_matcher",
            Self::SentimentAnalyzer { .. } => "sentiment_analyzer",
            Self::FormatValidator { .. } => "format_validator",
            Self::WordCountValidator { .. } => "word_count_validator",
            Self::StructureValidator { .. } => "structure_validator",
        }
    }

    /// Build the grader. Fails only for a JSON schema that does not compile.
    pub fn build(&self) -> Result<Box<dyn Grader>> {
        let grader: Box<dyn Grader> = match self {
            Self::LengthValidator { min_length, max_length } => {
                Box::new(LengthValidator::new(*min_length, *max_length))
            }
            Self::JsonValidator { schema: None } => Box::new(JsonValidator::new()),
            Self::JsonValidator { schema: Some(schema) } => Box::new(JsonValidator::with_schema(schema)?),
            Self::KeywordChecker { keywords, case_sensitive } => {
                Box::new(KeywordChecker::new(keywords.clone()).case_sensitive(*case_sensitive))
            }
            Self::RegexMatcher { pattern, should_match } => Box::new(RegexMatcher::new(pattern, *should_match)),
            Self::SentimentAnalyzer { expected } => Box::new(SentimentAnalyzer::new(*expected)),
            Self::FormatValidator { format } => Box::new(FormatValidator::new(format)),
            Self::WordCountValidator { min_words, max_words } => {
                Box::new(WordCountValidator::new(*min_words, *max_words))
            }
            Self::StructureValidator { sections } => Box::new(StructureValidator::new(sections.clone())),
        };
        Ok(grader)
    }
}

/// Graders resolved from names, plus the names that were skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraderSelection {
    pub graders: Vec<GraderConfig>,
    pub skipped: Vec<String>,
}

pub fn select_graders<I, S>(names: I) -> GraderSelection
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut selection = GraderSelection::default();
    for name in names {
        match GraderConfig::from_name(name.as_ref()) {
            Some(g) => selection.graders.push(g),
            None => selection.skipped.push(name.as_ref().to_string()),
        }
    }
    selection
}
