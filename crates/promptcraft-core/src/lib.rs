//! promptcraft-core: prompt evaluation engine.
//! Generate test cases, run a prompt against them, grade responses with code
//! graders and an LLM judge, and compare prompt variants.
//! See `examples/simple.rs` for a quickstart.

pub mod client;
pub mod compare;
pub mod config;
pub mod datasource;
pub mod engine;
pub mod generator;
pub mod grader;
pub mod judge;
pub mod openai;
#[cfg(feature = "persistence")]
pub mod report;
pub mod suggest;
pub mod testing;

pub mod graders {
    pub mod custom;
    pub mod format;
    pub mod json;
    pub mod keyword;
    pub mod length;
    pub mod regex;
    pub mod sentiment;
    pub mod structure;
    pub mod word_count;
}

pub use client::{completion_text, from_async_fn, CompletionClient, CompletionError, CompletionRequest};
pub use compare::{analyze_improvements, select_winner};
pub use config::{select_graders, GraderConfig, GraderSelection, PromptcraftConfig};
pub use datasource::{DataSource, GeneratedDataSource, JsonlDataSource, VecDataSource};
pub use engine::{EvaluationEngine, EvaluationEngineBuilder, EvaluationOptions};
pub use generator::TestCaseGenerator;
pub use grader::Grader;
pub use graders::{
    custom::{CustomGraders, FnGrader},
    format::{FormatType, FormatValidator},
    json::JsonValidator,
    keyword::KeywordChecker,
    length::LengthValidator,
    regex::RegexMatcher,
    sentiment::{Sentiment, SentimentAnalyzer},
    structure::StructureValidator,
    word_count::WordCountValidator,
};
pub use judge::{GradeParseError, ModelGrader};
pub use openai::OpenAiCompatClient;
pub use suggest::suggest_improvements;
pub use promptcraft_types::*;
