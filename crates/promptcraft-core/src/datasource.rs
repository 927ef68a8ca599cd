use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use promptcraft_types::TestCase;
use serde_json::Value;

use crate::generator::{case_from_value, TestCaseGenerator};

#[async_trait]
pub trait DataSource: Send + Sync {
    async fn load(&self) -> Result<Vec<TestCase>>;
}

pub struct VecDataSource {
    cases: Vec<TestCase>,
}

impl VecDataSource {
    pub fn new(cases: Vec<TestCase>) -> Self {
        Self { cases }
    }
}

#[async_trait]
impl DataSource for VecDataSource {
    async fn load(&self) -> Result<Vec<TestCase>> {
        Ok(self.cases.clone())
    }
}

/// Read JSONL where each line is a test case object:
/// - {"input": "...", "expected_criteria": "...", "difficulty": "hard", "category": "..."}
/// - {"input": "..."}
///
/// Missing criteria default to "General quality"; non-string inputs are kept as JSON text.
pub struct JsonlDataSource {
    path: PathBuf,
}

impl JsonlDataSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DataSource for JsonlDataSource {
    async fn load(&self) -> Result<Vec<TestCase>> {
        let content = read_to_string(&self.path).await?;
        parse_jsonl(&content)
    }
}

pub fn parse_jsonl(content: &str) -> Result<Vec<TestCase>> {
    let mut cases = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line)
            .with_context(|| format!("Invalid JSON on line {}", idx + 1))?;
        if !value.is_object() {
            return Err(anyhow!("Line {}: expected object", idx + 1));
        }
        let case = case_from_value(&value)
            .ok_or_else(|| anyhow!("Line {}: missing 'input'", idx + 1))?;
        cases.push(case);
    }
    Ok(cases)
}

/// Cases produced by the completion service for a prompt and use case.
///
/// Generation never fails; a broken service yields the stub fallback cases.
pub struct GeneratedDataSource {
    generator: TestCaseGenerator,
    prompt: Option<String>,
    use_case: String,
    num_cases: usize,
}

impl GeneratedDataSource {
    /// Cases tailored to one prompt.
    pub fn for_prompt(
        generator: TestCaseGenerator,
        prompt: impl Into<String>,
        use_case: impl Into<String>,
        num_cases: usize,
    ) -> Self {
        Self {
            generator,
            prompt: Some(prompt.into()),
            use_case: use_case.into(),
            num_cases,
        }
    }

    /// Prompt-independent cases for comparing variants.
    pub fn for_comparison(generator: TestCaseGenerator, use_case: impl Into<String>, num_cases: usize) -> Self {
        Self {
            generator,
            prompt: None,
            use_case: use_case.into(),
            num_cases,
        }
    }
}

#[async_trait]
impl DataSource for GeneratedDataSource {
    async fn load(&self) -> Result<Vec<TestCase>> {
        let cases = match &self.prompt {
            Some(prompt) => {
                self.generator
                    .generate_test_cases(prompt, &self.use_case, self.num_cases)
                    .await
            }
            None => {
                self.generator
                    .generate_comparison_cases(&self.use_case, self.num_cases)
                    .await
            }
        };
        Ok(cases)
    }
}

#[cfg(not(feature = "sync-fs"))]
async fn read_to_string(path: &PathBuf) -> Result<String> {
    use tokio::fs;
    fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))
}

#[cfg(feature = "sync-fs")]
async fn read_to_string(path: &PathBuf) -> Result<String> {
    use std::fs;
    use tokio::task;
    let path_clone = path.clone();
    let content = task::spawn_blocking(move || {
        fs::read_to_string(&path_clone).with_context(|| format!("Failed to read {:?}", path_clone))
    })
    .await
    .map_err(|e| anyhow!(e))??;
    Ok(content)
}
