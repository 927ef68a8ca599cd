use promptcraft_types::GradeResult;
use serde_json::json;

use crate::grader::Grader;

/// Checks the whitespace-separated word count against an inclusive range.
pub struct WordCountValidator {
    min_words: usize,
    max_words: usize,
}

impl WordCountValidator {
    pub fn new(min_words: usize, max_words: usize) -> Self {
        Self { min_words, max_words }
    }
}

impl Grader for WordCountValidator {
    fn name(&self) -> &'static str {
        "word_count_validator"
    }

    fn grade(&self, response: &str) -> GradeResult {
        let words = response.split_whitespace().count();
        if (self.min_words..=self.max_words).contains(&words) {
            return GradeResult::new(10, true, format!("Word count in range ({} words)", words));
        }

        let midpoint = (self.min_words + self.max_words) / 2;
        let distance = words.abs_diff(midpoint) / 10;
        let score = 10usize.saturating_sub(distance) as u32;

        GradeResult::new(
            score,
            false,
            format!(
                "Word count out of range ({} words, expected {}-{})",
                words, self.min_words, self.max_words
            ),
        )
        .with_details(json!({ "words": words, "midpoint": midpoint }))
    }
}

/// Builds a word-count grader closure for the given range.
pub fn word_count_validator(min_words: usize, max_words: usize) -> impl Fn(&str) -> GradeResult {
    let validator = WordCountValidator::new(min_words, max_words);
    move |response| validator.grade(response)
}
