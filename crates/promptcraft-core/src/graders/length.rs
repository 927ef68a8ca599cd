use promptcraft_types::GradeResult;
use serde_json::json;

use crate::grader::Grader;

pub const DEFAULT_MIN_LENGTH: usize = 10;
pub const DEFAULT_MAX_LENGTH: usize = 5000;

/// Checks the response length in characters.
pub struct LengthValidator {
    min_length: usize,
    max_length: usize,
}

impl LengthValidator {
    pub fn new(min_length: usize, max_length: usize) -> Self {
        Self { min_length, max_length }
    }
}

impl Default for LengthValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_LENGTH, DEFAULT_MAX_LENGTH)
    }
}

impl Grader for LengthValidator {
    fn name(&self) -> &'static str {
        "length_validator"
    }

    fn grade(&self, response: &str) -> GradeResult {
        let length = response.chars().count();
        let details = json!({ "length": length, "min": self.min_length, "max": self.max_length });

        let result = if length < self.min_length {
            GradeResult::new(
                3,
                false,
                format!("Response too short ({} chars, minimum {})", length, self.min_length),
            )
        } else if length > self.max_length {
            GradeResult::new(
                5,
                false,
                format!("Response too long ({} chars, maximum {})", length, self.max_length),
            )
        } else {
            GradeResult::new(10, true, format!("Length appropriate ({} chars)", length))
        };
        result.with_details(details)
    }
}

pub fn length_validator(response: &str, min_length: usize, max_length: usize) -> GradeResult {
    LengthValidator::new(min_length, max_length).grade(response)
}
