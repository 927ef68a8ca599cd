use std::fmt;
use std::str::FromStr;

use promptcraft_types::GradeResult;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::grader::Grader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatType {
    Email,
    Url,
    Phone,
    Date,
    Number,
}

impl FormatType {
    fn pattern(&self) -> &'static str {
        match self {
            Self::Email => r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$",
            Self::Url => r"https?://[^\s]+",
            Self::Phone => r"(\+\d{1,3}[-.]?)?\(?\d{3}\)?[-.]?\d{3}[-.]?\d{4}",
            Self::Date => r"\d{4}-\d{2}-\d{2}|\d{2}/\d{2}/\d{4}",
            Self::Number => r"^-?\d+\.?\d*$",
        }
    }
}

impl fmt::Display for FormatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Email => "email",
            Self::Url => "url",
            Self::Phone => "phone",
            Self::Date => "date",
            Self::Number => "number",
        };
        f.write_str(s)
    }
}

impl FromStr for FormatType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "email" => Ok(Self::Email),
            "url" => Ok(Self::Url),
            "phone" => Ok(Self::Phone),
            "date" => Ok(Self::Date),
            "number" => Ok(Self::Number),
            other => Err(other.to_string()),
        }
    }
}

/// Checks the trimmed response against one of the built-in formats.
///
/// An unrecognised format name is not a mismatch: it grades 5 with a diagnostic.
pub struct FormatValidator {
    format: Result<(FormatType, Regex), String>,
}

impl FormatValidator {
    pub fn new(format_type: &str) -> Self {
        let format = format_type.parse::<FormatType>().and_then(|ft| {
            Regex::new(ft.pattern())
                .map(|re| (ft, re))
                .map_err(|e| e.to_string())
        });
        Self { format }
    }
}

impl Grader for FormatValidator {
    fn name(&self) -> &'static str {
        "format_validator"
    }

    fn grade(&self, response: &str) -> GradeResult {
        let (format_type, regex) = match &self.format {
            Ok(f) => f,
            Err(unknown) => {
                return GradeResult::new(5, false, format!("Unknown format type: {}", unknown));
            }
        };

        if regex.is_match(response.trim()) {
            GradeResult::new(10, true, format!("Valid {} format", format_type))
        } else {
            GradeResult::new(0, false, format!("Invalid {} format", format_type))
        }
    }
}

pub fn format_validator(response: &str, format_type: &str) -> GradeResult {
    FormatValidator::new(format_type).grade(response)
}
