use promptcraft_types::GradeResult;
use regex::{Regex, RegexBuilder};
use serde_json::json;

use crate::grader::Grader;

/// Case-insensitive search for a pattern; `.` also matches newlines.
pub struct RegexMatcher {
	pattern: Result<Regex, regex::Error>,
	pattern_str: String,
	should_match: bool,
}

impl RegexMatcher {
	/// An invalid pattern is kept and reported as a failing grade.
	pub fn new(pattern: &str, should_match: bool) -> Self {
		let compiled = RegexBuilder::new(pattern)
			.case_insensitive(true)
			.dot_matches_new_line(true)
			.multi_line(true)
			.build();
		Self {
			pattern: compiled,
			pattern_str: pattern.to_string(),
			should_match,
		}
	}
}

impl Grader for RegexMatcher {
	fn name(&self) -> &'static str {
		"regex_matcher"
	}

	fn grade(&self, response: &str) -> GradeResult {
		let regex = match &self.pattern {
			Ok(r) => r,
			Err(e) => {
				return GradeResult::new(0, false, format!("Invalid regex pattern {}: {}", self.pattern_str, e));
			}
		};

		let found = regex.find(response);
		let matched = found.is_some();
		let (passed, reason) = match (self.should_match, matched) {
			(true, true) => (true, format!("Pattern matched: {}", self.pattern_str)),
			(true, false) => (false, format!("Pattern not found: {}", self.pattern_str)),
			(false, false) => (true, format!("Pattern correctly absent: {}", self.pattern_str)),
			(false, true) => (false, format!("Unwanted pattern found: {}", self.pattern_str)),
		};

		GradeResult::new(if passed { 10 } else { 0 }, passed, reason).with_details(json!({
			"pattern": self.pattern_str,
			"should_match": self.should_match,
			"match": found.map(|m| m.as_str().to_string()),
		}))
	}
}

pub fn regex_matcher(response: &str, pattern: &str, should_match: bool) -> GradeResult {
	RegexMatcher::new(pattern, should_match).grade(response)
}
