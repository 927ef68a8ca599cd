use promptcraft_types::GradeResult;
use serde_json::json;

use crate::grader::{coverage_score, Grader};

/// Checks that every required keyword occurs in the response.
pub struct KeywordChecker {
    keywords: Vec<String>,
    case_sensitive: bool,
}

impl KeywordChecker {
    /// Creates a case-insensitive keyword checker.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            case_sensitive: false,
        }
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }
}

impl Grader for KeywordChecker {
    fn name(&self) -> &'static str {
        "keyword_checker"
    }

    fn grade(&self, response: &str) -> GradeResult {
        let haystack = if self.case_sensitive {
            response.to_string()
        } else {
            response.to_lowercase()
        };

        let (found, missing): (Vec<&String>, Vec<&String>) = self.keywords.iter().partition(|kw| {
            if self.case_sensitive {
                haystack.contains(kw.as_str())
            } else {
                haystack.contains(&kw.to_lowercase())
            }
        });

        let score = coverage_score(found.len(), self.keywords.len());
        let reason = if missing.is_empty() {
            "All keywords present".to_string()
        } else {
            format!(
                "Found {}/{} keywords. Missing: {:?}",
                found.len(),
                self.keywords.len(),
                missing
            )
        };

        GradeResult::new(score, missing.is_empty(), reason)
            .with_details(json!({ "found": found, "missing": missing }))
    }
}

pub fn keyword_checker(response: &str, keywords: &[&str], case_sensitive: bool) -> GradeResult {
    KeywordChecker::new(keywords.iter().copied())
        .case_sensitive(case_sensitive)
        .grade(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_the_keywords_scores_five() {
        let grade = keyword_checker("hello world", &["hello", "bye"], false);
        assert_eq!(grade.score, 5);
        assert!(!grade.passed);
        let details = grade.details.unwrap();
        assert_eq!(details["missing"], json!(["bye"]));
        assert_eq!(details["found"], json!(["hello"]));
    }

    #[test]
    fn case_insensitive_by_default() {
        let grade = keyword_checker("The Capital is PARIS", &["paris", "capital"], false);
        assert_eq!(grade.score, 10);
        assert!(grade.passed);
        assert_eq!(grade.reason, "All keywords present");
    }

    #[test]
    fn case_sensitive_misses_other_case() {
        let grade = keyword_checker("The capital is paris", &["Paris"], true);
        assert_eq!(grade.score, 0);
        assert!(!grade.passed);
    }

    #[test]
    fn score_is_rounded() {
        // 2 of 3 → 6.67 → 7
        let grade = keyword_checker("a b", &["a", "b", "c"], false);
        assert_eq!(grade.score, 7);
    }

    #[test]
    fn no_keywords_passes() {
        let grade = KeywordChecker::new(Vec::<String>::new()).grade("");
        assert_eq!(grade.score, 10);
        assert!(grade.passed);
    }
}
