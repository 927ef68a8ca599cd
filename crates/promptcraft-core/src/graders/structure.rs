use promptcraft_types::GradeResult;
use serde_json::json;

use crate::grader::{coverage_score, Grader};

/// Checks that each required section name occurs in the response (case-insensitive).
pub struct StructureValidator {
    sections: Vec<String>,
}

impl StructureValidator {
    pub fn new<I, S>(sections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { sections: sections.into_iter().map(Into::into).collect() }
    }
}

impl Grader for StructureValidator {
    fn name(&self) -> &'static str {
        "structure_validator"
    }

    fn grade(&self, response: &str) -> GradeResult {
        let lowered = response.to_lowercase();
        let (found, missing): (Vec<&String>, Vec<&String>) = self
            .sections
            .iter()
            .partition(|s| lowered.contains(&s.to_lowercase()));

        GradeResult::new(
            coverage_score(found.len(), self.sections.len()),
            missing.is_empty(),
            format!("Found {}/{} required sections", found.len(), self.sections.len()),
        )
        .with_details(json!({ "found": found, "missing": missing }))
    }
}

/// Builds a structure grader closure for the given sections.
pub fn structure_validator<I, S>(sections: I) -> impl Fn(&str) -> GradeResult
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let validator = StructureValidator::new(sections);
    move |response| validator.grade(response)
}
