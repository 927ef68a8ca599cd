use std::collections::HashMap;

use promptcraft_types::GradeResult;

use crate::grader::Grader;

/// Adapts a plain function or closure to the `Grader` trait.
pub struct FnGrader<F> {
    f: F,
}

impl<F> FnGrader<F>
where
    F: Fn(&str) -> GradeResult + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Grader for FnGrader<F>
where
    F: Fn(&str) -> GradeResult + Send + Sync,
{
    fn name(&self) -> &'static str {
        "custom"
    }

    fn grade(&self, response: &str) -> GradeResult {
        (self.f)(response)
    }
}

/// User-registered graders looked up by name.
#[derive(Default)]
pub struct CustomGraders {
    graders: HashMap<String, Box<dyn Grader>>,
}

impl CustomGraders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, grader: impl Grader + 'static) {
        self.graders.insert(name.into(), Box::new(grader));
    }

    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&str) -> GradeResult + Send + Sync + 'static,
    {
        self.register(name, FnGrader::new(f));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.graders.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.graders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// An unregistered name grades 0 instead of failing.
    pub fn run(&self, name: &str, response: &str) -> GradeResult {
        match self.graders.get(name) {
            Some(grader) => grader.grade(response),
            None => GradeResult::new(0, false, format!("Validator '{}' not found", name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graders::word_count::word_count_validator;

    #[test]
    fn runs_registered_closure() {
        let mut registry = CustomGraders::new();
        registry.register_fn("short", word_count_validator(1, 3));
        registry.register_fn("polite", |r: &str| {
            let ok = r.to_lowercase().contains("please");
            GradeResult::new(if ok { 10 } else { 0 }, ok, "politeness")
        });

        assert!(registry.run("short", "two words").passed);
        assert!(!registry.run("polite", "do it now").passed);
        assert_eq!(registry.names(), vec!["polite", "short"]);
    }

    #[test]
    fn unknown_validator_fails_softly() {
        let registry = CustomGraders::new();
        let grade = registry.run("missing", "text");
        assert_eq!(grade.score, 0);
        assert!(!grade.passed);
        assert_eq!(grade.reason, "Validator 'missing' not found");
    }
}
