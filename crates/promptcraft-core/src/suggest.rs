use std::collections::HashMap;

use promptcraft_types::EvaluationRun;

use crate::judge::TECHNICAL_WEAKNESSES;

const LOW_AVERAGE: f64 = 5.0;
const HIGH_VARIANCE: f64 = 6.0;
const FAILURE_SHARE: f64 = 0.3;
const TOP_WEAKNESSES: usize = 3;

/// Rule-based advice for improving the evaluated prompt.
///
/// Averages and variance are skipped when the run has no valid scores.
pub fn suggest_improvements(run: &EvaluationRun) -> Vec<String> {
    let mut suggestions = Vec::new();
    let stats = &run.stats;
    let results = &run.results;
    let total = results.len() as f64;

    let scores: Vec<f64> = results
        .iter()
        .filter_map(|r| r.quality_score())
        .map(f64::from)
        .collect();

    if !stats.is_error() {
        if stats.average < LOW_AVERAGE {
            suggestions.push(
                "Average score is low. Try adding examples (one-shot or few-shot prompting)".to_string(),
            );
            suggestions.push(
                "Consider breaking complex tasks into smaller steps (chain-of-thought)".to_string(),
            );
        }

        if !scores.is_empty() && population_variance(&scores, stats.average) > HIGH_VARIANCE {
            suggestions.push(
                "Scores vary widely. Lower temperature to 0.3 for more consistent outputs".to_string(),
            );
            suggestions.push("Add explicit constraints or rules to reduce variability".to_string());
        }
    }

    let format_violations = results
        .iter()
        .filter_map(|r| r.code_grades.as_ref())
        .flat_map(|grades| grades.values())
        .filter(|g| !g.passed)
        .count();
    if format_violations as f64 > total * FAILURE_SHARE {
        suggestions.push(
            "Many format violations detected. Use XML tags or structured output format".to_string(),
        );
        suggestions.push("Add explicit format instructions with examples".to_string());
    }

    let common = common_weaknesses(run);
    if !common.is_empty() {
        suggestions.push(format!("Common issues detected: {}", common.join(", ")));
    }

    if run.technical_error_count() as f64 > total * FAILURE_SHARE {
        suggestions.insert(
            0,
            "Some responses could not be graded due to API issues. Check your API key and connection."
                .to_string(),
        );
    }

    if suggestions.is_empty() {
        suggestions.push("Performance looks good! Consider testing edge cases".to_string());
        suggestions.push("Try A/B testing with slight variations to optimize further".to_string());
    }

    suggestions
}

/// Mean squared deviation from `mean`.
fn population_variance(scores: &[f64], mean: f64) -> f64 {
    scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64
}

/// Most frequent lower-cased weaknesses from real (non-technical) grades, ties in
/// first-seen order.
fn common_weaknesses(run: &EvaluationRun) -> Vec<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();
    let weaknesses = run
        .results
        .iter()
        .filter_map(|r| r.model_grade.as_ref())
        .filter(|g| !g.is_technical_error)
        .flat_map(|g| g.weaknesses.iter())
        .map(|w| w.to_lowercase())
        .filter(|w| !TECHNICAL_WEAKNESSES.contains(&w.as_str()));

    for weakness in weaknesses {
        match slots.get(&weakness) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                slots.insert(weakness.clone(), counts.len());
                counts.push((weakness, 1));
            }
        }
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(TOP_WEAKNESSES).map(|(w, _)| w).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use promptcraft_types::{EvaluationResult, GradeResult, ModelGrade, RunMetadata, TestCase};
    use std::collections::BTreeMap;

    fn result(score: u32, weaknesses: &[&str]) -> EvaluationResult {
        EvaluationResult {
            test_case: TestCase::new("in", "crit"),
            response: "resp".into(),
            timestamp: Utc::now(),
            code_grades: None,
            model_grade: Some(ModelGrade {
                score,
                reason: String::new(),
                strengths: vec![],
                weaknesses: weaknesses.iter().map(|w| w.to_string()).collect(),
                is_technical_error: false,
            }),
        }
    }

    fn technical() -> EvaluationResult {
        EvaluationResult {
            model_grade: Some(ModelGrade::technical_error("down", "API connection issue")),
            ..result(0, &[])
        }
    }

    fn run(results: Vec<EvaluationResult>) -> EvaluationRun {
        let stats = EvaluationRun::summarize(&results);
        EvaluationRun {
            prompt: "p".into(),
            metadata: RunMetadata { total_cases: results.len(), timestamp: Utc::now(), duration_seconds: 0.0 },
            results,
            stats,
        }
    }

    #[test]
    fn good_run_gets_generic_advice() {
        let suggestions = suggest_improvements(&run(vec![result(8, &[]), result(9, &[])]));
        assert_eq!(suggestions.len(), 2);
        assert!(suggestions[0].starts_with("Performance looks good"));
    }

    #[test]
    fn low_average_recommends_examples() {
        let suggestions = suggest_improvements(&run(vec![result(3, &[]), result(4, &[])]));
        assert!(suggestions[0].contains("few-shot"));
        assert!(suggestions[1].contains("chain-of-thought"));
    }

    #[test]
    fn high_variance_recommends_lower_temperature() {
        // mean 6, deviations ±4 → variance 16
        let suggestions = suggest_improvements(&run(vec![result(2, &[]), result(10, &[])]));
        assert!(suggestions.iter().any(|s| s.contains("Lower temperature")));
    }

    #[test]
    fn code_grade_failures_recommend_structure() {
        let mut r = result(8, &[]);
        let mut grades = BTreeMap::new();
        grades.insert("json_validator".to_string(), GradeResult::new(0, false, "Invalid JSON"));
        r.code_grades = Some(grades);
        let suggestions = suggest_improvements(&run(vec![r, result(8, &[])]));
        assert!(suggestions.iter().any(|s| s.contains("structured output")));
    }

    #[test]
    fn common_weaknesses_are_tallied_case_insensitively() {
        let suggestions = suggest_improvements(&run(vec![
            result(8, &["Too verbose", "missing dates"]),
            result(8, &["too verbose", "API connection issue"]),
            result(8, &["Wrong tone", "Missing dates", "too verbose"]),
        ]));
        assert_eq!(
            suggestions,
            vec!["Common issues detected: too verbose, missing dates, wrong tone".to_string()]
        );
    }

    #[test]
    fn weakness_ties_keep_first_seen_order() {
        let many: Vec<String> = (0..200).map(|i| format!("issue {}", i % 50)).collect();
        let refs: Vec<&str> = many.iter().map(String::as_str).collect();
        let common = common_weaknesses(&run(vec![
            result(8, &["Zeta", "alpha"]),
            result(8, &["ALPHA", "zeta", "beta"]),
            result(8, &refs),
        ]));
        assert_eq!(common, vec!["issue 0", "issue 1", "issue 2"]);

        let common = common_weaknesses(&run(vec![result(8, &["Zeta", "alpha", "beta"]), result(8, &["alpha", "zeta"])]));
        assert_eq!(common, vec!["zeta", "alpha", "beta"]);
    }

    #[test]
    fn technical_errors_warn_first_and_skip_weaknesses() {
        let suggestions = suggest_improvements(&run(vec![
            result(8, &["vague"]),
            technical(),
            technical(),
        ]));
        assert!(suggestions[0].contains("API issues"));
        assert_eq!(suggestions[1], "Common issues detected: vague");
        assert!(!suggestions.iter().any(|s| s.contains("api connection issue")));
    }

    #[test]
    fn fully_failed_run_only_warns() {
        let suggestions = suggest_improvements(&run(vec![technical(), technical()]));
        assert_eq!(suggestions.len(), 1);
        assert!(suggestions[0].contains("API issues"));
    }

    #[test]
    fn variance_is_population_variance() {
        assert_eq!(population_variance(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 5.0), 4.0);
    }
}
