use promptcraft_types::{EvaluationResult, EvaluationRun, ImprovementAnalysis, ScoreDelta, Stats};

const MAX_LISTED: usize = 5;
const INPUT_PREVIEW_CHARS: usize = 100;

/// The variant with the strictly greatest average, scanning in the given order.
///
/// The running best starts at 0, so ties keep the earlier variant and a field of
/// all-zero (or all-failed) runs has no winner.
pub fn select_winner<'a, I>(summary: I) -> Option<String>
where
	I: IntoIterator<Item = (&'a str, &'a Stats)>,
{
	let mut best = 0.0;
	let mut winner = None;
	for (name, stats) in summary {
		if stats.average > best {
			best = stats.average;
			winner = Some(name.to_string());
		}
	}
	winner
}

/// Pair the two runs' results by position and report per-case score movement.
///
/// Every pair where both sides carry a model grade is compared. A technical-error
/// grade counts with its score of 0.
/// Both lists are ordered by magnitude (largest first, stable) and capped at 5.
pub fn analyze_improvements(first: &EvaluationRun, second: &EvaluationRun) -> ImprovementAnalysis {
	let mut improvements = Vec::new();
	let mut regressions = Vec::new();

	for (i, (r1, r2)) in first.results.iter().zip(second.results.iter()).enumerate() {
		let (Some(score1), Some(score2)) = (judged_score(r1), judged_score(r2)) else {
			continue;
		};
		let diff = i64::from(score2) - i64::from(score1);
		if diff == 0 {
			continue;
		}

		let delta = ScoreDelta {
			test_case_index: i,
			input: preview_input(&r1.test_case.input),
			magnitude: diff.unsigned_abs() as u32,
			score_change: diff,
			previous_score: score1,
			new_score: score2,
		};
		if diff > 0 {
			improvements.push(delta);
		} else {
			regressions.push(delta);
		}
	}

	improvements.sort_by(|a, b| b.magnitude.cmp(&a.magnitude));
	regressions.sort_by(|a, b| b.magnitude.cmp(&a.magnitude));
	improvements.truncate(MAX_LISTED);
	regressions.truncate(MAX_LISTED);

	ImprovementAnalysis {
		improvements,
		regressions,
		net_change: second.stats.average - first.stats.average,
	}
}

fn judged_score(result: &EvaluationResult) -> Option<u32> {
	result.model_grade.as_ref().map(|g| g.score)
}

fn preview_input(input: &str) -> String {
	let mut preview: String = input.chars().take(INPUT_PREVIEW_CHARS).collect();
	preview.push_str("...");
	preview
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use promptcraft_types::{calculate_stats, ModelGrade, RunMetadata, TestCase};

	fn grade(score: u32) -> ModelGrade {
		ModelGrade {
			score,
			reason: String::new(),
			strengths: vec![],
			weaknesses: vec![],
			is_technical_error: false,
		}
	}

	fn run(grades: Vec<Option<ModelGrade>>) -> EvaluationRun {
		let results: Vec<EvaluationResult> = grades
			.into_iter()
			.enumerate()
			.map(|(i, g)| EvaluationResult {
				test_case: TestCase::new(format!("case {}", i), "crit"),
				response: "r".into(),
				timestamp: Utc::now(),
				code_grades: None,
				model_grade: g,
			})
			.collect();
		let stats = EvaluationRun::summarize(&results);
		EvaluationRun {
			prompt: "p".into(),
			metadata: RunMetadata { total_cases: results.len(), timestamp: Utc::now(), duration_seconds: 0.0 },
			results,
			stats,
		}
	}

	#[test]
	fn winner_is_first_strictly_greatest() {
		let a = Stats { average: 7.0, ..calculate_stats(&[7.0]) };
		let b = Stats { average: 7.0, ..calculate_stats(&[7.0]) };
		let c = Stats { average: 6.9, ..calculate_stats(&[7.0]) };
		let winner = select_winner([("A", &a), ("B", &b), ("C", &c)]);
		assert_eq!(winner.as_deref(), Some("A"));
	}

	#[test]
	fn later_higher_average_wins() {
		let a = calculate_stats(&[5.0]);
		let b = calculate_stats(&[8.0]);
		assert_eq!(select_winner([("A", &a), ("B", &b)]).as_deref(), Some("B"));
	}

	#[test]
	fn all_failed_has_no_winner() {
		let failed = Stats::all_failed();
		assert_eq!(select_winner([("A", &failed), ("B", &failed)]), None);
	}

	#[test]
	fn signs_follow_positional_diffs() {
		let first = run(vec![Some(grade(5)), Some(grade(8)), Some(grade(6)), None]);
		let second = run(vec![Some(grade(9)), Some(grade(4)), Some(grade(6)), Some(grade(7))]);
		let analysis = analyze_improvements(&first, &second);

		assert_eq!(analysis.improvements.len(), 1);
		assert_eq!(analysis.regressions.len(), 1);
		let up = &analysis.improvements[0];
		assert_eq!((up.test_case_index, up.magnitude, up.score_change), (0, 4, 4));
		let down = &analysis.regressions[0];
		assert_eq!((down.test_case_index, down.magnitude, down.score_change), (1, 4, -4));
		assert_eq!(down.previous_score, 8);
		assert_eq!(down.new_score, 4);
		assert_eq!(analysis.net_change, second.stats.average - first.stats.average);
	}

	#[test]
	fn technical_error_diffs_from_zero() {
		let first = run(vec![Some(ModelGrade::technical_error("x", "API connection issue")), Some(grade(6))]);
		let second = run(vec![Some(grade(9)), Some(ModelGrade::technical_error("y", "API connection issue"))]);
		let analysis = analyze_improvements(&first, &second);

		assert_eq!(analysis.improvements.len(), 1);
		let up = &analysis.improvements[0];
		assert_eq!((up.test_case_index, up.previous_score, up.new_score, up.score_change), (0, 0, 9, 9));
		assert_eq!(analysis.regressions.len(), 1);
		let down = &analysis.regressions[0];
		assert_eq!((down.test_case_index, down.previous_score, down.new_score, down.magnitude), (1, 6, 0, 6));
	}

	#[test]
	fn lists_are_sorted_and_capped() {
		let first = run((0..8).map(|_| Some(grade(1))).collect());
		let second = run([2, 9, 3, 8, 4, 7, 5, 6].iter().map(|s| Some(grade(*s))).collect());
		let analysis = analyze_improvements(&first, &second);
		let magnitudes: Vec<u32> = analysis.improvements.iter().map(|d| d.magnitude).collect();
		assert_eq!(magnitudes, vec![8, 7, 6, 5, 4]);
	}

	#[test]
	fn input_preview_is_truncated() {
		let long = "x".repeat(150);
		let preview = preview_input(&long);
		assert_eq!(preview.len(), 103);
		assert!(preview.ends_with("..."));
		assert_eq!(preview_input("short"), "short...");
	}
}
