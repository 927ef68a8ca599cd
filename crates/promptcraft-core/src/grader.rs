use promptcraft_types::GradeResult;

/// A deterministic, local scoring function over a response.
///
/// Graders never fail: empty or malformed input produces a (usually failing)
/// `GradeResult` with a reason.
pub trait Grader: Send + Sync {
    fn name(&self) -> &'static str;
    fn grade(&self, response: &str) -> GradeResult;
}

impl<G: Grader + ?Sized> Grader for Box<G> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn grade(&self, response: &str) -> GradeResult {
        (**self).grade(response)
    }
}

/// `round(10 × found / total)`, or 10 when nothing was required.
pub(crate) fn coverage_score(found: usize, total: usize) -> u32 {
    if total == 0 {
        return 10;
    }
    (found as f64 / total as f64 * 10.0).round() as u32
}
