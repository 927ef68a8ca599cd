use promptcraft_core::{
    from_async_fn, CompletionError, CompletionRequest, EvaluationEngine, EvaluationOptions, GraderConfig,
    JsonlDataSource, DataSource, PromptVariant, TestCase,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A stand-in model: answers in JSON and grades every answer a 7,
    // or a 9 when the graded text mentions a refund.
    let client = from_async_fn(|req: CompletionRequest| async move {
        if req.json_mode {
            let score = if req.prompt.contains("refund") { 9 } else { 7 };
            return Ok::<_, CompletionError>(format!(
                r#"{{"score": {score}, "reason": "stub judge", "weaknesses": ["generic tone"]}}"#
            ));
        }
        let input = req.prompt.rsplit("\n\n").next().unwrap_or_default();
        Ok(format!(r#"{{"reply": "We will look into: {input}"}}"#))
    });

    let engine = EvaluationEngine::builder().client(client).build()?;

    // Example 1: inline cases with a code grader alongside the judge
    let cases = vec![
        TestCase::new("Where is my refund?", "Should mention the refund timeline"),
        TestCase::new("The app crashes on login", "Should ask for device details"),
    ];
    let options = EvaluationOptions::default().graders([GraderConfig::JsonValidator { schema: None }]);

    let run = engine
        .run_evaluation("Answer the customer in JSON.", &cases, &options)
        .await;
    println!("{}", run.summary_table());
    for suggestion in engine.suggest_improvements(&run) {
        println!("- {suggestion}");
    }

    // Example 2: compare two variants on the same cases
    let variants = vec![
        PromptVariant::new("terse", "Answer briefly in JSON."),
        PromptVariant::new("empathetic", "Apologize first, then answer in JSON."),
    ];
    let comparison = engine.compare_prompts(&variants, &cases, true).await;
    println!("{}", comparison.summary_table());

    // Example 3: load cases from a JSONL file if provided
    if let Some(path) = std::env::args().nth(1) {
        let cases = JsonlDataSource::new(path).load().await?;
        let run = engine
            .run_evaluation("Answer the customer in JSON.", &cases, &EvaluationOptions::default())
            .await;
        println!("{}", run.summary_table());
    }

    Ok(())
}
