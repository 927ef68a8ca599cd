use anyhow::Result;
use jsonschema::JSONSchema;
use promptcraft_types::GradeResult;
use serde_json::{json, Value};

use crate::grader::Grader;

/// Checks that a response parses as strict JSON and optionally satisfies a schema.
pub struct JsonValidator {
	schema: Option<JSONSchema>,
}

impl JsonValidator {
	pub fn new() -> Self {
		Self { schema: None }
	}

	/// Returns error if the schema itself does not compile.
	pub fn with_schema(schema: &Value) -> Result<Self> {
		let compiled = JSONSchema::compile(schema)
			.map_err(|e| anyhow::anyhow!("Invalid JSON schema: {}", e))?;
		Ok(Self { schema: Some(compiled) })
	}
}

impl Default for JsonValidator {
	fn default() -> Self {
		Self::new()
	}
}

impl Grader for JsonValidator {
	fn name(&self) -> &'static str {
		"json_validator"
	}

	fn grade(&self, response: &str) -> GradeResult {
		let parsed: Value = match serde_json::from_str(response) {
			Ok(v) => v,
			Err(e) => return GradeResult::new(0, false, format!("Invalid JSON: {}", e)),
		};

		let Some(schema) = &self.schema else {
			return GradeResult::new(10, true, "Valid JSON format");
		};

		// collect eagerly; the error iterator borrows `parsed`
		let violations: Vec<String> = match schema.validate(&parsed) {
			Ok(()) => Vec::new(),
			Err(errors) => errors.map(|e| format!("{}: {}", e.instance_path, e)).collect(),
		};

		if violations.is_empty() {
			GradeResult::new(10, true, "Valid JSON matching schema")
		} else {
			GradeResult::new(
				0,
				false,
				format!("JSON does not match schema ({} violation(s))", violations.len()),
			)
			.with_details(json!({ "errors": violations }))
		}
	}
}

pub fn json_validator(response: &str) -> GradeResult {
	JsonValidator::new().grade(response)
}
