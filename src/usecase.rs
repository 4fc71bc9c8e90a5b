//! Built-in use cases: a schema contract, its content rules, the prompt that
//! asks for it, and (for code-producing tasks) the execution harness.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::RunError;
use crate::executor::Harness;
use crate::schema::{FieldKind, FieldSpec, SchemaContract};
use crate::validator::{Guard, Rule, RuleTable};

pub const SCHEME_FIBONACCI: &str = "scheme-fibonacci";
pub const COUNTRY: &str = "country";

/// A generated file inside a directory-listing payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileArtifact {
    pub filename: String,
    pub contents: String,
}

/// Where executable artifacts live in a payload and how to run them.
#[derive(Debug, Clone)]
pub struct ExecutionSpec {
    /// Array-of-object field holding the artifacts.
    pub files_field: String,
    /// Extensions that mark an artifact as executable.
    pub extensions: Vec<String>,
    pub harness: Harness,
}

#[derive(Debug, Clone)]
pub struct UseCase {
    pub name: String,
    pub description: String,
    pub prompt: String,
    pub contract: SchemaContract,
    pub rules: RuleTable,
    pub execution: Option<ExecutionSpec>,
}

impl UseCase {
    /// Every file artifact in the payload. Items that do not deserialize were
    /// already rejected by the structural pass.
    pub fn artifacts(&self, payload: &Map<String, Value>) -> Vec<FileArtifact> {
        let Some(spec) = &self.execution else {
            return Vec::new();
        };
        let Some(Value::Array(items)) = payload.get(&spec.files_field) else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| serde_json::from_value::<FileArtifact>(item.clone()).ok())
            .collect()
    }

    pub fn is_executable(&self, file: &FileArtifact) -> bool {
        let name = file.filename.trim();
        self.execution
            .as_ref()
            .map(|spec| spec.extensions.iter().any(|ext| name.ends_with(ext.as_str())))
            .unwrap_or(false)
    }

    pub fn executable_artifacts(&self, payload: &Map<String, Value>) -> Vec<FileArtifact> {
        self.artifacts(payload)
            .into_iter()
            .filter(|file| self.is_executable(file))
            .collect()
    }
}

/// Names of every built-in use case.
pub fn names() -> &'static [&'static str] {
    &[SCHEME_FIBONACCI, COUNTRY]
}

pub fn lookup(name: &str) -> Result<UseCase, RunError> {
    let built = match name {
        SCHEME_FIBONACCI => scheme_fibonacci(),
        COUNTRY => Ok(country()),
        other => return Err(RunError::UnknownUseCase(other.to_string())),
    };
    built.map_err(|e| RunError::InvalidRule {
        use_case: name.to_string(),
        reason: e.to_string(),
    })
}

const FIB_PROMPT: &str = "Create a Scheme implementation of the Fibonacci sequence using tail recursion with an accumulator parameter.
The implementation should be in a file named 'fib.scm' and must:
1. Define a function named 'fib-tail' that uses proper tail recursion
2. Use an accumulator parameter to maintain state
3. Handle edge cases (0 and 1) correctly
4. Include comments explaining the algorithm

Also create a README.md that explains:
1. The implementation approach
2. Why tail recursion is more efficient
3. Example usage

Return these in a structured format with a clear overview.";

const FIB_HARNESS: &str = r#"
(define (test-fib-tail)
  (and
    (= (fib-tail 0) 0)
    (= (fib-tail 1) 1)
    (= (fib-tail 5) 5)
    (= (fib-tail 10) 55)
    (= (fib-tail 20) 6765)))

(display "Running tests...\n")
(display (if (test-fib-tail)
           "All tests passed!\n"
           "Tests failed!\n"))
"#;

fn scheme_fibonacci() -> Result<UseCase, regex::Error> {
    let contract = SchemaContract::new(
        "directory-listing",
        vec![
            FieldSpec::required("overview", FieldKind::String),
            FieldSpec::required(
                "files",
                FieldKind::Array(Box::new(FieldKind::Object(vec![
                    FieldSpec::required("filename", FieldKind::String),
                    FieldSpec::required("contents", FieldKind::String),
                ]))),
            ),
        ],
    );

    let rules = RuleTable::new()
        .field(
            "overview",
            vec![
                Rule::min_length(10, "Overview must be at least 10 characters"),
                Rule::require_any(
                    &["fibonacci", "tail recursion", "scheme"],
                    true,
                    "Overview must mention: fibonacci, tail recursion, scheme",
                ),
            ],
        )
        .field("files[].filename", vec![Rule::extensions(&[".scm", ".md"])])
        .guarded(
            "files[].contents",
            Guard::sibling_extension("filename", &[".scm"]),
            vec![
                Rule::pattern(r"\(define\s+\(?fib-tail\b", "Must implement fib-tail function")?,
                Rule::require_all(&[
                    ("define", "Scheme file must contain definitions"),
                    ("if", "Must include conditional logic"),
                    ("accumulator", "Must use accumulator for tail recursion"),
                ]),
            ],
        );

    Ok(UseCase {
        name: SCHEME_FIBONACCI.to_string(),
        description: "Scheme fibonacci with tail recursion, checked under guile".to_string(),
        prompt: FIB_PROMPT.to_string(),
        contract,
        rules,
        execution: Some(ExecutionSpec {
            files_field: "files".to_string(),
            extensions: vec![".scm".to_string()],
            harness: Harness {
                interpreter: "guile".to_string(),
                suffix: ".scm".to_string(),
                source: FIB_HARNESS.to_string(),
                success_marker: "All tests passed!".to_string(),
            },
        }),
    })
}

fn country() -> UseCase {
    let contract = SchemaContract::new(
        "country",
        vec![
            FieldSpec::required("name", FieldKind::String),
            FieldSpec::required("capital", FieldKind::String),
            FieldSpec::required("languages", FieldKind::Array(Box::new(FieldKind::String))),
        ],
    );

    let rules = RuleTable::new()
        .field("name", vec![Rule::min_length(1, "Country name is empty")])
        .field("capital", vec![Rule::min_length(1, "Capital is empty")])
        .field(
            "languages",
            vec![Rule::min_length(1, "At least one language is required")],
        );

    UseCase {
        name: COUNTRY.to_string(),
        description: "Country fact sheet (name, capital, languages)".to_string(),
        prompt: "Tell me about Canada.".to_string(),
        contract,
        rules,
        execution: None,
    }
}
