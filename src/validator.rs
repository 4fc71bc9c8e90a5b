//! Content rules evaluated after the structural pass.
//!
//! Rules are plain data: a [`RuleTable`] maps a field path to an ordered rule
//! list and a generic runner evaluates it. Keyword rules are heuristics, so
//! each use case declares its own table instead of hard-coding checks.

use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

use crate::schema::{value_type, FieldKind, FieldSpec, SchemaContract};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    String,
    Array,
    Object,
}

#[derive(Debug, Clone)]
pub enum Rule {
    /// Value must have this JSON shape.
    Shape(Shape),

    /// Trimmed string length (or array length) must be at least `min`.
    MinLength { min: usize, message: String },

    /// Trimmed string must end with one of the listed suffixes.
    AllowedExtensions(Vec<String>),

    /// Every token must appear; the first missing token's message is reported.
    RequireAll(Vec<(String, String)>),

    /// At least one token must appear.
    RequireAny {
        tokens: Vec<String>,
        case_insensitive: bool,
        message: String,
    },

    /// Regex must match somewhere in the string.
    Pattern { regex: Regex, message: String },
}

impl Rule {
    pub fn min_length(min: usize, message: &str) -> Self {
        Rule::MinLength {
            min,
            message: message.to_string(),
        }
    }

    pub fn extensions(exts: &[&str]) -> Self {
        Rule::AllowedExtensions(exts.iter().map(|e| e.to_string()).collect())
    }

    pub fn require_all(tokens: &[(&str, &str)]) -> Self {
        Rule::RequireAll(
            tokens
                .iter()
                .map(|(t, m)| (t.to_string(), m.to_string()))
                .collect(),
        )
    }

    pub fn require_any(tokens: &[&str], case_insensitive: bool, message: &str) -> Self {
        Rule::RequireAny {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            case_insensitive,
            message: message.to_string(),
        }
    }

    pub fn pattern(pattern: &str, message: &str) -> Result<Self, regex::Error> {
        Ok(Rule::Pattern {
            regex: Regex::new(pattern)?,
            message: message.to_string(),
        })
    }

    fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            Rule::Shape(shape) => {
                let ok = match shape {
                    Shape::String => value.is_string(),
                    Shape::Array => value.is_array(),
                    Shape::Object => value.is_object(),
                };
                if ok {
                    Ok(())
                } else {
                    Err(format!("expected {:?}, got {}", shape, value_type(value)).to_lowercase())
                }
            }
            Rule::MinLength { min, message } => {
                let len = match value {
                    Value::String(s) => s.trim().chars().count(),
                    Value::Array(items) => items.len(),
                    other => return Err(format!("expected string, got {}", value_type(other))),
                };
                if len < *min {
                    Err(message.clone())
                } else {
                    Ok(())
                }
            }
            Rule::AllowedExtensions(exts) => {
                let text = as_text(value)?;
                let name = text.trim();
                if exts.iter().any(|ext| name.ends_with(ext.as_str())) {
                    Ok(())
                } else {
                    Err(format!(
                        "Filename must end with one of {:?} (got {:?})",
                        exts, name
                    ))
                }
            }
            Rule::RequireAll(tokens) => {
                let text = as_text(value)?;
                match tokens.iter().find(|(token, _)| !text.contains(token.as_str())) {
                    Some((_, message)) => Err(message.clone()),
                    None => Ok(()),
                }
            }
            Rule::RequireAny {
                tokens,
                case_insensitive,
                message,
            } => {
                let text = as_text(value)?;
                let haystack = if *case_insensitive {
                    text.to_lowercase()
                } else {
                    text.to_string()
                };
                let found = tokens.iter().any(|t| {
                    if *case_insensitive {
                        haystack.contains(&t.to_lowercase())
                    } else {
                        haystack.contains(t.as_str())
                    }
                });
                if found {
                    Ok(())
                } else {
                    Err(message.clone())
                }
            }
            Rule::Pattern { regex, message } => {
                if regex.is_match(as_text(value)?) {
                    Ok(())
                } else {
                    Err(message.clone())
                }
            }
        }
    }
}

fn as_text(value: &Value) -> Result<&str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("expected string, got {}", value_type(value)))
}

/// Restricts a rule set to items whose sibling filename has one of the
/// given extensions (content keywords only make sense for executable files).
#[derive(Debug, Clone)]
pub struct Guard {
    pub sibling: String,
    pub extensions: Vec<String>,
}

impl Guard {
    pub fn sibling_extension(sibling: &str, exts: &[&str]) -> Self {
        Self {
            sibling: sibling.to_string(),
            extensions: exts.iter().map(|e| e.to_string()).collect(),
        }
    }

    fn applies(&self, parent: &Map<String, Value>) -> bool {
        parent
            .get(&self.sibling)
            .and_then(Value::as_str)
            .map(|name| {
                let name = name.trim();
                self.extensions.iter().any(|ext| name.ends_with(ext.as_str()))
            })
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct FieldRules {
    /// Field path, `files[].contents` style.
    pub path: String,
    pub guard: Option<Guard>,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    entries: Vec<FieldRules>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, path: &str, rules: Vec<Rule>) -> Self {
        self.entries.push(FieldRules {
            path: path.to_string(),
            guard: None,
            rules,
        });
        self
    }

    pub fn guarded(mut self, path: &str, guard: Guard, rules: Vec<Rule>) -> Self {
        self.entries.push(FieldRules {
            path: path.to_string(),
            guard: Some(guard),
            rules,
        });
        self
    }

    pub fn entries(&self) -> &[FieldRules] {
        &self.entries
    }

    fn for_path<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a FieldRules> + 'a {
        self.entries.iter().filter(move |e| e.path == path)
    }

    fn has_path(&self, path: &str) -> bool {
        self.for_path(path).next().is_some()
    }

    /// Every rule path (and guard sibling) must exist in the contract.
    pub fn check_against(&self, contract: &SchemaContract) -> Result<(), Vec<String>> {
        let mut unknown = Vec::new();
        for entry in &self.entries {
            if !contract.has_path(&entry.path) {
                unknown.push(entry.path.clone());
            }
            if let Some(guard) = &entry.guard {
                // Array items have no sibling fields to test.
                if entry.path.ends_with("[]") {
                    unknown.push(format!("{} (guard on array item)", entry.path));
                    continue;
                }
                let sibling = match entry.path.rsplit_once('.') {
                    Some((parent, _)) => format!("{}.{}", parent, guard.sibling),
                    None => guard.sibling.clone(),
                };
                if !contract.has_path(&sibling) {
                    unknown.push(sibling);
                }
            }
        }
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(unknown)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Invalid(String),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ValidationOutcome::Valid => None,
            ValidationOutcome::Invalid(msg) => Some(msg),
        }
    }
}

/// Outcome for one concrete field, e.g. `files[1].filename`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOutcome {
    pub path: String,
    pub outcome: ValidationOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFailure {
    pub path: String,
    pub message: String,
}

impl fmt::Display for FieldFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadOutcome {
    pub fields: Vec<FieldOutcome>,
}

impl PayloadOutcome {
    pub fn is_valid(&self) -> bool {
        self.fields.iter().all(|f| f.outcome.is_valid())
    }

    pub fn failures(&self) -> Vec<FieldFailure> {
        self.fields
            .iter()
            .filter_map(|f| {
                f.outcome.message().map(|m| FieldFailure {
                    path: f.path.clone(),
                    message: m.to_string(),
                })
            })
            .collect()
    }

    fn push(&mut self, path: String, outcome: ValidationOutcome) {
        self.fields.push(FieldOutcome { path, outcome });
    }
}

/// Apply `rules` in order and report the first failure.
pub fn validate_field(name: &str, value: &Value, rules: &[Rule]) -> ValidationOutcome {
    for rule in rules {
        if let Err(message) = rule.check(value) {
            debug!("Field {} failed rule {:?}: {}", name, rule, message);
            return ValidationOutcome::Invalid(message);
        }
    }
    ValidationOutcome::Valid
}

pub struct ContentValidator {
    table: RuleTable,
}

impl ContentValidator {
    pub fn new(table: RuleTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    /// Walk the payload along the contract and run every rule whose path is
    /// reached: top-level fields, nested object fields, and array items.
    /// Sibling fields are all checked; within one array-of-object item the
    /// first failure wins, so one pass surfaces every broken item.
    pub fn validate_payload(
        &self,
        payload: &Map<String, Value>,
        contract: &SchemaContract,
    ) -> PayloadOutcome {
        let mut outcome = PayloadOutcome::default();
        self.walk_object(&mut outcome, contract.fields(), payload, "", "", false);
        outcome
    }

    /// Returns false if any field of this object failed.
    fn walk_object(
        &self,
        outcome: &mut PayloadOutcome,
        fields: &[FieldSpec],
        map: &Map<String, Value>,
        path_prefix: &str,
        rule_prefix: &str,
        stop_at_first: bool,
    ) -> bool {
        let mut ok = true;
        for spec in fields {
            let path = join(path_prefix, &spec.name);
            let rule_path = join(rule_prefix, &spec.name);
            let valid = match present(map, &spec.name) {
                Some(value) => self.walk_value(
                    outcome,
                    &spec.kind,
                    value,
                    &path,
                    &rule_path,
                    Some(map),
                    stop_at_first,
                ),
                None if spec.required => {
                    outcome.push(
                        path,
                        ValidationOutcome::Invalid(format!(
                            "missing required field `{}`",
                            spec.name
                        )),
                    );
                    false
                }
                None => continue,
            };
            if !valid {
                ok = false;
                if stop_at_first {
                    break;
                }
            }
        }
        ok
    }

    #[allow(clippy::too_many_arguments)]
    fn walk_value(
        &self,
        outcome: &mut PayloadOutcome,
        kind: &FieldKind,
        value: &Value,
        path: &str,
        rule_path: &str,
        parent: Option<&Map<String, Value>>,
        stop_at_first: bool,
    ) -> bool {
        let field_outcome = self.check_value(path, rule_path, kind, value, parent);
        let valid = field_outcome.is_valid();
        outcome.push(path.to_string(), field_outcome);
        if !valid {
            return false;
        }

        match (kind, value) {
            (FieldKind::Object(fields), Value::Object(map)) => {
                self.walk_object(outcome, fields, map, path, rule_path, stop_at_first)
            }
            (FieldKind::Array(item), Value::Array(elements)) => {
                let item_rule_path = format!("{}[]", rule_path);
                let is_object = matches!(item.as_ref(), FieldKind::Object(_));
                // Primitive items are only reported when some rule targets them.
                if !is_object && !self.table.has_path(&item_rule_path) {
                    return true;
                }
                let mut ok = true;
                for (i, element) in elements.iter().enumerate() {
                    let item_path = format!("{}[{}]", path, i);
                    ok &= match (item.as_ref(), element) {
                        (FieldKind::Object(fields), Value::Object(map)) => self.walk_object(
                            outcome,
                            fields,
                            map,
                            &item_path,
                            &item_rule_path,
                            true,
                        ),
                        _ => self.walk_value(
                            outcome,
                            item,
                            element,
                            &item_path,
                            &item_rule_path,
                            None,
                            true,
                        ),
                    };
                }
                ok
            }
            _ => true,
        }
    }

    fn check_value(
        &self,
        path: &str,
        rule_path: &str,
        kind: &FieldKind,
        value: &Value,
        parent: Option<&Map<String, Value>>,
    ) -> ValidationOutcome {
        if !kind.matches(value) {
            return ValidationOutcome::Invalid(format!(
                "expected {}, got {}",
                kind.describe(),
                value_type(value)
            ));
        }

        for entry in self.table.for_path(rule_path) {
            if let Some(guard) = &entry.guard {
                if !parent.is_some_and(|p| guard.applies(p)) {
                    continue;
                }
            }
            let result = validate_field(path, value, &entry.rules);
            if !result.is_valid() {
                return result;
            }
        }
        ValidationOutcome::Valid
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn present<'a>(map: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    map.get(name).filter(|v| !v.is_null())
}
