//! Path-tracking walker over untyped JSON.
//!
//! The checker never stops at the first problem: every accessor records an
//! issue under the current field path and returns `None`, so a single pass
//! over a record enumerates every violated constraint.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::ops::RangeInclusive;

use super::Pin;

/// What went wrong at a given field path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueKind {
    MissingKey,
    TypeMismatch { expected: String, found: String },
    OutOfRange { message: String },
    InvalidEnum { value: String, allowed: Vec<String> },
    Refinement { message: String },
    Malformed { message: String },
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::MissingKey => write!(f, "required key is missing"),
            IssueKind::TypeMismatch { expected, found } => {
                write!(f, "expected {}, found {}", expected, found)
            }
            IssueKind::OutOfRange { message } => write!(f, "out of range: {}", message),
            IssueKind::InvalidEnum { value, allowed } => {
                write!(f, "'{}' is not one of [{}]", value, allowed.join(", "))
            }
            IssueKind::Refinement { message } => write!(f, "{}", message),
            IssueKind::Malformed { message } => write!(f, "malformed record: {}", message),
        }
    }
}

/// A single violated constraint, located by a dotted/indexed path such as
/// `products[1].heatingRelays[0].pin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub path: String,
    #[serde(flatten)]
    pub kind: IssueKind,
}

impl FieldIssue {
    pub fn new(path: impl Into<String>, kind: IssueKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "<root>: {}", self.kind)
        } else {
            write!(f, "{}: {}", self.path, self.kind)
        }
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Issue collector used by every record's shape check.
#[derive(Debug, Default)]
pub struct Checker {
    path: Vec<Segment>,
    issues: Vec<FieldIssue>,
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Checker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues(&self) -> &[FieldIssue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<FieldIssue> {
        self.issues
    }

    /// Current location rendered as `a.b[2].c`.
    pub fn path(&self) -> String {
        let mut out = String::new();
        for segment in &self.path {
            match segment {
                Segment::Key(key) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(key);
                }
                Segment::Index(i) => {
                    out.push_str(&format!("[{}]", i));
                }
            }
        }
        out
    }

    pub fn report(&mut self, kind: IssueKind) {
        let path = self.path();
        self.issues.push(FieldIssue::new(path, kind));
    }

    /// Record a cross-field refinement failure at the current path.
    pub fn refine(&mut self, message: impl Into<String>) {
        self.report(IssueKind::Refinement {
            message: message.into(),
        });
    }

    fn mismatch(&mut self, expected: &str, found: &Value) {
        self.report(IssueKind::TypeMismatch {
            expected: expected.to_string(),
            found: json_type_name(found).to_string(),
        });
    }

    /// Run `f` with `key` appended to the current path.
    pub fn at<R>(&mut self, key: &str, f: impl FnOnce(&mut Self) -> R) -> R {
        self.path.push(Segment::Key(key.to_string()));
        let result = f(self);
        self.path.pop();
        result
    }

    fn at_index<R>(&mut self, index: usize, f: impl FnOnce(&mut Self) -> R) -> R {
        self.path.push(Segment::Index(index));
        let result = f(self);
        self.path.pop();
        result
    }

    pub fn object<'v>(&mut self, value: &'v Value) -> Option<&'v Map<String, Value>> {
        match value {
            Value::Object(map) => Some(map),
            other => {
                self.mismatch("object", other);
                None
            }
        }
    }

    /// Fetch a required key, reporting `MissingKey` under the key's path.
    pub fn required<'v>(&mut self, obj: &'v Map<String, Value>, key: &str) -> Option<&'v Value> {
        match obj.get(key) {
            Some(value) => Some(value),
            None => {
                self.at(key, |c| c.report(IssueKind::MissingKey));
                None
            }
        }
    }

    /// Required, non-empty string.
    pub fn string<'v>(&mut self, obj: &'v Map<String, Value>, key: &str) -> Option<&'v str> {
        let value = self.required(obj, key)?;
        self.at(key, |c| c.string_value(value))
    }

    pub fn optional_string<'v>(
        &mut self,
        obj: &'v Map<String, Value>,
        key: &str,
    ) -> Option<&'v str> {
        let value = obj.get(key)?;
        self.at(key, |c| c.string_value(value))
    }

    fn string_value<'v>(&mut self, value: &'v Value) -> Option<&'v str> {
        match value {
            Value::String(s) if s.trim().is_empty() => {
                self.report(IssueKind::OutOfRange {
                    message: "must not be empty".to_string(),
                });
                None
            }
            Value::String(s) => Some(s.as_str()),
            other => {
                self.mismatch("string", other);
                None
            }
        }
    }

    /// Required string restricted to `allowed`.
    pub fn one_of<'v>(
        &mut self,
        obj: &'v Map<String, Value>,
        key: &str,
        allowed: &[&str],
    ) -> Option<&'v str> {
        let value = self.string(obj, key)?;
        if allowed.contains(&value) {
            Some(value)
        } else {
            self.at(key, |c| {
                c.report(IssueKind::InvalidEnum {
                    value: value.to_string(),
                    allowed: allowed.iter().map(|s| s.to_string()).collect(),
                })
            });
            None
        }
    }

    pub fn boolean(&mut self, obj: &Map<String, Value>, key: &str) -> Option<bool> {
        let value = self.required(obj, key)?;
        self.at(key, |c| c.boolean_value(value))
    }

    pub fn optional_boolean(&mut self, obj: &Map<String, Value>, key: &str) -> Option<bool> {
        match obj.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => self.at(key, |c| c.boolean_value(value)),
        }
    }

    /// Absent is fine (the field has a default); `null` is not a boolean.
    pub fn defaulted_boolean(&mut self, obj: &Map<String, Value>, key: &str) -> Option<bool> {
        let value = obj.get(key)?;
        self.at(key, |c| c.boolean_value(value))
    }

    fn boolean_value(&mut self, value: &Value) -> Option<bool> {
        match value {
            Value::Bool(b) => Some(*b),
            other => {
                self.mismatch("boolean", other);
                None
            }
        }
    }

    /// Required unsigned integer within `range`.
    pub fn uint_in(
        &mut self,
        obj: &Map<String, Value>,
        key: &str,
        range: RangeInclusive<u64>,
    ) -> Option<u64> {
        let value = self.required(obj, key)?;
        self.at(key, |c| c.uint_value(value, &range))
    }

    pub fn optional_uint_in(
        &mut self,
        obj: &Map<String, Value>,
        key: &str,
        range: RangeInclusive<u64>,
    ) -> Option<u64> {
        match obj.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => self.at(key, |c| c.uint_value(value, &range)),
        }
    }

    pub(crate) fn uint_value(&mut self, value: &Value, range: &RangeInclusive<u64>) -> Option<u64> {
        let Value::Number(number) = value else {
            self.mismatch("integer", value);
            return None;
        };
        if let Some(n) = number.as_u64() {
            if range.contains(&n) {
                return Some(n);
            }
            self.report(IssueKind::OutOfRange {
                message: format!(
                    "{} is outside {}..={}",
                    n,
                    range.start(),
                    range.end()
                ),
            });
            return None;
        }
        if number.as_i64().is_some() {
            self.report(IssueKind::OutOfRange {
                message: format!("{} is negative", number),
            });
        } else {
            self.report(IssueKind::TypeMismatch {
                expected: "integer".to_string(),
                found: format!("number {}", number),
            });
        }
        None
    }

    /// Required GPIO pin: a positive integer.
    pub fn pin(&mut self, obj: &Map<String, Value>, key: &str) -> Option<Pin> {
        let value = self.required(obj, key)?;
        self.at(key, |c| c.pin_value(value))
    }

    /// Optional GPIO pin: may be absent, but `null` is not accepted.
    pub fn optional_pin(&mut self, obj: &Map<String, Value>, key: &str) -> Option<Pin> {
        let value = obj.get(key)?;
        self.at(key, |c| c.pin_value(value))
    }

    /// Nullable GPIO pin slot: absent and `null` both mean "not wired".
    pub fn nullable_pin(&mut self, obj: &Map<String, Value>, key: &str) -> Option<Pin> {
        match obj.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => self.at(key, |c| c.pin_value(value)),
        }
    }

    pub(crate) fn pin_value(&mut self, value: &Value) -> Option<Pin> {
        self.uint_value(value, &(1..=Pin::MAX as u64))
            .map(|n| n as Pin)
    }

    pub fn array<'v>(&mut self, obj: &'v Map<String, Value>, key: &str) -> Option<&'v [Value]> {
        let value = self.required(obj, key)?;
        self.at(key, |c| c.array_value(value))
    }

    pub fn optional_array<'v>(
        &mut self,
        obj: &'v Map<String, Value>,
        key: &str,
    ) -> Option<&'v [Value]> {
        let value = obj.get(key)?;
        self.at(key, |c| c.array_value(value))
    }

    fn array_value<'v>(&mut self, value: &'v Value) -> Option<&'v [Value]> {
        match value {
            Value::Array(items) => Some(items.as_slice()),
            other => {
                self.mismatch("array", other);
                None
            }
        }
    }

    /// Enforce a maximum entry count on an array found under `key`.
    pub fn max_len(&mut self, key: &str, items: &[Value], max: usize) {
        if items.len() > max {
            self.at(key, |c| {
                c.report(IssueKind::OutOfRange {
                    message: format!("{} entries, at most {} allowed", items.len(), max),
                })
            });
        }
    }

    /// Visit each element of the array under `key`, indexing the path.
    pub fn each<'v>(
        &mut self,
        key: &str,
        items: &'v [Value],
        mut f: impl FnMut(&mut Self, &'v Value),
    ) {
        self.at(key, |c| {
            for (i, item) in items.iter().enumerate() {
                c.at_index(i, |c| f(c, item));
            }
        });
    }

    /// Array of non-empty strings.
    pub fn string_list<'v>(
        &mut self,
        obj: &'v Map<String, Value>,
        key: &str,
        required: bool,
    ) -> Vec<&'v str> {
        let items = if required {
            self.array(obj, key)
        } else {
            self.optional_array(obj, key)
        };
        let mut out = Vec::new();
        if let Some(items) = items {
            self.each(key, items, |c, item| {
                if let Some(s) = c.string_value(item) {
                    out.push(s);
                }
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_rendering() {
        let mut c = Checker::new();
        c.at("products", |c| {
            c.at_index(2, |c| c.at("pin", |c| c.report(IssueKind::MissingKey)))
        });
        assert_eq!(c.issues()[0].path, "products[2].pin");
    }

    #[test]
    fn test_collects_every_issue() {
        let value = json!({ "a": "x", "pin": 0, "flag": "yes" });
        let obj = value.as_object().unwrap();
        let mut c = Checker::new();
        c.string(obj, "missing");
        c.pin(obj, "pin");
        c.boolean(obj, "flag");
        let issues = c.into_issues();
        assert_eq!(issues.len(), 3);
        assert_eq!(issues[0].kind, IssueKind::MissingKey);
        assert!(matches!(issues[1].kind, IssueKind::OutOfRange { .. }));
        assert!(matches!(issues[2].kind, IssueKind::TypeMismatch { .. }));
    }

    #[test]
    fn test_pin_rejects_negative_and_fractional() {
        let value = json!({ "a": -4, "b": 4.5, "c": null });
        let obj = value.as_object().unwrap();
        let mut c = Checker::new();
        assert_eq!(c.pin(obj, "a"), None);
        assert_eq!(c.pin(obj, "b"), None);
        assert_eq!(c.nullable_pin(obj, "c"), None);
        assert_eq!(c.issues().len(), 2);
    }

    #[test]
    fn test_enum_violation_lists_allowed_values() {
        let value = json!({ "type": "blinking" });
        let obj = value.as_object().unwrap();
        let mut c = Checker::new();
        c.one_of(obj, "type", &["status", "indicator"]);
        let message = c.issues()[0].to_string();
        assert!(message.contains("blinking"));
        assert!(message.contains("status, indicator"));
    }
}
