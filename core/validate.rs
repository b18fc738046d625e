// Field-level validation of JSON objects exchanged with the EXL server.
//
// Every field of an object is checked before validation fails, so a malformed
// message yields one violation per bad field instead of stopping at the first.
use serde::de::DeserializeOwned;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::ops::RangeInclusive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Missing,
    WrongType,
    NotInSet,
    OutOfRange,
}

/// One field that failed its constraint.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{}: {msg}", .loc.join("."))]
pub struct Violation {
    pub kind: ViolationKind,
    /// Path from the message root to the offending field.
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
}

impl Violation {
    pub fn missing(loc: Vec<String>) -> Self {
        Violation {
            kind: ViolationKind::Missing,
            loc,
            msg: "field required".to_string(),
            input: None,
        }
    }

    pub fn wrong_type(loc: Vec<String>, msg: impl Into<String>, input: Value) -> Self {
        Violation {
            kind: ViolationKind::WrongType,
            loc,
            msg: msg.into(),
            input: Some(input),
        }
    }

    pub fn not_in_set(loc: Vec<String>, allowed: &[&str], input: Value) -> Self {
        let allowed: Vec<String> = allowed.iter().map(|name| format!("'{}'", name)).collect();
        Violation {
            kind: ViolationKind::NotInSet,
            loc,
            msg: format!("input should be one of {}", allowed.join(", ")),
            input: Some(input),
        }
    }

    pub fn out_of_range(loc: Vec<String>, msg: impl Into<String>, input: Value) -> Self {
        Violation {
            kind: ViolationKind::OutOfRange,
            loc,
            msg: msg.into(),
            input: Some(input),
        }
    }

    /// Dotted field path, e.g. `user.id`.
    pub fn field(&self) -> String {
        self.loc.join(".")
    }
}

fn describe(errors: &[Violation]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A message that did not match its expected shape.
///
/// Serializes as `{"response": "exception", "errors": [...], "input": ...}` so
/// it can be printed or logged next to ordinary server responses.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{} validation error(s): {}", .errors.len(), describe(.errors))]
pub struct ValidationError {
    pub errors: Vec<Violation>,
    /// The raw object that failed, when validation started from JSON.
    pub input: Option<Value>,
}

impl ValidationError {
    pub fn new(errors: Vec<Violation>) -> Self {
        ValidationError { errors, input: None }
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }
}

impl From<Violation> for ValidationError {
    fn from(violation: Violation) -> Self {
        ValidationError::new(vec![violation])
    }
}

impl Serialize for ValidationError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ValidationError", 3)?;
        state.serialize_field("response", "exception")?;
        state.serialize_field("errors", &self.errors)?;
        match &self.input {
            Some(input) => state.serialize_field("input", input)?,
            None => state.skip_field("input")?,
        }
        state.end()
    }
}

/// Builds a typed value out of a JSON object, reporting through [`Fields`].
///
/// Implementations must read every field before combining the results with
/// `?`, otherwise later violations go unreported.
pub trait FromFields: Sized {
    fn from_fields(fields: &mut Fields<'_>) -> Option<Self>;
}

/// Cursor over one JSON object that records violations as fields are read.
pub struct Fields<'a> {
    map: &'a Map<String, Value>,
    path: Vec<String>,
    errors: Vec<Violation>,
}

impl<'a> Fields<'a> {
    pub fn new(map: &'a Map<String, Value>) -> Self {
        Fields {
            map,
            path: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn loc(&self, name: &str) -> Vec<String> {
        let mut loc = self.path.clone();
        loc.push(name.to_string());
        loc
    }

    /// Raw value of a field; JSON `null` counts as absent.
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.map.get(name).filter(|v| !v.is_null())
    }

    pub fn push(&mut self, violation: Violation) {
        self.errors.push(violation);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn required<T: DeserializeOwned>(&mut self, name: &str) -> Option<T> {
        match self.map.get(name) {
            None => {
                self.push(Violation::missing(self.loc(name)));
                None
            }
            Some(value) => self.convert(name, value),
        }
    }

    pub fn optional<T: DeserializeOwned>(&mut self, name: &str) -> Option<Option<T>> {
        match self.get(name) {
            None => Some(None),
            Some(value) => self.convert(name, value).map(Some),
        }
    }

    pub fn required_nested<T: FromFields>(&mut self, name: &str) -> Option<T> {
        match self.map.get(name) {
            None => {
                self.push(Violation::missing(self.loc(name)));
                None
            }
            Some(Value::Object(inner)) => self.descend(name, inner),
            Some(other) => {
                let violation =
                    Violation::wrong_type(self.loc(name), "input should be an object", other.clone());
                self.push(violation);
                None
            }
        }
    }

    /// Required number that must also lie within `range`.
    pub fn bounded<T>(&mut self, name: &str, range: RangeInclusive<f64>) -> Option<T>
    where
        T: DeserializeOwned + Copy + Serialize,
    {
        let value: T = self.required(name)?;
        let as_f64 = serde_json::to_value(value).ok().and_then(|v| v.as_f64());
        match as_f64 {
            Some(n) if range.contains(&n) => Some(value),
            _ => {
                let msg = format!(
                    "input should be between {} and {}",
                    range.start(),
                    range.end()
                );
                let input = self.map.get(name).cloned().unwrap_or(Value::Null);
                self.push(Violation::out_of_range(self.loc(name), msg, input));
                None
            }
        }
    }

    /// Every field except the listed ones, as a raw map.
    pub fn remaining(&self, skip: &[&str]) -> Map<String, Value> {
        self.map
            .iter()
            .filter(|(k, _)| !skip.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn descend<T: FromFields>(&mut self, name: &str, inner: &'a Map<String, Value>) -> Option<T> {
        let mut child = Fields {
            map: inner,
            path: self.loc(name),
            errors: Vec::new(),
        };
        let value = T::from_fields(&mut child);
        let clean = child.errors.is_empty();
        self.errors.append(&mut child.errors);
        if clean {
            value
        } else {
            None
        }
    }

    fn convert<T: DeserializeOwned>(&mut self, name: &str, value: &Value) -> Option<T> {
        match serde_json::from_value(value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                let msg = e.to_string();
                let violation = if msg.starts_with("unknown variant") {
                    Violation {
                        kind: ViolationKind::NotInSet,
                        loc: self.loc(name),
                        msg,
                        input: Some(value.clone()),
                    }
                } else {
                    Violation::wrong_type(self.loc(name), msg, value.clone())
                };
                self.push(violation);
                None
            }
        }
    }
}

/// Validate a JSON value as `T`, all-or-nothing.
pub fn validate<T: FromFields>(value: &Value) -> Result<T, ValidationError> {
    let Some(map) = value.as_object() else {
        let violation = Violation::wrong_type(Vec::new(), "input should be an object", value.clone());
        return Err(ValidationError::from(violation).with_input(value.clone()));
    };

    let mut fields = Fields::new(map);
    let parsed = T::from_fields(&mut fields);
    match parsed {
        Some(parsed) if !fields.has_errors() => Ok(parsed),
        _ => {
            let mut errors = fields.errors;
            if errors.is_empty() {
                errors.push(Violation::wrong_type(Vec::new(), "unrecognized message", value.clone()));
            }
            Err(ValidationError::new(errors).with_input(value.clone()))
        }
    }
}
