//! Declarative tool input schemas and the generic validator that interprets them.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingRequiredField(String),
    #[error("field '{field}' must be {expected}, got {found}")]
    SchemaViolation {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl ValidationError {
    /// Stable snake_case reason used in structured error payloads.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingRequiredField(_) => "missing_required_field",
            Self::SchemaViolation { .. } => "schema_violation",
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Self::MissingRequiredField(field) => field,
            Self::SchemaViolation { field, .. } => field,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }

    /// Coerce a raw JSON value to this type, or `None` if it cannot be.
    fn coerce(self, raw: &Value) -> Option<Value> {
        match (self, raw) {
            (Self::String, Value::String(_)) => Some(raw.clone()),
            (Self::String, Value::Number(n)) => Some(Value::String(n.to_string())),
            (Self::String, Value::Bool(b)) => Some(Value::String(b.to_string())),

            (Self::Integer, Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    Some(json!(i))
                } else {
                    // Integral floats such as 5.0 are accepted.
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                        .map(|f| json!(f as i64))
                }
            }
            (Self::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(|i| json!(i)),

            (Self::Number, Value::Number(_)) => Some(raw.clone()),
            (Self::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(|f| json!(f)),

            (Self::Boolean, Value::Bool(_)) => Some(raw.clone()),
            (Self::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },

            _ => None,
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One declared input field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
    pub required: bool,
    pub default: Option<Value>,
    pub description: String,
    /// Advertised to the client as `enum`; membership is not enforced here.
    pub allowed: Vec<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            default: None,
            description: String::new(),
            allowed: Vec::new(),
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Number)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = values.into_iter().map(Into::into).collect();
        self
    }

    fn to_json_schema(&self) -> Value {
        let mut prop = Map::new();
        prop.insert("type".into(), json!(self.ty.as_str()));
        if !self.description.is_empty() {
            prop.insert("description".into(), json!(self.description));
        }
        if let Some(default) = &self.default {
            prop.insert("default".into(), default.clone());
        }
        if !self.allowed.is_empty() {
            prop.insert("enum".into(), json!(self.allowed));
        }
        Value::Object(prop)
    }
}

/// Accepted input shape of a tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSchema {
    fields: Vec<Field>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Render as the JSON Schema object advertised in `tools/list`.
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.to_json_schema()))
            .collect();

        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required && f.default.is_none())
            .map(|f| f.name.as_str())
            .collect();

        let mut schema = Map::new();
        schema.insert("type".into(), json!("object"));
        schema.insert("properties".into(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".into(), json!(required));
        }
        Value::Object(schema)
    }

    /// Compile the rendered schema to make sure clients receive a well-formed
    /// JSON Schema document.
    pub fn check(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(format!("duplicate field '{}'", field.name));
            }
            if let Some(default) = &field.default {
                if field.ty.coerce(default).is_none() {
                    return Err(format!(
                        "default for '{}' is not a valid {}",
                        field.name,
                        field.ty.as_str()
                    ));
                }
            }
        }

        jsonschema::validator_for(&self.to_json_schema())
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    /// Validate raw call arguments, producing coerced input with defaults
    /// substituted. Unknown fields are ignored.
    pub fn validate(&self, raw: Option<&Value>) -> Result<ValidatedInput, ValidationError> {
        let empty = Map::new();
        let args = match raw {
            None | Some(Value::Null) => &empty,
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(ValidationError::SchemaViolation {
                    field: "arguments".into(),
                    expected: "object",
                    found: json_kind(other),
                })
            }
        };

        let mut values = BTreeMap::new();
        for field in &self.fields {
            match args.get(&field.name).filter(|v| !v.is_null()) {
                Some(raw_value) => {
                    let coerced = field.ty.coerce(raw_value).ok_or_else(|| {
                        ValidationError::SchemaViolation {
                            field: field.name.clone(),
                            expected: field.ty.as_str(),
                            found: json_kind(raw_value),
                        }
                    })?;
                    values.insert(field.name.clone(), coerced);
                }
                None => {
                    if let Some(default) = &field.default {
                        values.insert(field.name.clone(), default.clone());
                    } else if field.required {
                        return Err(ValidationError::MissingRequiredField(field.name.clone()));
                    }
                }
            }
        }

        Ok(ValidatedInput { values })
    }
}

/// Arguments that passed validation, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedInput {
    values: BTreeMap<String, Value>,
}

impl ValidatedInput {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.values.get(name).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.values.get(name).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.values.get(name).and_then(Value::as_bool)
    }

    /// Decode into a typed input struct.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let map: Map<String, Value> = self.values.clone().into_iter().collect();
        serde_json::from_value(Value::Object(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search_schema() -> InputSchema {
        InputSchema::new()
            .field(Field::string("query").required().describe("Search keyword"))
            .field(Field::integer("page").default_value(1))
            .field(Field::integer("per_page").default_value(10))
            .field(Field::boolean("featured"))
            .field(Field::number("ratio"))
    }

    #[test]
    fn missing_required_field_is_reported_by_name() {
        let err = search_schema().validate(Some(&json!({}))).unwrap_err();
        assert_eq!(err, ValidationError::MissingRequiredField("query".into()));
        assert_eq!(err.reason(), "missing_required_field");
    }

    #[test]
    fn absent_arguments_behave_like_empty_object() {
        let err = search_schema().validate(None).unwrap_err();
        assert!(matches!(err, ValidationError::MissingRequiredField(f) if f == "query"));

        let schema = InputSchema::new().field(Field::integer("count").default_value(1));
        let input = schema.validate(None).unwrap();
        assert_eq!(input.get_i64("count"), Some(1));
    }

    #[test]
    fn defaults_are_substituted_and_optional_fields_stay_absent() {
        let input = search_schema().validate(Some(&json!({"query": "cats"}))).unwrap();
        assert_eq!(input.get_str("query"), Some("cats"));
        assert_eq!(input.get_i64("page"), Some(1));
        assert_eq!(input.get_i64("per_page"), Some(10));
        assert!(!input.contains("featured"));
    }

    #[test]
    fn null_counts_as_absent() {
        let input = search_schema()
            .validate(Some(&json!({"query": "cats", "page": null})))
            .unwrap();
        assert_eq!(input.get_i64("page"), Some(1));
    }

    #[test]
    fn coerces_string_numerals_and_booleans() {
        let input = search_schema()
            .validate(Some(&json!({
                "query": "dogs",
                "page": "3",
                "per_page": 25.0,
                "featured": "true",
                "ratio": "1.5"
            })))
            .unwrap();
        assert_eq!(input.get_i64("page"), Some(3));
        assert_eq!(input.get_i64("per_page"), Some(25));
        assert_eq!(input.get_bool("featured"), Some(true));
        assert_eq!(input.get_f64("ratio"), Some(1.5));
    }

    #[test]
    fn numbers_coerce_to_strings() {
        let schema = InputSchema::new().field(Field::string("photoId").required());
        let input = schema.validate(Some(&json!({"photoId": 42}))).unwrap();
        assert_eq!(input.get_str("photoId"), Some("42"));
    }

    #[test]
    fn uncoercible_values_are_schema_violations() {
        let err = search_schema()
            .validate(Some(&json!({"query": "x", "page": "two"})))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::SchemaViolation {
                field: "page".into(),
                expected: "integer",
                found: "string",
            }
        );

        let err = search_schema()
            .validate(Some(&json!({"query": ["a", "b"]})))
            .unwrap_err();
        assert_eq!(err.field(), "query");
        assert_eq!(err.reason(), "schema_violation");

        let err = search_schema()
            .validate(Some(&json!({"query": "x", "page": 2.5})))
            .unwrap_err();
        assert_eq!(err.field(), "page");
    }

    #[test]
    fn non_object_arguments_are_rejected() {
        let err = search_schema().validate(Some(&json!([1, 2]))).unwrap_err();
        assert_eq!(err.field(), "arguments");
    }

    #[test]
    fn extra_fields_are_ignored() {
        let input = search_schema()
            .validate(Some(&json!({"query": "cats", "unexpected": {"deep": true}})))
            .unwrap();
        assert!(!input.contains("unexpected"));
    }

    #[test]
    fn numeric_bounds_are_not_enforced() {
        let input = search_schema()
            .validate(Some(&json!({"query": "cats", "per_page": 500})))
            .unwrap();
        assert_eq!(input.get_i64("per_page"), Some(500));
    }

    #[test]
    fn renders_json_schema() {
        let schema = InputSchema::new()
            .field(Field::string("query").required().describe("Search keyword"))
            .field(
                Field::string("order_by")
                    .default_value("relevant")
                    .one_of(["relevant", "latest"]),
            );

        assert_eq!(
            schema.to_json_schema(),
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Search keyword"},
                    "order_by": {
                        "type": "string",
                        "default": "relevant",
                        "enum": ["relevant", "latest"]
                    }
                },
                "required": ["query"]
            })
        );
        assert!(schema.check().is_ok());
    }

    #[test]
    fn check_rejects_bad_declarations() {
        let dup = InputSchema::new()
            .field(Field::string("a"))
            .field(Field::integer("a"));
        assert!(dup.check().is_err());

        let bad_default = InputSchema::new().field(Field::integer("n").default_value("many"));
        assert!(bad_default.check().is_err());
    }

    #[test]
    fn deserializes_into_typed_input() {
        #[derive(serde::Deserialize)]
        struct Input {
            query: String,
            page: i64,
            featured: Option<bool>,
        }

        let input: Input = search_schema()
            .validate(Some(&json!({"query": "owls"})))
            .unwrap()
            .deserialize()
            .unwrap();
        assert_eq!(input.query, "owls");
        assert_eq!(input.page, 1);
        assert!(input.featured.is_none());
    }
}
