//! Field descriptors for widget-class configuration schemas.
//!
//! A widget class declares an ordered list of named fields. Each field knows
//! how to:
//! - validate a raw JSON value against its kind and constraints
//! - serialize the validated value into the stored configuration document
//! - describe itself as a form-spec fragment for a form-rendering client

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::FieldError;
use crate::JsonMap;

/// One selectable option of a choice or multi-choice field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Choice {
    /// Stored value for the option.
    pub value: Value,
    /// Label shown by the form client.
    pub label: String,
}

impl Choice {
    /// Create a choice from a value and a display label.
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Force a list of plain values into `(index, value)` choice pairs.
///
/// Lists that already carry labels pass through unchanged; a list of bare
/// strings becomes `[(0, s0), (1, s1), ...]`, which is the shape the select
/// component prefers.
pub fn choices_from_values(values: impl IntoIterator<Item = impl Into<String>>) -> Vec<Choice> {
    values
        .into_iter()
        .enumerate()
        .map(|(index, label)| Choice::new(i64::try_from(index).unwrap_or(i64::MAX), label))
        .collect()
}

/// The kind of a field, with kind-specific constraints.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Free text, optionally length-bounded.
    Char {
        max_length: Option<usize>,
        min_length: Option<usize>,
    },
    /// An http(s) URL.
    Url,
    /// Exactly one value out of a choice set.
    Choice { choices: Vec<Choice> },
    /// Any number of values out of a choice set. Validates with set
    /// semantics; serializes to an order-preserving sequence.
    MultiChoice { choices: Vec<Choice> },
    /// A bounded integer.
    Integer {
        min_value: Option<i64>,
        max_value: Option<i64>,
    },
    /// File upload. Declared for schema completeness; uploads are not
    /// implemented.
    File,
}

/// A value that passed field validation but has not been serialized yet.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidatedValue {
    Text(String),
    Url(String),
    Single(Value),
    /// Multi-choice selection. Duplicates are collapsed; first-occurrence
    /// order is retained so serialization stays deterministic.
    Multiple(Vec<Value>),
    Int(i64),
}

/// Immutable per-field metadata: kind, constraints and UI hints.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    kind: FieldKind,
    label: Option<String>,
    required: bool,
    placeholder: Option<String>,
    default: Option<Value>,
    auto_focus: bool,
}

impl FieldDescriptor {
    fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            label: None,
            required: true,
            placeholder: None,
            default: None,
            auto_focus: false,
        }
    }

    /// Free text field.
    pub fn char() -> Self {
        Self::new(FieldKind::Char {
            max_length: None,
            min_length: None,
        })
    }

    /// URL field.
    pub fn url() -> Self {
        Self::new(FieldKind::Url)
    }

    /// Single-choice field over the given options.
    pub fn choice(choices: Vec<Choice>) -> Self {
        Self::new(FieldKind::Choice { choices })
    }

    /// Multi-choice field over the given options.
    pub fn multi_choice(choices: Vec<Choice>) -> Self {
        Self::new(FieldKind::MultiChoice { choices })
    }

    /// Integer field.
    pub fn integer() -> Self {
        Self::new(FieldKind::Integer {
            min_value: None,
            max_value: None,
        })
    }

    /// File field (declared only; uploads are unimplemented).
    pub fn file() -> Self {
        Self::new(FieldKind::File)
    }

    /// Set the maximum length of a char field.
    pub fn with_max_length(mut self, max: usize) -> Self {
        if let FieldKind::Char { max_length, .. } = &mut self.kind {
            *max_length = Some(max);
        }
        self
    }

    /// Set the minimum length of a char field.
    pub fn with_min_length(mut self, min: usize) -> Self {
        if let FieldKind::Char { min_length, .. } = &mut self.kind {
            *min_length = Some(min);
        }
        self
    }

    /// Set the minimum value of an integer field.
    pub fn with_min_value(mut self, min: i64) -> Self {
        if let FieldKind::Integer { min_value, .. } = &mut self.kind {
            *min_value = Some(min);
        }
        self
    }

    /// Set the maximum value of an integer field.
    pub fn with_max_value(mut self, max: i64) -> Self {
        if let FieldKind::Integer { max_value, .. } = &mut self.kind {
            *max_value = Some(max);
        }
        self
    }

    /// Override the display label (defaults to a title-cased field key).
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Mark the field optional.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Set the placeholder UI hint.
    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    /// Set the default value used when an optional field is absent.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Request focus on this field when the form opens.
    pub fn with_auto_focus(mut self) -> Self {
        self.auto_focus = true;
        self
    }

    /// Field kind.
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// True if a value must be supplied.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Choice set of a choice or multi-choice field.
    pub fn choices(&self) -> Option<&[Choice]> {
        match &self.kind {
            FieldKind::Choice { choices } | FieldKind::MultiChoice { choices } => Some(choices),
            _ => None,
        }
    }

    /// Replace the choice set of a choice or multi-choice field.
    ///
    /// No-op for other kinds. Used by widget-class pre-configure hooks that
    /// compute choices dynamically at validation time.
    pub fn set_choices(&mut self, new_choices: Vec<Choice>) {
        match &mut self.kind {
            FieldKind::Choice { choices } | FieldKind::MultiChoice { choices } => {
                *choices = new_choices;
            }
            _ => {}
        }
    }

    /// Validate a raw value for the field named `key`.
    ///
    /// `raw` is the value from the submitted configuration, `None` when the
    /// key was absent. Absent or null optional fields fall back to the
    /// declared default; returns `Ok(None)` when nothing is to be stored.
    pub fn validate(
        &self,
        key: &str,
        raw: Option<&Value>,
    ) -> Result<Option<ValidatedValue>, FieldError> {
        let raw = match raw {
            Some(Value::Null) | None => {
                if let Some(default) = &self.default {
                    return self.validate_present(key, default).map(Some);
                }
                if self.required {
                    return Err(FieldError::new(key, "this field is required"));
                }
                return Ok(None);
            }
            Some(value) => value,
        };
        self.validate_present(key, raw).map(Some)
    }

    fn validate_present(&self, key: &str, raw: &Value) -> Result<ValidatedValue, FieldError> {
        match &self.kind {
            FieldKind::Char {
                max_length,
                min_length,
            } => {
                let text = raw
                    .as_str()
                    .ok_or_else(|| FieldError::new(key, "a string is required"))?;
                let len = text.chars().count();
                if let Some(max) = max_length {
                    if len > *max {
                        return Err(FieldError::new(
                            key,
                            format!("ensure this field has no more than {max} characters"),
                        ));
                    }
                }
                if let Some(min) = min_length {
                    if len < *min {
                        return Err(FieldError::new(
                            key,
                            format!("ensure this field has at least {min} characters"),
                        ));
                    }
                }
                Ok(ValidatedValue::Text(text.to_string()))
            }
            FieldKind::Url => {
                let text = raw
                    .as_str()
                    .ok_or_else(|| FieldError::new(key, "a string is required"))?;
                let parsed = url::Url::parse(text)
                    .map_err(|_| FieldError::new(key, "enter a valid URL"))?;
                if !matches!(parsed.scheme(), "http" | "https") || !parsed.has_host() {
                    return Err(FieldError::new(key, "enter a valid URL"));
                }
                Ok(ValidatedValue::Url(text.to_string()))
            }
            FieldKind::Choice { choices } => {
                if !choices.iter().any(|c| c.value == *raw) {
                    return Err(FieldError::new(key, format!("{raw} is not a valid choice")));
                }
                Ok(ValidatedValue::Single(raw.clone()))
            }
            FieldKind::MultiChoice { choices } => {
                let items = raw
                    .as_array()
                    .ok_or_else(|| FieldError::new(key, "expected a list of items"))?;
                let mut selected: Vec<Value> = Vec::with_capacity(items.len());
                for item in items {
                    if !choices.iter().any(|c| c.value == *item) {
                        return Err(FieldError::new(
                            key,
                            format!("{item} is not a valid choice"),
                        ));
                    }
                    if !selected.contains(item) {
                        selected.push(item.clone());
                    }
                }
                Ok(ValidatedValue::Multiple(selected))
            }
            FieldKind::Integer {
                min_value,
                max_value,
            } => {
                let n = raw
                    .as_i64()
                    .ok_or_else(|| FieldError::new(key, "a valid integer is required"))?;
                if let Some(min) = min_value {
                    if n < *min {
                        return Err(FieldError::new(
                            key,
                            format!("ensure this value is greater than or equal to {min}"),
                        ));
                    }
                }
                if let Some(max) = max_value {
                    if n > *max {
                        return Err(FieldError::new(
                            key,
                            format!("ensure this value is less than or equal to {max}"),
                        ));
                    }
                }
                Ok(ValidatedValue::Int(n))
            }
            FieldKind::File => Err(FieldError::new(key, "file uploads are not implemented")),
        }
    }

    /// Serialize a validated value for the stored configuration document.
    ///
    /// Multi-choice selections become an order-preserving JSON array; sets
    /// are not guaranteed serializable or orderable.
    pub fn serialize(&self, value: ValidatedValue) -> Value {
        match value {
            ValidatedValue::Text(s) | ValidatedValue::Url(s) => Value::String(s),
            ValidatedValue::Single(v) => v,
            ValidatedValue::Multiple(values) => Value::Array(values),
            ValidatedValue::Int(n) => Value::from(n),
        }
    }

    /// Describe the field as a form-spec fragment for the field named `key`.
    pub fn form_spec(&self, key: &str) -> FormFieldSpec {
        let mut props = JsonMap::new();
        let input_type = match &self.kind {
            FieldKind::Char {
                max_length,
                min_length,
            } => {
                props.insert("maxLength".into(), length_prop(*max_length));
                props.insert("minLength".into(), length_prop(*min_length));
                // Short bounded fields render as a single-line input.
                match max_length {
                    Some(max) if *max <= 200 => "text",
                    _ => "textarea",
                }
            }
            FieldKind::Url => {
                props.insert("maxLength".into(), Value::String(String::new()));
                props.insert("minLength".into(), Value::String(String::new()));
                "url"
            }
            FieldKind::Choice { .. } => {
                // Forced off so a single-choice field can never be submitted
                // as multiple. Use a multi-choice field to select several.
                props.insert("isMulti".into(), Value::Bool(false));
                "select"
            }
            FieldKind::MultiChoice { .. } => {
                props.insert("isMulti".into(), Value::Bool(true));
                "select"
            }
            FieldKind::Integer {
                min_value,
                max_value,
            } => {
                if let Some(min) = min_value {
                    props.insert("min".into(), json!(min));
                }
                if let Some(max) = max_value {
                    props.insert("max".into(), json!(max));
                }
                "number"
            }
            FieldKind::File => "file",
        };
        if let Some(placeholder) = &self.placeholder {
            props.insert("placeholder".into(), Value::String(placeholder.clone()));
        }
        if let Some(default) = &self.default {
            props.insert("default".into(), default.clone());
        }
        if self.auto_focus {
            props.insert("autoFocus".into(), Value::Bool(true));
        }
        FormFieldSpec {
            key: key.to_string(),
            label: self
                .label
                .clone()
                .unwrap_or_else(|| label_from_key(key)),
            input_type: input_type.to_string(),
            props,
            choices: self.choices().map(<[Choice]>::to_vec),
        }
    }
}

fn length_prop(length: Option<usize>) -> Value {
    // The form client expects an empty string rather than null when a bound
    // is unset.
    match length {
        Some(n) => json!(n),
        None => Value::String(String::new()),
    }
}

/// Derive a display label from a field key: `feed_display_limit` becomes
/// `Feed display limit`.
fn label_from_key(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// A field descriptor bound to its field name within a widget class.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBinding {
    /// Field name; unique key within the class and in the stored
    /// configuration document.
    pub key: String,
    /// The field's descriptor.
    pub descriptor: FieldDescriptor,
}

impl FieldBinding {
    /// Bind `descriptor` under the field name `key`.
    pub fn new(key: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        Self {
            key: key.into(),
            descriptor,
        }
    }

    /// Form-spec fragment for this binding.
    pub fn form_spec(&self) -> FormFieldSpec {
        self.descriptor.form_spec(&self.key)
    }
}

/// Declarative description of one form input, consumable by a form-rendering
/// client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormFieldSpec {
    /// Bound field name.
    pub key: String,
    /// Display label.
    pub label: String,
    /// Input widget type: `text`, `textarea`, `url`, `select`, `number` or
    /// `file`.
    pub input_type: String,
    /// Input-specific hints (maxLength, minLength, isMulti, default,
    /// placeholder, autoFocus).
    pub props: JsonMap,
    /// Selectable options, present for choice kinds only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Choice>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_field_enforces_length_bounds() {
        let field = FieldDescriptor::char().with_max_length(5).with_min_length(2);
        assert_eq!(
            field.validate("body", Some(&json!("abc"))).unwrap(),
            Some(ValidatedValue::Text("abc".into()))
        );
        assert!(field.validate("body", Some(&json!("toolong"))).is_err());
        assert!(field.validate("body", Some(&json!("a"))).is_err());
        assert!(field.validate("body", Some(&json!(42))).is_err());
    }

    #[test]
    fn required_field_rejects_absent_and_null() {
        let field = FieldDescriptor::char();
        let err = field.validate("body", None).unwrap_err();
        assert_eq!(err.field, "body");
        assert!(field.validate("body", Some(&Value::Null)).is_err());
    }

    #[test]
    fn optional_field_falls_back_to_default() {
        let field = FieldDescriptor::integer().optional().with_default(3);
        assert_eq!(
            field.validate("limit", None).unwrap(),
            Some(ValidatedValue::Int(3))
        );

        let no_default = FieldDescriptor::char().optional();
        assert_eq!(no_default.validate("note", None).unwrap(), None);
    }

    #[test]
    fn url_field_requires_http_scheme_and_host() {
        let field = FieldDescriptor::url();
        assert!(field
            .validate("url", Some(&json!("https://example.com/feed")))
            .is_ok());
        assert!(field.validate("url", Some(&json!("not a url"))).is_err());
        assert!(field.validate("url", Some(&json!("ftp://example.com"))).is_err());
        assert!(field.validate("url", Some(&json!("javascript:alert(1)"))).is_err());
    }

    #[test]
    fn choice_field_rejects_values_outside_the_set() {
        let field = FieldDescriptor::choice(vec![
            Choice::new(1, "one"),
            Choice::new(2, "two"),
        ]);
        assert_eq!(
            field.validate("pick", Some(&json!(2))).unwrap(),
            Some(ValidatedValue::Single(json!(2)))
        );
        assert!(field.validate("pick", Some(&json!(3))).is_err());
    }

    #[test]
    fn multi_choice_collapses_duplicates_preserving_order() {
        let field = FieldDescriptor::multi_choice(vec![
            Choice::new(1, "a"),
            Choice::new(2, "b"),
            Choice::new(3, "c"),
        ]);
        let validated = field
            .validate("picks", Some(&json!([3, 1, 3, 2])))
            .unwrap()
            .unwrap();
        assert_eq!(
            validated,
            ValidatedValue::Multiple(vec![json!(3), json!(1), json!(2)])
        );
        // Serializes to an order-preserving array.
        assert_eq!(field.serialize(validated), json!([3, 1, 2]));
    }

    #[test]
    fn multi_choice_rejects_non_array_and_unknown_values() {
        let field = FieldDescriptor::multi_choice(vec![Choice::new(1, "a")]);
        assert!(field.validate("picks", Some(&json!(1))).is_err());
        assert!(field.validate("picks", Some(&json!([1, 9]))).is_err());
    }

    #[test]
    fn integer_field_enforces_bounds() {
        let field = FieldDescriptor::integer().with_min_value(0).with_max_value(12);
        assert_eq!(
            field.validate("limit", Some(&json!(12))).unwrap(),
            Some(ValidatedValue::Int(12))
        );
        assert!(field.validate("limit", Some(&json!(13))).is_err());
        assert!(field.validate("limit", Some(&json!(-1))).is_err());
        assert!(field.validate("limit", Some(&json!(1.5))).is_err());
    }

    #[test]
    fn file_field_rejects_submitted_values() {
        let field = FieldDescriptor::file().optional();
        assert_eq!(field.validate("file", None).unwrap(), None);
        assert!(field.validate("file", Some(&json!("data"))).is_err());
    }

    #[test]
    fn plain_values_normalize_to_indexed_choices() {
        let choices = choices_from_values(["red", "green"]);
        assert_eq!(choices[0], Choice::new(0, "red"));
        assert_eq!(choices[1], Choice::new(1, "green"));
    }

    #[test]
    fn char_spec_switches_to_textarea_when_unbounded() {
        let short = FieldDescriptor::char().with_max_length(200).form_spec("title");
        assert_eq!(short.input_type, "text");
        assert_eq!(short.props["maxLength"], json!(200));

        let long = FieldDescriptor::char().form_spec("body");
        assert_eq!(long.input_type, "textarea");
        assert_eq!(long.props["maxLength"], json!(""));
    }

    #[test]
    fn select_specs_force_is_multi() {
        let single = FieldDescriptor::choice(vec![Choice::new(0, "a")]).form_spec("pick");
        assert_eq!(single.input_type, "select");
        assert_eq!(single.props["isMulti"], json!(false));
        assert_eq!(single.choices.as_ref().map(Vec::len), Some(1));

        let multi = FieldDescriptor::multi_choice(vec![Choice::new(0, "a")]).form_spec("picks");
        assert_eq!(multi.props["isMulti"], json!(true));
    }

    #[test]
    fn spec_carries_ui_hints() {
        let spec = FieldDescriptor::integer()
            .with_min_value(0)
            .with_max_value(12)
            .optional()
            .with_default(3)
            .with_placeholder("How many entries")
            .form_spec("feed_display_limit");
        assert_eq!(spec.input_type, "number");
        assert_eq!(spec.label, "Feed display limit");
        assert_eq!(spec.props["default"], json!(3));
        assert_eq!(spec.props["placeholder"], json!("How many entries"));
        assert_eq!(spec.props["min"], json!(0));
        assert_eq!(spec.props["max"], json!(12));
    }
}
