use crate::entity::ValidationRules;
use crate::schema::FormField;
use log::error;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// 单字段校验错误，文案沿用后台管理端的英文提示
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("{label} is required")]
    Required { label: String },
    #[error("{label} must be at least {min} characters")]
    TooShort { label: String, min: usize },
    #[error("{label} must be less than {max} characters")]
    TooLong { label: String, max: usize },
    #[error("{label} format is invalid")]
    PatternMismatch { label: String },
    #[error("Invalid validation pattern for {label}")]
    InvalidPattern { label: String },
    #[error("{label} must be greater than {min}")]
    BelowMin { label: String, min: f64 },
    #[error("{label} must be less than {max}")]
    AboveMax { label: String, max: f64 },
}

/// 字段名 -> 错误提示；通过校验的字段不出现
pub type FormErrors = BTreeMap<String, String>;

/// JS 风格的假值：null / "" / 0 / NaN / false
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().map(|f| f == 0.0 || f.is_nan()).unwrap_or(false),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// 按固定顺序校验，命中第一条即返回
///
/// 1. required 且值为假值
/// 2. 字符串：minLength → maxLength → pattern
/// 3. 数字：min → max
pub fn validate_field(
    value: Option<&Value>,
    rules: Option<&ValidationRules>,
    label: &str,
) -> Option<FieldError> {
    let rules = rules?;
    let value = value.unwrap_or(&Value::Null);

    if rules.required && is_falsy(value) {
        return Some(FieldError::Required {
            label: label.to_string(),
        });
    }

    match value {
        Value::String(s) => {
            let len = s.chars().count();
            if let Some(min) = rules.min_length.filter(|m| *m > 0) {
                if len < min {
                    return Some(FieldError::TooShort {
                        label: label.to_string(),
                        min,
                    });
                }
            }
            if let Some(max) = rules.max_length.filter(|m| *m > 0) {
                if len > max {
                    return Some(FieldError::TooLong {
                        label: label.to_string(),
                        max,
                    });
                }
            }
            if let Some(pattern) = rules.pattern.filter(|p| !p.is_empty()) {
                if !s.is_empty() {
                    match Regex::new(pattern) {
                        Ok(re) => {
                            if !re.is_match(s) {
                                return Some(FieldError::PatternMismatch {
                                    label: label.to_string(),
                                });
                            }
                        }
                        Err(e) => {
                            error!("Invalid regex pattern for {}: {}", label, e);
                            return Some(FieldError::InvalidPattern {
                                label: label.to_string(),
                            });
                        }
                    }
                }
            }
        }
        Value::Number(n) => {
            if let Some(v) = n.as_f64() {
                if let Some(min) = rules.min {
                    if v < min {
                        return Some(FieldError::BelowMin {
                            label: label.to_string(),
                            min,
                        });
                    }
                }
                if let Some(max) = rules.max {
                    if v > max {
                        return Some(FieldError::AboveMax {
                            label: label.to_string(),
                            max,
                        });
                    }
                }
            }
        }
        _ => {}
    }

    None
}

pub fn validate_form(draft: &Map<String, Value>, fields: &[FormField]) -> FormErrors {
    fields
        .iter()
        .filter_map(|field| {
            validate_field(draft.get(field.name), field.validation.as_ref(), field.label)
                .map(|err| (field.name.to_string(), err.to_string()))
        })
        .collect()
}

pub fn has_errors(errors: &FormErrors) -> bool {
    !errors.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityType;
    use crate::schema::generate_form_schema;
    use serde_json::json;

    fn rules() -> ValidationRules {
        ValidationRules::NONE
    }

    #[test]
    fn required_rejects_falsy_values() {
        let r = ValidationRules {
            required: true,
            ..rules()
        };
        for v in [json!(null), json!(""), json!(0), json!(false)] {
            assert_eq!(
                validate_field(Some(&v), Some(&r), "Name"),
                Some(FieldError::Required {
                    label: "Name".into()
                })
            );
        }
        assert_eq!(validate_field(None, Some(&r), "Name").map(|e| e.to_string()), Some("Name is required".to_string()));
        assert!(validate_field(Some(&json!("ok")), Some(&r), "Name").is_none());
    }

    #[test]
    fn string_rules_apply_in_order() {
        let r = ValidationRules {
            min_length: Some(2),
            max_length: Some(4),
            pattern: Some("^[a-z]+$"),
            ..rules()
        };
        assert!(matches!(
            validate_field(Some(&json!("a")), Some(&r), "Code"),
            Some(FieldError::TooShort { min: 2, .. })
        ));
        assert!(matches!(
            validate_field(Some(&json!("abcde")), Some(&r), "Code"),
            Some(FieldError::TooLong { max: 4, .. })
        ));
        assert!(matches!(
            validate_field(Some(&json!("AB")), Some(&r), "Code"),
            Some(FieldError::PatternMismatch { .. })
        ));
        assert!(validate_field(Some(&json!("abc")), Some(&r), "Code").is_none());
    }

    #[test]
    fn malformed_pattern_is_reported_not_thrown() {
        let r = ValidationRules {
            pattern: Some("(unclosed"),
            ..rules()
        };
        let err = validate_field(Some(&json!("x")), Some(&r), "Code").unwrap();
        assert_eq!(err.to_string(), "Invalid validation pattern for Code");
    }

    #[test]
    fn number_bounds() {
        let r = ValidationRules {
            min: Some(1.0),
            max: Some(10.0),
            ..rules()
        };
        assert!(matches!(
            validate_field(Some(&json!(0.5)), Some(&r), "Qty"),
            Some(FieldError::BelowMin { .. })
        ));
        assert!(matches!(
            validate_field(Some(&json!(11)), Some(&r), "Qty"),
            Some(FieldError::AboveMax { .. })
        ));
        assert!(validate_field(Some(&json!(5)), Some(&r), "Qty").is_none());
    }

    #[test]
    fn other_types_only_check_required() {
        let r = ValidationRules {
            required: true,
            min_length: Some(3),
            min: Some(5.0),
            ..rules()
        };
        assert!(validate_field(Some(&json!(true)), Some(&r), "Flag").is_none());
        assert!(validate_field(Some(&json!(["a"])), Some(&r), "List").is_none());
    }

    #[test]
    fn missing_rules_mean_optional() {
        assert!(validate_field(None, None, "Any").is_none());
        assert!(validate_field(Some(&json!("")), None, "Any").is_none());
    }

    #[test]
    fn validate_field_is_idempotent() {
        let r = ValidationRules {
            required: true,
            min_length: Some(2),
            ..rules()
        };
        let v = json!("x");
        let first = validate_field(Some(&v), Some(&r), "Name");
        let second = validate_field(Some(&v), Some(&r), "Name");
        assert_eq!(first, second);
    }

    #[test]
    fn empty_required_text_yields_single_error() {
        let schema = generate_form_schema(EntityType::Product);
        let mut draft = Map::new();
        draft.insert("name".into(), json!(""));
        draft.insert("quantity".into(), json!(3));
        draft.insert("prix".into(), json!(9.5));
        let errors = validate_form(&draft, &schema.fields);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("name").map(String::as_str), Some("Name is required"));
        assert!(has_errors(&errors));
    }
}
