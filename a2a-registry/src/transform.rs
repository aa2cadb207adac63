use serde_json::Value;

use crate::error::TransformError;

pub type TransformFn = fn(&Value) -> Result<Value, TransformError>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Validation {
    Pattern(&'static str),
    NumberRange { min: f64, max: f64 },
    Array,
    Enum(&'static [&'static str]),
}

/// A single path-based parameter mapping. Nested paths use dotted keys (`"a.b.c"`).
#[derive(Clone)]
pub struct ParameterMapping {
    pub source_path: String,
    pub target_path: String,
    pub transform: Option<&'static str>,
    pub validation: Option<Validation>,
    pub required: bool,
    pub default: Option<Value>,
}

fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| current.get(segment))
}

fn set_path(value: &mut Value, path: &str, new_value: Value) {
    let segments: Vec<&str> = path.split('.').collect();
    let mut current = value;
    for segment in &segments[..segments.len() - 1] {
        if !current.is_object() {
            *current = Value::Object(serde_json::Map::new());
        }
        current = current.as_object_mut().unwrap().entry(segment.to_string()).or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
    if !current.is_object() {
        *current = Value::Object(serde_json::Map::new());
    }
    current.as_object_mut().unwrap().insert(segments[segments.len() - 1].to_string(), new_value);
}

fn named_transform(name: &str, value: &Value) -> Result<Value, TransformError> {
    match name {
        "toUpperCase" => Ok(Value::String(value.as_str().unwrap_or_default().to_uppercase())),
        "toLowerCase" => Ok(Value::String(value.as_str().unwrap_or_default().to_lowercase())),
        "parseJSON" => {
            let raw = value.as_str().unwrap_or_default();
            serde_json::from_str(raw).map_err(|e| TransformError::ValidationFailed { path: "parseJSON".into(), reason: e.to_string() })
        }
        "arrayToString" => {
            let joined = value
                .as_array()
                .map(|items| items.iter().map(|v| v.as_str().unwrap_or_default().to_string()).collect::<Vec<_>>().join(","))
                .unwrap_or_default();
            Ok(Value::String(joined))
        }
        other => Err(TransformError::UnknownTransform(other.to_string())),
    }
}

fn validate(path: &str, value: &Value, validation: Validation) -> Result<(), TransformError> {
    let fail = |reason: String| Err(TransformError::ValidationFailed { path: path.to_string(), reason });
    match validation {
        Validation::Pattern(pattern) => {
            let s = value.as_str().unwrap_or_default();
            if s.contains(pattern) {
                Ok(())
            } else {
                fail(format!("expected value to match pattern {pattern}"))
            }
        }
        Validation::NumberRange { min, max } => {
            let n = value.as_f64().ok_or_else(|| TransformError::ValidationFailed { path: path.to_string(), reason: "not a number".into() })?;
            if n >= min && n <= max {
                Ok(())
            } else {
                fail(format!("{n} outside range [{min}, {max}]"))
            }
        }
        Validation::Array => {
            if value.is_array() {
                Ok(())
            } else {
                fail("expected an array".into())
            }
        }
        Validation::Enum(allowed) => {
            let s = value.as_str().unwrap_or_default();
            if allowed.contains(&s) {
                Ok(())
            } else {
                fail(format!("{s} not in allowed values {allowed:?}"))
            }
        }
    }
}

/// Applies a set of [`ParameterMapping`]s from a source document to a freshly built target
/// document. Succeeds only if every required mapping resolves and every typed validation passes.
pub struct TransformationEngine {
    mappings: Vec<ParameterMapping>,
}

impl TransformationEngine {
    pub fn new(mappings: Vec<ParameterMapping>) -> Self {
        Self { mappings }
    }

    pub fn apply(&self, source: &Value) -> Result<Value, TransformError> {
        let mut target = Value::Object(serde_json::Map::new());
        for mapping in &self.mappings {
            let found = get_path(source, &mapping.source_path).cloned();
            let resolved = match found {
                Some(value) => value,
                None => match &mapping.default {
                    Some(default) => default.clone(),
                    None => {
                        if mapping.required {
                            return Err(TransformError::RequiredFieldMissing(mapping.source_path.clone()));
                        }
                        continue;
                    }
                },
            };

            let transformed = match mapping.transform {
                Some(name) => named_transform(name, &resolved)?,
                None => resolved,
            };

            if let Some(validation) = mapping.validation {
                validate(&mapping.target_path, &transformed, validation)?;
            }

            set_path(&mut target, &mapping.target_path, transformed);
        }
        Ok(target)
    }

    /// The reverse mapping set, built by swapping each mapping's source and target paths. Loses
    /// the original transform (no well-defined general inverse) and validation.
    pub fn reversed(&self) -> TransformationEngine {
        let mappings = self
            .mappings
            .iter()
            .map(|m| ParameterMapping {
                source_path: m.target_path.clone(),
                target_path: m.source_path.clone(),
                transform: None,
                validation: None,
                required: m.required,
                default: None,
            })
            .collect();
        TransformationEngine::new(mappings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_paths_map_through_dotted_keys() {
        let engine = TransformationEngine::new(vec![ParameterMapping {
            source_path: "user.name".into(),
            target_path: "profile.displayName".into(),
            transform: None,
            validation: None,
            required: true,
            default: None,
        }]);
        let source = serde_json::json!({"user": {"name": "ada"}});
        let result = engine.apply(&source).unwrap();
        assert_eq!(result["profile"]["displayName"], "ada");
    }

    #[test]
    fn missing_required_field_errors() {
        let engine = TransformationEngine::new(vec![ParameterMapping {
            source_path: "missing".into(),
            target_path: "x".into(),
            transform: None,
            validation: None,
            required: true,
            default: None,
        }]);
        let result = engine.apply(&serde_json::json!({}));
        assert!(matches!(result, Err(TransformError::RequiredFieldMissing(_))));
    }

    #[test]
    fn default_used_when_source_absent_and_not_required() {
        let engine = TransformationEngine::new(vec![ParameterMapping {
            source_path: "missing".into(),
            target_path: "x".into(),
            transform: None,
            validation: None,
            required: false,
            default: Some(serde_json::json!(42)),
        }]);
        let result = engine.apply(&serde_json::json!({})).unwrap();
        assert_eq!(result["x"], 42);
    }

    #[test]
    fn to_upper_case_transform_applies() {
        let engine = TransformationEngine::new(vec![ParameterMapping {
            source_path: "name".into(),
            target_path: "name".into(),
            transform: Some("toUpperCase"),
            validation: None,
            required: true,
            default: None,
        }]);
        let result = engine.apply(&serde_json::json!({"name": "ada"})).unwrap();
        assert_eq!(result["name"], "ADA");
    }

    #[test]
    fn number_range_validation_rejects_out_of_bounds() {
        let engine = TransformationEngine::new(vec![ParameterMapping {
            source_path: "age".into(),
            target_path: "age".into(),
            transform: None,
            validation: Some(Validation::NumberRange { min: 0.0, max: 120.0 }),
            required: true,
            default: None,
        }]);
        let result = engine.apply(&serde_json::json!({"age": 200}));
        assert!(matches!(result, Err(TransformError::ValidationFailed { .. })));
    }

    #[test]
    fn reversed_swaps_source_and_target_paths() {
        let engine = TransformationEngine::new(vec![ParameterMapping {
            source_path: "a".into(),
            target_path: "b".into(),
            transform: None,
            validation: None,
            required: true,
            default: None,
        }]);
        let reversed = engine.reversed();
        let result = reversed.apply(&serde_json::json!({"b": 7})).unwrap();
        assert_eq!(result["a"], 7);
    }
}
