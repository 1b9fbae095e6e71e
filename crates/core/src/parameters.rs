//! Parameter schema model.
//!
//! Each model in the catalog declares the generation parameters it accepts
//! as an ordered list of [`ParamDescriptor`]s. Nodes store their chosen
//! values in a [`ParamMap`]; this module fills defaults, merges edits and
//! validates untrusted input at the boundary.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::null_as_default;

/// Parameter key carrying the output aspect ratio (`"W:H"`).
pub const ASPECT_RATIO_KEY: &str = "aspect_ratio";

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A single parameter value. Providers only ever see scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert a JSON scalar. Returns `None` for null, arrays and objects.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(ParamValue::Bool(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(ParamValue::Number),
            serde_json::Value::String(s) => Some(ParamValue::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Number(n) => write!(f, "{n}"),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

/// Parameter values keyed by descriptor key. Unknown keys are kept so
/// provider-specific extras survive a round trip.
pub type ParamMap = BTreeMap<String, ParamValue>;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Widget type of a parameter descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    Select,
    GridSelect,
    Slider,
    Switch,
    Text,
}

/// One selectable option of a `select` / `grid_select` parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamOption {
    pub label: String,
    /// Stored in the node when the option is picked.
    pub value: ParamValue,
    /// Extra hint shown under the option.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

/// Declarative description of one configurable generation parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamDescriptor {
    /// Key under which the value is stored in a node's parameters.
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub options: Vec<ParamOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ParamValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

impl ParamDescriptor {
    /// Minimal descriptor, used by tests and seed data.
    pub fn new(key: impl Into<String>, label: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            param_type,
            options: Vec::new(),
            default: None,
            min: None,
            max: None,
            step: None,
            placeholder: None,
            max_length: None,
        }
    }

    /// Value used when a model is first selected.
    pub fn with_default(mut self, value: impl Into<ParamValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Append a choice for select fields.
    pub fn with_option(mut self, label: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.options.push(ParamOption {
            label: label.into(),
            value: value.into(),
            desc: None,
        });
        self
    }

    /// Bounds and optional step for sliders.
    pub fn with_range(mut self, min: f64, max: f64, step: Option<f64>) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self.step = step;
        self
    }
}

/// Ordered descriptor list owned by a catalog model.
pub type ParameterSchema = Vec<ParamDescriptor>;

// ---------------------------------------------------------------------------
// Defaults and merging
// ---------------------------------------------------------------------------

/// Produce the effective values: every key absent from `values` is filled
/// with the descriptor default. Keys unknown to the schema pass through.
pub fn apply_defaults(schema: &[ParamDescriptor], values: &ParamMap) -> ParamMap {
    let mut effective = values.clone();
    for descriptor in schema {
        if let Some(default) = &descriptor.default {
            effective
                .entry(descriptor.key.clone())
                .or_insert_with(|| default.clone());
        }
    }
    effective
}

/// The schema's declared defaults alone.
pub fn schema_defaults(schema: &[ParamDescriptor]) -> ParamMap {
    apply_defaults(schema, &ParamMap::new())
}

/// Overlay `patch` onto `base`. Values are scalars, so this is the whole of
/// the deep merge: later keys win, untouched keys survive.
pub fn merge_parameters(base: &mut ParamMap, patch: ParamMap) {
    base.extend(patch);
}

/// Convert an untrusted JSON object into a [`ParamMap`].
pub fn params_from_json(value: &serde_json::Value) -> Result<ParamMap, CoreError> {
    let object = value
        .as_object()
        .ok_or_else(|| CoreError::Validation("parameters must be a JSON object".to_string()))?;

    object
        .iter()
        .map(|(key, raw)| {
            ParamValue::from_json(raw)
                .map(|v| (key.clone(), v))
                .ok_or_else(|| {
                    CoreError::Validation(format!(
                        "parameter '{key}' must be a string, number or boolean"
                    ))
                })
        })
        .collect()
}

/// Parse an aspect ratio such as `"16:9"` into `(width, height)`.
pub fn parse_aspect_ratio(value: &str) -> Option<(f64, f64)> {
    let (w, h) = value.split_once(':')?;
    let w: f64 = w.trim().parse().ok()?;
    let h: f64 = h.trim().parse().ok()?;
    if w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0 {
        Some((w, h))
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a schema as authored in the model catalog.
///
/// - keys and labels are non-empty, keys are unique
/// - `select` / `grid_select` carry at least one option
/// - `slider` carries `min` and `max` with `min <= max`
///
/// Errors are reported as `"<index>.<field>: <message>"` for the first
/// offending descriptor.
pub fn validate_schema(schema: &[ParamDescriptor]) -> Result<(), CoreError> {
    let mut seen = HashSet::new();

    for (index, descriptor) in schema.iter().enumerate() {
        let fail = |field: &str, message: &str| {
            Err(CoreError::Validation(format!("{index}.{field}: {message}")))
        };

        if descriptor.key.trim().is_empty() {
            return fail("key", "Key is required");
        }
        if descriptor.label.trim().is_empty() {
            return fail("label", "Label is required");
        }
        if !seen.insert(descriptor.key.as_str()) {
            return fail("key", &format!("Duplicate key '{}'", descriptor.key));
        }

        match descriptor.param_type {
            ParamType::Select | ParamType::GridSelect if descriptor.options.is_empty() => {
                return fail(
                    "options",
                    "Options are required for select and grid_select types",
                );
            }
            ParamType::Slider => match (descriptor.min, descriptor.max) {
                (Some(min), Some(max)) if min > max => {
                    return fail("min", "Min must not exceed max");
                }
                (Some(_), Some(_)) => {}
                _ => return fail("min", "Min and max are required for slider type"),
            },
            _ => {}
        }
    }

    Ok(())
}

/// Check values supplied for known keys against their descriptors.
///
/// Used where parameters arrive from an untrusted caller (the agent), so it
/// can only pick values a person could pick in the form. Unknown keys are
/// accepted unchanged.
pub fn validate_values(schema: &[ParamDescriptor], values: &ParamMap) -> Result<(), CoreError> {
    for (key, value) in values {
        let Some(descriptor) = schema.iter().find(|d| &d.key == key) else {
            continue;
        };
        let invalid = |expected: &str| {
            Err(CoreError::Validation(format!(
                "parameter '{key}' has invalid value '{value}': expected {expected}"
            )))
        };

        match descriptor.param_type {
            ParamType::Select | ParamType::GridSelect => {
                if !descriptor.options.iter().any(|o| &o.value == value) {
                    let allowed: Vec<String> =
                        descriptor.options.iter().map(|o| o.value.to_string()).collect();
                    return invalid(&format!("one of [{}]", allowed.join(", ")));
                }
            }
            ParamType::Slider => {
                let Some(n) = value.as_f64() else {
                    return invalid("a number");
                };
                let below = descriptor.min.is_some_and(|min| n < min);
                let above = descriptor.max.is_some_and(|max| n > max);
                if below || above {
                    return invalid(&format!(
                        "a number in [{}, {}]",
                        descriptor.min.unwrap_or(f64::MIN),
                        descriptor.max.unwrap_or(f64::MAX)
                    ));
                }
            }
            ParamType::Switch => {
                if value.as_bool().is_none() {
                    return invalid("a boolean");
                }
            }
            ParamType::Text => {
                let Some(text) = value.as_str() else {
                    return invalid("a string");
                };
                if let Some(limit) = descriptor.max_length {
                    if text.chars().count() > limit as usize {
                        return invalid(&format!("at most {limit} characters"));
                    }
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
