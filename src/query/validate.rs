use thiserror::Error;

use crate::collection::CollectionDescriptor;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("unknown search term '{key}', valid terms are: {}", valid.join(", "))]
    UnknownSearchTerm { key: String, valid: Vec<String> },

    #[error("search term '{key}' value '{value}' does not match pattern '{pattern}'")]
    SearchTermPatternMismatch {
        key: String,
        value: String,
        pattern: String,
    },

    #[error("search term '{key}' value '{value}' is out of range [{min:?}, {max:?}]")]
    SearchTermOutOfRange {
        key: String,
        value: String,
        min: Option<f64>,
        max: Option<f64>,
    },
}

/// Validates `value` for search term `key` against the collection's
/// descriptor: the key must exist, its pattern (if any) must match, and its
/// numeric bounds (if any) must contain the value.
pub fn validate(
    descriptor: &CollectionDescriptor,
    key: &str,
    value: &str,
) -> Result<(), ValidationError> {
    let spec = descriptor.get(key).ok_or_else(|| {
        let mut valid: Vec<String> = descriptor.keys().cloned().collect();
        valid.sort();
        ValidationError::UnknownSearchTerm {
            key: key.to_string(),
            valid,
        }
    })?;

    if let Some(pattern) = &spec.pattern {
        if !pattern.is_match(value) {
            return Err(ValidationError::SearchTermPatternMismatch {
                key: key.to_string(),
                value: value.to_string(),
                pattern: pattern.as_str().to_string(),
            });
        }
    }

    if spec.min_inclusive.is_some() || spec.max_inclusive.is_some() {
        let out_of_range = || ValidationError::SearchTermOutOfRange {
            key: key.to_string(),
            value: value.to_string(),
            min: spec.min_inclusive,
            max: spec.max_inclusive,
        };
        let parsed: f64 = value.parse().map_err(|_| out_of_range())?;
        if let Some(min) = spec.min_inclusive {
            if parsed < min {
                return Err(out_of_range());
            }
        }
        if let Some(max) = spec.max_inclusive {
            if parsed > max {
                return Err(out_of_range());
            }
        }
    }

    Ok(())
}
