//! Option-value validators driven by the declarative spec registry.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::OptionValue;

static LENGTH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-?[0-9]+(?:\.[0-9]+)?)(em|ex|px|in|cm|mm|pt|pc|%)$").expect("static regex")
});

static LINENOS_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([0-9]+)(?:-([0-9]+))?\s*$").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveType {
    Integer,
    NonnegativeInteger,
    Path,
    Uri,
    String,
    Length,
    Boolean,
    Flag,
    Linenos,
    /// Tries each alternative in declared order, taking the first success.
    Union(Vec<PrimitiveType>),
}

#[derive(Debug, thiserror::Error)]
#[error("invalid option value {value:?}: expected {expected}")]
pub struct InvalidOptionValue {
    pub value: String,
    pub expected: String,
}

impl PrimitiveType {
    pub fn expected_name(&self) -> String {
        match self {
            PrimitiveType::Integer => "integer".into(),
            PrimitiveType::NonnegativeInteger => "nonnegative_integer".into(),
            PrimitiveType::Path => "path".into(),
            PrimitiveType::Uri => "uri".into(),
            PrimitiveType::String => "string".into(),
            PrimitiveType::Length => "length".into(),
            PrimitiveType::Boolean => "boolean".into(),
            PrimitiveType::Flag => "flag".into(),
            PrimitiveType::Linenos => "linenos".into(),
            PrimitiveType::Union(alts) => alts
                .iter()
                .map(|a| a.expected_name())
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }

    /// Validates a raw string into a typed [`OptionValue`].
    pub fn validate(&self, raw: &str) -> Result<OptionValue, InvalidOptionValue> {
        match self {
            PrimitiveType::Integer => raw
                .trim()
                .parse::<i64>()
                .map(OptionValue::Int)
                .map_err(|_| self.err(raw)),
            PrimitiveType::NonnegativeInteger => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|v| *v >= 0)
                .map(OptionValue::Int)
                .ok_or_else(|| self.err(raw)),
            PrimitiveType::Path => {
                if raw.trim().is_empty() {
                    Err(self.err(raw))
                } else {
                    Ok(OptionValue::Str(raw.trim().to_string()))
                }
            }
            PrimitiveType::Uri => {
                if raw.trim().is_empty() {
                    Err(self.err(raw))
                } else {
                    Ok(OptionValue::Str(raw.trim().to_string()))
                }
            }
            PrimitiveType::String => Ok(OptionValue::Str(raw.to_string())),
            PrimitiveType::Length => {
                let caps = LENGTH_PATTERN.captures(raw.trim()).ok_or_else(|| self.err(raw))?;
                let value: f64 = caps[1].parse().map_err(|_| self.err(raw))?;
                Ok(OptionValue::Length {
                    value,
                    unit: caps[2].to_string(),
                })
            }
            PrimitiveType::Boolean => match raw.trim() {
                "true" => Ok(OptionValue::Bool(true)),
                "false" => Ok(OptionValue::Bool(false)),
                _ => Err(self.err(raw)),
            },
            PrimitiveType::Flag => {
                if raw.trim().is_empty() {
                    Ok(OptionValue::Flag)
                } else {
                    Err(self.err(raw))
                }
            }
            PrimitiveType::Linenos => {
                let mut ranges = Vec::new();
                for part in raw.split(',') {
                    let caps = LINENOS_RANGE.captures(part).ok_or_else(|| self.err(raw))?;
                    let start: u32 = caps[1].parse().map_err(|_| self.err(raw))?;
                    let end: u32 = caps
                        .get(2)
                        .map(|m| m.as_str().parse())
                        .transpose()
                        .map_err(|_| self.err(raw))?
                        .unwrap_or(start);
                    ranges.push((start, end));
                }
                if ranges.is_empty() {
                    Err(self.err(raw))
                } else {
                    Ok(OptionValue::Linenos(ranges))
                }
            }
            PrimitiveType::Union(alts) => {
                for alt in alts {
                    if let Ok(v) = alt.validate(raw) {
                        return Ok(v);
                    }
                }
                Err(self.err(raw))
            }
        }
    }

    fn err(&self, raw: &str) -> InvalidOptionValue {
        InvalidOptionValue {
            value: raw.to_string(),
            expected: self.expected_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_length() {
        let v = PrimitiveType::Length.validate("12.5px").unwrap();
        assert_eq!(v, OptionValue::Length { value: 12.5, unit: "px".into() });
    }

    #[test]
    fn parses_linenos_ranges() {
        let v = PrimitiveType::Linenos.validate("1, 2-3").unwrap();
        assert_eq!(v, OptionValue::Linenos(vec![(1, 1), (2, 3)]));
    }

    #[test]
    fn flag_rejects_nonempty() {
        assert!(PrimitiveType::Flag.validate("x").is_err());
        assert!(PrimitiveType::Flag.validate("").is_ok());
    }

    #[test]
    fn union_tries_in_order() {
        let u = PrimitiveType::Union(vec![PrimitiveType::Integer, PrimitiveType::String]);
        assert_eq!(u.validate("5").unwrap(), OptionValue::Int(5));
        assert_eq!(u.validate("abc").unwrap(), OptionValue::Str("abc".into()));
    }

    #[test]
    fn union_failure_reports_all_expected() {
        let u = PrimitiveType::Union(vec![PrimitiveType::Integer, PrimitiveType::Boolean]);
        let err = u.validate("nope").unwrap_err();
        assert!(err.expected.contains("integer"));
        assert!(err.expected.contains("boolean"));
    }
}
