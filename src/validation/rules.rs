//! Field rules and the messages they produce.

use std::sync::LazyLock;

use chrono::NaiveDate;
use serde_json::Value;

static EMAIL_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"(?i)^[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?$",
    )
    .expect("EMAIL_REGEX is a valid regex pattern")
});

static PHONE_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^\+?[0-9][0-9 ()-]{5,19}$").expect("PHONE_REGEX is a valid regex pattern")
});

static DATE_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("DATE_REGEX is a valid regex pattern")
});

/// A single check on one field.
///
/// Every rule except [`Rule::Required`] passes when the field is absent, so
/// optional fields are expressed by leaving `Required` out.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Required,
    Email,
    Phone,
    /// Calendar date in `YYYY-MM-DD`.
    Date,
    OneOf(&'static [&'static str]),
    MinLength(usize),
    Number { min: Option<f64>, max: Option<f64> },
    /// Must equal the value at another dotted path.
    Matches(&'static str),
    /// Array with at least this many entries.
    MinItems(usize),
}

/// Whether a value counts as "not provided".
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        _ => false,
    }
}

/// Numeric reading of a JSON value; form inputs may arrive as strings.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

impl Rule {
    /// Check `value` (the field) with `other` being the value at the path
    /// named by [`Rule::Matches`], if any. Returns the message on failure.
    pub fn check(&self, label: &str, value: Option<&Value>, other: Option<&Value>) -> Option<String> {
        if let Rule::Required = self {
            return is_blank(value).then(|| format!("{label} is required"));
        }
        if let Rule::MinItems(min) = self {
            let len = value.and_then(Value::as_array).map_or(0, Vec::len);
            return (len < *min).then(|| match min {
                1 => format!("Add at least one entry to {}", label.to_lowercase()),
                n => format!("Add at least {n} entries to {}", label.to_lowercase()),
            });
        }
        if is_blank(value) {
            return None;
        }
        let value = value?;

        match self {
            Rule::Required | Rule::MinItems(_) => None,
            Rule::Email => {
                let ok = value.as_str().is_some_and(|s| EMAIL_REGEX.is_match(s.trim()));
                (!ok).then(|| format!("{label} must be a valid email address"))
            }
            Rule::Phone => {
                let ok = value.as_str().is_some_and(|s| PHONE_REGEX.is_match(s.trim()));
                (!ok).then(|| format!("{label} must be a valid phone number"))
            }
            Rule::Date => {
                let ok = value.as_str().is_some_and(|s| {
                    let s = s.trim();
                    DATE_REGEX.is_match(s) && NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
                });
                (!ok).then(|| format!("{label} must be a date in YYYY-MM-DD format"))
            }
            Rule::OneOf(allowed) => {
                let ok = value.as_str().is_some_and(|s| allowed.contains(&s));
                (!ok).then(|| format!("{label} must be one of: {}", allowed.join(", ")))
            }
            Rule::MinLength(min) => {
                let len = value.as_str().map_or(0, |s| s.chars().count());
                (len < *min).then(|| format!("{label} must be at least {min} characters"))
            }
            Rule::Number { min, max } => match as_number(value) {
                None => Some(format!("{label} must be a number")),
                Some(n) if min.is_some_and(|m| n < m) => {
                    Some(format!("{label} must be at least {}", min.unwrap_or_default()))
                }
                Some(n) if max.is_some_and(|m| n > m) => {
                    Some(format!("{label} must be at most {}", max.unwrap_or_default()))
                }
                Some(_) => None,
            },
            Rule::Matches(_) => (Some(value) != other).then(|| format!("{label} does not match")),
        }
    }
}
