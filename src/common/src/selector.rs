//! Kubernetes label selector parsing and matching.
//!
//! The live client hands the raw selector string to the API server, so the
//! parser here is used to reject malformed selectors at startup and to let
//! in-memory clusters filter pods the same way the server would.
//!
//! Supported grammar (comma separated requirements):
//!
//! - `key=value`, `key==value`, `key!=value`
//! - `key`, `!key`
//! - `key in (a,b)`, `key notin (a,b)`
//! - `key>N`, `key<N` with an integer `N`

use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("empty requirement in label selector '{selector}'")]
    EmptyRequirement { selector: String },

    #[error("invalid label key '{key}'")]
    InvalidKey { key: String },

    #[error("invalid label value '{value}' for key '{key}'")]
    InvalidValue { key: String, value: String },

    #[error("malformed set requirement '{requirement}'")]
    MalformedSet { requirement: String },

    #[error("unbalanced parentheses in label selector '{selector}'")]
    UnbalancedParentheses { selector: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    In,
    NotIn,
    Exists,
    DoesNotExist,
    GreaterThan,
    LessThan,
}

/// One parsed requirement. Only built by the parser, so every operator
/// carries the number of values it needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Requirement {
    key: String,
    operator: Operator,
    values: Vec<String>,
}

impl Requirement {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
            Operator::Equals | Operator::In => value.is_some_and(|v| self.values.contains(v)),
            // A missing key satisfies `!=` and `notin`, as on the API server.
            Operator::NotEquals | Operator::NotIn => !value.is_some_and(|v| self.values.contains(v)),
            // Labels that are absent or not integers never satisfy `>` or `<`.
            Operator::GreaterThan | Operator::LessThan => {
                let bound = self.values.first().and_then(|v| v.parse::<i64>().ok());
                let actual = value.and_then(|v| v.parse::<i64>().ok());
                match (actual, bound) {
                    (Some(actual), Some(bound)) if self.operator == Operator::GreaterThan => {
                        actual > bound
                    }
                    (Some(actual), Some(bound)) => actual < bound,
                    _ => false,
                }
            }
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.values.join(",");
        match self.operator {
            Operator::Equals => write!(f, "{}={value}", self.key),
            Operator::NotEquals => write!(f, "{}!={value}", self.key),
            Operator::GreaterThan => write!(f, "{}>{value}", self.key),
            Operator::LessThan => write!(f, "{}<{value}", self.key),
            Operator::In => write!(f, "{} in ({})", self.key, self.values.join(",")),
            Operator::NotIn => write!(f, "{} notin ({})", self.key, self.values.join(",")),
            Operator::Exists => write!(f, "{}", self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
        }
    }
}

/// A parsed label selector. The empty selector matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    pub fn parse(selector: &str) -> Result<Self, SelectorError> {
        if selector.trim().is_empty() {
            return Ok(Self::default());
        }

        let requirements = split_requirements(selector)?
            .into_iter()
            .map(|term| {
                let term = term.trim();
                if term.is_empty() {
                    return Err(SelectorError::EmptyRequirement {
                        selector: selector.to_string(),
                    });
                }
                parse_requirement(term)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { requirements })
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.requirements.iter().map(|r| r.to_string()).collect();
        write!(f, "{}", rendered.join(","))
    }
}

/// Split on commas that are not inside a `( ... )` value list.
fn split_requirements(selector: &str) -> Result<Vec<&str>, SelectorError> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (idx, ch) in selector.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| SelectorError::UnbalancedParentheses {
                        selector: selector.to_string(),
                    })?;
            }
            ',' if depth == 0 => {
                terms.push(&selector[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(SelectorError::UnbalancedParentheses {
            selector: selector.to_string(),
        });
    }
    terms.push(&selector[start..]);
    Ok(terms)
}

fn parse_requirement(term: &str) -> Result<Requirement, SelectorError> {
    if let Some(open) = term.find('(') {
        return parse_set_requirement(term, open);
    }

    if let Some(key) = term.strip_prefix('!') {
        return Ok(Requirement {
            key: validate_key(key.trim())?,
            operator: Operator::DoesNotExist,
            values: Vec::new(),
        });
    }

    let (key, operator, value) = if let Some((key, value)) = term.split_once("!=") {
        (key, Operator::NotEquals, value)
    } else if let Some((key, value)) = term.split_once('>') {
        return parse_numeric_requirement(key, Operator::GreaterThan, value);
    } else if let Some((key, value)) = term.split_once('<') {
        return parse_numeric_requirement(key, Operator::LessThan, value);
    } else if let Some((key, value)) = term.split_once("==") {
        (key, Operator::Equals, value)
    } else if let Some((key, value)) = term.split_once('=') {
        (key, Operator::Equals, value)
    } else {
        return Ok(Requirement {
            key: validate_key(term)?,
            operator: Operator::Exists,
            values: Vec::new(),
        });
    };

    let key = validate_key(key.trim())?;
    let value = validate_value(&key, value.trim())?;
    Ok(Requirement {
        key,
        operator,
        values: vec![value],
    })
}

fn parse_numeric_requirement(
    key: &str,
    operator: Operator,
    value: &str,
) -> Result<Requirement, SelectorError> {
    let key = validate_key(key.trim())?;
    let value = value.trim();
    if value.parse::<i64>().is_err() {
        return Err(SelectorError::InvalidValue {
            key,
            value: value.to_string(),
        });
    }
    Ok(Requirement {
        key,
        operator,
        values: vec![value.to_string()],
    })
}

fn parse_set_requirement(term: &str, open: usize) -> Result<Requirement, SelectorError> {
    let malformed = || SelectorError::MalformedSet {
        requirement: term.to_string(),
    };

    let inner = term[open + 1..].strip_suffix(')').ok_or_else(malformed)?;
    let mut head = term[..open].split_whitespace();
    let (Some(key), Some(operator), None) = (head.next(), head.next(), head.next()) else {
        return Err(malformed());
    };
    let operator = match operator {
        "in" => Operator::In,
        "notin" => Operator::NotIn,
        _ => return Err(malformed()),
    };

    let key = validate_key(key)?;
    let values = inner
        .split(',')
        .map(|value| validate_value(&key, value.trim()))
        .collect::<Result<Vec<_>, _>>()?;
    if values.iter().all(|v| v.is_empty()) {
        return Err(malformed());
    }

    Ok(Requirement {
        key,
        operator,
        values,
    })
}

fn validate_key(key: &str) -> Result<String, SelectorError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
        && key.chars().next().is_some_and(|c| c.is_ascii_alphanumeric());
    if valid {
        Ok(key.to_string())
    } else {
        Err(SelectorError::InvalidKey {
            key: key.to_string(),
        })
    }
}

fn validate_value(key: &str, value: &str) -> Result<String, SelectorError> {
    if value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        Ok(value.to_string())
    } else {
        Err(SelectorError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}
