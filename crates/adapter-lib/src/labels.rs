//! Label sets and label selectors
//!
//! Selectors use the Kubernetes label-selector syntax:
//! `env=prod`, `tier!=cache`, `zone in (a,b)`, `zone notin (c)`,
//! `canary` (key exists), `!canary` (key absent), `replicas>2`.
//! Requirements are comma-separated and all must hold.

use crate::error::{AdapterError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

const MAX_NAME_LEN: usize = 63;
const MAX_PREFIX_LEN: usize = 253;

/// Unordered string-to-string label mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Build a label set from `k=v,k2=v2`; anything but equality terms is rejected
    pub fn from_selector_str(raw: &str) -> Result<Self> {
        let selector = Selector::parse(raw)?;
        let mut labels = LabelSet::new();
        for requirement in selector.requirements() {
            match requirement.operator() {
                Operator::Equals => {
                    labels.insert(requirement.key(), requirement.values()[0].clone());
                }
                _ => {
                    return Err(AdapterError::invalid_selector(
                        raw,
                        format!("{} is not a key=value pair", requirement),
                    ))
                }
            }
        }
        Ok(labels)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{}={}", k, v)?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
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

/// One term of a selector
#[derive(Debug, Clone, PartialEq, Eq)]
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

    pub fn matches(&self, labels: &LabelSet) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            Operator::Equals | Operator::In => {
                value.map_or(false, |v| self.values.iter().any(|x| x == v))
            }
            Operator::NotEquals | Operator::NotIn => {
                value.map_or(true, |v| self.values.iter().all(|x| x != v))
            }
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
            Operator::GreaterThan | Operator::LessThan => {
                let (Some(actual), Some(bound)) = (
                    value.and_then(|v| v.parse::<i64>().ok()),
                    self.values.first().and_then(|v| v.parse::<i64>().ok()),
                ) else {
                    return false;
                };
                if self.operator == Operator::GreaterThan {
                    actual > bound
                } else {
                    actual < bound
                }
            }
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            Operator::Equals => write!(f, "{}={}", self.key, self.values[0]),
            Operator::NotEquals => write!(f, "{}!={}", self.key, self.values[0]),
            Operator::In => write!(f, "{} in ({})", self.key, self.values.join(",")),
            Operator::NotIn => write!(f, "{} notin ({})", self.key, self.values.join(",")),
            Operator::Exists => write!(f, "{}", self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
            Operator::GreaterThan => write!(f, "{}>{}", self.key, self.values[0]),
            Operator::LessThan => write!(f, "{}<{}", self.key, self.values[0]),
        }
    }
}

/// A parsed label predicate; the empty selector matches everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn matches(&self, labels: &LabelSet) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }

    /// Selector requiring every label of `labels` to be present with its value
    pub fn from_labels(labels: &LabelSet) -> Self {
        let requirements = labels
            .iter()
            .map(|(k, v)| Requirement {
                key: k.to_string(),
                operator: Operator::Equals,
                values: vec![v.to_string()],
            })
            .collect();
        Self { requirements }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let tokens = lex(raw)?;
        let mut parser = Parser {
            raw,
            tokens,
            pos: 0,
        };
        let mut requirements = parser.parse()?;
        requirements.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(Self { requirements })
    }
}

impl FromStr for Selector {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self> {
        Selector::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, requirement) in self.requirements.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", requirement)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Identifier(String),
    Not,
    Equals,
    DoubleEquals,
    NotEquals,
    GreaterThan,
    LessThan,
    OpenParen,
    CloseParen,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Identifier(s) => write!(f, "{:?}", s),
            Token::Not => f.write_str("'!'"),
            Token::Equals => f.write_str("'='"),
            Token::DoubleEquals => f.write_str("'=='"),
            Token::NotEquals => f.write_str("'!='"),
            Token::GreaterThan => f.write_str("'>'"),
            Token::LessThan => f.write_str("'<'"),
            Token::OpenParen => f.write_str("'('"),
            Token::CloseParen => f.write_str("')'"),
            Token::Comma => f.write_str("','"),
        }
    }
}

fn is_special(c: char) -> bool {
    matches!(c, '!' | '=' | '(' | ')' | ',' | '>' | '<')
}

fn lex(raw: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = raw.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if !is_special(c) {
            let mut ident = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || is_special(c) {
                    break;
                }
                ident.push(c);
                chars.next();
            }
            tokens.push(Token::Identifier(ident));
            continue;
        }

        chars.next();
        let token = match c {
            '!' if chars.peek() == Some(&'=') => {
                chars.next();
                Token::NotEquals
            }
            '!' => Token::Not,
            '=' if chars.peek() == Some(&'=') => {
                chars.next();
                Token::DoubleEquals
            }
            '=' => Token::Equals,
            '>' => Token::GreaterThan,
            '<' => Token::LessThan,
            '(' => Token::OpenParen,
            ')' => Token::CloseParen,
            ',' => Token::Comma,
            other => {
                return Err(AdapterError::invalid_selector(
                    raw,
                    format!("unexpected character {:?}", other),
                ))
            }
        };
        tokens.push(token);
    }

    Ok(tokens)
}

struct Parser<'a> {
    raw: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, reason: impl Into<String>) -> AdapterError {
        AdapterError::invalid_selector(self.raw, reason)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn parse(&mut self) -> Result<Vec<Requirement>> {
        let mut requirements = Vec::new();
        if self.tokens.is_empty() {
            return Ok(requirements);
        }

        loop {
            requirements.push(self.parse_requirement()?);
            match self.next() {
                None => return Ok(requirements),
                Some(Token::Comma) if self.peek().is_some() => continue,
                Some(Token::Comma) => return Err(self.error("trailing ','")),
                Some(other) => return Err(self.error(format!("expected ',' but found {}", other))),
            }
        }
    }

    fn parse_requirement(&mut self) -> Result<Requirement> {
        if self.peek() == Some(&Token::Not) {
            self.next();
            let key = self.parse_key()?;
            return Ok(Requirement {
                key,
                operator: Operator::DoesNotExist,
                values: Vec::new(),
            });
        }

        let key = self.parse_key()?;
        let operator = match self.peek() {
            None | Some(Token::Comma) => {
                return Ok(Requirement {
                    key,
                    operator: Operator::Exists,
                    values: Vec::new(),
                })
            }
            Some(Token::Equals) | Some(Token::DoubleEquals) => Operator::Equals,
            Some(Token::NotEquals) => Operator::NotEquals,
            Some(Token::GreaterThan) => Operator::GreaterThan,
            Some(Token::LessThan) => Operator::LessThan,
            Some(Token::Identifier(word)) if word == "in" => Operator::In,
            Some(Token::Identifier(word)) if word == "notin" => Operator::NotIn,
            Some(other) => {
                return Err(self.error(format!("expected an operator after {:?}, found {}", key, other)))
            }
        };
        self.next();

        let values = match operator {
            Operator::In | Operator::NotIn => self.parse_value_set()?,
            Operator::GreaterThan | Operator::LessThan => {
                let value = self.parse_value()?;
                if value.parse::<i64>().is_err() {
                    return Err(self.error(format!("{:?} is not an integer", value)));
                }
                vec![value]
            }
            _ => vec![self.parse_value()?],
        };

        Ok(Requirement {
            key,
            operator,
            values,
        })
    }

    fn parse_key(&mut self) -> Result<String> {
        match self.next() {
            Some(Token::Identifier(key)) => {
                validate_key(&key).map_err(|reason| self.error(reason))?;
                Ok(key)
            }
            Some(other) => Err(self.error(format!("expected a label key, found {}", other))),
            None => Err(self.error("expected a label key")),
        }
    }

    /// A value may be empty, e.g. `tier=` or `tier in (,a)`
    fn parse_value(&mut self) -> Result<String> {
        match self.peek() {
            Some(Token::Identifier(_)) => {
                let Some(Token::Identifier(value)) = self.next() else {
                    unreachable!("peeked an identifier")
                };
                validate_value(&value).map_err(|reason| self.error(reason))?;
                Ok(value)
            }
            None | Some(Token::Comma) | Some(Token::CloseParen) => Ok(String::new()),
            Some(other) => Err(self.error(format!("expected a label value, found {}", other))),
        }
    }

    fn parse_value_set(&mut self) -> Result<Vec<String>> {
        if self.next() != Some(Token::OpenParen) {
            return Err(self.error("expected '(' after set operator"));
        }

        let mut values = BTreeSet::new();
        loop {
            values.insert(self.parse_value()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::CloseParen) => break,
                Some(other) => return Err(self.error(format!("expected ',' or ')', found {}", other))),
                None => return Err(self.error("unterminated value set")),
            }
        }
        if values.iter().all(|v| v.is_empty()) {
            return Err(self.error("values set can't be empty"));
        }
        Ok(values.into_iter().collect())
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

fn validate_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(format!("{:?} must be 1-{} characters", name, MAX_NAME_LEN));
    }
    let starts_ok = name.chars().next().map_or(false, |c| c.is_ascii_alphanumeric());
    let ends_ok = name.chars().last().map_or(false, |c| c.is_ascii_alphanumeric());
    if !starts_ok || !ends_ok || !name.chars().all(is_name_char) {
        return Err(format!(
            "{:?} must consist of alphanumerics, '-', '_' or '.', and begin and end with an alphanumeric",
            name
        ));
    }
    Ok(())
}

fn validate_key(key: &str) -> std::result::Result<(), String> {
    let name = match key.split_once('/') {
        Some((prefix, name)) => {
            let valid_prefix = !prefix.is_empty()
                && prefix.len() <= MAX_PREFIX_LEN
                && prefix
                    .split('.')
                    .all(|part| {
                        !part.is_empty()
                            && part.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
                            && !part.starts_with('-')
                            && !part.ends_with('-')
                    });
            if !valid_prefix {
                return Err(format!("{:?} has an invalid DNS subdomain prefix", key));
            }
            name
        }
        None => key,
    };
    validate_name(name)
}

fn validate_value(value: &str) -> std::result::Result<(), String> {
    if value.is_empty() {
        return Ok(());
    }
    validate_name(value)
}
