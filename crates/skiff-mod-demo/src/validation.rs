use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

static LETTER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-zA-Z]").expect("static regex"));
static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]").expect("static regex"));
static ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9 ]*$").expect("static regex"));
static LOWERCASE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z]*$").expect("static regex"));
static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((([0-9]{1})*[- .(]*([0-9]{3})[- .)]*[0-9]{3}[- .]*[0-9]{4})+)*$").expect("static regex")
});
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]*@[A-Za-z0-9_-][A-Za-z0-9_.-]*\.[A-Za-z0-9_]+$")
        .expect("static regex")
});
static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(((http|https|ftp)://)?[a-zA-Z0-9.-]+\.[a-zA-Z0-9]{2,4}[a-zA-Z0-9/+=%&_.~?-]*)*$")
        .expect("static regex")
});
static US_ZIP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{5}(-[0-9]{4})?$").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// The rule name is not known.
    Invalid(String),
    /// `minlength`/`maxlength` without a usable `:<n>` bound.
    BadLength(String),
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleError::Invalid(rule) => write!(f, "invalid rule: {rule}"),
            RuleError::BadLength(rule) => write!(f, "rule needs a numeric bound: {rule}"),
        }
    }
}

impl std::error::Error for RuleError {}

/// A single field check, written `name` or `name:<n>`. Names are
/// case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Required,
    ContainsLetter,
    ContainsNumber,
    Alphanumeric,
    Lowercase,
    Phone,
    Email,
    Url,
    MinLength(usize),
    MaxLength(usize),
    UsZip,
}

impl FromStr for Rule {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let (name, bound) = match lowered.split_once(':') {
            Some((name, bound)) => (name, Some(bound)),
            None => (lowered.as_str(), None),
        };
        let length = || {
            bound
                .and_then(|b| b.trim().parse::<usize>().ok())
                .ok_or_else(|| RuleError::BadLength(s.to_string()))
        };
        Ok(match name {
            "required" => Rule::Required,
            "containsletter" => Rule::ContainsLetter,
            "containsnumber" => Rule::ContainsNumber,
            "alphanumeric" => Rule::Alphanumeric,
            "lowercase" => Rule::Lowercase,
            "phone" => Rule::Phone,
            "email" => Rule::Email,
            "url" => Rule::Url,
            "minlength" => Rule::MinLength(length()?),
            "maxlength" => Rule::MaxLength(length()?),
            "uszip" => Rule::UsZip,
            _ => return Err(RuleError::Invalid(s.to_string())),
        })
    }
}

impl Rule {
    pub fn test(&self, value: &str) -> bool {
        match self {
            Rule::Required => !value.is_empty(),
            Rule::ContainsLetter => LETTER.is_match(value),
            Rule::ContainsNumber => NUMBER.is_match(value),
            Rule::Alphanumeric => ALPHANUMERIC.is_match(value),
            Rule::Lowercase => LOWERCASE.is_match(value),
            Rule::Phone => PHONE.is_match(value),
            Rule::Email => EMAIL.is_match(value),
            Rule::Url => URL.is_match(value),
            Rule::MinLength(n) => value.chars().count() >= *n,
            Rule::MaxLength(n) => value.chars().count() <= *n,
            Rule::UsZip => US_ZIP.is_match(value),
        }
    }
}

/// The `utils/validation` dependency.
#[derive(Debug, Default)]
pub struct Validation;

impl Validation {
    pub fn new() -> Self {
        Self
    }

    /// Check `value` against one rule.
    pub fn test(&self, rule: &str, value: &str) -> Result<bool, RuleError> {
        Ok(rule.parse::<Rule>()?.test(value))
    }

    /// Check `value` against every rule and return the ones it fails.
    pub fn failures<'r>(&self, rules: &[&'r str], value: &str) -> Result<Vec<&'r str>, RuleError> {
        let mut failed = Vec::new();
        for rule in rules {
            if !self.test(rule, value)? {
                failed.push(*rule);
            }
        }
        Ok(failed)
    }
}
