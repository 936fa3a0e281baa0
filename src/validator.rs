//! Value predicates bound to properties.
//!
//! A [`Validator`] is a pure predicate over a single JSON value. Properties hold
//! at most one validator per [`ValidatorKind`]; configuring the same kind again
//! replaces the previous one.

use std::fmt::{self, Display};
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::OnceLock;

use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde_json::Value;

/// The declared type of a property.
///
/// `Object`, `Array` and `Dto` are structural; every other tag is a scalar
/// type checked by a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Array,
    Base64,
    Boolean,
    Currency,
    Date,
    DateTime,
    Dto,
    Ein,
    Email,
    Float,
    Integer,
    IntlPhoneNumber,
    IpAddress,
    Name,
    Numeric,
    Object,
    String,
    Time,
    Upc,
    Url,
    UsPhoneNumber,
    Uuid,
}

impl TypeTag {
    /// Every tag in the vocabulary.
    pub const ALL: [TypeTag; 22] = [
        TypeTag::Array,
        TypeTag::Base64,
        TypeTag::Boolean,
        TypeTag::Currency,
        TypeTag::Date,
        TypeTag::DateTime,
        TypeTag::Dto,
        TypeTag::Ein,
        TypeTag::Email,
        TypeTag::Float,
        TypeTag::Integer,
        TypeTag::IntlPhoneNumber,
        TypeTag::IpAddress,
        TypeTag::Name,
        TypeTag::Numeric,
        TypeTag::Object,
        TypeTag::String,
        TypeTag::Time,
        TypeTag::Upc,
        TypeTag::Url,
        TypeTag::UsPhoneNumber,
        TypeTag::Uuid,
    ];

    /// The tag as written in schema descriptions.
    pub fn as_str(self) -> &'static str {
        match self {
            TypeTag::Array => "array",
            TypeTag::Base64 => "base64",
            TypeTag::Boolean => "boolean",
            TypeTag::Currency => "currency",
            TypeTag::Date => "date",
            TypeTag::DateTime => "date_time",
            TypeTag::Dto => "dto",
            TypeTag::Ein => "ein",
            TypeTag::Email => "email",
            TypeTag::Float => "float",
            TypeTag::Integer => "integer",
            TypeTag::IntlPhoneNumber => "intl_phone_number",
            TypeTag::IpAddress => "ip_address",
            TypeTag::Name => "name",
            TypeTag::Numeric => "numeric",
            TypeTag::Object => "object",
            TypeTag::String => "string",
            TypeTag::Time => "time",
            TypeTag::Upc => "upc",
            TypeTag::Url => "url",
            TypeTag::UsPhoneNumber => "us_phone_number",
            TypeTag::Uuid => "uuid",
        }
    }

    /// Returns true for `object` and `dto`, whose value is a nested record.
    pub fn is_object(self) -> bool {
        matches!(self, TypeTag::Object | TypeTag::Dto)
    }

    /// Returns true for `array`.
    pub fn is_array(self) -> bool {
        self == TypeTag::Array
    }

    /// Returns true for tags that hold a plain value.
    pub fn is_scalar(self) -> bool {
        !self.is_object() && !self.is_array()
    }

    /// Checks a value against this tag.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            TypeTag::Array => value.is_array(),
            TypeTag::Object | TypeTag::Dto => value.is_object(),
            TypeTag::String => value.is_string(),
            TypeTag::Integer => is_integer(value),
            TypeTag::Float | TypeTag::Numeric => as_number(value).is_some(),
            TypeTag::Boolean => is_boolean(value),
            TypeTag::Date => text(value).is_some_and(is_date),
            TypeTag::DateTime => text(value).is_some_and(is_date_time),
            TypeTag::Time => text(value).is_some_and(is_time),
            TypeTag::Email => text(value).is_some_and(|s| email_regex().is_match(s)),
            TypeTag::Url => text(value).is_some_and(|s| url::Url::parse(s).is_ok()),
            TypeTag::Uuid => text(value).is_some_and(|s| uuid::Uuid::parse_str(s).is_ok()),
            TypeTag::IpAddress => text(value).is_some_and(|s| s.parse::<IpAddr>().is_ok()),
            TypeTag::Base64 => text(value).is_some_and(|s| {
                base64::engine::general_purpose::STANDARD.decode(s).is_ok()
            }),
            TypeTag::Currency => text(value).is_some_and(|s| currency_regex().is_match(s)),
            TypeTag::Ein => text(value).is_some_and(|s| ein_regex().is_match(s)),
            TypeTag::Name => text(value).is_some_and(|s| name_regex().is_match(s)),
            TypeTag::Upc => scalar_text(value).as_deref().is_some_and(is_upc),
            TypeTag::UsPhoneNumber => text(value).is_some_and(|s| us_phone_regex().is_match(s)),
            TypeTag::IntlPhoneNumber => {
                text(value).is_some_and(|s| intl_phone_regex().is_match(s))
            }
        }
    }
}

impl Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeTag {
    type Err = String;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        TypeTag::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == tag)
            .ok_or_else(|| tag.to_string())
    }
}

/// The slot a validator occupies on a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidatorKind {
    Type,
    Length,
    Range,
    Pattern,
}

/// A predicate over a single value.
#[derive(Debug, Clone)]
pub enum Validator {
    /// The value matches the declared type tag.
    Type(TypeTag),
    /// Character count within bounds. Missing bounds are open.
    Length { min: Option<usize>, max: Option<usize> },
    /// Numeric value within bounds. Missing bounds are open.
    Range { min: Option<f64>, max: Option<f64> },
    /// The value's text matches the regex.
    Pattern(Regex),
}

impl Validator {
    /// Compiles a pattern validator.
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Validator::Pattern)
    }

    /// The slot this validator occupies.
    pub fn kind(&self) -> ValidatorKind {
        match self {
            Validator::Type(_) => ValidatorKind::Type,
            Validator::Length { .. } => ValidatorKind::Length,
            Validator::Range { .. } => ValidatorKind::Range,
            Validator::Pattern(_) => ValidatorKind::Pattern,
        }
    }

    /// Runs the predicate.
    pub fn is_valid(&self, value: &Value) -> bool {
        match self {
            Validator::Type(tag) => tag.accepts(value),
            Validator::Length { min, max } => match scalar_text(value) {
                Some(s) => within(s.chars().count(), *min, *max),
                None => false,
            },
            Validator::Range { min, max } => match as_number(value) {
                Some(n) => within(n, *min, *max),
                None => false,
            },
            Validator::Pattern(regex) => match scalar_text(value) {
                Some(s) => regex.is_match(&s),
                None => false,
            },
        }
    }
}

impl Display for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::Type(tag) => write!(f, "{}", tag),
            Validator::Length { .. } => f.write_str("length"),
            Validator::Range { .. } => f.write_str("range"),
            Validator::Pattern(_) => f.write_str("pattern"),
        }
    }
}

fn within<T: PartialOrd>(value: T, min: Option<T>, max: Option<T>) -> bool {
    min.map_or(true, |min| value >= min) && max.map_or(true, |max| value <= max)
}

fn text(value: &Value) -> Option<&str> {
    value.as_str()
}

/// String content of strings, decimal text of numbers.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_i64() || n.is_u64(),
        Value::String(s) => s.trim().parse::<i64>().is_ok(),
        _ => false,
    }
}

fn is_boolean(value: &Value) -> bool {
    match value {
        Value::Bool(_) => true,
        Value::Number(n) => matches!(n.as_i64(), Some(0) | Some(1)),
        Value::String(s) => matches!(
            s.to_ascii_lowercase().as_str(),
            "true" | "false" | "1" | "0" | "yes" | "no" | "on" | "off"
        ),
        _ => false,
    }
}

fn is_date(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

fn is_date_time(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok()
}

fn is_time(s: &str) -> bool {
    NaiveTime::parse_from_str(s, "%H:%M:%S").is_ok() || NaiveTime::parse_from_str(s, "%H:%M").is_ok()
}

/// UPC-A: 12 digits, the last one a mod-10 check digit.
fn is_upc(s: &str) -> bool {
    let digits: Vec<u32> = s.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != 12 || s.len() != 12 {
        return false;
    }
    let odd: u32 = digits.iter().step_by(2).take(6).sum();
    let even: u32 = digits.iter().skip(1).step_by(2).take(5).sum();
    (10 - (odd * 3 + even) % 10) % 10 == digits[11]
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?)+$")
            .expect("email regex is valid")
    })
}

fn currency_regex() -> &'static Regex {
    static CURRENCY: OnceLock<Regex> = OnceLock::new();
    CURRENCY.get_or_init(|| {
        Regex::new(r"^-?\$?-?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d{2})?$").expect("currency regex is valid")
    })
}

fn ein_regex() -> &'static Regex {
    static EIN: OnceLock<Regex> = OnceLock::new();
    EIN.get_or_init(|| Regex::new(r"^\d{2}-?\d{7}$").expect("ein regex is valid"))
}

fn name_regex() -> &'static Regex {
    static NAME: OnceLock<Regex> = OnceLock::new();
    NAME.get_or_init(|| Regex::new(r"^\p{L}[\p{L} '.\-]*$").expect("name regex is valid"))
}

fn us_phone_regex() -> &'static Regex {
    static US_PHONE: OnceLock<Regex> = OnceLock::new();
    US_PHONE.get_or_init(|| {
        Regex::new(r"^(?:\+?1[\s.\-]?)?(?:\(\d{3}\)|\d{3})[\s.\-]?\d{3}[\s.\-]?\d{4}$")
            .expect("us phone regex is valid")
    })
}

fn intl_phone_regex() -> &'static Regex {
    static INTL_PHONE: OnceLock<Regex> = OnceLock::new();
    INTL_PHONE.get_or_init(|| {
        Regex::new(r"^\+[1-9]\d{0,2}(?:[\s.\-]?\d){4,14}$").expect("intl phone regex is valid")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tag_round_trip_through_str() {
        for tag in TypeTag::ALL {
            assert_eq!(tag.as_str().parse::<TypeTag>(), Ok(tag));
        }
        assert_eq!("int".parse::<TypeTag>(), Err("int".to_string()));
    }

    #[test]
    fn test_structural_tags() {
        assert!(TypeTag::Object.is_object());
        assert!(TypeTag::Dto.is_object());
        assert!(TypeTag::Array.is_array());
        assert!(TypeTag::Email.is_scalar());
        assert!(!TypeTag::Array.is_scalar());
    }

    #[test]
    fn test_integer_accepts_numeric_strings() {
        assert!(TypeTag::Integer.accepts(&json!(42)));
        assert!(TypeTag::Integer.accepts(&json!("42")));
        assert!(!TypeTag::Integer.accepts(&json!(4.2)));
        assert!(!TypeTag::Integer.accepts(&json!("forty")));
    }

    #[test]
    fn test_float_and_numeric() {
        assert!(TypeTag::Float.accepts(&json!(1.5)));
        assert!(TypeTag::Float.accepts(&json!(3)));
        assert!(TypeTag::Numeric.accepts(&json!("2.5")));
        assert!(!TypeTag::Numeric.accepts(&json!("abc")));
        assert!(!TypeTag::Numeric.accepts(&json!(true)));
    }

    #[test]
    fn test_boolean() {
        assert!(TypeTag::Boolean.accepts(&json!(false)));
        assert!(TypeTag::Boolean.accepts(&json!("yes")));
        assert!(TypeTag::Boolean.accepts(&json!(1)));
        assert!(!TypeTag::Boolean.accepts(&json!(2)));
        assert!(!TypeTag::Boolean.accepts(&json!("maybe")));
    }

    #[test]
    fn test_dates_and_times() {
        assert!(TypeTag::Date.accepts(&json!("1978-01-01")));
        assert!(!TypeTag::Date.accepts(&json!("1978-02-30")));
        assert!(TypeTag::DateTime.accepts(&json!("2024-01-01 10:00:00")));
        assert!(TypeTag::DateTime.accepts(&json!("2024-01-01T10:00:00Z")));
        assert!(!TypeTag::DateTime.accepts(&json!("2024-01-01")));
        assert!(TypeTag::Time.accepts(&json!("23:59")));
        assert!(TypeTag::Time.accepts(&json!("23:59:59")));
        assert!(!TypeTag::Time.accepts(&json!("25:00")));
    }

    #[test]
    fn test_email_url_uuid_ip() {
        assert!(TypeTag::Email.accepts(&json!("john@example.com")));
        assert!(!TypeTag::Email.accepts(&json!("not-an-email")));
        assert!(TypeTag::Url.accepts(&json!("https://example.com/a?b=c")));
        assert!(!TypeTag::Url.accepts(&json!("example")));
        assert!(TypeTag::Uuid.accepts(&json!("67e55044-10b1-426f-9247-bb680e5fe0c8")));
        assert!(!TypeTag::Uuid.accepts(&json!("67e55044")));
        assert!(TypeTag::IpAddress.accepts(&json!("192.168.0.1")));
        assert!(TypeTag::IpAddress.accepts(&json!("::1")));
        assert!(!TypeTag::IpAddress.accepts(&json!("300.1.1.1")));
    }

    #[test]
    fn test_formatted_strings() {
        assert!(TypeTag::Base64.accepts(&json!("aGVsbG8=")));
        assert!(!TypeTag::Base64.accepts(&json!("***")));
        assert!(TypeTag::Currency.accepts(&json!("$1,234.56")));
        assert!(TypeTag::Currency.accepts(&json!("10")));
        assert!(!TypeTag::Currency.accepts(&json!("1.2.3")));
        assert!(TypeTag::Ein.accepts(&json!("12-3456789")));
        assert!(!TypeTag::Ein.accepts(&json!("123-456789")));
        assert!(TypeTag::Name.accepts(&json!("Mary-Jane O'Neil")));
        assert!(!TypeTag::Name.accepts(&json!("R2D2")));
        assert!(TypeTag::Upc.accepts(&json!("036000291452")));
        assert!(!TypeTag::Upc.accepts(&json!("036000291453")));
        assert!(TypeTag::UsPhoneNumber.accepts(&json!("(555) 123-4567")));
        assert!(!TypeTag::UsPhoneNumber.accepts(&json!("123")));
        assert!(TypeTag::IntlPhoneNumber.accepts(&json!("+44 20 7946 0958")));
        assert!(!TypeTag::IntlPhoneNumber.accepts(&json!("020 7946 0958")));
    }

    #[test]
    fn test_length_counts_characters() {
        let validator = Validator::Length {
            min: Some(3),
            max: Some(5),
        };
        assert!(validator.is_valid(&json!("日本語")));
        assert!(!validator.is_valid(&json!("ab")));
        assert!(!validator.is_valid(&json!("abcdef")));
        assert!(validator.is_valid(&json!(1234)));
        assert!(!validator.is_valid(&json!(true)));
    }

    #[test]
    fn test_open_bounds() {
        let at_least = Validator::Range {
            min: Some(18.0),
            max: None,
        };
        assert!(at_least.is_valid(&json!(1_000_000)));
        assert!(!at_least.is_valid(&json!(17)));

        let at_most = Validator::Length {
            min: None,
            max: Some(2),
        };
        assert!(at_most.is_valid(&json!("")));
        assert!(!at_most.is_valid(&json!("abc")));
    }

    #[test]
    fn test_range_accepts_numeric_strings() {
        let validator = Validator::Range {
            min: Some(18.0),
            max: Some(100.0),
        };
        assert!(validator.is_valid(&json!(40)));
        assert!(validator.is_valid(&json!("40")));
        assert!(!validator.is_valid(&json!(150)));
        assert!(!validator.is_valid(&json!("old")));
    }

    #[test]
    fn test_pattern() {
        let validator = Validator::pattern(r"^\d{5}$").unwrap();
        assert!(validator.is_valid(&json!("90210")));
        assert!(validator.is_valid(&json!(90210)));
        assert!(!validator.is_valid(&json!("9021")));
        assert!(Validator::pattern("[broken").is_err());
    }

    #[test]
    fn test_kind_and_display() {
        assert_eq!(Validator::Type(TypeTag::Email).kind(), ValidatorKind::Type);
        assert_eq!(Validator::Type(TypeTag::Email).to_string(), "email");
        let length = Validator::Length { min: None, max: None };
        assert_eq!(length.kind(), ValidatorKind::Length);
        assert_eq!(length.to_string(), "length");
        assert_eq!(Validator::pattern("a").unwrap().to_string(), "pattern");
    }
}
