// Convert source values (JSON numbers, scraped text) into display strings.
// Every function is total: empty/missing -> "", unparseable -> input as-is.

use std::borrow::Cow;

/// A value as it arrives from a source, before formatting.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue<'a> {
    Missing,
    Number(f64),
    Text(Cow<'a, str>),
}

impl From<f64> for RawValue<'_> {
    fn from(v: f64) -> Self {
        RawValue::Number(v)
    }
}

impl From<Option<f64>> for RawValue<'_> {
    fn from(v: Option<f64>) -> Self {
        v.map_or(RawValue::Missing, RawValue::Number)
    }
}

impl<'a> From<&'a str> for RawValue<'a> {
    fn from(s: &'a str) -> Self {
        RawValue::Text(Cow::Borrowed(s))
    }
}

impl<'a> From<&'a serde_json::Value> for RawValue<'a> {
    fn from(v: &'a serde_json::Value) -> Self {
        use serde_json::Value;
        match v {
            Value::Null => RawValue::Missing,
            Value::Number(n) => n.as_f64().map_or_else(
                || RawValue::Text(Cow::Owned(n.to_string())),
                RawValue::Number,
            ),
            Value::String(s) => RawValue::Text(Cow::Borrowed(s)),
            other => RawValue::Text(Cow::Owned(other.to_string())),
        }
    }
}

impl<'a> From<Option<&'a serde_json::Value>> for RawValue<'a> {
    fn from(v: Option<&'a serde_json::Value>) -> Self {
        v.map_or(RawValue::Missing, RawValue::from)
    }
}

// Either a finite number, or the text to hand back unchanged.
enum Parsed<'a> {
    Empty,
    Finite(f64),
    Verbatim(Cow<'a, str>),
}

fn parse(raw: RawValue<'_>) -> Parsed<'_> {
    match raw {
        RawValue::Missing => Parsed::Empty,
        RawValue::Number(v) if v.is_finite() => Parsed::Finite(v),
        RawValue::Number(v) => Parsed::Verbatim(Cow::Owned(v.to_string())),
        RawValue::Text(s) if s.is_empty() => Parsed::Empty,
        RawValue::Text(s) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Parsed::Finite(v),
            _ => Parsed::Verbatim(s),
        },
    }
}

/// `-3.456` -> `"-3.46%"`
pub fn to_percent_string<'a>(x: impl Into<RawValue<'a>>) -> String {
    match parse(x.into()) {
        Parsed::Empty => String::new(),
        Parsed::Finite(v) => format!("{:.2}%", v),
        Parsed::Verbatim(s) => s.into_owned(),
    }
}

/// `1234.5` -> `"$1,234.5"`, `100` -> `"$100"`
pub fn to_money_string<'a>(x: impl Into<RawValue<'a>>) -> String {
    match parse(x.into()) {
        Parsed::Empty => String::new(),
        Parsed::Finite(v) => format!("${}", grouped_fixed8(v)),
        Parsed::Verbatim(s) => s.into_owned(),
    }
}

/// Same as [`to_money_string`] without the currency prefix.
pub fn to_plain_number_string<'a>(x: impl Into<RawValue<'a>>) -> String {
    match parse(x.into()) {
        Parsed::Empty => String::new(),
        Parsed::Finite(v) => grouped_fixed8(v),
        Parsed::Verbatim(s) => s.into_owned(),
    }
}

// 8 fractional digits, comma-grouped integer part, trailing zeros and dot removed.
fn grouped_fixed8(v: f64) -> String {
    let fixed = format!("{:.8}", v);
    let (sign, digits) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));

    let mut out = String::with_capacity(fixed.len() + int_part.len() / 3);
    out.push_str(sign);
    out.push_str(&group_thousands(int_part));
    out.push('.');
    out.push_str(frac_part);

    let trimmed = out.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
