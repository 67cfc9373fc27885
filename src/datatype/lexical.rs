//! Lexical rules shared by the built-in codecs: XML whitespace handling and
//! the canonical forms of booleans, floating point numbers and hex binary.

use crate::errors::ParseError;
use std::borrow::Cow;

/// Whether `c` is one of the four XML whitespace characters
#[inline]
pub fn is_xml_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

/// Whether the text consists of XML whitespace only (or is empty)
#[inline]
pub fn is_whitespace(text: &str) -> bool {
    text.bytes().all(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
}

/// Removes leading and trailing XML whitespace (`whiteSpace="collapse"` for
/// values that cannot contain inner whitespace)
#[inline]
pub fn trim(text: &str) -> &str {
    text.trim_matches(is_xml_whitespace)
}

/// Applies `whiteSpace="collapse"`: trims and replaces every inner run of
/// whitespace with one space
pub fn collapse(text: &str) -> Cow<str> {
    let trimmed = trim(text);
    let needs_work = trimmed
        .as_bytes()
        .windows(2)
        .any(|w| is_xml_whitespace(w[0] as char) && is_xml_whitespace(w[1] as char))
        || trimmed.bytes().any(|b| matches!(b, b'\t' | b'\n' | b'\r'));
    if !needs_work {
        return Cow::Borrowed(trimmed);
    }
    let mut out = String::with_capacity(trimmed.len());
    let mut in_space = false;
    for c in trimmed.chars() {
        if is_xml_whitespace(c) {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    Cow::Owned(out)
}

/// Splits a list value (`xs:list`) into its whitespace-separated tokens
pub fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(is_xml_whitespace).filter(|t| !t.is_empty())
}

/// `xs:boolean`: `true`, `false`, `1` or `0`
pub fn parse_boolean(text: &str) -> Result<bool, ParseError> {
    match trim(text) {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ParseError::invalid("xs:boolean", text)),
    }
}

macro_rules! float_lexical {
    ($parse:ident, $print:ident, $ty:ty, $name:literal) => {
        #[doc = concat!("`", $name, "` lexical form, accepting `INF`, `-INF` and `NaN`")]
        pub fn $parse(text: &str) -> Result<$ty, ParseError> {
            match trim(text) {
                "INF" | "+INF" => Ok(<$ty>::INFINITY),
                "-INF" => Ok(<$ty>::NEG_INFINITY),
                "NaN" => Ok(<$ty>::NAN),
                // Rust accepts spellings the schema does not
                t if t.eq_ignore_ascii_case("inf")
                    || t.eq_ignore_ascii_case("infinity")
                    || t.eq_ignore_ascii_case("+infinity")
                    || t.eq_ignore_ascii_case("-infinity")
                    || t.eq_ignore_ascii_case("-inf")
                    || t.eq_ignore_ascii_case("nan") =>
                {
                    Err(ParseError::invalid($name, text))
                }
                t => t.parse().map_err(|_| ParseError::invalid($name, text)),
            }
        }

        #[doc = concat!("Canonical `", $name, "` lexical form")]
        pub fn $print(value: $ty) -> String {
            if value.is_nan() {
                "NaN".to_string()
            } else if value == <$ty>::INFINITY {
                "INF".to_string()
            } else if value == <$ty>::NEG_INFINITY {
                "-INF".to_string()
            } else {
                value.to_string()
            }
        }
    };
}

float_lexical!(parse_float, print_float, f32, "xs:float");
float_lexical!(parse_double, print_double, f64, "xs:double");

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// `xs:hexBinary` canonical form (upper case)
pub fn print_hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for b in data {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0xF) as usize] as char);
    }
    out
}

/// `xs:hexBinary`, case insensitive
pub fn parse_hex(text: &str) -> Result<Vec<u8>, ParseError> {
    fn nibble(b: u8) -> Option<u8> {
        match b {
            b'0'..=b'9' => Some(b - b'0'),
            b'a'..=b'f' => Some(b - b'a' + 10),
            b'A'..=b'F' => Some(b - b'A' + 10),
            _ => None,
        }
    }
    let t = trim(text).as_bytes();
    if t.len() % 2 != 0 {
        return Err(ParseError::invalid("xs:hexBinary", text));
    }
    t.chunks(2)
        .map(|pair| match (nibble(pair[0]), nibble(pair[1])) {
            (Some(h), Some(l)) => Ok(h << 4 | l),
            _ => Err(ParseError::invalid("xs:hexBinary", text)),
        })
        .collect()
}
