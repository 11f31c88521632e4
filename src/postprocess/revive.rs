//! Built-in revivals: trimming, entity decoding, number and boolean coercion.

use std::borrow::Cow;

use crate::parser::ReviveOptions;
use crate::value::Value;

/// The predefined XML entities, in decoding order (`&amp;` last).
const ENTITIES: [(&str, &str); 5] = [
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&apos;", "'"),
    ("&quot;", "\""),
    ("&amp;", "&"),
];

/// Longest digit run accepted in a character reference.
const MAX_CHAR_REF_DIGITS: usize = 10;

/// Applies the built-in revivals to a raw attribute or text value.
///
/// `trim` is passed separately because text in a preserve scope is never
/// trimmed. `allow_numbers` is `false` for the document's `@version`.
pub(crate) fn revive(raw: &str, trim: bool, options: &ReviveOptions, allow_numbers: bool) -> Value {
    let text = if trim { raw.trim() } else { raw };
    let text = if options.entities {
        decode_entities(text)
    } else {
        Cow::Borrowed(text)
    };
    if options.numbers && allow_numbers {
        if let Some(number) = parse_number(&text) {
            return Value::Number(number);
        }
    }
    if options.booleans {
        if text.eq_ignore_ascii_case("true") {
            return Value::Bool(true);
        }
        if text.eq_ignore_ascii_case("false") {
            return Value::Bool(false);
        }
    }
    Value::String(text.into_owned())
}

/// Decodes character references and the five predefined entities.
///
/// Character references are decoded over the whole string first, then each
/// named entity in turn, `&amp;` last. So `&#38;lt;` becomes `<` while
/// `&amp;lt;` becomes `&lt;`. Anything that is not a well-formed reference is
/// left as written.
///
/// ```
/// use xmlshape::postprocess::decode_entities;
///
/// assert_eq!(decode_entities("&lt;a&gt; &#38; &#x41;"), "<a> & A");
/// assert_eq!(decode_entities("&amp;lt;"), "&lt;");
/// assert_eq!(decode_entities("&#38;lt;"), "<");
/// assert_eq!(decode_entities("AT&T"), "AT&T");
/// ```
#[must_use]
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }
    let mut decoded = decode_char_refs(text);
    for (entity, replacement) in ENTITIES {
        if decoded.contains(entity) {
            decoded = Cow::Owned(decoded.replace(entity, replacement));
        }
    }
    decoded
}

fn decode_char_refs(text: &str) -> Cow<'_, str> {
    if !text.contains("&#") {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find("&#") {
        out.push_str(&rest[..at]);
        rest = &rest[at..];
        match char_ref(rest) {
            Some((ch, len)) => {
                out.push(ch);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Decodes the character reference at the start of `text` (which begins
/// with `&#`). Returns the character and the length of the reference.
fn char_ref(text: &str) -> Option<(char, usize)> {
    let body = &text[2..];
    let (digits, radix, prefix) = match body.strip_prefix('x') {
        Some(hex) => (hex, 16, 3),
        None => (body, 10, 2),
    };
    let len = digits
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric())
        .count();
    if len == 0 || len > MAX_CHAR_REF_DIGITS || digits.as_bytes().get(len) != Some(&b';') {
        return None;
    }
    let digits = &digits[..len];
    if !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    let ch = char::from_u32(u32::from_str_radix(digits, radix).ok()?)?;
    Some((ch, prefix + len + 1))
}

/// Parses a string the way JavaScript's `Number()` does, keeping only
/// finite results.
///
/// Surrounding whitespace is ignored; blank strings are not numbers.
/// `0x`, `0o` and `0b` prefixes select another radix (unsigned only).
///
/// ```
/// use xmlshape::postprocess::parse_number;
///
/// assert_eq!(parse_number(" 42 "), Some(42.0));
/// assert_eq!(parse_number("-1.5e3"), Some(-1500.0));
/// assert_eq!(parse_number("0xac"), Some(172.0));
/// assert_eq!(parse_number("Infinity"), None);
/// assert_eq!(parse_number(""), None);
/// ```
#[must_use]
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let radix = match text.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        let digits = &text[2..];
        if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
            return None;
        }
        let value = digits.chars().fold(0.0_f64, |acc, c| {
            acc * f64::from(radix) + f64::from(c.to_digit(radix).unwrap_or(0))
        });
        return value.is_finite().then_some(value);
    }
    if !text
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
    {
        return None;
    }
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}
