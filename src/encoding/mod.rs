//! Byte input decoding.
//!
//! Parsing works on UTF-8 text. Byte and reader input is decoded first:
//!
//! 1. A byte order mark selects UTF-8, UTF-16LE or UTF-16BE and is skipped.
//! 2. Without a BOM the input is assumed to be UTF-8.
//! 3. An `encoding="..."` pseudo-attribute in the XML declaration overrides the
//!    assumption when it names a different encoding.
//!
//! Transcoding goes through `encoding_rs`.

use thiserror::Error;

/// Input bytes could not be decoded into text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("encoding error: {message}")]
pub struct EncodingError {
    /// A human-readable description of the failure.
    pub message: String,
}

impl EncodingError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// How far into the input the XML declaration is searched for.
const DECLARATION_SCAN_LIMIT: usize = 256;

/// Inspects the byte order mark.
///
/// Returns the encoding label and the number of BOM bytes to skip. Input
/// without a BOM is reported as UTF-8 with nothing to skip.
///
/// # Examples
///
/// ```
/// use xmlshape::encoding::detect_encoding;
///
/// assert_eq!(detect_encoding(b"\xEF\xBB\xBF<a/>"), ("UTF-8", 3));
/// assert_eq!(detect_encoding(b"\xFF\xFE<\x00"), ("UTF-16LE", 2));
/// assert_eq!(detect_encoding(b"<a/>"), ("UTF-8", 0));
/// ```
#[must_use]
pub fn detect_encoding(bytes: &[u8]) -> (&'static str, usize) {
    match bytes {
        [0xEF, 0xBB, 0xBF, ..] => ("UTF-8", 3),
        [0xFE, 0xFF, ..] => ("UTF-16BE", 2),
        [0xFF, 0xFE, ..] => ("UTF-16LE", 2),
        _ => ("UTF-8", 0),
    }
}

/// Transcodes `bytes` from the encoding named by `label` into UTF-8.
///
/// # Errors
///
/// Returns `EncodingError` when the label is unknown to `encoding_rs` or the
/// bytes are malformed for that encoding.
pub fn transcode(bytes: &[u8], label: &str) -> Result<String, EncodingError> {
    let encoding = encoding_rs::Encoding::for_label(label.as_bytes())
        .ok_or_else(|| EncodingError::new(format!("unsupported encoding: {label}")))?;
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(EncodingError::new(format!(
            "malformed byte sequence for encoding {label}"
        )));
    }
    Ok(text.into_owned())
}

/// Decodes raw XML bytes into a UTF-8 string.
///
/// # Errors
///
/// Returns `EncodingError` when no usable encoding can be determined or the
/// bytes do not decode cleanly.
///
/// # Examples
///
/// ```
/// use xmlshape::encoding::decode_to_utf8;
///
/// let text = decode_to_utf8(b"<?xml version=\"1.0\"?><root/>").unwrap();
/// assert!(text.ends_with("<root/>"));
/// ```
pub fn decode_to_utf8(bytes: &[u8]) -> Result<String, EncodingError> {
    let (bom_label, skip) = detect_encoding(bytes);
    let content = &bytes[skip..];

    if bom_label != "UTF-8" {
        let text = transcode(content, bom_label)?;
        return match declared_encoding(text.as_bytes()) {
            Some(declared) if !same_encoding(&declared, bom_label) => {
                transcode(content, &declared)
            }
            _ => Ok(text),
        };
    }

    // The declaration is ASCII in every encoding we accept, so it can be read
    // before knowing how to decode the rest.
    match declared_encoding(content) {
        Some(declared) if !same_encoding(&declared, "UTF-8") => transcode(content, &declared),
        _ => std::str::from_utf8(content)
            .map(str::to_string)
            .map_err(|err| EncodingError::new(format!("input is not valid UTF-8: {err}"))),
    }
}

/// Reads the `encoding` pseudo-attribute of a leading XML declaration.
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let scan = &bytes[..bytes.len().min(DECLARATION_SCAN_LIMIT)];
    if !scan.starts_with(b"<?xml") {
        return None;
    }
    let end = scan.windows(2).position(|w| w == b"?>")?;
    let declaration = &scan[..end];
    let needle = b"encoding";
    let at = declaration
        .windows(needle.len())
        .position(|w| w == needle)?;
    let rest = trim_ascii_start(&declaration[at + needle.len()..]);
    let rest = trim_ascii_start(rest.strip_prefix(b"=")?);
    let (&quote, rest) = rest.split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let len = rest.iter().position(|&b| b == quote)?;
    let label = &rest[..len];
    label
        .is_ascii()
        .then(|| String::from_utf8_lossy(label).into_owned())
}

fn trim_ascii_start(bytes: &[u8]) -> &[u8] {
    let skip = bytes
        .iter()
        .take_while(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
        .count();
    &bytes[skip..]
}

/// Compares two labels, treating `UTF-16` as matching either byte order.
fn same_encoding(declared: &str, actual: &str) -> bool {
    let declared = declared.to_ascii_uppercase();
    let actual = actual.to_ascii_uppercase();
    let utf8 = |label: &str| matches!(label, "UTF-8" | "UTF8");
    declared == actual
        || (utf8(&declared) && utf8(&actual))
        || (declared == "UTF-16" && actual.starts_with("UTF-16"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_boms() {
        assert_eq!(detect_encoding(b"\xEF\xBB\xBF<root/>"), ("UTF-8", 3));
        assert_eq!(detect_encoding(b"\xFE\xFF\x00<"), ("UTF-16BE", 2));
        assert_eq!(detect_encoding(b"\xFF\xFE<\x00"), ("UTF-16LE", 2));
        assert_eq!(detect_encoding(b""), ("UTF-8", 0));
        assert_eq!(detect_encoding(b"\xEF"), ("UTF-8", 0));
    }

    #[test]
    fn test_decode_plain_utf8() {
        let text = decode_to_utf8("<root>世界</root>".as_bytes()).unwrap();
        assert_eq!(text, "<root>世界</root>");
    }

    #[test]
    fn test_decode_strips_utf8_bom() {
        let text = decode_to_utf8(b"\xEF\xBB\xBF<root/>").unwrap();
        assert_eq!(text, "<root/>");
    }

    #[test]
    fn test_decode_utf16le() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "<a>é</a>".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_to_utf8(&bytes).unwrap(), "<a>é</a>");
    }

    #[test]
    fn test_decode_declared_latin1() {
        let mut bytes = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>".to_vec();
        bytes.extend_from_slice(b"<root>caf\xE9</root>");
        let text = decode_to_utf8(&bytes).unwrap();
        assert!(text.ends_with("<root>caf\u{e9}</root>"));
    }

    #[test]
    fn test_declared_encoding_quotes() {
        assert_eq!(
            declared_encoding(b"<?xml version='1.0' encoding='UTF-8'?>"),
            Some("UTF-8".to_string())
        );
        assert_eq!(declared_encoding(b"<?xml version=\"1.0\"?><a/>"), None);
        assert_eq!(declared_encoding(b"<a/>"), None);
    }

    #[test]
    fn test_transcode_known_label() {
        assert_eq!(transcode(b"caf\xE9", "windows-1252").unwrap(), "caf\u{e9}");
        let err = transcode(b"\xFF\xFF", "UTF-8").unwrap_err();
        assert!(err.message.contains("malformed byte sequence"));
    }

    #[test]
    fn test_transcode_unknown_label() {
        let err = transcode(b"hello", "NOT-AN-ENCODING").unwrap_err();
        assert!(err.message.contains("unsupported encoding"));
    }

    #[test]
    fn test_decode_invalid_utf8() {
        assert!(decode_to_utf8(&[0x80, 0x81, 0x82]).is_err());
    }
}
