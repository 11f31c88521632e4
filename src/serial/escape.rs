//! Entity escaping for serialized values.
//!
//! By default only the characters that would break the surrounding markup
//! are escaped: `&`, `<` and `>` in text, `&`, `"` and `'` in attribute
//! values. With `all` set every predefined entity is written out.

/// Where an escaped value is going to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Context {
    Text,
    Attribute,
}

/// Escapes `text` for `context` into a new string.
pub(crate) fn escape(text: &str, context: Context, all: bool) -> String {
    let mut out = String::with_capacity(text.len());
    write_escaped(&mut out, text, context, all);
    out
}

/// Writes `text` to `out` with the escaping rules of `context`.
pub(crate) fn write_escaped(out: &mut String, text: &str, context: Context, all: bool) {
    let in_text = context == Context::Text;
    for ch in text.chars() {
        let entity = match ch {
            '&' => Some("&amp;"),
            '<' if all || in_text => Some("&lt;"),
            '>' if all || in_text => Some("&gt;"),
            '"' if all || !in_text => Some("&quot;"),
            '\'' if all || !in_text => Some("&apos;"),
            _ => None,
        };
        match entity {
            Some(entity) => out.push_str(entity),
            None => out.push(ch),
        }
    }
}
