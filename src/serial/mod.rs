//! XML serialization.
//!
//! This module writes a document [`Value`](crate::Value) back to XML text.
//! It is the inverse of [`parse_str`](crate::parse_str): with default
//! options, parsing the output of [`stringify`] yields the value that was
//! stringified.

mod escape;
pub mod xml;

pub use xml::{
    cdata, comment, stringify, stringify_with_options, FormatOptions, ReplaceArgs,
    ReplaceOptions, Replacer, StringifyOptions,
};
