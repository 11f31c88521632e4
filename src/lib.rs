//! # xmlshape
//!
//! Parses XML into an ordered [`Value`] tree and stringifies such trees back
//! to XML. Attributes become `@name` entries, text becomes `#text`, repeated
//! children become arrays, and trivial nodes are flattened into plain
//! strings, attribute maps or `null`. Cleaning, flattening and value revival
//! (entities, numbers, booleans, custom hooks) are configurable, and with
//! default options a parsed document survives a stringify/parse round trip.
//!
//! ## Quick Start
//!
//! ```
//! let doc = xmlshape::parse_str(r#"<root lang="en"><child>Hello</child></root>"#).unwrap();
//! assert_eq!(doc["root"]["@lang"].as_str(), Some("en"));
//! assert_eq!(doc["root"]["child"].as_str(), Some("Hello"));
//!
//! let xml = xmlshape::stringify(&doc).unwrap();
//! assert_eq!(xml, "<root lang=\"en\">\n  <child>Hello</child>\n</root>");
//! ```

pub mod encoding;
pub mod error;
pub mod parser;
pub mod postprocess;
pub mod serial;
pub mod tree;
pub mod value;

// Re-export primary types at the crate root for convenience.
pub use error::{Error, SyntaxError};
pub use parser::{parse_str, parse_str_with_options, ParseOptions};
pub use serial::{cdata, comment, stringify, stringify_with_options, StringifyOptions};
pub use tree::{Document, NodeId};
pub use value::{Map, Value};
