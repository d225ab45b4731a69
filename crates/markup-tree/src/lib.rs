//! Markup-Tree: hierarchical markup to normalized key/value trees
//!
//! Converts analysis reports (attributes, text, nested and repeated
//! elements) into a canonical tree that serializes to JSON:
//!
//! - attributes live under `@attributes`, trimmed direct text under `#text`
//! - a tag repeated under one parent becomes an ordered list
//! - a tag seen once stays a single value, never a one-element list
//! - text-only leaves collapse to plain strings
//! - the document root is wrapped as `{ <root tag>: <tree> }`

pub mod convert;
pub mod error;
pub mod report;
pub mod tree;

pub use convert::{normalize_element, normalize_str};
pub use error::{ConvertError, Result};
pub use report::{convert_file, convert_report, load_normalized, ReportPaths};
pub use tree::{Child, Element, NormalizedDocument, NormalizedTree, ATTRIBUTES_KEY, TEXT_KEY};
