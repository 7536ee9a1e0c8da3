//! XML parsing and serialization built around [`TreeBuilder`].

mod builder;
pub mod printer;

pub use builder::{LoadStatus, TreeBuilder};
pub use printer::{to_compact_string, to_pretty_string};

use crate::error::{Error, Result};
use crate::node::NodeRef;

/// Parses an XML string into a tree and returns its root.
///
/// The input is wrapped in a synthetic envelope first, so text with
/// multiple top-level elements parses; the returned root is then the
/// envelope node holding them as children.
pub fn parse_str(text: &str) -> Result<NodeRef> {
    let mut builder = TreeBuilder::new();
    builder.load(Some(text), false, true)?;
    builder
        .root()
        .ok_or_else(|| Error::MalformedInput("document produced no root element".to_string()))
}

/// Parses an XML file into a tree and returns its root. Same envelope
/// handling as [`parse_str`].
pub fn parse_file(path: &str) -> Result<NodeRef> {
    let mut builder = TreeBuilder::new();
    builder.load(Some(path), true, true)?;
    builder
        .root()
        .ok_or_else(|| Error::MalformedInput("document produced no root element".to_string()))
}
