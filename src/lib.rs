//! A mutable in-memory XML tree with an event-driven builder.
//!
//! The tree is made of reference-counted [`TreeNode`]s that carry a tag
//! (or comment marker), attributes, text, and an ordered child list with
//! weak parent back-links. [`TreeBuilder`] assembles trees from parser
//! events, tolerating comments before the root element and inputs with
//! multiple top-level elements (wrapped in a synthetic envelope).
//!
//! ```
//! use xml_treenode::{parse_str, to_compact_string, TreeNode};
//!
//! let root = parse_str("<library><book id=\"1\">Dune</book></library>").unwrap();
//! let books = TreeNode::find_all_by_name(&root, "book");
//! assert_eq!(books.len(), 1);
//! assert_eq!(
//!     to_compact_string(&books[0]),
//!     "<book id=\"1\">Dune</book>"
//! );
//! ```

pub mod error;
pub mod node;
pub mod xml;

pub use error::{Error, Result};
pub use node::{Label, Lookup, NodeList, NodeRef, TreeIter, TreeNode, WeakNodeRef};
pub use xml::{parse_file, parse_str, to_compact_string, to_pretty_string, LoadStatus, TreeBuilder};
