//! Event-driven tree construction.
//!
//! [`TreeBuilder`] is a small SAX-style state machine: it consumes
//! start/end/data/comment events, either hand-driven or produced by the
//! quick-xml tokenizer via [`TreeBuilder::load`], and assembles a
//! [`TreeNode`] graph. Comments are first-class tree content, including
//! the irregular case of comments appearing before any root element.

use std::collections::HashMap;
use std::fs;
use std::rc::Rc;

use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::node::{Lookup, NodeRef, TreeNode};

/// Tag name of the synthetic envelope used to tolerate multiple sibling
/// root elements in one input.
const DUMMY_TAG: &str = "dummy";

/// Outcome of a [`TreeBuilder::load`] call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// The input was parsed and the builder holds a root.
    Loaded,
    /// Nothing was parsed: the source was absent, or a missing file was
    /// suppressed by `ignore_errors`. The builder is unchanged.
    Skipped,
}

/// Active label context used to gate character data.
#[derive(Debug, Clone, PartialEq)]
enum Context {
    /// No start event seen yet.
    None,
    /// The most recent start event opened a comment.
    Comment,
    /// The most recent start event carried this (trimmed) tag name,
    /// possibly empty.
    Element(String),
}

/// Builds a [`TreeNode`] tree from parser events.
///
/// A builder is constructed once per parse and consumed by one
/// [`load`](TreeBuilder::load) call; afterwards it keeps the root for
/// repeated queries. Building a second unrelated tree requires a fresh
/// builder.
#[derive(Debug)]
pub struct TreeBuilder {
    /// The most recently opened, not-yet-closed node.
    current: Option<NodeRef>,
    /// The single top-level node, once established.
    root: Option<NodeRef>,
    /// Comment nodes seen before any root element, attached to the root
    /// once it appears.
    pending_comments: Vec<NodeRef>,
    /// Label context for data gating.
    context: Context,
    /// Structural failure raised by an event handler, surfaced by the
    /// feed loop as a well-formedness error.
    error: Option<String>,
    /// When set, a missing source file is logged and reported as
    /// [`LoadStatus::Skipped`] instead of failing.
    ignore_errors: bool,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        TreeBuilder {
            current: None,
            root: None,
            pending_comments: Vec::new(),
            context: Context::None,
            error: None,
            ignore_errors: false,
        }
    }

    /// Controls whether a missing source file is a fatal failure or a
    /// logged no-op.
    pub fn set_ignore_errors(&mut self, value: bool) {
        self.ignore_errors = value;
    }

    /// Returns the root of the built tree, if one has been established.
    pub fn root(&self) -> Option<NodeRef> {
        self.root.clone()
    }

    /// Number of children under the root, or 0 when there is no root.
    pub fn len(&self) -> usize {
        self.root.as_ref().map_or(0, |r| r.borrow().child_count())
    }

    /// Returns true when there is no root or the root has no children.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indexed lookup delegated to the root; [`Lookup::Nothing`] when no
    /// root exists.
    pub fn lookup(&self, key: &str) -> Lookup {
        match &self.root {
            Some(root) => TreeNode::lookup(root, key),
            None => Lookup::Nothing,
        }
    }

    /// Containment check delegated to the root; false when no root
    /// exists.
    pub fn contains(&self, key: &str) -> bool {
        self.root
            .as_ref()
            .is_some_and(|root| TreeNode::contains(root, key))
    }

    /// Handles an element start event.
    ///
    /// A tag that trims to empty creates nothing. The first element seen
    /// becomes the root and adopts any buffered pre-root comments, in
    /// order. Attributes are copied onto the new node, which becomes the
    /// current node. A second top-level element is a well-formedness
    /// failure: the existing root is kept and the parse is failed.
    pub fn start(&mut self, tag: &str, attributes: &HashMap<String, String>) {
        let name = tag.trim().to_string();
        self.context = Context::Element(name.clone());
        if name.is_empty() {
            return;
        }
        if self.current.is_none() && self.root.is_some() {
            self.error = Some("junk after document element".to_string());
            return;
        }

        let node = TreeNode::new(name);
        match &self.current {
            Some(current) => TreeNode::add_child(current, &node, true),
            None => {
                self.root = Some(Rc::clone(&node));
                for comment in self.pending_comments.drain(..) {
                    TreeNode::add_child(&node, &comment, true);
                }
            }
        }
        for (key, value) in attributes {
            node.borrow_mut().set_attribute(key.clone(), value.clone());
        }
        self.current = Some(node);
    }

    /// Handles a comment start event.
    ///
    /// The comment node attaches to the current node when one exists; a
    /// comment seen before any root is buffered until the root appears.
    /// The comment becomes the current node either way.
    pub fn start_comment(&mut self) {
        self.context = Context::Comment;
        let node = TreeNode::new_comment();
        if let Some(current) = &self.current {
            TreeNode::add_child(current, &node, true);
        } else if self.root.is_none() {
            self.pending_comments.push(Rc::clone(&node));
        }
        self.current = Some(node);
    }

    /// Handles an element end event: the current node moves up to its
    /// parent. Closing the root leaves no current node, but the root
    /// itself stays stored.
    pub fn end(&mut self, tag: &str) {
        if tag.trim().is_empty() {
            return;
        }
        if let Some(current) = self.current.take() {
            self.current = current.borrow().parent();
        }
    }

    /// Handles a comment end event. A buffered top-level comment closing
    /// before any root exists leaves no current node.
    pub fn end_comment(&mut self) {
        if let Some(current) = self.current.take() {
            self.current = current.borrow().parent();
        }
        if self.root.is_none() {
            self.current = None;
        }
    }

    /// Handles character data.
    ///
    /// Comment content is appended verbatim whenever non-empty; element
    /// content is appended only when it trims to something non-empty and
    /// an element context is active. Non-whitespace text with no open
    /// node is a well-formedness failure and fails the parse.
    pub fn data(&mut self, text: &str) {
        let Some(current) = self.current.clone() else {
            if !text.trim().is_empty() {
                self.error = Some(if self.root.is_some() {
                    "junk after document element".to_string()
                } else {
                    "text outside root element".to_string()
                });
            }
            return;
        };
        match &self.context {
            Context::Comment => {
                if !text.is_empty() {
                    current.borrow_mut().append_value(text);
                }
            }
            Context::Element(name) => {
                if !name.is_empty() && !text.trim().is_empty() {
                    current.borrow_mut().append_value(text);
                }
            }
            Context::None => {}
        }
    }

    /// Handles a complete comment: start, content, end.
    pub fn comment(&mut self, text: &str) {
        self.start_comment();
        self.data(text);
        self.end_comment();
    }

    /// End-of-input hook; present for symmetry with the tokenizer's
    /// lifecycle.
    pub fn close(&mut self) {}

    /// Loads XML from a file path or from in-memory text.
    ///
    /// A `None` source is an idempotent no-op. With `add_dummy`, the raw
    /// text is wrapped in a synthetic `<dummy>` envelope so inputs with
    /// multiple sibling root elements parse; the parsed `dummy` node then
    /// holds the original top-level elements as its children. Without the
    /// envelope, a second top-level element or non-whitespace text outside
    /// the root fails as malformed. Any parse failure discards the
    /// partially built tree along with the error.
    pub fn load(
        &mut self,
        source: Option<&str>,
        source_is_file: bool,
        add_dummy: bool,
    ) -> Result<LoadStatus> {
        let Some(source) = source else {
            return Ok(LoadStatus::Skipped);
        };

        let mut text = if source_is_file {
            match fs::read_to_string(source) {
                Ok(contents) => contents,
                Err(_) => {
                    if self.ignore_errors {
                        error!("File {} not found!", source);
                        return Ok(LoadStatus::Skipped);
                    }
                    return Err(Error::FileNotFound(source.to_string()));
                }
            }
        } else {
            source.to_string()
        };

        if add_dummy {
            text = format!("<{}>\n{}\n</{}>", DUMMY_TAG, text, DUMMY_TAG);
        }

        if let Err(err) = self.feed(&text) {
            self.current = None;
            self.root = None;
            self.pending_comments.clear();
            self.context = Context::None;
            self.error = None;
            return Err(if source_is_file {
                Error::MalformedInput(format!("{}, {}", source, err))
            } else {
                Error::MalformedInput(err)
            });
        }
        self.close();

        if add_dummy {
            self.unwrap_dummy();
        }

        Ok(LoadStatus::Loaded)
    }

    /// Drives the quick-xml tokenizer over the text, translating its
    /// events into builder callbacks. Returns the underlying error
    /// message on a well-formedness failure.
    fn feed(&mut self, text: &str) -> std::result::Result<(), String> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text_start = false;
        reader.config_mut().trim_text_end = false;
        reader.config_mut().check_end_names = true;

        loop {
            match reader.read_event().map_err(|e| e.to_string())? {
                Event::Start(ref e) => {
                    let (name, attributes) = decode_element(&reader, e)?;
                    self.start(&name, &attributes);
                }
                Event::Empty(ref e) => {
                    // Self-closing tag, handled like start + end
                    let (name, attributes) = decode_element(&reader, e)?;
                    self.start(&name, &attributes);
                    self.end(&name);
                }
                Event::End(ref e) => {
                    let name = reader
                        .decoder()
                        .decode(e.name().as_ref())
                        .map_err(|e| e.to_string())?
                        .to_string();
                    self.end(&name);
                }
                Event::Text(ref e) => {
                    let raw = std::str::from_utf8(e.as_ref()).map_err(|e| e.to_string())?;
                    let text = unescape(raw).map_err(|e| e.to_string())?;
                    self.data(&text);
                }
                Event::CData(ref e) => {
                    let text = String::from_utf8_lossy(e.as_ref()).to_string();
                    self.data(&text);
                }
                Event::Comment(ref e) => {
                    let text = String::from_utf8_lossy(e.as_ref()).to_string();
                    self.comment(&text);
                }
                Event::GeneralRef(ref e) => {
                    let name = String::from_utf8_lossy(e.as_ref()).to_string();
                    if let Some(resolved) = resolve_reference(&name) {
                        self.data(&resolved);
                    }
                }
                Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {
                    // XML declaration, processing instructions and DOCTYPE
                    // carry no tree content
                }
                Event::Eof => break,
            }
            if let Some(err) = self.error.take() {
                return Err(err);
            }
        }
        Ok(())
    }

    /// Promotes a `dummy`-labelled child of the parsed root to be the new
    /// root, unwrapping a nested envelope.
    fn unwrap_dummy(&mut self) {
        let Some(root) = self.root.clone() else {
            return;
        };
        let promoted = root
            .borrow()
            .children_ref()
            .iter()
            .find(|c| c.borrow().is_label(DUMMY_TAG))
            .cloned();
        if let Some(node) = promoted {
            debug!("promoting nested <{}> element to root", DUMMY_TAG);
            self.root = Some(node);
        }
    }
}

/// Decodes an element's name and attributes from a start/empty event.
fn decode_element(
    reader: &Reader<&[u8]>,
    e: &BytesStart,
) -> std::result::Result<(String, HashMap<String, String>), String> {
    let name = reader
        .decoder()
        .decode(e.name().as_ref())
        .map_err(|e| e.to_string())?
        .to_string();

    let mut attributes = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = reader
            .decoder()
            .decode(attr.key.as_ref())
            .map_err(|e| e.to_string())?
            .to_string();
        let value = attr.unescape_value().map_err(|e| e.to_string())?.to_string();
        attributes.insert(key, value);
    }
    Ok((name, attributes))
}

/// Resolves a general entity reference: the five predefined entities and
/// numeric character references. Unknown entities are dropped.
fn resolve_reference(name: &str) -> Option<String> {
    match name {
        "amp" => Some("&".to_string()),
        "lt" => Some("<".to_string()),
        "gt" => Some(">".to_string()),
        "apos" => Some("'".to_string()),
        "quot" => Some("\"".to_string()),
        _ => {
            let digits = name.strip_prefix('#')?;
            let code = if let Some(hex) = digits
                .strip_prefix('x')
                .or_else(|| digits.strip_prefix('X'))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                digits.parse().ok()?
            };
            char::from_u32(code).map(|c| c.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::printer::to_compact_string;

    fn no_attrs() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_hand_driven_events() {
        let mut builder = TreeBuilder::new();
        builder.start("root", &no_attrs());
        builder.start("child", &no_attrs());
        builder.data("hello");
        builder.end("child");
        builder.end("root");
        builder.close();

        let root = builder.root().unwrap();
        assert!(root.borrow().is_label("root"));
        assert_eq!(root.borrow().child_count(), 1);
        assert_eq!(root.borrow().children_ref()[0].borrow().value(), "hello");
    }

    #[test]
    fn test_root_end_clears_current() {
        let mut builder = TreeBuilder::new();
        builder.start("root", &no_attrs());
        builder.end("root");
        // Whitespace after the root is ignored
        builder.data("   ");

        let root = builder.root().unwrap();
        assert_eq!(root.borrow().value(), "");
    }

    #[test]
    fn test_empty_tag_name_creates_nothing() {
        let mut builder = TreeBuilder::new();
        builder.start("  ", &no_attrs());
        assert!(builder.root().is_none());

        builder.start("root", &no_attrs());
        builder.data("ignored before any element?");
        assert!(builder.root().is_some());
    }

    #[test]
    fn test_whitespace_data_is_gated() {
        let mut builder = TreeBuilder::new();
        builder.start("root", &no_attrs());
        builder.data("\n    ");
        builder.data("real");
        builder.end("root");

        assert_eq!(builder.root().unwrap().borrow().value(), "real");
    }

    #[test]
    fn test_comment_data_kept_verbatim() {
        let mut builder = TreeBuilder::new();
        builder.start("root", &no_attrs());
        builder.comment("  spaced  ");
        builder.end("root");

        let root = builder.root().unwrap();
        let r = root.borrow();
        let comment = &r.children_ref()[0];
        assert!(comment.borrow().label().is_comment());
        assert_eq!(comment.borrow().value(), "  spaced  ");
    }

    #[test]
    fn test_pre_root_comments_buffered() {
        let mut builder = TreeBuilder::new();
        builder.comment(" first ");
        builder.comment(" second ");
        assert!(builder.root().is_none());

        builder.start("root", &no_attrs());
        builder.end("root");

        let root = builder.root().unwrap();
        assert_eq!(root.borrow().child_count(), 2);
        assert_eq!(root.borrow().children_ref()[0].borrow().value(), " first ");
        assert_eq!(root.borrow().children_ref()[1].borrow().value(), " second ");
    }

    #[test]
    fn test_second_top_level_element_keeps_root() {
        let mut builder = TreeBuilder::new();
        builder.start("root", &no_attrs());
        builder.end("root");
        builder.start("second", &no_attrs());

        let root = builder.root().unwrap();
        assert!(root.borrow().is_label("root"));
        assert_eq!(root.borrow().child_count(), 0);
    }

    #[test]
    fn test_attributes_copied_to_node() {
        let mut attributes = HashMap::new();
        attributes.insert("a".to_string(), "1".to_string());
        attributes.insert("b".to_string(), "2".to_string());

        let mut builder = TreeBuilder::new();
        builder.start("root", &attributes);

        let root = builder.root().unwrap();
        assert_eq!(root.borrow().attribute("a").unwrap(), "1");
        assert_eq!(root.borrow().attribute("b").unwrap(), "2");
    }

    #[test]
    fn test_load_none_source_is_noop() {
        let mut builder = TreeBuilder::new();
        let status = builder.load(None, false, false).unwrap();
        assert_eq!(status, LoadStatus::Skipped);
        assert!(builder.root().is_none());
    }

    #[test]
    fn test_load_string() {
        let mut builder = TreeBuilder::new();
        let status = builder
            .load(Some("<root><child>text</child></root>"), false, false)
            .unwrap();
        assert_eq!(status, LoadStatus::Loaded);
        assert_eq!(builder.len(), 1);
        assert!(builder.contains("root"));
        assert!(builder.contains("child"));
    }

    #[test]
    fn test_load_resolves_entities() {
        let mut builder = TreeBuilder::new();
        builder
            .load(Some("<root>a &amp; b &#65;</root>"), false, false)
            .unwrap();
        let root = builder.root().unwrap();
        assert_eq!(root.borrow().value(), "a & b A");
    }

    #[test]
    fn test_load_missing_file_fails() {
        let mut builder = TreeBuilder::new();
        let err = builder
            .load(Some("no_such_file.xml"), true, false)
            .unwrap_err();
        assert_eq!(err.to_string(), "File no_such_file.xml not found!");
    }

    #[test]
    fn test_load_missing_file_ignored() {
        let mut builder = TreeBuilder::new();
        builder.set_ignore_errors(true);
        let status = builder.load(Some("no_such_file.xml"), true, false).unwrap();
        assert_eq!(status, LoadStatus::Skipped);
        assert!(builder.root().is_none());
    }

    #[test]
    fn test_load_malformed_discards_partial_tree() {
        let mut builder = TreeBuilder::new();
        let err = builder
            .load(Some("<first><tag name=\"</first>"), false, false)
            .unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)));
        assert!(err.to_string().starts_with("Input is not valid XML: "));
        assert!(builder.root().is_none());
    }

    #[test]
    fn test_load_mismatched_end_tag_fails() {
        let mut builder = TreeBuilder::new();
        let err = builder
            .load(Some("<a><b></a></b>"), false, false)
            .unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)));
    }

    #[test]
    fn test_dummy_wrap_multi_root() {
        let mut builder = TreeBuilder::new();
        builder
            .load(
                Some("<first><tag args=\"tmp1\" /></first><second><tag /><tag name=\"tmp2\" /></second>"),
                false,
                true,
            )
            .unwrap();

        let root = builder.root().unwrap();
        assert_eq!(root.borrow().child_count(), 2);
        let children = root.borrow().children();
        assert!(children[0].borrow().is_label("first"));
        assert!(children[1].borrow().is_label("second"));
        assert_eq!(
            to_compact_string(&children[0]),
            "<first><tag args=\"tmp1\" /></first>"
        );
        assert_eq!(
            to_compact_string(&children[1]),
            "<second><tag /><tag name=\"tmp2\" /></second>"
        );
    }

    #[test]
    fn test_builder_accessors_without_root() {
        let builder = TreeBuilder::new();
        assert_eq!(builder.len(), 0);
        assert!(builder.is_empty());
        assert!(!builder.contains("anything"));
        assert!(builder.lookup("anything").is_nothing());
    }
}
