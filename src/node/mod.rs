//! Node structures for XML tree representation.
//!
//! This module provides the mutable tree node used to represent XML
//! documents. Children are owned by their parent's child list; the parent
//! link is a weak back-reference used for upward navigation only, so a
//! dropped subtree is freed without reference cycles.

mod node_list;

pub use node_list::{Lookup, NodeList};

use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::cell::RefCell;

use crate::error::{Error, Result};

/// A reference-counted pointer to a node.
pub type NodeRef = Rc<RefCell<TreeNode>>;

/// A weak reference to a node, used for parent links.
pub type WeakNodeRef = Weak<RefCell<TreeNode>>;

/// Creates a new node reference.
fn new_node_ref(inner: TreeNode) -> NodeRef {
    Rc::new(RefCell::new(inner))
}

/// The label of a node: a tag name, or the comment marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    /// An ordinary element tag name.
    Tag(String),
    /// The sentinel distinguishing comment nodes from elements.
    Comment,
}

impl Label {
    /// Returns the tag name, or `None` for comment nodes.
    pub fn as_tag(&self) -> Option<&str> {
        match self {
            Label::Tag(name) => Some(name),
            Label::Comment => None,
        }
    }

    /// Returns true if this is the comment marker.
    pub fn is_comment(&self) -> bool {
        matches!(self, Label::Comment)
    }

    /// Text used when rendering sort keys. Comment nodes use the
    /// conventional `#comment` name.
    fn sort_text(&self) -> &str {
        match self {
            Label::Tag(name) => name,
            Label::Comment => "#comment",
        }
    }
}

/// One node of the document tree.
///
/// Each node has a label (tag name or comment marker), an attribute map,
/// accumulated text content, a trailing separator (`tail`), an ordered
/// child list, and a weak link to its parent.
#[derive(Debug)]
pub struct TreeNode {
    /// Tag name or comment marker.
    label: Label,
    /// Attribute name to value mapping, keys unique.
    attributes: HashMap<String, String>,
    /// Accumulated character data seen while this node was active.
    value: String,
    /// Whitespace/text following this node's closing tag. Written by the
    /// pretty-printer's indent pass.
    tail: String,
    /// Child nodes, owned.
    children: Vec<NodeRef>,
    /// Weak reference to the parent node.
    parent: WeakNodeRef,
}

impl TreeNode {
    /// Creates a new element node with the given tag name.
    pub fn new(tag: impl Into<String>) -> NodeRef {
        new_node_ref(TreeNode {
            label: Label::Tag(tag.into()),
            attributes: HashMap::new(),
            value: String::new(),
            tail: String::new(),
            children: Vec::new(),
            parent: Weak::new(),
        })
    }

    /// Creates a new element node carrying the given attributes.
    pub fn with_attributes(tag: impl Into<String>, attributes: HashMap<String, String>) -> NodeRef {
        let node = Self::new(tag);
        node.borrow_mut().attributes = attributes;
        node
    }

    /// Creates a new comment node.
    pub fn new_comment() -> NodeRef {
        let node = Self::new(String::new());
        node.borrow_mut().label = Label::Comment;
        node
    }

    /// Returns the label of this node.
    pub fn label(&self) -> &Label {
        &self.label
    }

    /// Replaces the label (renames the tag).
    pub fn set_label(&mut self, label: Label) {
        self.label = label;
    }

    /// Renames an element node's tag.
    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.label = Label::Tag(tag.into());
    }

    /// Returns true if this node's label is the given tag name.
    /// Comment nodes never match a tag name.
    pub fn is_label(&self, name: &str) -> bool {
        match &self.label {
            Label::Tag(tag) => tag == name,
            Label::Comment => false,
        }
    }

    /// Returns the accumulated text content.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Replaces the text content.
    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    /// Appends to the text content.
    pub fn append_value(&mut self, value: &str) {
        self.value.push_str(value);
    }

    /// Returns the trailing separator after this node.
    pub fn tail(&self) -> &str {
        &self.tail
    }

    /// Sets the trailing separator after this node.
    pub fn set_tail(&mut self, tail: impl Into<String>) {
        self.tail = tail.into();
    }

    /// Adds or overwrites an attribute.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Returns an attribute value, failing when the key is absent.
    pub fn attribute(&self, key: &str) -> Result<&str> {
        self.attributes
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    /// Returns an attribute value, or `None` when the key is absent.
    pub fn attribute_opt(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Returns true if the attribute is present.
    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Removes an attribute, returning its value, failing when absent.
    pub fn delete_attribute(&mut self, key: &str) -> Result<String> {
        self.attributes
            .remove(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    /// Returns the attribute map.
    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    /// Returns the number of children.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Returns a copy of the child list, safe to mutate without affecting
    /// this node.
    pub fn children(&self) -> Vec<NodeRef> {
        self.children.clone()
    }

    /// Returns the live child list. Mutating through [`children_mut`]
    /// bypasses the parent-link bookkeeping and is the caller's
    /// responsibility.
    ///
    /// [`children_mut`]: TreeNode::children_mut
    pub fn children_ref(&self) -> &[NodeRef] {
        &self.children
    }

    /// Returns the live child list for direct mutation. See
    /// [`children_ref`](TreeNode::children_ref) for the aliasing contract.
    pub fn children_mut(&mut self) -> &mut Vec<NodeRef> {
        &mut self.children
    }

    /// Returns the parent node, or `None` for a root or detached node.
    pub fn parent(&self) -> Option<NodeRef> {
        self.parent.upgrade()
    }

    /// Deterministic sort key: label plus attributes sorted by key as
    /// `'k':'v'` pairs, with all spaces stripped.
    pub fn to_sort_key(&self) -> String {
        let mut keys: Vec<&String> = self.attributes.keys().collect();
        keys.sort();
        let mut pairs = String::new();
        for key in keys {
            if !pairs.is_empty() {
                pairs.push(',');
            }
            pairs.push('\'');
            pairs.push_str(key);
            pairs.push_str("':'");
            pairs.push_str(&self.attributes[key]);
            pairs.push('\'');
        }
        format!("{}{{{}}}", self.label.sort_text(), pairs).replace(' ', "")
    }
}

/// Structural operations working with [`NodeRef`] handles.
///
/// These need the reference-counted wrapper because they maintain the
/// parent/child invariant across two nodes, and because node identity is
/// pointer identity (`Rc::ptr_eq`).
impl TreeNode {
    /// Attaches `child` at the end of `parent`'s child list.
    ///
    /// With `reparent` set, the child is first detached from any previous
    /// parent and its parent link is pointed at `parent`. Adding a child
    /// that is already present is a no-op on the list.
    pub fn add_child(parent: &NodeRef, child: &NodeRef, reparent: bool) {
        if reparent {
            Self::reparent(child, parent, false);
        }
        let present = parent
            .borrow()
            .children
            .iter()
            .any(|c| Rc::ptr_eq(c, child));
        if !present {
            parent.borrow_mut().children.push(Rc::clone(child));
        }
    }

    /// Inserts `child` at position `index` in `parent`'s child list.
    ///
    /// Fails fast with [`Error::IndexOutOfRange`] when `index` is past the
    /// end of the list; there is no clamping. A child that is already
    /// present is not moved.
    pub fn insert_child(
        parent: &NodeRef,
        index: usize,
        child: &NodeRef,
        reparent: bool,
    ) -> Result<()> {
        let len = parent.borrow().children.len();
        if index > len {
            return Err(Error::IndexOutOfRange { index, len });
        }
        if reparent {
            Self::reparent(child, parent, false);
        }
        let present = parent
            .borrow()
            .children
            .iter()
            .any(|c| Rc::ptr_eq(c, child));
        if !present {
            parent.borrow_mut().children.insert(index, Rc::clone(child));
        }
        Ok(())
    }

    /// Inserts `child` immediately after `anchor`; appends when `anchor` is
    /// not among `parent`'s children. A child that is already present is
    /// not moved.
    pub fn insert_after_child(parent: &NodeRef, anchor: &NodeRef, child: &NodeRef, reparent: bool) {
        if reparent {
            Self::reparent(child, parent, false);
        }
        {
            let p = parent.borrow();
            if p.children.iter().any(|c| Rc::ptr_eq(c, child)) {
                return;
            }
        }
        let pos = parent
            .borrow()
            .children
            .iter()
            .position(|c| Rc::ptr_eq(c, anchor));
        let mut p = parent.borrow_mut();
        match pos {
            Some(i) => p.children.insert(i + 1, Rc::clone(child)),
            None => p.children.push(Rc::clone(child)),
        }
    }

    /// Detaches `child` from `parent`, returning whether the removal
    /// succeeded.
    ///
    /// Only succeeds when `child`'s recorded parent is `parent`. If the
    /// child list does not actually contain the child (an inconsistent
    /// attachment), the parent link is still cleared but `false` is
    /// returned.
    pub fn remove_child(parent: &NodeRef, child: &NodeRef) -> bool {
        let attached = child
            .borrow()
            .parent
            .upgrade()
            .is_some_and(|p| Rc::ptr_eq(&p, parent));
        if !attached {
            return false;
        }
        child.borrow_mut().parent = Weak::new();
        let mut p = parent.borrow_mut();
        match p.children.iter().position(|c| Rc::ptr_eq(c, child)) {
            Some(pos) => {
                p.children.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Moves `node` under `new_parent`. No-op when already parented there.
    ///
    /// This is the single primitive behind `add_child`/`insert_child`/
    /// `insert_after_child`. With `add_child` unset, only the parent link
    /// is redirected, leaving the node in the deliberate transient
    /// detached state (parent set, not in the parent's child list).
    pub fn reparent(node: &NodeRef, new_parent: &NodeRef, add_child: bool) {
        let current = node.borrow().parent.upgrade();
        if let Some(ref p) = current {
            if Rc::ptr_eq(p, new_parent) {
                return;
            }
        }
        if let Some(old) = current {
            Self::remove_child(&old, node);
        }
        node.borrow_mut().parent = Rc::downgrade(new_parent);
        if add_child {
            Self::add_child(new_parent, node, false);
        }
    }

    /// Walks parent links to the top of the tree.
    pub fn get_root(node: &NodeRef) -> NodeRef {
        let mut cur = Rc::clone(node);
        loop {
            let parent = cur.borrow().parent.upgrade();
            match parent {
                Some(p) => cur = p,
                None => return cur,
            }
        }
    }

    /// Collects every descendant whose label exactly matches `name`, in
    /// pre-order. Self is not considered.
    pub fn find_all_by_name(node: &NodeRef, name: &str) -> Vec<NodeRef> {
        let mut found = Vec::new();
        for child in node.borrow().children.iter() {
            if child.borrow().is_label(name) {
                found.push(Rc::clone(child));
            }
            if child.borrow().child_count() > 0 {
                found.extend(Self::find_all_by_name(child, name));
            }
        }
        found
    }

    /// Like [`find_all_by_name`](TreeNode::find_all_by_name), but the node
    /// itself is included when it matches.
    pub fn find_self_and_all_by_name(node: &NodeRef, name: &str) -> Vec<NodeRef> {
        let mut found = Vec::new();
        if node.borrow().is_label(name) {
            found.push(Rc::clone(node));
        }
        found.extend(Self::find_all_by_name(node, name));
        found
    }

    /// Returns the first node in pre-order (self included) whose label
    /// matches `name`.
    pub fn find_first_by_name(node: &NodeRef, name: &str) -> Option<NodeRef> {
        if node.borrow().is_label(name) {
            return Some(Rc::clone(node));
        }
        for child in node.borrow().children.iter() {
            if let Some(hit) = Self::find_first_by_name(child, name) {
                return Some(hit);
            }
        }
        None
    }

    /// Matches immediate children only, non-recursively.
    pub fn find_direct_children_by_name(node: &NodeRef, name: &str) -> Vec<NodeRef> {
        node.borrow()
            .children
            .iter()
            .filter(|c| c.borrow().is_label(name))
            .cloned()
            .collect()
    }

    /// Returns a lazy pre-order iterator over this subtree, self included.
    ///
    /// A filter of `None` or `"*"` matches every node; otherwise only
    /// nodes whose label equals the filter are yielded. Each call produces
    /// an independent traversal.
    pub fn iterate(node: &NodeRef, tag: Option<&str>) -> TreeIter {
        let filter = match tag {
            None | Some("*") => None,
            Some(t) => Some(t.to_string()),
        };
        TreeIter {
            stack: vec![Rc::clone(node)],
            filter,
        }
    }

    /// Shallow duplicate: the attribute map is copied, but the child list
    /// shares the original's child nodes. The copy has no parent.
    pub fn copy(node: &NodeRef) -> NodeRef {
        let n = node.borrow();
        new_node_ref(TreeNode {
            label: n.label.clone(),
            attributes: n.attributes.clone(),
            value: n.value.clone(),
            tail: n.tail.clone(),
            children: n.children.clone(),
            parent: Weak::new(),
        })
    }

    /// Fully independent duplicate of this subtree. The copy has no
    /// parent.
    pub fn deep_copy(node: &NodeRef) -> NodeRef {
        let dup = {
            let n = node.borrow();
            new_node_ref(TreeNode {
                label: n.label.clone(),
                attributes: n.attributes.clone(),
                value: n.value.clone(),
                tail: n.tail.clone(),
                children: Vec::new(),
                parent: Weak::new(),
            })
        };
        for child in node.borrow().children.iter() {
            let child_dup = Self::deep_copy(child);
            Self::add_child(&dup, &child_dup, true);
        }
        dup
    }

    /// Loose surface-membership predicate: true when `key` equals this
    /// node's label, a direct child's label, or an attribute key. Not
    /// recursive.
    pub fn contains(node: &NodeRef, key: &str) -> bool {
        let n = node.borrow();
        if n.is_label(key) {
            return true;
        }
        if n.children.iter().any(|c| c.borrow().is_label(key)) {
            return true;
        }
        n.attributes.contains_key(key)
    }

    /// Returns true when `other` is a direct child of `node`, by identity.
    pub fn contains_node(node: &NodeRef, other: &NodeRef) -> bool {
        node.borrow().children.iter().any(|c| Rc::ptr_eq(c, other))
    }

    /// Tri-modal indexed lookup used for document navigation.
    ///
    /// When `key` matches this node's own label: no children yields
    /// [`Lookup::Nothing`]; exactly one child without grandchildren yields
    /// that child's text as [`Lookup::Text`]; otherwise all children as
    /// [`Lookup::Nodes`]. When this node has children, immediate children
    /// are scanned for label matches and returned as a node list. Finally
    /// the key falls back to attribute lookup.
    pub fn lookup(node: &NodeRef, key: &str) -> Lookup {
        let n = node.borrow();
        if n.is_label(key) {
            if n.children.is_empty() {
                return Lookup::Nothing;
            }
            if n.children.len() == 1 && n.children[0].borrow().child_count() == 0 {
                return Lookup::Text(n.children[0].borrow().value().to_string());
            }
            return Lookup::Nodes(NodeList::from_nodes(n.children.clone()));
        }
        if !n.children.is_empty() {
            let matches: Vec<NodeRef> = n
                .children
                .iter()
                .filter(|c| c.borrow().is_label(key))
                .cloned()
                .collect();
            if matches.is_empty() {
                return Lookup::Nothing;
            }
            return Lookup::Nodes(NodeList::from_nodes(matches));
        }
        match n.attributes.get(key) {
            Some(value) => Lookup::Text(value.clone()),
            None => Lookup::Nothing,
        }
    }

    /// Deterministic key over this node and its whole subtree. Children
    /// contribute their recursive keys ordered by their own sort keys.
    pub fn to_recursive_sort_key(node: &NodeRef) -> String {
        let mut key = node.borrow().to_sort_key();
        let mut kids = node.borrow().children.clone();
        kids.sort_by_key(|c| c.borrow().to_sort_key());
        for child in &kids {
            key.push_str(&Self::to_recursive_sort_key(child));
        }
        key
    }
}

/// Lazy pre-order traversal over a subtree. Created by
/// [`TreeNode::iterate`].
pub struct TreeIter {
    stack: Vec<NodeRef>,
    filter: Option<String>,
}

impl Iterator for TreeIter {
    type Item = NodeRef;

    fn next(&mut self) -> Option<NodeRef> {
        while let Some(node) = self.stack.pop() {
            {
                let n = node.borrow();
                for child in n.children.iter().rev() {
                    self.stack.push(Rc::clone(child));
                }
            }
            let matches = match &self.filter {
                None => true,
                Some(tag) => node.borrow().is_label(tag),
            };
            if matches {
                return Some(node);
            }
        }
        None
    }
}
