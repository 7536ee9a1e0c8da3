//! Multi-match query results: the node list wrapper and the tagged
//! lookup variant.

use std::rc::Rc;

use super::{NodeRef, TreeNode};

/// Result of an indexed lookup.
///
/// The lookup operation is deliberately multi-purpose: depending on the
/// shape of the tree the same key can resolve to nothing, scalar text, a
/// single node, or a list of nodes. Callers pattern-match instead of
/// relying on implicit coercions.
#[derive(Debug, Clone)]
pub enum Lookup {
    /// No match.
    Nothing,
    /// Scalar text: an attribute value or a sole child's accumulated text.
    Text(String),
    /// A single matched node.
    Node(NodeRef),
    /// Multiple matched nodes.
    Nodes(NodeList),
}

impl Lookup {
    /// Returns true when the lookup matched nothing.
    pub fn is_nothing(&self) -> bool {
        matches!(self, Lookup::Nothing)
    }

    /// Returns the scalar text, if this is a text result.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Lookup::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the node, if this is a single-node result.
    pub fn as_node(&self) -> Option<&NodeRef> {
        match self {
            Lookup::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Returns the node list, if this is a multi-node result.
    pub fn as_nodes(&self) -> Option<&NodeList> {
        match self {
            Lookup::Nodes(nodes) => Some(nodes),
            _ => None,
        }
    }
}

/// An ordered collection of nodes returned by multi-match queries, with
/// index- and name-based lookup helpers.
#[derive(Debug, Clone, Default)]
pub struct NodeList {
    nodes: Vec<NodeRef>,
}

impl NodeList {
    /// Creates an empty list.
    pub fn new() -> Self {
        NodeList { nodes: Vec::new() }
    }

    /// Wraps an existing node sequence.
    pub fn from_nodes(nodes: Vec<NodeRef>) -> Self {
        NodeList { nodes }
    }

    /// Appends a node.
    pub fn push(&mut self, node: NodeRef) {
        self.nodes.push(node);
    }

    /// Number of nodes in the list.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true when the list holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the underlying node sequence.
    pub fn nodes(&self) -> &[NodeRef] {
        &self.nodes
    }

    /// Iterates over the nodes in order.
    pub fn iter(&self) -> std::slice::Iter<'_, NodeRef> {
        self.nodes.iter()
    }

    /// Index-based lookup. A node with exactly one child resolves to that
    /// child's text; anything else resolves to the node itself.
    pub fn get(&self, index: usize) -> Lookup {
        match self.nodes.get(index) {
            Some(node) => Self::resolve(node),
            None => Lookup::Nothing,
        }
    }

    /// Name-based lookup: resolves the first node whose surface knows the
    /// key (label, direct-child label, or attribute key).
    pub fn get_named(&self, key: &str) -> Lookup {
        for node in &self.nodes {
            if TreeNode::contains(node, key) {
                return Self::resolve(node);
            }
        }
        Lookup::Nothing
    }

    /// Returns true when any listed node's surface knows the key.
    pub fn contains(&self, key: &str) -> bool {
        self.nodes.iter().any(|node| TreeNode::contains(node, key))
    }

    fn resolve(node: &NodeRef) -> Lookup {
        let n = node.borrow();
        if n.child_count() == 1 {
            Lookup::Text(n.children_ref()[0].borrow().value().to_string())
        } else {
            Lookup::Node(Rc::clone(node))
        }
    }
}

impl<'a> IntoIterator for &'a NodeList {
    type Item = &'a NodeRef;
    type IntoIter = std::slice::Iter<'a, NodeRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_with_text(tag: &str, text: &str) -> NodeRef {
        let node = TreeNode::new(tag);
        node.borrow_mut().set_value(text);
        node
    }

    #[test]
    fn test_lookup_own_label_no_children() {
        let node = TreeNode::new("a");
        assert!(TreeNode::lookup(&node, "a").is_nothing());
    }

    #[test]
    fn test_lookup_own_label_sole_leaf_child_yields_text() {
        let parent = TreeNode::new("person");
        let name = node_with_text("name", "Alice");
        TreeNode::add_child(&parent, &name, true);

        let result = TreeNode::lookup(&parent, "person");
        assert_eq!(result.as_text(), Some("Alice"));
    }

    #[test]
    fn test_lookup_own_label_many_children_yields_list() {
        let parent = TreeNode::new("person");
        TreeNode::add_child(&parent, &TreeNode::new("name"), true);
        TreeNode::add_child(&parent, &TreeNode::new("age"), true);

        let result = TreeNode::lookup(&parent, "person");
        assert_eq!(result.as_nodes().unwrap().len(), 2);
    }

    #[test]
    fn test_lookup_child_scan() {
        let root = TreeNode::new("root");
        let a1 = TreeNode::new("a");
        let a2 = TreeNode::new("a");
        let b = TreeNode::new("b");
        TreeNode::add_child(&root, &a1, true);
        TreeNode::add_child(&root, &a2, true);
        TreeNode::add_child(&root, &b, true);

        let result = TreeNode::lookup(&root, "a");
        let list = result.as_nodes().unwrap();
        assert_eq!(list.len(), 2);
        assert!(Rc::ptr_eq(&list.nodes()[0], &a1));
        assert!(Rc::ptr_eq(&list.nodes()[1], &a2));

        // Sole match is still wrapped in a list
        let result = TreeNode::lookup(&root, "b");
        assert_eq!(result.as_nodes().unwrap().len(), 1);

        assert!(TreeNode::lookup(&root, "missing").is_nothing());
    }

    #[test]
    fn test_lookup_attribute_fallback() {
        let node = TreeNode::new("leaf");
        node.borrow_mut().set_attribute("color", "red");

        assert_eq!(TreeNode::lookup(&node, "color").as_text(), Some("red"));
        assert!(TreeNode::lookup(&node, "shape").is_nothing());
    }

    #[test]
    fn test_node_list_get_resolves() {
        let single_child = TreeNode::new("wrap");
        TreeNode::add_child(&single_child, &node_with_text("inner", "hello"), true);
        let plain = TreeNode::new("plain");

        let list = NodeList::from_nodes(vec![single_child.clone(), plain.clone()]);
        assert_eq!(list.get(0).as_text(), Some("hello"));
        assert!(Rc::ptr_eq(list.get(1).as_node().unwrap(), &plain));
        assert!(list.get(2).is_nothing());
    }

    #[test]
    fn test_node_list_named_lookup_and_contains() {
        let a = TreeNode::new("a");
        a.borrow_mut().set_attribute("id", "1");
        let b = TreeNode::new("b");

        let list = NodeList::from_nodes(vec![a, b]);
        assert!(list.contains("a"));
        assert!(list.contains("id"));
        assert!(list.contains("b"));
        assert!(!list.contains("c"));

        assert!(list.get_named("b").as_node().is_some());
        assert!(list.get_named("missing").is_nothing());
    }
}
