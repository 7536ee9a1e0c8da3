//! Serialization of node trees back to XML text.
//!
//! Two renderings are provided: a compact form that inserts no whitespace,
//! and a pretty form that indents a working copy of the tree two spaces
//! per level before serializing it.

use crate::node::{Label, NodeRef, TreeNode};

/// Serializes a subtree to XML with no inserted whitespace.
///
/// Elements with no text and no children are self-closing
/// (`<tag attr="v" />`); attributes are written sorted by name for
/// deterministic output. No XML declaration is emitted.
pub fn to_compact_string(node: &NodeRef) -> String {
    let mut out = String::new();
    write_node(node, &mut out);
    out
}

/// Serializes a subtree to two-space-indented XML.
///
/// The indentation pass runs on a deep copy, so the tree itself is left
/// untouched. `doctype` is prepended verbatim (e.g. a doctype
/// declaration); pass `""` for none. A tree with children ends with a
/// trailing newline.
pub fn to_pretty_string(node: &NodeRef, doctype: &str) -> String {
    let work = TreeNode::deep_copy(node);
    indent(&work, 0);
    format!("{}{}", doctype, to_compact_string(&work))
}

fn write_node(node: &NodeRef, out: &mut String) {
    let n = node.borrow();
    match n.label() {
        Label::Comment => {
            out.push_str("<!--");
            out.push_str(n.value());
            out.push_str("-->");
        }
        Label::Tag(name) => {
            out.push('<');
            out.push_str(name);

            let mut attr_names: Vec<&String> = n.attributes().keys().collect();
            attr_names.sort();
            for attr in attr_names {
                out.push(' ');
                out.push_str(attr);
                out.push_str("=\"");
                out.push_str(&to_entities(&n.attributes()[attr]));
                out.push('"');
            }

            if n.value().is_empty() && n.child_count() == 0 {
                out.push_str(" />");
            } else {
                out.push('>');
                out.push_str(&to_entities(n.value()));
                for child in n.children_ref() {
                    write_node(child, out);
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
        }
    }
    out.push_str(&to_entities(n.tail()));
}

/// Rewrites whitespace-only `value`/`tail` fields so the compact
/// serializer produces indented output.
///
/// For a node with children: a whitespace-only value becomes a newline
/// plus next-level indent, its own whitespace-only tail becomes a newline
/// plus current-level indent, children are indented one level deeper, and
/// the last child's whitespace-only tail is pulled back to the current
/// level. Leaves below the root get a newline-plus-indent tail.
fn indent(node: &NodeRef, level: usize) {
    let i = format!("\n{}", "  ".repeat(level));
    let children = node.borrow().children();
    if !children.is_empty() {
        {
            let mut n = node.borrow_mut();
            if n.value().trim().is_empty() {
                n.set_value(format!("{}  ", i));
            }
            if n.tail().trim().is_empty() {
                n.set_tail(i.clone());
            }
        }
        for child in &children {
            indent(child, level + 1);
        }
        let last = &children[children.len() - 1];
        let mut l = last.borrow_mut();
        if l.tail().trim().is_empty() {
            l.set_tail(i);
        }
    } else if level > 0 {
        let mut n = node.borrow_mut();
        if n.tail().trim().is_empty() {
            n.set_tail(i);
        }
    }
}

/// Converts special characters to XML entities.
fn to_entities(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '\'' => result.push_str("&apos;"),
            '"' => result.push_str("&quot;"),
            _ => result.push(c),
        }
    }
    result
}
