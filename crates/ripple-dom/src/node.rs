#![forbid(unsafe_code)]

//! In-memory document tree.
//!
//! [`DomNode`] is a shared handle (`Rc` inside); clones refer to the same
//! node and equality is node identity. Inserting a node that already has a
//! parent moves it.
//!
//! # Invariants
//!
//! 1. A node appears in at most one parent's child list, and its parent link
//!    names that parent.
//! 2. Attributes keep insertion order, so serialization is deterministic.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use ripple_render::{Callback, Value};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

fn next_node_id() -> u64 {
    NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Elements serialized without a closing tag.
const VOID_TAGS: [&str; 8] = ["area", "br", "col", "hr", "img", "input", "link", "meta"];

#[must_use]
pub fn is_void_tag(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

#[must_use]
pub fn escape(value: &str) -> String {
    v_htmlescape::escape(value).to_string()
}

enum NodeKind {
    Text(String),
    Element {
        tag: String,
        attrs: IndexMap<String, String>,
        listeners: IndexMap<String, Callback>,
    },
}

struct NodeData {
    id: u64,
    kind: NodeKind,
    parent: Weak<RefCell<NodeData>>,
    children: Vec<DomNode>,
}

#[derive(Clone)]
pub struct DomNode(Rc<RefCell<NodeData>>);

impl DomNode {
    fn with_kind(kind: NodeKind) -> Self {
        Self(Rc::new(RefCell::new(NodeData {
            id: next_node_id(),
            kind,
            parent: Weak::new(),
            children: Vec::new(),
        })))
    }

    #[must_use]
    pub fn new_text(content: &str) -> Self {
        Self::with_kind(NodeKind::Text(content.to_owned()))
    }

    #[must_use]
    pub fn new_element(tag: &str) -> Self {
        Self::with_kind(NodeKind::Element {
            tag: tag.to_owned(),
            attrs: IndexMap::new(),
            listeners: IndexMap::new(),
        })
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.0.borrow().id
    }

    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self.0.borrow().kind, NodeKind::Text(_))
    }

    #[must_use]
    pub fn tag(&self) -> Option<String> {
        match &self.0.borrow().kind {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            NodeKind::Text(_) => None,
        }
    }

    /// Content of a text node.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        match &self.0.borrow().kind {
            NodeKind::Text(t) => Some(t.clone()),
            NodeKind::Element { .. } => None,
        }
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<String> {
        match &self.0.borrow().kind {
            NodeKind::Element { attrs, .. } => attrs.get(name).cloned(),
            NodeKind::Text(_) => None,
        }
    }

    #[must_use]
    pub fn attrs(&self) -> Vec<(String, String)> {
        match &self.0.borrow().kind {
            NodeKind::Element { attrs, .. } => {
                attrs.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
            }
            NodeKind::Text(_) => Vec::new(),
        }
    }

    #[must_use]
    pub fn has_listener(&self, event: &str) -> bool {
        match &self.0.borrow().kind {
            NodeKind::Element { listeners, .. } => listeners.contains_key(event),
            NodeKind::Text(_) => false,
        }
    }

    #[must_use]
    pub fn children(&self) -> Vec<DomNode> {
        self.0.borrow().children.clone()
    }

    #[must_use]
    pub fn parent(&self) -> Option<DomNode> {
        self.0.borrow().parent.upgrade().map(DomNode)
    }

    #[must_use]
    pub fn next_sibling(&self) -> Option<DomNode> {
        let parent = self.parent()?;
        let data = parent.0.borrow();
        let pos = data.children.iter().position(|c| c == self)?;
        data.children.get(pos + 1).cloned()
    }

    /// Call the listener registered for `event`. Returns whether one ran.
    pub fn dispatch(&self, event: &str, arg: &Value) -> bool {
        let listener = match &self.0.borrow().kind {
            NodeKind::Element { listeners, .. } => listeners.get(event).cloned(),
            NodeKind::Text(_) => None,
        };
        match listener {
            Some(cb) => {
                cb.call(arg);
                true
            }
            None => false,
        }
    }

    /// Concatenated text of this node and its descendants.
    #[must_use]
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        let data = self.0.borrow();
        match &data.kind {
            NodeKind::Text(t) => out.push_str(t),
            NodeKind::Element { .. } => {
                for child in &data.children {
                    child.collect_text(out);
                }
            }
        }
    }

    #[must_use]
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    #[must_use]
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        for child in &self.0.borrow().children {
            child.write_html(&mut out);
        }
        out
    }

    fn write_html(&self, out: &mut String) {
        let data = self.0.borrow();
        match &data.kind {
            NodeKind::Text(t) => out.push_str(&escape(t)),
            NodeKind::Element { tag, attrs, .. } => {
                out.push('<');
                out.push_str(tag);
                for (k, v) in attrs {
                    out.push(' ');
                    out.push_str(k);
                    if !v.is_empty() {
                        out.push_str("=\"");
                        out.push_str(&escape(v));
                        out.push('"');
                    }
                }
                out.push('>');
                if is_void_tag(tag) {
                    return;
                }
                for child in &data.children {
                    child.write_html(out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    // ── Mutation ─────────────────────────────────────────────────────

    /// Detach from the current parent. No-op when detached.
    pub fn detach(&self) {
        let parent = self.0.borrow_mut().parent.upgrade();
        if let Some(parent) = parent {
            parent.borrow_mut().children.retain(|c| c != self);
            self.0.borrow_mut().parent = Weak::new();
        }
    }

    /// Insert `child` before `reference`, or last when `reference` is `None`
    /// or not a child of `self`.
    pub fn insert_before(&self, child: &DomNode, reference: Option<&DomNode>) {
        child.detach();
        {
            let mut data = self.0.borrow_mut();
            let pos = reference
                .and_then(|r| data.children.iter().position(|c| c == r))
                .unwrap_or(data.children.len());
            data.children.insert(pos, child.clone());
        }
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
    }

    pub fn append(&self, child: &DomNode) {
        self.insert_before(child, None);
    }

    /// Put `replacement` where `self` is. No-op when `self` is detached.
    pub fn replace_with(&self, replacement: &DomNode) {
        if self == replacement {
            return;
        }
        let Some(parent) = self.parent() else {
            return;
        };
        replacement.detach();
        {
            let mut data = parent.0.borrow_mut();
            if let Some(pos) = data.children.iter().position(|c| c == self) {
                data.children[pos] = replacement.clone();
            }
        }
        replacement.0.borrow_mut().parent = Rc::downgrade(&parent.0);
        self.0.borrow_mut().parent = Weak::new();
    }

    /// Overwrite text content. Returns `false` for element nodes.
    pub fn set_text(&self, content: &str) -> bool {
        match &mut self.0.borrow_mut().kind {
            NodeKind::Text(t) => {
                if t != content {
                    content.clone_into(t);
                }
                true
            }
            NodeKind::Element { .. } => false,
        }
    }

    pub fn set_attr(&self, name: &str, value: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.0.borrow_mut().kind {
            attrs.insert(name.to_owned(), value.to_owned());
        }
    }

    pub fn remove_attr(&self, name: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.0.borrow_mut().kind {
            attrs.shift_remove(name);
        }
    }

    pub fn set_listener(&self, event: &str, callback: Callback) {
        if let NodeKind::Element { listeners, .. } = &mut self.0.borrow_mut().kind {
            listeners.insert(event.to_owned(), callback);
        }
    }

    pub fn remove_listener(&self, event: &str) {
        if let NodeKind::Element { listeners, .. } = &mut self.0.borrow_mut().kind {
            listeners.shift_remove(event);
        }
    }
}

impl PartialEq for DomNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for DomNode {}

impl Hash for DomNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for DomNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.borrow();
        match &data.kind {
            NodeKind::Text(t) => write!(f, "#{}{:?}", data.id, t),
            NodeKind::Element { tag, .. } => write!(f, "#{}<{}>", data.id, tag),
        }
    }
}

/// Factory for nodes plus the `body` element the tree hangs from.
#[derive(Debug, Clone)]
pub struct Document {
    body: DomNode,
}

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Self {
            body: DomNode::new_element("body"),
        }
    }

    #[must_use]
    pub fn body(&self) -> DomNode {
        self.body.clone()
    }

    #[must_use]
    pub fn create_text(&self, content: &str) -> DomNode {
        DomNode::new_text(content)
    }

    #[must_use]
    pub fn create_element(&self, tag: &str) -> DomNode {
        DomNode::new_element(tag)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
