//! Result Tree
//!
//! Every executed command line produces one [`ResultTree`]. The root is a command node
//! holding the input line; handlers attach data nodes under it, one per value they
//! produce.
//!
//! ## Layout
//!
//! Nodes live in an arena of slots. A node owns its children (their ids are listed in
//! its slot) and records its parent as a plain index used only for structural queries.
//! Removing a node frees its whole subtree and nothing else. Freed slots are never
//! reused, so a stale [`NodeId`] can only ever miss, never alias a newer node.
//!
//! ```text
//! slot 0  Command "KEYS a b 10"      children: [1]
//! slot 1  Data    Array[a, ab, b]    parent: 0
//! ```
//!
//! ## Observation
//!
//! A [`TreeObserver`] is injected when the tree is created and sees every node added
//! afterwards, at any depth.

use crate::error::Error;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Index of a node inside a [`ResultTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node's slot in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// What a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// An executed command; renders as nothing
    Command,
    /// Output data
    Data,
}

/// Receives structural changes of a tree as they happen.
pub trait TreeObserver: Send + Sync {
    /// A node was attached under `parent`.
    fn child_added(&self, parent: NodeId, child: NodeId, value: &Value);

    /// A node's value was replaced.
    fn value_updated(&self, node: NodeId, value: &Value);
}

#[derive(Debug)]
struct Slot {
    value: Value,
    delimiter: String,
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed output of one executed command.
pub struct ResultTree {
    slots: Vec<Option<Slot>>,
    live: usize,
    observer: Option<Arc<dyn TreeObserver>>,
    error: Option<Error>,
}

impl ResultTree {
    const ROOT: NodeId = NodeId(0);

    /// Creates a tree whose root is a command node holding `label`.
    pub fn new(label: impl Into<String>, observer: Option<Arc<dyn TreeObserver>>) -> Self {
        let root = Slot {
            value: Value::String(label.into()),
            delimiter: String::new(),
            kind: NodeKind::Command,
            parent: None,
            children: Vec::new(),
        };
        Self {
            slots: vec![Some(root)],
            live: 1,
            observer,
            error: None,
        }
    }

    /// Id of the root node.
    pub fn root(&self) -> NodeId {
        Self::ROOT
    }

    /// The input line this tree was created for.
    pub fn label(&self) -> &str {
        self.slot(Self::ROOT)
            .and_then(|s| s.value.as_str())
            .unwrap_or_default()
    }

    /// Attaches a data node holding `value` under `parent`.
    ///
    /// Returns `None` if `parent` has been removed.
    pub fn attach_child(
        &mut self,
        parent: NodeId,
        value: Value,
        delimiter: impl Into<String>,
    ) -> Option<NodeId> {
        self.slot(parent)?;

        let id = NodeId(self.slots.len());
        self.slots.push(Some(Slot {
            value,
            delimiter: delimiter.into(),
            kind: NodeKind::Data,
            parent: Some(parent),
            children: Vec::new(),
        }));
        self.live += 1;

        if let Some(slot) = self.slot_mut(parent) {
            slot.children.push(id);
        }
        if let (Some(observer), Some(slot)) = (&self.observer, self.slot(id)) {
            observer.child_added(parent, id, &slot.value);
        }
        Some(id)
    }

    /// Replaces the value of `node`. Returns false if the node does not exist.
    pub fn set_value(&mut self, node: NodeId, value: Value) -> bool {
        let Some(slot) = self.slot_mut(node) else {
            return false;
        };
        slot.value = value;

        if let (Some(observer), Some(slot)) = (&self.observer, self.slot(node)) {
            observer.value_updated(node, &slot.value);
        }
        true
    }

    /// Detaches `node` from its parent and releases its whole subtree.
    ///
    /// Returns the number of nodes released (0 if `node` does not exist).
    pub fn remove(&mut self, node: NodeId) -> usize {
        let Some(parent) = self.slot(node).map(|s| s.parent) else {
            return 0;
        };
        if let Some(parent) = parent.and_then(|p| self.slot_mut(p)) {
            parent.children.retain(|c| *c != node);
        }

        let mut released = 0;
        let mut pending = vec![node];
        while let Some(id) = pending.pop() {
            if let Some(slot) = self.slots.get_mut(id.0).and_then(Option::take) {
                pending.extend(slot.children);
                released += 1;
            }
        }
        self.live -= released;
        released
    }

    /// Parent of `node`, if it exists and is not a root.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.slot(node)?.parent
    }

    /// Children of `node` in attachment order (empty if it does not exist).
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.slot(node).map(|s| s.children.as_slice()).unwrap_or(&[])
    }

    /// Topmost ancestor of `node`.
    pub fn root_of(&self, node: NodeId) -> Option<NodeId> {
        let mut current = node;
        self.slot(current)?;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        Some(current)
    }

    pub fn value(&self, node: NodeId) -> Option<&Value> {
        self.slot(node).map(|s| &s.value)
    }

    pub fn delimiter(&self, node: NodeId) -> Option<&str> {
        self.slot(node).map(|s| s.delimiter.as_str())
    }

    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.slot(node).map(|s| s.kind)
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.live
    }

    /// True once every node, root included, has been removed.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Values of the root's direct children, in order.
    pub fn outputs(&self) -> impl Iterator<Item = &Value> + '_ {
        self.children(Self::ROOT)
            .iter()
            .filter_map(move |id| self.value(*id))
    }

    /// Renders the whole tree depth-first.
    ///
    /// Each node contributes its rendering followed by its delimiter, unless the
    /// rendering is empty. Command nodes render as nothing.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let mut pending = vec![Self::ROOT];
        while let Some(id) = pending.pop() {
            let Some(slot) = self.slot(id) else {
                continue;
            };
            if slot.kind == NodeKind::Data {
                let rendered = slot.value.to_text(&slot.delimiter);
                if !rendered.is_empty() {
                    out.push_str(&rendered);
                    out.push_str(&slot.delimiter);
                }
            }
            pending.extend(slot.children.iter().rev());
        }
        out
    }

    /// The error recorded for the executed command, if it failed.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn set_error(&mut self, error: Error) {
        self.error = Some(error);
    }

    /// True if no error was recorded.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    fn slot(&self, id: NodeId) -> Option<&Slot> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, id: NodeId) -> Option<&mut Slot> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }
}

impl fmt::Debug for ResultTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultTree")
            .field("label", &self.label())
            .field("live", &self.live)
            .field("error", &self.error)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}
