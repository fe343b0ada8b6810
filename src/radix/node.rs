//! Nodes and edges of the compressed prefix tree.

/// A stored key and its value. The key is always the full key, never a fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf<V> {
    pub key: Vec<u8>,
    pub value: V,
}

/// A labelled link to a child node. The label is the first byte of the child's prefix.
#[derive(Debug, Clone)]
pub struct Edge<V> {
    pub label: u8,
    pub node: Box<Node<V>>,
}

/// A tree node.
///
/// Invariants: `edges` is sorted ascending by `label` with unique labels, and
/// `prefix` holds the bytes consumed since the parent.
#[derive(Debug, Clone)]
pub struct Node<V> {
    pub leaf: Option<Leaf<V>>,
    pub prefix: Vec<u8>,
    pub edges: Vec<Edge<V>>,
}

impl<V> Default for Node<V> {
    fn default() -> Self {
        Self {
            leaf: None,
            prefix: Vec::new(),
            edges: Vec::new(),
        }
    }
}

impl<V> Node<V> {
    pub(crate) fn new_leaf(prefix: &[u8], key: &[u8], value: V) -> Self {
        Self {
            leaf: Some(Leaf {
                key: key.to_vec(),
                value,
            }),
            prefix: prefix.to_vec(),
            edges: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.leaf.is_some()
    }

    pub(crate) fn edge_index(&self, label: u8) -> Result<usize, usize> {
        self.edges.binary_search_by_key(&label, |e| e.label)
    }

    /// Insert an edge keeping the list sorted. An existing edge with the same
    /// label is replaced.
    pub(crate) fn add_edge(&mut self, label: u8, node: Node<V>) {
        let edge = Edge {
            label,
            node: Box::new(node),
        };
        match self.edge_index(label) {
            Ok(idx) => self.edges[idx] = edge,
            Err(idx) => self.edges.insert(idx, edge),
        }
    }

    pub(crate) fn get_edge(&self, label: u8) -> Option<&Node<V>> {
        self.edge_index(label).ok().map(|idx| &*self.edges[idx].node)
    }

    pub(crate) fn remove_edge(&mut self, label: u8) -> Option<Node<V>> {
        let idx = self.edge_index(label).ok()?;
        Some(*self.edges.remove(idx).node)
    }

    /// Absorb the only child: its prefix is appended to ours and its leaf
    /// and edges replace ours.
    pub(crate) fn merge_child(&mut self) {
        debug_assert_eq!(self.edges.len(), 1);
        let child = *self.edges.remove(0).node;
        self.prefix.extend_from_slice(&child.prefix);
        self.leaf = child.leaf;
        self.edges = child.edges;
    }

    /// Visit every leaf of this subtree in edge order. Returns true if `f`
    /// asked to stop.
    pub(crate) fn walk<'a, F>(&'a self, f: &mut F) -> bool
    where
        F: FnMut(&'a [u8], &'a V) -> bool,
    {
        if let Some(leaf) = &self.leaf
            && f(leaf.key.as_slice(), &leaf.value)
        {
            return true;
        }
        self.edges.iter().any(|edge| edge.node.walk(f))
    }

    pub(crate) fn count_leaves(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_, _| {
            count += 1;
            false
        });
        count
    }
}

/// Length of the common prefix of two byte strings.
pub(crate) fn longest_common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}
