//! Compressed prefix tree (radix tree) keyed by raw bytes.
//!
//! Used as the durable index structure of the linker's registry and as an
//! in-memory lookup cache keyed by module path or package name.

mod node;

use std::collections::BTreeMap;

pub use node::{Edge, Leaf, Node};
use node::longest_common_prefix;

/// A radix tree mapping byte-string keys to values of type `V`.
#[derive(Debug, Clone)]
pub struct PrefixTree<V> {
    root: Node<V>,
    size: usize,
}

impl<V> Default for PrefixTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> PrefixTree<V> {
    pub fn new() -> Self {
        Self {
            root: Node::default(),
            size: 0,
        }
    }

    /// Number of keys stored.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn root(&self) -> &Node<V> {
        &self.root
    }

    /// Insert or overwrite `key`. Returns the previous value when the key
    /// already existed.
    pub fn store(&mut self, key: &[u8], value: V) -> Option<V> {
        let old = Self::insert(&mut self.root, key, key, value);
        if old.is_none() {
            self.size += 1;
        }
        old
    }

    fn insert(node: &mut Node<V>, key: &[u8], search: &[u8], value: V) -> Option<V> {
        if search.is_empty() {
            return match node.leaf.as_mut() {
                Some(leaf) => Some(std::mem::replace(&mut leaf.value, value)),
                None => {
                    node.leaf = Some(Leaf {
                        key: key.to_vec(),
                        value,
                    });
                    None
                }
            };
        }

        let label = search[0];
        let idx = match node.edge_index(label) {
            Ok(idx) => idx,
            Err(_) => {
                node.add_edge(label, Node::new_leaf(search, key, value));
                return None;
            }
        };

        let child = &mut node.edges[idx].node;
        let common = longest_common_prefix(search, &child.prefix);
        if common == child.prefix.len() {
            return Self::insert(child, key, &search[common..], value);
        }

        // The child shares only part of its prefix with the key: split it
        // under an intermediate node carrying the common bytes.
        let mut split = Node {
            leaf: None,
            prefix: search[..common].to_vec(),
            edges: Vec::new(),
        };
        let mut old_child = std::mem::take(&mut **child);
        old_child.prefix.drain(..common);
        split.add_edge(old_child.prefix[0], old_child);

        if search.len() == common {
            split.leaf = Some(Leaf {
                key: key.to_vec(),
                value,
            });
        } else {
            let rest = &search[common..];
            split.add_edge(rest[0], Node::new_leaf(rest, key, value));
        }

        **child = split;
        None
    }

    /// Look up an exact key.
    pub fn load(&self, key: &[u8]) -> Option<&V> {
        let mut node = &self.root;
        let mut search = key;

        loop {
            if search.is_empty() {
                return node.leaf.as_ref().map(|leaf| &leaf.value);
            }
            node = node.get_edge(search[0])?;
            search = search.strip_prefix(node.prefix.as_slice())?;
        }
    }

    /// Every entry whose key starts with `prefix`, including an exact match
    /// of the prefix itself. `None` only when no node lies on the prefix path.
    pub fn load_prefix(&self, prefix: &[u8]) -> Option<BTreeMap<&[u8], &V>> {
        let subtree = self.find_prefix_node(prefix)?;
        let mut result = BTreeMap::new();
        subtree.walk(&mut |key, value| {
            result.insert(key, value);
            false
        });
        Some(result)
    }

    fn find_prefix_node(&self, prefix: &[u8]) -> Option<&Node<V>> {
        let mut node = &self.root;
        let mut search = prefix;

        loop {
            if search.is_empty() {
                return Some(node);
            }
            node = node.get_edge(search[0])?;
            if let Some(rest) = search.strip_prefix(node.prefix.as_slice()) {
                search = rest;
            } else if node.prefix.starts_with(search) {
                return Some(node);
            } else {
                return None;
            }
        }
    }

    /// Remove `key`, returning its value. A node left with a single edge and
    /// no leaf is merged with its child, and so is its parent.
    pub fn delete(&mut self, key: &[u8]) -> Option<V> {
        let removed = if key.is_empty() {
            self.root.leaf.take().map(|leaf| leaf.value)
        } else {
            Self::remove(&mut self.root, key, true)
        };
        if removed.is_some() {
            self.size -= 1;
        }
        removed
    }

    fn remove(parent: &mut Node<V>, search: &[u8], parent_is_root: bool) -> Option<V> {
        let label = search[0];
        let idx = parent.edge_index(label).ok()?;
        let child = &mut parent.edges[idx].node;
        let rest = search.strip_prefix(child.prefix.as_slice())?;

        if !rest.is_empty() {
            return Self::remove(child, rest, false);
        }

        let value = child.leaf.take()?.value;

        if child.edges.is_empty() {
            parent.remove_edge(label);
        } else if child.edges.len() == 1 {
            child.merge_child();
        }

        if !parent_is_root && parent.edges.len() == 1 && !parent.is_leaf() {
            parent.merge_child();
        }

        Some(value)
    }

    /// Remove every key starting with `prefix`. Returns the number removed.
    pub fn delete_prefix(&mut self, prefix: &[u8]) -> usize {
        let removed = if prefix.is_empty() {
            let count = self.root.count_leaves();
            self.root = Node::default();
            count
        } else {
            Self::remove_prefix(&mut self.root, prefix, true)
        };
        self.size -= removed;
        removed
    }

    fn remove_prefix(parent: &mut Node<V>, prefix: &[u8], parent_is_root: bool) -> usize {
        let label = prefix[0];
        let Ok(idx) = parent.edge_index(label) else {
            return 0;
        };
        let child = &mut parent.edges[idx].node;

        let removed = if child.prefix.starts_with(prefix) {
            // the whole child subtree lies under the prefix
            let count = child.count_leaves();
            parent.remove_edge(label);
            count
        } else if let Some(rest) = prefix.strip_prefix(child.prefix.as_slice()) {
            return Self::remove_prefix(child, rest, false);
        } else {
            return 0;
        };

        if !parent_is_root && parent.edges.len() == 1 && !parent.is_leaf() {
            parent.merge_child();
        }
        removed
    }

    /// Smallest key in edge order.
    pub fn minimum(&self) -> Option<(&[u8], &V)> {
        let mut node = &self.root;
        loop {
            if let Some(leaf) = &node.leaf {
                return Some((leaf.key.as_slice(), &leaf.value));
            }
            node = &node.edges.first()?.node;
        }
    }

    /// Largest key in edge order.
    pub fn maximum(&self) -> Option<(&[u8], &V)> {
        let mut node = &self.root;
        loop {
            if let Some(edge) = node.edges.last() {
                node = &edge.node;
                continue;
            }
            return node.leaf.as_ref().map(|leaf| (leaf.key.as_slice(), &leaf.value));
        }
    }

    /// Visit every entry in edge order until `f` returns true.
    pub fn walk<'a, F>(&'a self, mut f: F)
    where
        F: FnMut(&'a [u8], &'a V) -> bool,
    {
        self.root.walk(&mut f);
    }

    /// Visit every entry whose key starts with `prefix` until `f` returns true.
    pub fn walk_prefix<'a, F>(&'a self, prefix: &[u8], mut f: F)
    where
        F: FnMut(&'a [u8], &'a V) -> bool,
    {
        if let Some(node) = self.find_prefix_node(prefix) {
            node.walk(&mut f);
        }
    }

    /// Visit every entry whose key is a prefix of `path`, shortest first,
    /// until `f` returns true.
    pub fn walk_path<'a, F>(&'a self, path: &[u8], mut f: F)
    where
        F: FnMut(&'a [u8], &'a V) -> bool,
    {
        let mut node = &self.root;
        let mut search = path;

        loop {
            if let Some(leaf) = &node.leaf
                && f(leaf.key.as_slice(), &leaf.value)
            {
                return;
            }
            if search.is_empty() {
                return;
            }
            let Some(next) = node.get_edge(search[0]) else {
                return;
            };
            let Some(rest) = search.strip_prefix(next.prefix.as_slice()) else {
                return;
            };
            node = next;
            search = rest;
        }
    }

    /// The deepest stored key that is a prefix of `key`.
    pub fn longest_prefix(&self, key: &[u8]) -> Option<(&[u8], &V)> {
        let mut last = None;
        self.walk_path(key, |k, v| {
            last = Some((k, v));
            false
        });
        last
    }

    /// All keys in edge order.
    pub fn keys(&self) -> Vec<Vec<u8>> {
        let mut keys = Vec::with_capacity(self.size);
        self.walk(|k, _| {
            keys.push(k.to_vec());
            false
        });
        keys
    }
}
