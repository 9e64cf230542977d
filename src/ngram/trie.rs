//! Fixed-capacity hash trie holding every n-gram seen since the last spill.
//!
//! Nodes live in one flat, open-addressed table and only point at their
//! parent, so a node is found by hashing `(parent, token)` and probing
//! linearly. Slot 0 is the root; it points at itself and never counts as an
//! n-gram. The table is allocated on the first insert, sized from a byte
//! budget, and never grows: the owner must spill and [`clear`](TokenTrie::clear)
//! before it fills up.

use std::mem;

use crate::error::{Error, Result};
use crate::token_map::TokenId;

pub type NodeId = u32;

pub const ROOT_NODE_ID: NodeId = 0;
/// Parent value of a slot that holds no node.
pub const INVALID_NODE_ID: NodeId = NodeId::MAX;
pub const INVALID_TOKEN_ID: TokenId = TokenId::MAX;

pub const MIN_MAX_DEPTH: usize = 1;
pub const DEFAULT_MAX_DEPTH: usize = 5;
pub const MIN_MEMORY_USAGE: usize = 1 << 20;
pub const DEFAULT_MEMORY_USAGE: usize = 256 << 20;

/// Node indices must stay representable as non-negative `i32`.
const MAX_TABLE_SIZE: usize = 1 << 31;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Node {
    parent: NodeId,
    token: TokenId,
    freq: i32,
}

impl Node {
    const EMPTY: Node = Node {
        parent: INVALID_NODE_ID,
        token: INVALID_TOKEN_ID,
        freq: 0,
    };

    #[inline]
    pub fn parent(&self) -> NodeId {
        self.parent
    }

    #[inline]
    pub fn token(&self) -> TokenId {
        self.token
    }

    #[inline]
    pub fn freq(&self) -> i32 {
        self.freq
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parent == INVALID_NODE_ID
    }
}

#[derive(Debug)]
pub struct TokenTrie {
    max_depth: usize,
    memory_usage: usize,
    table: Vec<Node>,
    num_nodes: usize,
    total_length: usize,
    max_freq: i32,
}

impl Default for TokenTrie {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl TokenTrie {
    /// `max_depth` is the longest n-gram recorded and `memory_usage` the table
    /// budget in bytes; 0 selects the default, small values are raised to the
    /// minimum.
    pub fn new(max_depth: usize, memory_usage: usize) -> Self {
        let mut trie = TokenTrie {
            max_depth: DEFAULT_MAX_DEPTH,
            memory_usage: DEFAULT_MEMORY_USAGE,
            table: Vec::new(),
            num_nodes: 0,
            total_length: 0,
            max_freq: 0,
        };
        trie.reset(max_depth, memory_usage);
        trie
    }

    /// Clears the trie and changes its limits.
    pub fn reset(&mut self, max_depth: usize, memory_usage: usize) {
        self.max_depth = match max_depth {
            0 => DEFAULT_MAX_DEPTH,
            d => d.max(MIN_MAX_DEPTH),
        };
        self.memory_usage = match memory_usage {
            0 => DEFAULT_MEMORY_USAGE,
            m => m.max(MIN_MEMORY_USAGE),
        };
        self.clear();
    }

    /// Drops the table and all counters. The next insert allocates afresh.
    pub fn clear(&mut self) {
        self.table = Vec::new();
        self.num_nodes = 0;
        self.total_length = 0;
        self.max_freq = 0;
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn memory_usage(&self) -> usize {
        self.memory_usage
    }

    pub fn table_size(&self) -> usize {
        self.table.len()
    }

    /// Occupied slots, root included.
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Sum of the lengths of all distinct n-grams stored.
    pub fn total_length(&self) -> usize {
        self.total_length
    }

    pub fn max_freq(&self) -> i32 {
        self.max_freq
    }

    pub fn is_empty(&self) -> bool {
        self.num_nodes == 0
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.table[id as usize]
    }

    /// Records every n-gram of length `1..=max_depth` in `tokens`.
    pub fn insert(&mut self, tokens: &[TokenId]) -> Result<()> {
        if self.is_empty() {
            self.init_table();
        }
        for i in 0..tokens.len() {
            let end = (i + self.max_depth).min(tokens.len());
            let mut node = ROOT_NODE_ID;
            for (j, &token) in tokens[i..end].iter().enumerate() {
                let (next, is_new) = self.insert_node(node, token)?;
                if is_new {
                    self.total_length += j + 1;
                }
                node = next;
            }
        }
        Ok(())
    }

    /// Finds the node for `tokens` without modifying the trie.
    #[cfg(test)]
    pub(crate) fn find(&self, tokens: &[TokenId]) -> Option<NodeId> {
        if self.is_empty() || tokens.is_empty() {
            return None;
        }
        let mut node = ROOT_NODE_ID;
        for &token in tokens {
            let slot = self.find_slot(node, token)?;
            if self.table[slot].is_empty() {
                return None;
            }
            node = slot as NodeId;
        }
        Some(node)
    }

    /// Frequency of the n-gram `tokens`, 0 if it was never inserted.
    #[cfg(test)]
    pub(crate) fn freq(&self, tokens: &[TokenId]) -> i32 {
        self.find(tokens).map_or(0, |id| self.node(id).freq)
    }

    /// Appends the tokens of the path from the root to `id` to `tokens` and
    /// returns the node's frequency. `None` for the root and empty slots.
    pub fn path(&self, id: NodeId, tokens: &mut Vec<TokenId>) -> Option<i32> {
        if id == ROOT_NODE_ID || self.node(id).is_empty() {
            return None;
        }
        let freq = self.node(id).freq;
        let start = tokens.len();
        let mut id = id;
        while id != ROOT_NODE_ID {
            let node = self.node(id);
            tokens.push(node.token);
            id = node.parent;
        }
        tokens[start..].reverse();
        Some(freq)
    }

    fn init_table(&mut self) {
        let size = (self.memory_usage / mem::size_of::<Node>()).min(MAX_TABLE_SIZE);
        self.table = vec![Node::EMPTY; size];
        self.table[ROOT_NODE_ID as usize].parent = ROOT_NODE_ID;
        self.num_nodes = 1;
    }

    fn insert_node(&mut self, parent: NodeId, token: TokenId) -> Result<(NodeId, bool)> {
        let slot = self.find_slot(parent, token).ok_or(Error::TrieFull {
            slots: self.table.len(),
        })?;
        let node = &mut self.table[slot];
        let is_new = node.is_empty();
        if is_new {
            node.parent = parent;
            node.token = token;
            self.num_nodes += 1;
        }
        node.freq += 1;
        if node.freq > self.max_freq {
            self.max_freq = node.freq;
        }
        Ok((slot as NodeId, is_new))
    }

    /// Slot holding `(parent, token)`, or the empty slot where it belongs.
    /// `None` if the table is full and the pair is absent.
    fn find_slot(&self, parent: NodeId, token: TokenId) -> Option<usize> {
        let size = self.table.len();
        let key = ((parent as u64) << 32) | token as u64;
        let mut slot = (hash(key) as usize) % size;
        for _ in 0..size {
            let node = &self.table[slot];
            if node.is_empty() {
                return Some(slot);
            }
            if slot != ROOT_NODE_ID as usize && node.parent == parent && node.token == token {
                return Some(slot);
            }
            slot += 1;
            if slot == size {
                slot = 0;
            }
        }
        None
    }
}

/// 64-bit to 32-bit integer mix.
#[inline]
fn hash(mut x: u64) -> u32 {
    x = (!x).wrapping_add(x << 18);
    x ^= x >> 31;
    x = x.wrapping_mul(21);
    x ^= x >> 11;
    x = x.wrapping_add(x << 6);
    x ^= x >> 22;
    x as u32
}
