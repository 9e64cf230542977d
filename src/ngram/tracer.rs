//! Enumerates every n-gram stored in a [`TokenTrie`] exactly once.
//!
//! The trie only has parent links, so the tracer scans the table for
//! unvisited nodes. After emitting a node it climbs to the node's parent on
//! the next call, as long as the parent has not been emitted yet; every
//! prefix of a stored n-gram is itself a stored n-gram and is reached this way
//! or by the scan.

use crate::bit_set::Set as BitSet;
use crate::ngram::trie::{NodeId, ROOT_NODE_ID, TokenTrie};
use crate::token_map::TokenId;

pub struct TrieTracer<'a> {
    trie: &'a TokenTrie,
    visited: BitSet,
    /// Next node of the ancestor climb, `ROOT_NODE_ID` when there is none.
    current: NodeId,
    /// Next slot to scan.
    next: usize,
}

impl<'a> TrieTracer<'a> {
    pub fn new(trie: &'a TokenTrie) -> Self {
        TrieTracer {
            trie,
            visited: BitSet::new(trie.table_size()),
            current: ROOT_NODE_ID,
            next: ROOT_NODE_ID as usize + 1,
        }
    }

    /// Restarts the walk over `trie`, reusing the visited bitmap's memory.
    pub fn reset(&mut self, trie: &'a TokenTrie) {
        self.trie = trie;
        self.visited.reset(trie.table_size());
        self.current = ROOT_NODE_ID;
        self.next = ROOT_NODE_ID as usize + 1;
    }

    /// Appends the tokens of the next n-gram to `tokens` and returns its
    /// frequency, or `None` once every node has been emitted. `tokens` is
    /// never cleared; callers keep track of where each n-gram starts.
    pub fn next_into(&mut self, tokens: &mut Vec<TokenId>) -> Option<i32> {
        if let Some(freq) = self.climb(tokens) {
            return Some(freq);
        }
        while self.next < self.trie.table_size() {
            let id = self.next as NodeId;
            self.next += 1;
            if self.visited.has(id as usize) || self.trie.node(id).is_empty() {
                continue;
            }
            self.current = id;
            return self.climb(tokens);
        }
        None
    }

    /// Emits `current` and moves the climb to its parent if that is still
    /// unvisited.
    fn climb(&mut self, tokens: &mut Vec<TokenId>) -> Option<i32> {
        if self.current == ROOT_NODE_ID {
            return None;
        }
        let id = self.current;
        self.visited.add(id as usize);

        let parent = self.trie.node(id).parent();
        self.current = if self.visited.has(parent as usize) {
            ROOT_NODE_ID
        } else {
            parent
        };
        self.trie.path(id, tokens)
    }
}

impl Iterator for TrieTracer<'_> {
    type Item = (Vec<TokenId>, i32);

    fn next(&mut self) -> Option<Self::Item> {
        let mut tokens = Vec::new();
        let freq = self.next_into(&mut tokens)?;
        Some((tokens, freq))
    }
}
