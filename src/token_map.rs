//! Token dictionary: interns token text and hands out dense ids.
//!
//! Ids are assigned in first-seen order starting at 0. The token bytes are
//! stored once and shared between the id table and the lookup map.

use std::collections::HashMap;
use std::rc::Rc;

pub type TokenId = u32;

#[derive(Debug, Default)]
pub struct TokenMap {
    ids: HashMap<Rc<[u8]>, TokenId>,
    tokens: Vec<Rc<[u8]>>,
}

impl TokenMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `token`, storing a copy of it first if it has not
    /// been seen since the last [`clear`](Self::clear).
    pub fn intern(&mut self, token: &[u8]) -> TokenId {
        if let Some(&id) = self.ids.get(token) {
            return id;
        }
        let id = self.tokens.len() as TokenId;
        let text: Rc<[u8]> = Rc::from(token);
        self.ids.insert(Rc::clone(&text), id);
        self.tokens.push(text);
        id
    }

    /// # Panics
    /// Panics if `id` was not returned by `intern` since the last clear.
    #[inline]
    pub fn text(&self, id: TokenId) -> &[u8] {
        &self.tokens[id as usize]
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.tokens.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_assigns_sequential_ids() {
        let mut map = TokenMap::new();
        assert_eq!(map.intern(b"hello"), 0);
        assert_eq!(map.intern(b"world"), 1);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn intern_deduplicates() {
        let mut map = TokenMap::new();
        let first = map.intern(b"same");
        let second = map.intern(b"same");
        assert_eq!(first, second);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn text_roundtrip() {
        let mut map = TokenMap::new();
        for token in ["a", "bb", "", "\u{65e5}\u{672c}"] {
            let id = map.intern(token.as_bytes());
            assert_eq!(map.text(id), token.as_bytes());
        }
        assert_eq!(map.intern(b"bb"), 1);
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn clear_resets_ids() {
        let mut map = TokenMap::new();
        map.intern(b"x");
        map.intern(b"y");
        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.intern(b"y"), 0);
        assert_eq!(map.intern(b"x"), 1);
    }
}
