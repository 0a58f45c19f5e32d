//! Arena-backed trie over the lowercase ASCII alphabet.
//!
//! Every node is a fixed array of 26 packed slots, one per letter. A slot
//! holds the arena index of the child reached by that letter in its low 31
//! bits, and in its top bit whether a word ends on that letter. Index 0 is the
//! root, which can never be a child, so a zero index means "no child".
//!
//! Nodes are only ever appended to the arena, so indices stay valid for the
//! life of the set.

use crate::{error::Result, word_set::WordSet};

pub const ALPHABET: usize = (b'z' - b'a' + 1) as usize;

const TERMINAL: u32 = 0x8000_0000;
const INDEX_MASK: u32 = 0x7fff_ffff;

/// Largest arena a trie can address.
pub const MAX_NODES: usize = INDEX_MASK as usize;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TrieError {
    #[error("byte {byte:#04x} is not a lowercase ascii letter")]
    InvalidLetter { byte: u8 },

    #[error("trie arena is full ({capacity} nodes)")]
    ArenaExhausted { capacity: usize },
}

/// One packed `(child index, terminal)` pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct Slot(u32);

impl Slot {
    pub fn child(self) -> Option<u32> {
        match self.0 & INDEX_MASK {
            0 => None,
            index => Some(index),
        }
    }

    pub fn is_terminal(self) -> bool {
        self.0 & TERMINAL != 0
    }

    fn set_child(&mut self, index: u32) {
        debug_assert!(index != 0 && index <= INDEX_MASK);
        self.0 = (self.0 & TERMINAL) | index;
    }

    fn set_terminal(&mut self) {
        self.0 |= TERMINAL;
    }
}

type Node = [Slot; ALPHABET];

#[derive(Debug, Clone)]
pub struct TrieWordSet {
    nodes: Vec<Node>,
    max_nodes: usize,
}

impl Default for TrieWordSet {
    fn default() -> Self {
        TrieWordSet::with_capacity(Self::DEFAULT_PREALLOCATE)
    }
}

impl TrieWordSet {
    /// Nodes reserved up front by [`Default`]; partial sets are created per
    /// chunk, so this stays small and the arena grows on demand.
    pub const DEFAULT_PREALLOCATE: usize = 1024;

    /// Creates an empty trie with room for `preallocate` nodes before the
    /// arena has to grow.
    pub fn with_capacity(preallocate: usize) -> TrieWordSet {
        TrieWordSet::bounded(preallocate, MAX_NODES)
    }

    /// Like [`with_capacity`](Self::with_capacity), but never holds more than
    /// `max_nodes` nodes; inserts that would need more fail.
    pub fn bounded(preallocate: usize, max_nodes: usize) -> TrieWordSet {
        let max_nodes = max_nodes.clamp(1, MAX_NODES);
        let mut nodes = Vec::with_capacity(preallocate.clamp(1, max_nodes));
        nodes.push([Slot::default(); ALPHABET]);
        TrieWordSet { nodes, max_nodes }
    }

    /// Nodes allocated so far, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, word: &[u8]) -> bool {
        let Some((&last, prefix)) = word.split_last() else {
            return false;
        };
        let mut node = 0usize;
        for &byte in prefix {
            let Some(letter) = letter_index(byte) else {
                return false;
            };
            match self.nodes[node][letter].child() {
                Some(child) => node = child as usize,
                None => return false,
            }
        }
        letter_index(last).is_some_and(|letter| self.nodes[node][letter].is_terminal())
    }

    /// Adds `word`; `Ok(false)` if it was already present or is empty.
    pub fn insert_word(&mut self, word: &[u8]) -> Result<bool, TrieError> {
        let Some((&last, prefix)) = word.split_last() else {
            return Ok(false);
        };
        // validate first so a rejected word leaves no half-built path behind
        if let Some(&byte) = word.iter().find(|b| !b.is_ascii_lowercase()) {
            return Err(TrieError::InvalidLetter { byte });
        }

        let mut node = 0usize;
        for &byte in prefix {
            let letter = (byte - b'a') as usize;
            node = match self.nodes[node][letter].child() {
                Some(child) => child as usize,
                None => {
                    let child = self.allocate_node()?;
                    self.nodes[node][letter].set_child(child);
                    child as usize
                }
            };
        }

        let slot = &mut self.nodes[node][(last - b'a') as usize];
        if slot.is_terminal() {
            return Ok(false);
        }
        slot.set_terminal();
        Ok(true)
    }

    /// Inserts every word of `other`. Costs one insert per word of `other`,
    /// so merge the smaller trie into the larger one where possible.
    pub fn merge_from(&mut self, other: &TrieWordSet) -> Result<(), TrieError> {
        other.try_for_each_word(|word| self.insert_word(word).map(|_| ()))
    }

    /// Visits every word depth-first, in lexicographic order.
    pub fn enumerate(&self, mut visit: impl FnMut(&[u8])) {
        let _ = self.try_for_each_word(|word| {
            visit(word);
            Ok::<(), ()>(())
        });
    }

    /// Like [`enumerate`](Self::enumerate), stopping at the first error.
    pub fn try_for_each_word<E>(
        &self,
        mut visit: impl FnMut(&[u8]) -> Result<(), E>,
    ) -> Result<(), E> {
        // explicit stack of (node, next letter); `word` holds the path to the
        // top frame, so tokens longer than the thread stack are fine
        let mut stack: Vec<(usize, usize)> = vec![(0, 0)];
        let mut word: Vec<u8> = Vec::new();

        while let Some(frame) = stack.last_mut() {
            let (node, letter) = *frame;
            if letter == ALPHABET {
                stack.pop();
                if !stack.is_empty() {
                    word.pop();
                }
                continue;
            }
            frame.1 += 1;

            let slot = self.nodes[node][letter];
            if slot.0 == 0 {
                continue;
            }
            word.push(b'a' + letter as u8);
            if slot.is_terminal() {
                visit(word.as_slice())?;
            }
            match slot.child() {
                Some(child) => stack.push((child as usize, 0)),
                None => {
                    word.pop();
                }
            }
        }
        Ok(())
    }

    /// Number of stored words. Walks the whole trie; there is no cached
    /// counter.
    pub fn size(&self) -> usize {
        let mut count = 0;
        self.enumerate(|_| count += 1);
        count
    }

    fn allocate_node(&mut self) -> Result<u32, TrieError> {
        let index = self.nodes.len();
        if index >= self.max_nodes {
            return Err(TrieError::ArenaExhausted {
                capacity: self.max_nodes,
            });
        }
        self.nodes.push([Slot::default(); ALPHABET]);
        Ok(index as u32)
    }
}

fn letter_index(byte: u8) -> Option<usize> {
    byte.is_ascii_lowercase().then(|| (byte - b'a') as usize)
}

impl WordSet for TrieWordSet {
    fn insert(&mut self, word: &[u8]) -> Result<bool> {
        Ok(self.insert_word(word)?)
    }

    fn merge(&mut self, mut other: Self) -> Result<()> {
        if other.nodes.len() > self.nodes.len() {
            std::mem::swap(self, &mut other);
        }
        Ok(self.merge_from(&other)?)
    }

    fn len(&self) -> usize {
        self.size()
    }

    fn is_empty(&self) -> bool {
        self.nodes[0].iter().all(|slot| slot.0 == 0)
    }

    fn for_each_word(&self, visit: &mut dyn FnMut(&[u8])) {
        self.enumerate(visit)
    }
}
