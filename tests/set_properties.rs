use std::collections::BTreeSet;

use proptest::prelude::*;
use uq_words::{HashWordSet, TrieWordSet, WordSet};

fn word() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(b'a'..=b'z', 1..12)
}

fn words() -> impl Strategy<Value = Vec<Vec<u8>>> {
    proptest::collection::vec(word(), 0..200)
}

fn sorted_words<S: WordSet>(set: &S) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    set.for_each_word(&mut |w| out.push(w.to_vec()));
    out.sort();
    out
}

fn build<S: WordSet>(words: &[Vec<u8>]) -> S {
    S::from_words(words.iter().map(Vec::as_slice)).unwrap()
}

/// Splits `words` into `parts` runs and reduces them with the given tree
/// shape: left fold, right fold or balanced pairwise rounds.
fn reduce_in_shape<S: WordSet>(words: &[Vec<u8>], parts: usize, shape: u8) -> S {
    let step = words.len().div_ceil(parts).max(1);
    let mut sets: Vec<S> = words.chunks(step).map(build::<S>).collect();
    if sets.is_empty() {
        return S::default();
    }
    match shape % 3 {
        0 => {
            let mut acc = sets.remove(0);
            for s in sets {
                acc.merge(s).unwrap();
            }
            acc
        }
        1 => {
            let mut acc = sets.pop().unwrap();
            while let Some(mut s) = sets.pop() {
                s.merge(acc).unwrap();
                acc = s;
            }
            acc
        }
        _ => {
            while sets.len() > 1 {
                let mut next = Vec::with_capacity(sets.len().div_ceil(2));
                let mut it = sets.into_iter();
                while let Some(mut a) = it.next() {
                    if let Some(b) = it.next() {
                        a.merge(b).unwrap();
                    }
                    next.push(a);
                }
                sets = next;
            }
            sets.pop().unwrap()
        }
    }
}

proptest! {
    #[test]
    fn merge_is_set_union(a in words(), b in words()) {
        let expected: BTreeSet<Vec<u8>> = a.iter().chain(b.iter()).cloned().collect();
        let expected: Vec<Vec<u8>> = expected.into_iter().collect();

        let mut trie: TrieWordSet = build(&a);
        trie.merge(build(&b)).unwrap();
        prop_assert_eq!(sorted_words(&trie), expected.clone());

        let mut hash: HashWordSet = build(&a);
        hash.merge(build(&b)).unwrap();
        prop_assert_eq!(sorted_words(&hash), expected);
    }

    #[test]
    fn merge_is_commutative(a in words(), b in words()) {
        let mut ab: TrieWordSet = build(&a);
        ab.merge(build(&b)).unwrap();
        let mut ba: TrieWordSet = build(&b);
        ba.merge(build(&a)).unwrap();
        prop_assert_eq!(sorted_words(&ab), sorted_words(&ba));
    }

    #[test]
    fn reinsert_is_a_no_op(ws in words()) {
        let mut trie: TrieWordSet = build(&ws);
        let mut hash: HashWordSet = build(&ws);
        let (trie_len, hash_len) = (trie.len(), hash.len());
        for w in &ws {
            prop_assert!(!trie.insert(w).unwrap());
            prop_assert!(!hash.insert(w).unwrap());
        }
        prop_assert_eq!(trie.len(), trie_len);
        prop_assert_eq!(hash.len(), hash_len);
    }

    #[test]
    fn trie_enumeration_is_sorted_and_unique(ws in words()) {
        let trie: TrieWordSet = build(&ws);
        let mut seen = Vec::new();
        trie.enumerate(|w| seen.push(w.to_vec()));
        let expected: Vec<Vec<u8>> = ws.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
        prop_assert_eq!(seen, expected);
    }

    #[test]
    fn merge_tree_shape_does_not_matter(ws in words(), parts in 3usize..8) {
        let expected = ws.iter().collect::<BTreeSet<_>>().len();
        for shape in 0..3u8 {
            let trie: TrieWordSet = reduce_in_shape(&ws, parts, shape);
            let hash: HashWordSet = reduce_in_shape(&ws, parts, shape);
            prop_assert_eq!(trie.len(), expected, "trie, shape {}", shape);
            prop_assert_eq!(hash.len(), expected, "hash, shape {}", shape);
        }
    }
}
