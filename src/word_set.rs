use rustc_hash::FxHashSet;

use crate::error::Result;

/// A set of distinct tokens used as a partial or final reduction result.
///
/// Sets move between tasks by value and are never shared for mutation.
pub trait WordSet: Default + Send + 'static {
    /// Adds `word`, returning whether it was not present before. Empty words
    /// are never stored.
    fn insert(&mut self, word: &[u8]) -> Result<bool>;

    /// Adds every word of `other` to `self`.
    fn merge(&mut self, other: Self) -> Result<()>;

    /// Number of distinct words.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls `visit` once per distinct word.
    fn for_each_word(&self, visit: &mut dyn FnMut(&[u8]));

    fn from_words<'a>(words: impl IntoIterator<Item = &'a [u8]>) -> Result<Self> {
        let mut set = Self::default();
        for word in words {
            set.insert(word)?;
        }
        Ok(set)
    }
}

/// Hash set of owned tokens.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HashWordSet {
    words: FxHashSet<Box<[u8]>>,
}

impl HashWordSet {
    pub fn contains(&self, word: &[u8]) -> bool {
        self.words.contains(word)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.words.iter().map(|w| &**w)
    }
}

impl WordSet for HashWordSet {
    fn insert(&mut self, word: &[u8]) -> Result<bool> {
        // look up by slice first so repeated words don't allocate
        if word.is_empty() || self.words.contains(word) {
            return Ok(false);
        }
        Ok(self.words.insert(word.into()))
    }

    fn merge(&mut self, mut other: Self) -> Result<()> {
        if other.words.len() > self.words.len() {
            std::mem::swap(self, &mut other);
        }
        self.words.extend(other.words);
        Ok(())
    }

    fn len(&self) -> usize {
        self.words.len()
    }

    fn for_each_word(&self, visit: &mut dyn FnMut(&[u8])) {
        for word in &self.words {
            visit(&**word);
        }
    }
}

#[cfg(test)]
mod test {
    use super::{HashWordSet, WordSet};

    #[test]
    fn insert_is_idempotent() {
        let mut set = HashWordSet::default();
        assert!(set.insert(b"apple").unwrap());
        assert!(!set.insert(b"apple").unwrap(), "second insert reports already present");
        assert!(!set.insert(b"").unwrap(), "empty words are rejected");
        assert_eq!(set.len(), 1);
        assert!(set.contains(b"apple"));
    }

    #[test]
    fn merge_is_union() {
        let mut a = HashWordSet::from_words([b"a" as &[u8], b"b", b"c"]).unwrap();
        let b = HashWordSet::from_words([b"c" as &[u8], b"d"]).unwrap();
        a.merge(b).unwrap();
        let mut words: Vec<Vec<u8>> = a.iter().map(<[u8]>::to_vec).collect();
        words.sort();
        assert_eq!(words, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]);

        // merging a larger set into a smaller one gives the same result
        let mut small = HashWordSet::from_words([b"x" as &[u8]]).unwrap();
        small.merge(a.clone()).unwrap();
        assert_eq!(small.len(), 5);
        assert!(small.contains(b"x") && small.contains(b"d"));
    }

    #[test]
    fn for_each_word_visits_every_word_once() {
        let set = HashWordSet::from_words([b"one" as &[u8], b"two", b"one"]).unwrap();
        let mut count = 0;
        set.for_each_word(&mut |_| count += 1);
        assert_eq!(count, 2);
    }
}
