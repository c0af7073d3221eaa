use indexmap::IndexMap;
use std::hash::Hash;

/// Occurrence counter that remembers first-seen order.
///
/// Rankings are sorted by count descending; equal counts keep the order in
/// which the keys were first observed.
#[derive(Debug, Clone)]
pub struct FrequencyTable<K> {
    counts: IndexMap<K, usize>,
}

impl<K: Eq + Hash + Clone> FrequencyTable<K> {
    pub fn new() -> Self {
        Self {
            counts: IndexMap::new(),
        }
    }

    pub fn add(&mut self, key: K) {
        *self.counts.entry(key).or_insert(0) += 1;
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn count(&self, key: &K) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// The `k` most frequent keys
    pub fn top(&self, k: usize) -> Vec<(K, usize)> {
        let mut ranked: Vec<(K, usize)> = self
            .counts
            .iter()
            .map(|(key, count)| (key.clone(), *count))
            .collect();
        // sort_by is stable, so ties stay in insertion order
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(k);
        ranked
    }
}

impl<K: Eq + Hash + Clone> Default for FrequencyTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone> FromIterator<K> for FrequencyTable<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut table = Self::new();
        for key in iter {
            table.add(key);
        }
        table
    }
}
