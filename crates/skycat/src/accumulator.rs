//! Bounded result set.
//!
//! A [`ResultSet`] keeps at most `max` entries. Once full, a candidate only
//! gets in by beating the current worst entry, which it then replaces. Which
//! key counts as "worse" is fixed by the [`Eviction`] policy: the larger
//! distance from the search center, or the fainter (larger) magnitude.

use crate::entry::SourceEntry;

/// Which stored entry is discarded when a better candidate arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Eviction {
    /// Farthest from the search center goes first.
    #[default]
    Distance,
    /// Faintest goes first.
    Magnitude,
}

/// Outcome of offering a candidate to a [`ResultSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Stored in a free slot.
    Appended,
    /// Stored in place of the previous worst entry.
    Replaced,
    /// The set is full and the candidate is no better than its worst entry.
    Exhausted,
}

/// At most `max` entries, each stored beside the key it was admitted with.
#[derive(Debug, Clone)]
pub struct ResultSet {
    max: usize,
    eviction: Eviction,
    entries: Vec<SourceEntry>,
    keys: Vec<f64>,
    worst: usize,
}

impl ResultSet {
    /// An empty set holding up to `max` entries; `max == 0` admits nothing.
    pub fn new(max: usize, eviction: Eviction) -> ResultSet {
        ResultSet {
            max,
            eviction,
            entries: Vec::with_capacity(max.min(4096)),
            keys: Vec::with_capacity(max.min(4096)),
            worst: 0,
        }
    }

    /// Policy deciding which entry is discarded when the set is full.
    pub fn eviction(&self) -> Eviction {
        self.eviction
    }

    /// Capacity given at construction.
    pub fn max_count(&self) -> usize {
        self.max
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True before any candidate has been admitted.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True once further candidates must displace the worst entry.
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.max
    }

    /// Key of the entry that would be evicted next.
    pub fn worst_key(&self) -> Option<f64> {
        self.keys.get(self.worst).copied()
    }

    /// Offer `entry` with its sort key (distance in degrees or magnitude).
    pub fn offer(&mut self, entry: SourceEntry, key: f64) -> Admission {
        if self.entries.len() < self.max {
            if self.keys.is_empty() || worse(key, self.keys[self.worst]) {
                self.worst = self.keys.len();
            }
            self.entries.push(entry);
            self.keys.push(key);
            return Admission::Appended;
        }
        if self.max == 0 || !worse(self.keys[self.worst], key) {
            return Admission::Exhausted;
        }
        self.entries[self.worst] = entry;
        self.keys[self.worst] = key;
        self.worst = self.find_worst();
        Admission::Replaced
    }

    /// Like [`offer`](Self::offer), reporting only whether the entry was kept.
    pub fn accept(&mut self, entry: SourceEntry, key: f64) -> bool {
        self.offer(entry, key) != Admission::Exhausted
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SourceEntry, f64)> {
        self.entries.iter().zip(self.keys.iter().copied())
    }

    /// Entries with their keys, in insertion-slot order.
    pub fn into_pairs(self) -> Vec<(SourceEntry, f64)> {
        self.entries.into_iter().zip(self.keys).collect()
    }

    pub fn into_entries(self) -> Vec<SourceEntry> {
        self.entries
    }

    fn find_worst(&self) -> usize {
        let mut worst = 0;
        for (i, &key) in self.keys.iter().enumerate().skip(1) {
            if worse(key, self.keys[worst]) {
                worst = i;
            }
        }
        worst
    }
}

/// True when key `a` ranks below key `b`. NaN ranks below everything.
fn worse(a: f64, b: f64) -> bool {
    if a.is_nan() {
        return !b.is_nan();
    }
    a > b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Frame;

    fn star(id: f64) -> SourceEntry {
        SourceEntry::new(id, id, 0.0, Frame::j2000())
    }

    fn ids(set: ResultSet) -> Vec<f64> {
        let mut ids: Vec<f64> = set.into_entries().iter().map(|e| e.id).collect();
        ids.sort_by(f64::total_cmp);
        ids
    }

    #[test]
    fn appends_until_full() {
        let mut set = ResultSet::new(3, Eviction::Distance);
        assert_eq!(set.offer(star(1.0), 0.5), Admission::Appended);
        assert_eq!(set.offer(star(2.0), 0.9), Admission::Appended);
        assert_eq!(set.offer(star(3.0), 0.1), Admission::Appended);
        assert!(set.is_full());
        assert_eq!(set.worst_key(), Some(0.9));
    }

    #[test]
    fn replaces_worst_and_rescans() {
        let mut set = ResultSet::new(3, Eviction::Magnitude);
        set.offer(star(1.0), 12.0);
        set.offer(star(2.0), 15.0);
        set.offer(star(3.0), 14.0);
        assert_eq!(set.offer(star(4.0), 11.0), Admission::Replaced);
        assert_eq!(set.worst_key(), Some(14.0));
        assert_eq!(ids(set), vec![1.0, 3.0, 4.0]);
    }

    #[test]
    fn equal_to_worst_is_rejected() {
        let mut set = ResultSet::new(1, Eviction::Distance);
        set.offer(star(1.0), 2.0);
        assert_eq!(set.offer(star(2.0), 2.0), Admission::Exhausted);
        assert!(!set.accept(star(3.0), 3.0));
        assert!(set.accept(star(4.0), 1.0));
        assert_eq!(ids(set), vec![4.0]);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut set = ResultSet::new(0, Eviction::Distance);
        assert_eq!(set.offer(star(1.0), 0.0), Admission::Exhausted);
        assert!(set.is_empty());
        assert_eq!(set.worst_key(), None);
    }

    #[test]
    fn nan_keys_are_evicted_first() {
        let mut set = ResultSet::new(2, Eviction::Magnitude);
        set.offer(star(1.0), f64::NAN);
        set.offer(star(2.0), 10.0);
        assert!(set.worst_key().unwrap().is_nan());
        assert!(set.accept(star(3.0), 20.0));
        assert_eq!(ids(set), vec![2.0, 3.0]);
    }

    #[test]
    fn result_is_independent_of_arrival_order() {
        let keys = [5.0, 1.0, 9.0, 3.0, 7.0, 2.0, 8.0, 4.0, 6.0, 0.5];
        for eviction in [Eviction::Distance, Eviction::Magnitude] {
            let mut shuffled = ResultSet::new(4, eviction);
            for (i, &k) in keys.iter().enumerate() {
                shuffled.offer(star(i as f64), k);
            }
            let mut order: Vec<usize> = (0..keys.len()).collect();
            order.sort_by(|&a, &b| keys[a].total_cmp(&keys[b]));
            let mut sorted = ResultSet::new(4, eviction);
            for i in order {
                sorted.offer(star(i as f64), keys[i]);
            }
            assert_eq!(ids(shuffled), ids(sorted));
        }
    }
}
