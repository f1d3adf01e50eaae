//! Note -> handler mapping snapshots
//!
//! A [`NoteMap`] is built once from configuration and never mutated. The
//! [`MappingCell`] publishes whole maps atomically: the real-time thread
//! always dereferences exactly one complete snapshot, and replacing the map
//! never exposes a half-built table.

use crate::job::HandlerPath;
use arc_swap::{ArcSwap, Guard};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Number of addressable MIDI notes
pub const NOTE_COUNT: usize = 128;

/// Immutable note (0-127) to handler table
#[derive(Debug, Clone)]
pub struct NoteMap {
    slots: Box<[Option<HandlerPath>]>,
    len: usize,
}

impl NoteMap {
    /// Map with no entries: nothing ever triggers
    pub fn empty() -> Self {
        Self {
            slots: vec![None; NOTE_COUNT].into_boxed_slice(),
            len: 0,
        }
    }

    /// Build a map from resolved configuration entries
    ///
    /// Notes above 127 are ignored.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (u8, PathBuf)>,
    {
        let mut map = Self::empty();
        for (note, path) in entries {
            let Some(slot) = map.slots.get_mut(note as usize) else {
                continue;
            };
            if slot.is_none() {
                map.len += 1;
            }
            *slot = Some(HandlerPath::from(path));
        }
        map
    }

    /// Handler for a note, if mapped
    #[inline]
    pub fn get(&self, note: u8) -> Option<&HandlerPath> {
        self.slots.get(note as usize).and_then(Option::as_ref)
    }

    /// Number of mapped notes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate mapped notes in ascending order
    pub fn iter(&self) -> impl Iterator<Item = (u8, &HandlerPath)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(note, slot)| slot.as_ref().map(|path| (note as u8, path)))
    }
}

impl Default for NoteMap {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<&BTreeMap<u8, PathBuf>> for NoteMap {
    fn from(entries: &BTreeMap<u8, PathBuf>) -> Self {
        Self::from_entries(entries.iter().map(|(note, path)| (*note, path.clone())))
    }
}

/// Atomically replaceable [`NoteMap`] handle
///
/// Shared read-only between the session (publisher) and the real-time
/// processor (reader) through `Arc<MappingCell>`.
pub struct MappingCell {
    current: ArcSwap<NoteMap>,
    /// Replaced snapshots that may still be referenced by a reader's guard.
    /// Only the publisher frees them, once the cell holds the last reference.
    retired: Mutex<Vec<Arc<NoteMap>>>,
}

impl MappingCell {
    pub fn new(map: NoteMap) -> Self {
        Self {
            current: ArcSwap::from_pointee(map),
            retired: Mutex::new(Vec::new()),
        }
    }

    /// Current snapshot (wait-free, no allocation once the thread is warmed up)
    #[inline]
    pub fn snapshot(&self) -> Guard<Arc<NoteMap>> {
        self.current.load()
    }

    /// Current snapshot as an owned handle (non-real-time callers)
    pub fn load_full(&self) -> Arc<NoteMap> {
        self.current.load_full()
    }

    /// Publish a new snapshot, replacing the whole map at once
    ///
    /// Must not be called from the real-time thread. Retired snapshots no
    /// longer held by any reader are freed here, on the publishing thread.
    pub fn publish(&self, map: NoteMap) {
        // swap() turns outstanding reader debts on the old map into real
        // references, so strong_count sees every guard still alive
        let previous = self.current.swap(Arc::new(map));
        let mut retired = match self.retired.lock() {
            Ok(retired) => retired,
            Err(poisoned) => poisoned.into_inner(),
        };
        retired.push(previous);
        retired.retain(|map| Arc::strong_count(map) > 1);
    }

    /// Number of replaced snapshots still waiting for readers to let go
    pub fn retired_len(&self) -> usize {
        match self.retired.lock() {
            Ok(retired) => retired.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

impl Default for MappingCell {
    fn default() -> Self {
        Self::new(NoteMap::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn entries(pairs: &[(u8, &str)]) -> Vec<(u8, PathBuf)> {
        pairs.iter().map(|(n, p)| (*n, PathBuf::from(p))).collect()
    }

    #[test]
    fn test_lookup() {
        let map = NoteMap::from_entries(entries(&[(60, "/a"), (61, "/b")]));
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(60).map(|p| p.as_ref()), Some(Path::new("/a")));
        assert_eq!(map.get(61).map(|p| p.as_ref()), Some(Path::new("/b")));
        assert!(map.get(62).is_none());
        assert!(map.get(200).is_none());
    }

    #[test]
    fn test_duplicate_note_replaces_entry() {
        let map = NoteMap::from_entries(entries(&[(60, "/a"), (60, "/c")]));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(60).map(|p| p.as_ref()), Some(Path::new("/c")));
    }

    #[test]
    fn test_out_of_range_note_ignored() {
        let map = NoteMap::from_entries(entries(&[(128, "/a"), (255, "/b")]));
        assert!(map.is_empty());
    }

    #[test]
    fn test_iter_in_note_order() {
        let map = NoteMap::from_entries(entries(&[(61, "/b"), (12, "/a")]));
        let notes: Vec<u8> = map.iter().map(|(n, _)| n).collect();
        assert_eq!(notes, vec![12, 61]);
    }

    #[test]
    fn test_publish_replaces_snapshot() {
        let cell = MappingCell::default();
        assert!(cell.snapshot().is_empty());

        cell.publish(NoteMap::from_entries(entries(&[(60, "/a")])));
        assert_eq!(cell.snapshot().len(), 1);

        cell.publish(NoteMap::empty());
        assert!(cell.snapshot().is_empty());
    }

    #[test]
    fn test_guard_held_across_publishes_is_never_last_owner() {
        let cell = MappingCell::new(NoteMap::from_entries(entries(&[(60, "/a")])));

        let guard = cell.snapshot();
        cell.publish(NoteMap::empty());
        cell.publish(NoteMap::empty());
        cell.publish(NoteMap::empty());

        // The cell still owns the old map, so dropping the guard cannot free it
        assert!(Arc::strong_count(&*guard) >= 2);
        assert_eq!(guard.get(60).map(|p| p.as_ref()), Some(Path::new("/a")));
        assert_eq!(cell.retired_len(), 1);

        drop(guard);
        cell.publish(NoteMap::empty());
        assert_eq!(cell.retired_len(), 0);
    }

    #[test]
    fn test_unreferenced_snapshots_freed_on_publish() {
        let cell = MappingCell::default();
        for _ in 0..10 {
            cell.publish(NoteMap::empty());
        }
        assert_eq!(cell.retired_len(), 0);
    }

    #[test]
    fn test_readers_never_see_partial_snapshot() {
        // Two maps that are each internally consistent: every note in
        // 0..64 points at the same handler.
        let map_a = NoteMap::from_entries((0..64).map(|n| (n, PathBuf::from("/a"))));
        let map_b = NoteMap::from_entries((0..64).map(|n| (n, PathBuf::from("/b"))));

        let cell = Arc::new(MappingCell::new(map_a.clone()));
        let done = Arc::new(AtomicBool::new(false));

        let reader = {
            let cell = cell.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut checks = 0u64;
                loop {
                    let snapshot = cell.snapshot();
                    let first = snapshot.get(0).cloned();
                    assert!(first.is_some());
                    for note in 0..64 {
                        assert_eq!(snapshot.get(note).cloned(), first);
                    }
                    checks += 1;
                    if done.load(Ordering::Relaxed) {
                        break checks;
                    }
                }
            })
        };

        for i in 0..2000 {
            let next = if i % 2 == 0 { map_b.clone() } else { map_a.clone() };
            cell.publish(next);
        }
        done.store(true, Ordering::Relaxed);

        let checks = reader.join().unwrap();
        assert!(checks > 0);
    }
}
