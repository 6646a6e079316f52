//! Registry of live audio buffers
//!
//! Insertion-ordered collection traversed by the mixer on every device
//! callback. Entries live in a slot vector and are linked through slot
//! indices; ids carry a generation so a stale id never aliases a reused slot.
//!
//! Every entry holds one strong reference, so the registry decides where a
//! buffer is freed. The mixer only borrows entries: traversal never touches
//! a reference count, and the last reference goes away when the application
//! thread removes or prunes the entry. A buffer whose handles were all
//! dropped without an explicit delete (only the registry's reference left)
//! is skipped by the mixer and returned by the next [`Registry::prune`].
//!
//! Callers wrap the registry in a `Mutex`; nothing here synchronizes.

use crate::audio::buffer::AudioBuffer;
use std::sync::Arc;

/// Stable handle for a registered buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId {
    index: u32,
    generation: u32,
}

struct Entry {
    buffer: Arc<AudioBuffer>,
    prev: Option<usize>,
    next: Option<usize>,
}

struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

/// Slot arena plus an index-linked list in insertion order
#[derive(Default)]
pub struct Registry {
    slots: Vec<Slot>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of linked entries (including orphaned ones)
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a buffer at the tail, reusing a free slot when possible
    pub fn insert(&mut self, buffer: &Arc<AudioBuffer>) -> BufferId {
        let entry = Entry {
            buffer: Arc::clone(buffer),
            prev: self.tail,
            next: None,
        };

        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index].entry = Some(entry);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                self.slots.len() - 1
            }
        };

        match self.tail {
            Some(tail) => {
                if let Some(prev) = self.slots[tail].entry.as_mut() {
                    prev.next = Some(index);
                }
            }
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;

        BufferId {
            index: index as u32,
            generation: self.slots[index].generation,
        }
    }

    /// Unlink a buffer and hand back the registry's reference.
    ///
    /// None for an unknown or stale id. Drop the result after releasing the
    /// registry lock.
    pub fn remove(&mut self, id: BufferId) -> Option<Arc<AudioBuffer>> {
        if !self.contains(id) {
            return None;
        }
        self.unlink(id.index as usize)
    }

    /// True while `id` refers to a linked entry
    pub fn contains(&self, id: BufferId) -> bool {
        self.slots
            .get(id.index as usize)
            .map(|slot| slot.generation == id.generation && slot.entry.is_some())
            .unwrap_or(false)
    }

    /// Unlink every orphaned entry and return their references
    pub fn prune(&mut self) -> Vec<Arc<AudioBuffer>> {
        let mut orphans = Vec::new();
        let mut cursor = self.head;
        while let Some(index) = cursor {
            let Some(entry) = self.slots[index].entry.as_ref() else {
                break;
            };
            cursor = entry.next;
            if is_orphan(&entry.buffer) {
                orphans.extend(self.unlink(index));
            }
        }
        orphans
    }

    /// Live buffers in insertion order
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            registry: self,
            cursor: self.head,
        }
    }

    fn unlink(&mut self, index: usize) -> Option<Arc<AudioBuffer>> {
        let entry = self.slots[index].entry.take()?;

        match entry.prev {
            Some(prev) => {
                if let Some(p) = self.slots[prev].entry.as_mut() {
                    p.next = entry.next;
                }
            }
            None => self.head = entry.next,
        }
        match entry.next {
            Some(next) => {
                if let Some(n) = self.slots[next].entry.as_mut() {
                    n.prev = entry.prev;
                }
            }
            None => self.tail = entry.prev,
        }

        let slot = &mut self.slots[index];
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.len -= 1;
        Some(entry.buffer)
    }
}

/// Only the registry still references the buffer
fn is_orphan(buffer: &Arc<AudioBuffer>) -> bool {
    Arc::strong_count(buffer) == 1
}

/// Insertion-order iterator that skips orphaned buffers
pub struct Iter<'a> {
    registry: &'a Registry,
    cursor: Option<usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Arc<AudioBuffer>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(index) = self.cursor {
            let entry = self.registry.slots[index].entry.as_ref()?;
            self.cursor = entry.next;
            if !is_orphan(&entry.buffer) {
                return Some(&entry.buffer);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::types::{BufferUsage, PcmFormat, SampleFormat};

    fn make_buffer(frames: usize) -> Arc<AudioBuffer> {
        let format = PcmFormat::new(SampleFormat::F32, 2, 44_100);
        Arc::new(AudioBuffer::new(format, frames, BufferUsage::Static, 2, 44_100).unwrap())
    }

    fn sizes(registry: &Registry) -> Vec<usize> {
        registry.iter().map(|b| b.size_in_frames()).collect()
    }

    #[test]
    fn test_insertion_order() {
        let mut registry = Registry::new();
        let buffers: Vec<_> = (1..=3).map(make_buffer).collect();
        for buffer in &buffers {
            registry.insert(buffer);
        }
        assert_eq!(registry.len(), 3);
        assert_eq!(sizes(&registry), vec![1, 2, 3]);
    }

    #[test]
    fn test_remove_middle_head_tail() {
        let mut registry = Registry::new();
        let buffers: Vec<_> = (1..=4).map(make_buffer).collect();
        let ids: Vec<_> = buffers.iter().map(|b| registry.insert(b)).collect();

        assert!(registry.remove(ids[1]).is_some());
        assert_eq!(sizes(&registry), vec![1, 3, 4]);

        assert!(registry.remove(ids[0]).is_some());
        assert_eq!(sizes(&registry), vec![3, 4]);

        assert!(registry.remove(ids[3]).is_some());
        assert_eq!(sizes(&registry), vec![3]);

        let late = make_buffer(5);
        registry.insert(&late);
        assert_eq!(sizes(&registry), vec![3, 5]);
    }

    #[test]
    fn test_stale_id_rejected_after_slot_reuse() {
        let mut registry = Registry::new();
        let first = make_buffer(1);
        let id = registry.insert(&first);
        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());

        let second = make_buffer(2);
        let reused = registry.insert(&second);
        assert!(!registry.contains(id));
        assert!(registry.contains(reused));
        assert!(registry.remove(id).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_orphans_skipped_until_pruned() {
        let mut registry = Registry::new();
        let keep = make_buffer(1);
        registry.insert(&keep);

        let gone = make_buffer(2);
        let watch = Arc::downgrade(&gone);
        registry.insert(&gone);
        drop(gone);

        assert_eq!(sizes(&registry), vec![1]);
        assert_eq!(registry.len(), 2);
        // Registry still owns the orphan
        assert!(watch.upgrade().is_some());

        let orphans = registry.prune();
        assert_eq!(orphans.len(), 1);
        assert_eq!(registry.len(), 1);
        assert!(watch.upgrade().is_some());

        drop(orphans);
        assert!(watch.upgrade().is_none());
    }

    #[test]
    fn test_remove_returns_the_last_reference() {
        let mut registry = Registry::new();
        let buffer = make_buffer(3);
        let watch = Arc::downgrade(&buffer);
        let id = registry.insert(&buffer);
        drop(buffer);

        let last = registry.remove(id).unwrap();
        assert_eq!(Arc::strong_count(&last), 1);
        drop(last);
        assert!(watch.upgrade().is_none());
    }
}
