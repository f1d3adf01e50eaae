//! Bounded lock-free relay queue from the real-time thread to the worker
//!
//! A fixed-capacity single-producer single-consumer ring buffer over two
//! monotonically increasing cursors.
//!
//! # Real-Time Safety
//!
//! - **No allocations** after construction: slots are allocated once
//! - **Wait-free**: `try_enqueue` is O(1) and returns immediately when full
//! - **No locks**: ordering is carried by Acquire/Release on the cursors
//!
//! # Memory ordering
//!
//! ```text
//! producer: write slot[tail]  ──►  tail.store(tail + 1, Release)
//!                                        │ synchronizes with
//! consumer:       tail.load(Acquire)  ◄──┘  ──►  read slot[head]  ──►  head.store(head + 1, Release)
//!                                                                             │ synchronizes with
//! producer:       head.load(Acquire)  ◄───────────────────────────────────────┘  ──► reuse slot
//! ```
//!
//! Only the producer ever stores `tail` and only the consumer ever stores
//! `head`. [`RelayProducer`] and [`RelayConsumer`] are not `Clone`, so the
//! single-producer single-consumer discipline is enforced by ownership.

use crossbeam::utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Default relay capacity
///
/// A burst of note-ons larger than this while the worker is busy with a slow
/// handler gets dropped, which is the intended backpressure behaviour.
pub const DEFAULT_RELAY_CAPACITY: usize = 1024;

/// Storage shared by both ends
struct Ring<T> {
    /// Read cursor: number of items ever consumed
    head: CachePadded<AtomicUsize>,
    /// Write cursor: number of items ever produced
    tail: CachePadded<AtomicUsize>,
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
}

// SAFETY: a slot is only accessed by the producer while it is outside
// [head, tail) and only by the consumer while it is inside, and the cursor
// handoff is Acquire/Release. Values move between threads, so T: Send.
unsafe impl<T: Send> Sync for Ring<T> {}
unsafe impl<T: Send> Send for Ring<T> {}

impl<T> Ring<T> {
    #[inline]
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn slot(&self, cursor: usize) -> *mut MaybeUninit<T> {
        self.slots[cursor & self.mask].get()
    }
}

impl<T> Drop for Ring<T> {
    fn drop(&mut self) {
        // Both ends are gone: drop whatever was never consumed
        let head = *self.head.get_mut();
        let tail = *self.tail.get_mut();
        let mut cursor = head;
        while cursor != tail {
            // SAFETY: every slot in [head, tail) holds an initialized value
            unsafe { (*self.slot(cursor)).assume_init_drop() };
            cursor = cursor.wrapping_add(1);
        }
    }
}

/// Constructor namespace for the relay queue
pub struct RelayQueue;

impl RelayQueue {
    /// Create a queue holding at least `capacity` items
    ///
    /// Capacity is rounded up to a power of two (minimum 1).
    /// Returns `(producer, consumer)`: the producer belongs on the real-time
    /// thread, the consumer on the worker.
    pub fn with_capacity<T>(capacity: usize) -> (RelayProducer<T>, RelayConsumer<T>) {
        let capacity = capacity.max(1).next_power_of_two();
        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let ring = Arc::new(Ring {
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            slots,
            mask: capacity - 1,
        });

        (
            RelayProducer {
                ring: ring.clone(),
                tail: 0,
                cached_head: 0,
            },
            RelayConsumer {
                ring,
                head: 0,
                cached_tail: 0,
            },
        )
    }
}

/// Write end of the relay queue
pub struct RelayProducer<T> {
    ring: Arc<Ring<T>>,
    /// Local copy of the write cursor (only we write it)
    tail: usize,
    /// Last observed read cursor, refreshed only when the ring looks full
    cached_head: usize,
}

impl<T> RelayProducer<T> {
    /// Try to enqueue one value without blocking
    ///
    /// Returns the value back when the queue is full; the caller decides to
    /// drop it. Never allocates, never locks, never retries.
    #[inline]
    pub fn try_enqueue(&mut self, value: T) -> Result<(), T> {
        let capacity = self.ring.capacity();

        if self.tail.wrapping_sub(self.cached_head) >= capacity {
            self.cached_head = self.ring.head.load(Ordering::Acquire);
            if self.tail.wrapping_sub(self.cached_head) >= capacity {
                return Err(value);
            }
        }

        // SAFETY: the slot is outside [head, tail), so the consumer is not
        // touching it, and the Acquire load of head above ordered its last
        // read before this write.
        unsafe { (*self.ring.slot(self.tail)).write(value) };

        self.tail = self.tail.wrapping_add(1);
        self.ring.tail.store(self.tail, Ordering::Release);
        Ok(())
    }

    /// Number of free slots right now
    pub fn slots(&self) -> usize {
        let head = self.ring.head.load(Ordering::Acquire);
        self.ring.capacity() - self.tail.wrapping_sub(head)
    }

    pub fn is_full(&self) -> bool {
        self.slots() == 0
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

/// Read end of the relay queue
pub struct RelayConsumer<T> {
    ring: Arc<Ring<T>>,
    /// Local copy of the read cursor (only we write it)
    head: usize,
    /// Last observed write cursor
    cached_tail: usize,
}

impl<T> RelayConsumer<T> {
    /// Take up to `max` available items, lazily, in FIFO order
    ///
    /// Never blocks: when nothing is available the batch is empty. The read
    /// cursor advances by one for each item the batch actually yields, so
    /// dropping a batch early leaves the rest queued.
    pub fn dequeue_batch(&mut self, max: usize) -> Batch<'_, T> {
        self.cached_tail = self.ring.tail.load(Ordering::Acquire);
        let available = self.cached_tail.wrapping_sub(self.head);
        Batch {
            remaining: available.min(max),
            consumer: self,
        }
    }

    /// Take a single item, if any
    pub fn try_dequeue(&mut self) -> Option<T> {
        self.dequeue_batch(1).next()
    }

    /// Number of items waiting right now
    pub fn len(&self) -> usize {
        self.ring
            .tail
            .load(Ordering::Acquire)
            .wrapping_sub(self.head)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Move one value out of the slot at the read cursor
    ///
    /// # Safety
    /// The caller must have observed (Acquire) a tail beyond `self.head`.
    #[inline]
    unsafe fn pop_unchecked(&mut self) -> T {
        let value = (*self.ring.slot(self.head)).assume_init_read();
        self.head = self.head.wrapping_add(1);
        self.ring.head.store(self.head, Ordering::Release);
        value
    }
}

/// Lazy batch of dequeued items, see [`RelayConsumer::dequeue_batch`]
pub struct Batch<'a, T> {
    consumer: &'a mut RelayConsumer<T>,
    remaining: usize,
}

impl<T> Iterator for Batch<'_, T> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        // SAFETY: `remaining` was bounded by the Acquire-observed tail when
        // the batch was created.
        Some(unsafe { self.consumer.pop_unchecked() })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Batch<'_, T> {}
