/// Bounded single-producer/single-consumer queue used as the hand-off
/// between the transport's receive thread and the caller's `poll()` thread.
///
/// No dynamic allocation after construction, no locks, no blocking. Capacity
/// must be a power of two so index wrapping is a mask instead of a modulo.
// The crate denies `unsafe_code` by default; this module is the one
// carve-out, holding the entire lock-free SPSC implementation behind a
// documented safety argument on each block. See DESIGN.md.
#![allow(unsafe_code)]

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A fixed-capacity SPSC ring buffer.
///
/// `try_push` never overwrites an unread slot: when full it returns the
/// value back to the caller so back-pressure can be observed and signaled
/// (see [`crate::hysteresis::Hysteresis`]). Exactly one producer may call
/// `try_push` and exactly one consumer may call `try_pop`; mixing callers
/// across threads is a logic error the type does not protect against.
pub struct Ring<T> {
    slots: Box<[UnsafeCell<Option<T>>]>,
    mask: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
}

// SAFETY: `head`/`tail` partition slot ownership between producer and
// consumer: the producer only ever writes `slots[head & mask]` and only
// after observing (via Acquire) that the consumer has vacated it; the
// consumer only ever reads `slots[tail & mask]` and only after observing
// (via Acquire) that the producer has published it. No slot is ever
// touched by both sides concurrently.
unsafe impl<T: Send> Send for Ring<T> {}
unsafe impl<T: Send> Sync for Ring<T> {}

impl<T> Ring<T> {
    /// Create a ring with the given capacity. Rounds up to the next power
    /// of two if `capacity` is not already one (minimum 2).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || UnsafeCell::new(None));
        Self {
            slots: slots.into_boxed_slice(),
            mask: capacity - 1,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Push a value. Returns `Err(value)` if the ring is full.
    pub fn try_push(&self, value: T) -> Result<(), T> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head.wrapping_sub(tail) >= self.slots.len() {
            return Err(value);
        }
        let idx = head & self.mask;
        // SAFETY: consumer has not yet reached `idx` (checked above via
        // Acquire on `tail`), so the producer has exclusive access.
        unsafe {
            *self.slots[idx].get() = Some(value);
        }
        self.head.store(head.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Pop the oldest value, if any.
    pub fn try_pop(&self) -> Option<T> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail == head {
            return None;
        }
        let idx = tail & self.mask;
        // SAFETY: producer has published `idx` (checked above via Acquire
        // on `head`), and only the consumer ever reads/clears this slot.
        let value = unsafe { (*self.slots[idx].get()).take() };
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        value
    }

    pub fn is_empty(&self) -> bool {
        self.tail.load(Ordering::Acquire) == self.head.load(Ordering::Acquire)
    }

    pub fn is_full(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail) >= self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.head
            .load(Ordering::Acquire)
            .wrapping_sub(self.tail.load(Ordering::Acquire))
    }
}

/// A single-slot holder for "latest value wins" data such as pong/status
/// responses, where only the most recent observation matters and losing an
/// intermediate one is acceptable.
///
/// Implemented as a seqlock: the writer bumps an odd sequence, writes, then
/// bumps to even; the reader retries if it observed an odd sequence or the
/// sequence changed mid-read. Single writer, any number of readers (the
/// session only ever has one, but the primitive does not assume it).
pub struct LatestSlot<T: Clone> {
    seq: AtomicUsize,
    value: UnsafeCell<Option<T>>,
}

unsafe impl<T: Send + Clone> Send for LatestSlot<T> {}
unsafe impl<T: Send + Clone> Sync for LatestSlot<T> {}

impl<T: Clone> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            seq: AtomicUsize::new(0),
            value: UnsafeCell::new(None),
        }
    }

    /// Publish a new value. Single-writer only.
    pub fn publish(&self, value: T) {
        let seq = self.seq.load(Ordering::Relaxed);
        self.seq.store(seq.wrapping_add(1), Ordering::Release);
        // SAFETY: only the single designated writer thread ever calls
        // `publish`; readers never write through this pointer.
        unsafe {
            *self.value.get() = Some(value);
        }
        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Read the latest published value, if any.
    pub fn read(&self) -> Option<T> {
        loop {
            let before = self.seq.load(Ordering::Acquire);
            if before % 2 != 0 {
                continue;
            }
            // SAFETY: a torn read is detected below by re-checking `seq`;
            // we never act on a value observed during a concurrent write.
            let value = unsafe { (*self.value.get()).clone() };
            let after = self.seq.load(Ordering::Acquire);
            if before == after {
                return value;
            }
        }
    }
}

impl<T: Clone> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_fifo_order() {
        let ring: Ring<u32> = Ring::new(4);
        assert!(ring.try_push(1).is_ok());
        assert!(ring.try_push(2).is_ok());
        assert_eq!(ring.try_pop(), Some(1));
        assert_eq!(ring.try_pop(), Some(2));
        assert_eq!(ring.try_pop(), None);
    }

    #[test]
    fn capacity_rounds_to_power_of_two() {
        let ring: Ring<u8> = Ring::new(5);
        assert_eq!(ring.capacity(), 8);
    }

    #[test]
    fn fills_exactly_at_capacity_then_rejects() {
        let ring: Ring<u32> = Ring::new(4);
        for i in 0..4 {
            assert!(ring.try_push(i).is_ok());
        }
        assert!(ring.is_full());
        assert_eq!(ring.try_push(99), Err(99));
    }

    #[test]
    fn never_overwrites_unread_entries() {
        let ring: Ring<u32> = Ring::new(2);
        assert!(ring.try_push(10).is_ok());
        assert!(ring.try_push(20).is_ok());
        assert!(ring.try_push(30).is_err());
        assert_eq!(ring.try_pop(), Some(10));
        assert!(ring.try_push(30).is_ok());
        assert_eq!(ring.try_pop(), Some(20));
        assert_eq!(ring.try_pop(), Some(30));
    }

    #[test]
    fn latest_slot_returns_most_recent_publish() {
        let slot: LatestSlot<u32> = LatestSlot::new();
        assert_eq!(slot.read(), None);
        slot.publish(1);
        slot.publish(2);
        assert_eq!(slot.read(), Some(2));
    }

    #[test]
    fn ring_is_empty_until_pushed() {
        let ring: Ring<u32> = Ring::new(4);
        assert!(ring.is_empty());
        ring.try_push(1).unwrap();
        assert!(!ring.is_empty());
    }
}
