/*
 *   Copyright (c) 2025 R3BL LLC
 *   All rights reserved.
 *
 *   Licensed under the Apache License, Version 2.0 (the "License");
 *   you may not use this file except in compliance with the License.
 *   You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 *   Unless required by applicable law or agreed to in writing, software
 *   distributed under the License is distributed on an "AS IS" BASIS,
 *   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *   See the License for the specific language governing permissions and
 *   limitations under the License.
 */

//! Fixed-capacity, newest-first history buffer.
//!
//! Shaped like the teacher's `RingBufferHeap`: a `Vec<Option<T>>` with `head`/`tail`/
//! `count` bookkeeping instead of a `VecDeque`, so a full-buffer push is an in-place
//! overwrite rather than a pop-then-push. Capacity here is a runtime parameter (the pool
//! config table in §6 makes `history_capacity` configurable), not a const generic.
//!
//! # Modules
//!
//! * `constructor`: [`RingBuffer::new`].
//! * `mutator`: [`RingBuffer::push`] and [`RingBuffer::clear`].
//! * `size`: length and capacity queries.
//! * `iterator`: the newest-first [`RingBufferIter`].

/// Fixed-capacity ring buffer. `push` on a full buffer overwrites the oldest entry.
/// [`RingBuffer::all`] and [`RingBuffer::iter`] yield newest first.
pub struct RingBuffer<T> {
    storage: Vec<Option<T>>,
    capacity: usize,
    /// Index the next `push` will write to.
    head: usize,
    /// Index of the oldest live entry.
    tail: usize,
    count: usize,
}

mod constructor {
    use super::RingBuffer;

    impl<T> RingBuffer<T> {
        /// Capacity must be non-zero; the pool clamps `history_capacity` to at least 1.
        #[must_use]
        pub fn new(capacity: usize) -> Self {
            let capacity = capacity.max(1);
            Self {
                storage: Vec::with_capacity(capacity),
                capacity,
                head: 0,
                tail: 0,
                count: 0,
            }
        }
    }
}

mod mutator {
    use super::RingBuffer;

    impl<T> RingBuffer<T> {
        /// Inserts `value` as the newest entry, evicting the oldest if the buffer is
        /// full.
        pub fn push(&mut self, value: T) {
            if self.count == self.capacity {
                // Buffer full: the slot at `head` already holds the oldest entry (since
                // head == tail once count == capacity), overwrite it and advance tail
                // along.
                self.tail = (self.tail + 1) % self.capacity;
            } else {
                self.count += 1;
            }
            if self.storage.len() < self.capacity {
                self.storage.push(Some(value));
            } else {
                self.storage[self.head] = Some(value);
            }
            self.head = (self.head + 1) % self.capacity;
        }

        pub fn clear(&mut self) {
            self.head = 0;
            self.tail = 0;
            self.count = 0;
            self.storage.iter_mut().for_each(|slot| *slot = None);
        }
    }
}

mod size {
    use super::RingBuffer;

    impl<T> RingBuffer<T> {
        #[must_use]
        pub fn len(&self) -> usize { self.count }

        #[must_use]
        pub fn is_empty(&self) -> bool { self.count == 0 }

        #[must_use]
        pub fn capacity(&self) -> usize { self.capacity }
    }
}

mod iterator {
    use super::RingBuffer;

    /// Iterates a [`RingBuffer`] newest-first.
    pub struct RingBufferIter<'a, T> {
        buffer: &'a RingBuffer<T>,
        offset: usize,
    }

    impl<T> RingBuffer<T> {
        /// All entries, newest first.
        #[must_use]
        pub fn all(&self) -> Vec<&T> { self.iter().collect() }

        /// The `n` most recent entries, newest first. `n` beyond `len()` is clamped.
        #[must_use]
        pub fn recent(&self, n: usize) -> Vec<&T> { self.iter().take(n).collect() }

        /// Iterator over entries, newest first.
        #[must_use]
        pub fn iter(&self) -> RingBufferIter<'_, T> {
            RingBufferIter { buffer: self, offset: 0 }
        }
    }

    impl<'a, T> Iterator for RingBufferIter<'a, T> {
        type Item = &'a T;

        fn next(&mut self) -> Option<Self::Item> {
            if self.offset >= self.buffer.count {
                return None;
            }
            // Newest entry is the one just written before `head`; walk backwards from
            // there.
            let index = (self.buffer.head + self.buffer.capacity - 1 - self.offset)
                % self.buffer.capacity;
            self.offset += 1;
            self.buffer.storage.get(index).and_then(|slot| slot.as_ref())
        }
    }

    impl<'a, T> IntoIterator for &'a RingBuffer<T> {
        type Item = &'a T;
        type IntoIter = RingBufferIter<'a, T>;

        fn into_iter(self) -> Self::IntoIter { self.iter() }
    }
}

pub use iterator::RingBufferIter;
