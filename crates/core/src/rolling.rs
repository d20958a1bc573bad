//! Bounded FIFO history.

use std::collections::VecDeque;

/// Ordered, capacity-bounded buffer.
///
/// Invariants:
/// - `len() <= capacity()`
/// - iteration order is arrival order
/// - pushing into a full buffer evicts the oldest element
#[derive(Debug, Clone)]
pub struct RollingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingBuffer<T> {
    /// Create an empty buffer. A capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `item`, returning the evicted element when the buffer was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently pushed element.
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Up to the last `n` elements, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &T> {
        let skip = self.items.len().saturating_sub(n);
        self.items.iter().skip(skip)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: Clone> RollingBuffer<T> {
    /// Owned copy of up to the last `n` elements, oldest first.
    pub fn recent_cloned(&self, n: usize) -> Vec<T> {
        self.recent(n).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn evicts_oldest_when_full() {
        let mut buf = RollingBuffer::new(3);
        assert_eq!(buf.push(1), None);
        assert_eq!(buf.push(2), None);
        assert_eq!(buf.push(3), None);
        assert_eq!(buf.push(4), Some(1));

        assert_eq!(buf.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(buf.latest(), Some(&4));
    }

    #[test]
    fn recent_is_capped_at_length() {
        let mut buf = RollingBuffer::new(10);
        buf.push("a");
        buf.push("b");

        assert_eq!(buf.recent_cloned(5), vec!["a", "b"]);
        assert_eq!(buf.recent_cloned(1), vec!["b"]);
        assert!(buf.recent_cloned(0).is_empty());
    }

    #[test]
    fn empty_buffer_has_no_latest() {
        let buf: RollingBuffer<u8> = RollingBuffer::new(4);
        assert!(buf.latest().is_none());
        assert!(buf.is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: the buffer never outgrows its capacity and always holds
        /// exactly the last `capacity` insertions, in arrival order.
        #[test]
        fn holds_last_c_in_arrival_order(
            capacity in 1usize..64,
            items in prop::collection::vec(any::<u32>(), 0..300)
        ) {
            let mut buf = RollingBuffer::new(capacity);
            for (i, item) in items.iter().enumerate() {
                buf.push(*item);
                prop_assert!(buf.len() <= capacity);
                prop_assert_eq!(buf.len(), (i + 1).min(capacity));
            }

            let start = items.len().saturating_sub(capacity);
            let expected: Vec<u32> = items[start..].to_vec();
            let stored: Vec<u32> = buf.iter().copied().collect();
            prop_assert_eq!(stored, expected);
        }
    }
}
