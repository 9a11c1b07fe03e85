use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// A min-heap with a fixed maximum capacity.
///
/// Retains the `capacity` largest items offered from an unbounded stream:
/// 1. While below capacity, every offered item is kept
/// 2. Once full, an item is compared against the minimum of the kept set
/// 3. Only a strictly larger item evicts the minimum, equal ones are discarded
///
/// Complexity:
/// - Offer: O(log K) where K is the capacity
/// - Memory: O(K) instead of O(total items)
///
/// A capacity of zero is accepted and discards everything. The heap is not
/// synchronized; callers share it behind the aggregate's lock.
#[derive(Debug, Clone)]
pub struct BoundedMinHeap<T: Ord> {
    heap: BinaryHeap<Reverse<T>>,
    capacity: usize,
}

impl<T: Ord> BoundedMinHeap<T> {
    /// Creates a new bounded min-heap with the specified capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            capacity,
        }
    }

    /// Offers an item to the heap and reports whether it was retained.
    pub fn offer(&mut self, item: T) -> bool {
        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(item));
            return true;
        }

        // Replacing through PeekMut sifts the new root down once on drop.
        if let Some(mut min) = self.heap.peek_mut() {
            if item > min.0 {
                *min = Reverse(item);
                return true;
            }
        }
        false
    }

    /// Returns true if `item` would be retained by [`offer`](Self::offer).
    pub fn admits(&self, item: &T) -> bool {
        if self.heap.len() < self.capacity {
            return true;
        }
        match self.heap.peek() {
            Some(Reverse(min)) => item > min,
            None => false,
        }
    }

    /// Offers every item of `other` to this heap.
    pub fn absorb(&mut self, other: BoundedMinHeap<T>) {
        for Reverse(item) in other.heap {
            self.offer(item);
        }
    }

    /// Iterates over the retained items in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.heap.iter().map(|Reverse(item)| item)
    }

    /// Borrows the retained items, largest first.
    pub fn sorted(&self) -> Vec<&T> {
        let mut items: Vec<&T> = self.iter().collect();
        items.sort_by(|a, b| b.cmp(a));
        items
    }
}
