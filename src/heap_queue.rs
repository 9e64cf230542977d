//! Array-backed binary min-heap with a pluggable ordering.
//!
//! Unlike `std::collections::BinaryHeap` it exposes [`HeapQueue::replace`],
//! which swaps the minimum for a new value with a single sift-down. The
//! k-way merge uses it to advance the stream that just produced the minimum.

fn natural_less<T: Ord>(lhs: &T, rhs: &T) -> bool {
    lhs < rhs
}

/// `less` is a strict "less than" relation; the smallest element is on top.
pub struct HeapQueue<T, C = fn(&T, &T) -> bool> {
    buf: Vec<T>,
    less: C,
}

impl<T: Ord> HeapQueue<T> {
    pub fn new() -> Self {
        Self::with_order(natural_less::<T>)
    }
}

impl<T: Ord> Default for HeapQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C> HeapQueue<T, C>
where
    C: Fn(&T, &T) -> bool,
{
    pub fn with_order(less: C) -> Self {
        HeapQueue {
            buf: Vec::new(),
            less,
        }
    }

    /// The minimum element.
    pub fn top(&self) -> Option<&T> {
        self.buf.first()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn enqueue(&mut self, value: T) {
        self.buf.push(value);
        self.sift_up(self.buf.len() - 1);
    }

    /// Removes and returns the minimum element.
    pub fn dequeue(&mut self) -> Option<T> {
        let last = self.buf.pop()?;
        if self.buf.is_empty() {
            return Some(last);
        }
        let top = std::mem::replace(&mut self.buf[0], last);
        self.sift_down(0);
        Some(top)
    }

    /// Replaces the minimum with `value` and returns the old minimum. Same
    /// result as `dequeue` followed by `enqueue`, with one sift instead of two.
    pub fn replace(&mut self, value: T) -> Option<T> {
        if self.buf.is_empty() {
            self.buf.push(value);
            return None;
        }
        let top = std::mem::replace(&mut self.buf[0], value);
        self.sift_down(0);
        Some(top)
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if !(self.less)(&self.buf[index], &self.buf[parent]) {
                break;
            }
            self.buf.swap(index, parent);
            index = parent;
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        let len = self.buf.len();
        loop {
            let mut child = index * 2 + 1;
            if child >= len {
                break;
            }
            if child + 1 < len && (self.less)(&self.buf[child + 1], &self.buf[child]) {
                child += 1;
            }
            if !(self.less)(&self.buf[child], &self.buf[index]) {
                break;
            }
            self.buf.swap(index, child);
            index = child;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain<T, C: Fn(&T, &T) -> bool>(queue: &mut HeapQueue<T, C>) -> Vec<T> {
        let mut out = Vec::new();
        while let Some(v) = queue.dequeue() {
            out.push(v);
        }
        out
    }

    #[test]
    fn empty_queue() {
        let mut queue: HeapQueue<i32> = HeapQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.top(), None);
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn dequeues_in_order() {
        let mut queue = HeapQueue::new();
        for v in [5, 3, 9, 1, 1, 7, 2] {
            queue.enqueue(v);
        }
        assert_eq!(queue.len(), 7);
        assert_eq!(queue.top(), Some(&1));
        assert_eq!(drain(&mut queue), vec![1, 1, 2, 3, 5, 7, 9]);
    }

    #[test]
    fn replace_keeps_minimum_on_top() {
        let mut queue = HeapQueue::new();
        for v in [10, 20, 30] {
            queue.enqueue(v);
        }
        assert_eq!(queue.replace(25), Some(10));
        assert_eq!(queue.top(), Some(&20));
        assert_eq!(queue.replace(5), Some(20));
        assert_eq!(queue.top(), Some(&5));
        assert_eq!(drain(&mut queue), vec![5, 25, 30]);
    }

    #[test]
    fn replace_on_empty_enqueues() {
        let mut queue = HeapQueue::new();
        assert_eq!(queue.replace(4), None);
        assert_eq!(queue.top(), Some(&4));
    }

    #[test]
    fn custom_order() {
        let mut queue = HeapQueue::with_order(|a: &&str, b: &&str| a.len() < b.len());
        for word in ["three", "a", "to", "four"] {
            queue.enqueue(word);
        }
        assert_eq!(drain(&mut queue), vec!["a", "to", "four", "three"]);
    }
}
