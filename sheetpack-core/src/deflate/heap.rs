//! Fixed-capacity binary max-heap of `(value, index)` pairs.
//!
//! The heap always pops its largest value. Huffman construction wants the
//! least frequent symbols first, so callers push the *negated* frequency:
//! `push(symbol, -(freq as i64))`. Every caller in this crate follows that
//! convention; `HeapNode::frequency` undoes it.

/// An entry popped from the heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapNode {
    pub index: usize,
    pub value: i64,
}

impl HeapNode {
    /// The original frequency of a node pushed with a negated value.
    pub fn frequency(&self) -> u64 {
        (-self.value) as u64
    }
}

pub struct HuffmanHeap {
    buffer: Vec<(i64, usize)>,
    capacity: usize,
}

impl HuffmanHeap {
    pub fn with_capacity(capacity: usize) -> Self {
        HuffmanHeap {
            buffer: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Insert a node and sift it up.
    ///
    /// Panics when the heap is already at capacity.
    pub fn push(&mut self, index: usize, value: i64) {
        assert!(
            self.buffer.len() < self.capacity,
            "huffman heap overflow (capacity {})",
            self.capacity
        );
        self.buffer.push((value, index));

        let mut current = self.buffer.len() - 1;
        while current > 0 {
            let parent = (current - 1) / 2;
            if self.buffer[current].0 > self.buffer[parent].0 {
                self.buffer.swap(current, parent);
                current = parent;
            } else {
                break;
            }
        }
    }

    /// Remove and return the node with the largest value.
    pub fn pop(&mut self) -> Option<HeapNode> {
        if self.buffer.is_empty() {
            return None;
        }
        let (value, index) = self.buffer.swap_remove(0);

        let len = self.buffer.len();
        let mut parent = 0;
        loop {
            let mut child = 2 * parent + 1;
            if child >= len {
                break;
            }
            if child + 1 < len && self.buffer[child + 1].0 > self.buffer[child].0 {
                child += 1;
            }
            if self.buffer[child].0 > self.buffer[parent].0 {
                self.buffer.swap(child, parent);
                parent = child;
            } else {
                break;
            }
        }

        Some(HeapNode { index, value })
    }
}
