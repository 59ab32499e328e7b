//! Expiry Priority Queue
//!
//! A binary min-heap of key deadlines. Entries in the key space need to
//! update or drop their own deadline in O(log n), which requires knowing
//! where their node currently sits in the heap.
//!
//! ## Design
//!
//! ```text
//!   slots (arena, stable ids)          heap (ordered by deadline)
//!  ┌────┬───────────────────────┐     ┌───┬───┬───┬───┐
//!  │ 0  │ key=a  t=30  pos=2    │◄────│ 1 │ 3 │ 0 │ 2 │
//!  │ 1  │ key=b  t=10  pos=0    │     └───┴───┴───┴───┘
//!  │ 2  │ key=c  t=90  pos=3    │
//!  │ 3  │ key=d  t=20  pos=1    │
//!  └────┴───────────────────────┘
//! ```
//!
//! Nodes live in a slot arena and never move. The heap holds slot ids, and
//! each node records its current heap position. Every swap inside the heap
//! rewrites the positions of both nodes, so `pos` is always accurate after
//! any mutation. An entry only stores its [`ExpiryId`] (a slot index), never
//! a reference into the queue.

/// Stable handle to a node in the [`ExpiryQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExpiryId(usize);

#[derive(Debug)]
struct Node {
    key: String,
    deadline: i64,
    pos: usize,
}

/// Min-heap of `(key, deadline)` pairs with O(log n) update and removal by id.
#[derive(Debug, Default)]
pub struct ExpiryQueue {
    slots: Vec<Option<Node>>,
    free: Vec<usize>,
    heap: Vec<usize>,
}

impl ExpiryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending deadlines.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Inserts a new node and returns its handle.
    pub fn insert(&mut self, key: impl Into<String>, deadline: i64) -> ExpiryId {
        let pos = self.heap.len();
        let node = Node {
            key: key.into(),
            deadline,
            pos,
        };

        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                slot
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };

        self.heap.push(slot);
        self.sift_up(pos);
        ExpiryId(slot)
    }

    /// Moves a node to a new deadline.
    ///
    /// Returns `false` if the id is not live.
    pub fn update(&mut self, id: ExpiryId, deadline: i64) -> bool {
        let pos = match self.node_mut(id) {
            Some(node) => {
                node.deadline = deadline;
                node.pos
            }
            None => return false,
        };

        self.fix(pos);
        true
    }

    /// Removes a node by id, returning its key and deadline.
    pub fn remove(&mut self, id: ExpiryId) -> Option<(String, i64)> {
        let pos = self.node(id)?.pos;
        let last = self.heap.len() - 1;

        self.swap(pos, last);
        self.heap.pop();
        if pos < self.heap.len() {
            self.fix(pos);
        }

        let node = self.slots[id.0].take()?;
        self.free.push(id.0);
        Some((node.key, node.deadline))
    }

    /// The node with the earliest deadline, without removing it.
    pub fn peek(&self) -> Option<(ExpiryId, &str, i64)> {
        let slot = *self.heap.first()?;
        let node = self.slots[slot].as_ref()?;
        Some((ExpiryId(slot), node.key.as_str(), node.deadline))
    }

    /// Removes and returns the node with the earliest deadline.
    pub fn pop(&mut self) -> Option<(String, i64)> {
        let (id, _, _) = self.peek()?;
        self.remove(id)
    }

    /// Deadline of a live node.
    pub fn deadline(&self, id: ExpiryId) -> Option<i64> {
        self.node(id).map(|node| node.deadline)
    }

    /// Iterates live nodes in heap order (not sorted).
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.heap.iter().filter_map(move |&slot| {
            self.slots[slot]
                .as_ref()
                .map(|node| (node.key.as_str(), node.deadline))
        })
    }

    fn node(&self, id: ExpiryId) -> Option<&Node> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: ExpiryId) -> Option<&mut Node> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    fn deadline_at(&self, pos: usize) -> i64 {
        self.slots[self.heap[pos]]
            .as_ref()
            .map(|node| node.deadline)
            .unwrap_or(i64::MAX)
    }

    /// Swaps two heap positions and records the new positions in both nodes.
    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        for pos in [a, b] {
            if let Some(node) = self.slots[self.heap[pos]].as_mut() {
                node.pos = pos;
            }
        }
    }

    /// Restores heap order around a node whose deadline may have moved
    /// either way.
    fn fix(&mut self, pos: usize) {
        if !self.sift_down(pos) {
            self.sift_up(pos);
        }
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.deadline_at(pos) >= self.deadline_at(parent) {
                break;
            }
            self.swap(pos, parent);
            pos = parent;
        }
    }

    /// Returns `true` if the node moved.
    fn sift_down(&mut self, start: usize) -> bool {
        let len = self.heap.len();
        let mut pos = start;

        loop {
            let left = 2 * pos + 1;
            if left >= len {
                break;
            }

            let right = left + 1;
            let mut child = left;
            if right < len && self.deadline_at(right) < self.deadline_at(left) {
                child = right;
            }

            if self.deadline_at(child) >= self.deadline_at(pos) {
                break;
            }

            self.swap(pos, child);
            pos = child;
        }

        pos > start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every node's recorded position must match where it actually is.
    fn assert_positions(queue: &ExpiryQueue) {
        for (pos, &slot) in queue.heap.iter().enumerate() {
            let node = queue.slots[slot].as_ref().unwrap();
            assert_eq!(node.pos, pos, "node {} has a stale position", node.key);
        }
        for pos in 1..queue.heap.len() {
            assert!(queue.deadline_at((pos - 1) / 2) <= queue.deadline_at(pos));
        }
    }

    fn drain(queue: &mut ExpiryQueue) -> Vec<(String, i64)> {
        std::iter::from_fn(|| queue.pop()).collect()
    }

    #[test]
    fn test_pop_in_deadline_order() {
        let mut queue = ExpiryQueue::new();
        for (key, deadline) in [("c", 30), ("a", 10), ("e", 50), ("b", 20), ("d", 40)] {
            queue.insert(key, deadline);
            assert_positions(&queue);
        }

        assert_eq!(queue.len(), 5);
        assert_eq!(queue.peek().map(|(_, k, t)| (k.to_string(), t)), Some(("a".to_string(), 10)));

        let keys: Vec<String> = drain(&mut queue).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b", "c", "d", "e"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_update_moves_node() {
        let mut queue = ExpiryQueue::new();
        let a = queue.insert("a", 10);
        let _b = queue.insert("b", 20);
        let c = queue.insert("c", 30);

        // Push the head to the back
        assert!(queue.update(a, 100));
        assert_positions(&queue);
        assert_eq!(queue.peek().map(|(_, k, _)| k), Some("b"));

        // Pull the tail to the front
        assert!(queue.update(c, 1));
        assert_positions(&queue);
        assert_eq!(queue.peek().map(|(id, k, t)| (id, k, t)), Some((c, "c", 1)));
        assert_eq!(queue.deadline(a), Some(100));
    }

    #[test]
    fn test_remove_by_id() {
        let mut queue = ExpiryQueue::new();
        let ids: Vec<ExpiryId> = (0..10)
            .map(|i| queue.insert(format!("k{}", i), (i * 7 % 10) as i64))
            .collect();

        assert_eq!(queue.remove(ids[4]), Some(("k4".to_string(), 8)));
        assert_positions(&queue);
        assert_eq!(queue.remove(ids[0]), Some(("k0".to_string(), 0)));
        assert_positions(&queue);

        // Removing twice is a no-op
        assert_eq!(queue.remove(ids[4]), None);
        assert!(!queue.update(ids[4], 5));
        assert_eq!(queue.len(), 8);

        let deadlines: Vec<i64> = drain(&mut queue).into_iter().map(|(_, t)| t).collect();
        let mut sorted = deadlines.clone();
        sorted.sort();
        assert_eq!(deadlines, sorted);
    }

    #[test]
    fn test_slots_are_reused() {
        let mut queue = ExpiryQueue::new();
        let a = queue.insert("a", 1);
        queue.remove(a);
        let b = queue.insert("b", 2);

        assert_eq!(a, b);
        assert_eq!(queue.slots.len(), 1);
        assert_eq!(queue.deadline(b), Some(2));
    }

    #[test]
    fn test_iter_lists_live_nodes() {
        let mut queue = ExpiryQueue::new();
        queue.insert("a", 3);
        let b = queue.insert("b", 1);
        queue.insert("c", 2);
        queue.remove(b);

        let mut nodes: Vec<(&str, i64)> = queue.iter().collect();
        nodes.sort();
        assert_eq!(nodes, vec![("a", 3), ("c", 2)]);
    }
}
