//! Recency ordering for the bounded cache
//!
//! [`EvictionQueue`] is a doubly linked list whose nodes live in a contiguous
//! arena. Nodes are addressed by [`Handle`]s (slot index plus generation), so
//! the list never hands out pointers and every operation stays O(1):
//!
//! - `push_front` reuses a slot from the free list when one is available
//! - `remove` relinks the neighbours and returns the slot to the free list
//! - `move_to_front` relinks a node without allocating
//!
//! The front of the queue is the most recently used entry, the back is the
//! next eviction candidate.

/// Stable reference to a node in an [`EvictionQueue`]
///
/// A handle stays valid until its node is removed. Slots are reused after
/// removal, but each reuse bumps the slot generation so a stale handle never
/// resolves to the new occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: usize,
    generation: u64,
}

#[derive(Debug)]
struct Node<T> {
    value: T,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u64,
    node: Option<Node<T>>,
}

/// Arena-backed doubly linked list ordered from most to least recently used
#[derive(Debug)]
pub struct EvictionQueue<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T> Default for EvictionQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EvictionQueue<T> {
    /// Create an empty queue
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Create an empty queue with room for `capacity` nodes before reallocating
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            ..Self::new()
        }
    }

    /// Number of linked nodes
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the queue holds no nodes
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Handle of the most recently used node
    #[must_use]
    pub fn front(&self) -> Option<Handle> {
        self.head.map(|index| self.handle_at(index))
    }

    /// Handle of the least recently used node
    #[must_use]
    pub fn back(&self) -> Option<Handle> {
        self.tail.map(|index| self.handle_at(index))
    }

    /// Borrow the value behind a handle
    #[must_use]
    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.node(handle).map(|node| &node.value)
    }

    /// Handle of the node linked after `handle`, one step toward the back
    #[must_use]
    pub fn next_handle(&self, handle: Handle) -> Option<Handle> {
        self.node(handle)?.next.map(|index| self.handle_at(index))
    }

    /// Handle of the node linked before `handle`, one step toward the front
    #[must_use]
    pub fn prev_handle(&self, handle: Handle) -> Option<Handle> {
        self.node(handle)?.prev.map(|index| self.handle_at(index))
    }

    /// Mutably borrow the value behind a handle
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.node.as_mut().map(|node| &mut node.value)
    }

    /// Insert a value at the front and return its handle
    pub fn push_front(&mut self, value: T) -> Handle {
        let node = Node {
            value,
            prev: None,
            next: self.head,
        };

        let index = if let Some(index) = self.free.pop() {
            self.slots[index].node = Some(node);
            index
        } else {
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            self.slots.len() - 1
        };

        match self.head {
            Some(old_head) => {
                if let Some(old) = self.node_at_mut(old_head) {
                    old.prev = Some(index);
                }
            }
            None => self.tail = Some(index),
        }
        self.head = Some(index);
        self.len += 1;

        self.handle_at(index)
    }

    /// Unlink a node and return its value
    ///
    /// Returns `None` when the handle is stale.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        self.node(handle)?;
        self.unlink(handle.index);

        let slot = &mut self.slots[handle.index];
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;

        Some(node.value)
    }

    /// Remove and return the least recently used value
    pub fn pop_back(&mut self) -> Option<T> {
        let back = self.back()?;
        self.remove(back)
    }

    /// Mark a node as most recently used
    ///
    /// A no-op for the current front. Returns `false` when the handle is stale.
    pub fn move_to_front(&mut self, handle: Handle) -> bool {
        if self.node(handle).is_none() {
            return false;
        }
        if self.head == Some(handle.index) {
            return true;
        }

        self.unlink(handle.index);

        let old_head = self.head;
        if let Some(node) = self.node_at_mut(handle.index) {
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(old) => {
                if let Some(node) = self.node_at_mut(old) {
                    node.prev = Some(handle.index);
                }
            }
            None => self.tail = Some(handle.index),
        }
        self.head = Some(handle.index);

        true
    }

    /// Drop every node
    ///
    /// Outstanding handles become stale rather than aliasing future nodes.
    pub fn clear(&mut self) {
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            self.free.push(index);
        }
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    /// Iterate from most to least recently used
    #[must_use]
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            queue: self,
            front: self.head,
            back: self.tail,
            remaining: self.len,
        }
    }

    fn handle_at(&self, index: usize) -> Handle {
        Handle {
            index,
            generation: self.slots[index].generation,
        }
    }

    fn node(&self, handle: Handle) -> Option<&Node<T>> {
        let slot = self.slots.get(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn node_at(&self, index: usize) -> Option<&Node<T>> {
        self.slots.get(index).and_then(|slot| slot.node.as_ref())
    }

    fn node_at_mut(&mut self, index: usize) -> Option<&mut Node<T>> {
        self.slots.get_mut(index).and_then(|slot| slot.node.as_mut())
    }

    /// Detach a node from its neighbours, fixing head/tail at the boundaries.
    /// The length is left to the caller.
    fn unlink(&mut self, index: usize) {
        let Some((prev, next)) = self.node_at(index).map(|node| (node.prev, node.next)) else {
            return;
        };

        match prev {
            Some(p) => {
                if let Some(node) = self.node_at_mut(p) {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.node_at_mut(n) {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = self.node_at_mut(index) {
            node.prev = None;
            node.next = None;
        }
    }
}

/// Iterator over an [`EvictionQueue`], front to back
///
/// Also iterates back to front through [`DoubleEndedIterator`].
#[derive(Debug)]
pub struct Iter<'a, T> {
    queue: &'a EvictionQueue<T>,
    front: Option<usize>,
    back: Option<usize>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (Handle, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let index = self.front?;
        let node = self.queue.node_at(index)?;
        self.front = node.next;
        self.remaining -= 1;
        Some((self.queue.handle_at(index), &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let index = self.back?;
        let node = self.queue.node_at(index)?;
        self.back = node.prev;
        self.remaining -= 1;
        Some((self.queue.handle_at(index), &node.value))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<'a, T> IntoIterator for &'a EvictionQueue<T> {
    type Item = (Handle, &'a T);
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
