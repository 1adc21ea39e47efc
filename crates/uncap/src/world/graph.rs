use std::fmt;

use thiserror::Error;
use tracing::{debug, trace, warn};

use super::attachments::{
    AttachmentKind, Attachments, BlockAllocator, BlockKind, HeapAllocator, NODE_STORAGE_BYTES,
};
use super::entity::Entity;
use super::node::{AllocFlags, NodeHandle, ObjectNode, SetRecordId, SetRecords};

pub const ROOT_LIST_COUNT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    #[error("node storage exhausted")]
    NodeStorageExhausted,
    #[error("failed to allocate {kind:?} attachment block")]
    AttachmentExhausted { kind: AttachmentKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Created(NodeHandle),
    Destroyed(NodeHandle),
}

/// Host-side "is this node deletable" check, consulted by `release` only.
pub type ReleaseGuard = Box<dyn Fn(NodeHandle, &ObjectNode) -> bool>;

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    node: Option<ObjectNode>,
}

/// Arena-backed object tree: sibling lists hang off a fixed set of root
/// lists or off a parent's child link, and released slots are recycled
/// LIFO through the free list.
pub struct ObjectGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    roots: [Option<NodeHandle>; ROOT_LIST_COUNT],
    allocator: Box<dyn BlockAllocator>,
    set_records: SetRecords,
    release_guard: Option<ReleaseGuard>,
    current: Option<NodeHandle>,
    events: Vec<LifecycleEvent>,
}

impl Default for ObjectGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectGraph")
            .field("live", &self.live_count())
            .field("free", &self.free.len())
            .field("roots", &self.roots)
            .field("current", &self.current)
            .field("pending_events", &self.events.len())
            .finish_non_exhaustive()
    }
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::with_allocator(Box::new(HeapAllocator::default()))
    }

    pub fn with_allocator(allocator: Box<dyn BlockAllocator>) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            roots: [None; ROOT_LIST_COUNT],
            allocator,
            set_records: SetRecords::default(),
            release_guard: None,
            current: None,
            events: Vec::new(),
        }
    }

    pub fn set_release_guard(&mut self, guard: ReleaseGuard) {
        self.release_guard = Some(guard);
    }

    pub fn clear_release_guard(&mut self) {
        self.release_guard = None;
    }

    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.node(handle).is_some()
    }

    pub fn node(&self, handle: NodeHandle) -> Option<&ObjectNode> {
        let slot = self.slots.get(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.node.as_ref()
    }

    pub fn node_mut(&mut self, handle: NodeHandle) -> Option<&mut ObjectNode> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.node.as_mut()
    }

    pub fn entity(&self, handle: NodeHandle) -> Option<&Entity> {
        self.node(handle)?.attachments.primary.as_ref()
    }

    pub fn entity_mut(&mut self, handle: NodeHandle) -> Option<&mut Entity> {
        self.node_mut(handle)?.attachments.primary.as_mut()
    }

    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn free_list_len(&self) -> usize {
        self.free.len()
    }

    /// Reclaimed slot indices, bottom of the stack first.
    pub fn free_slots(&self) -> &[u32] {
        &self.free
    }

    pub fn root(&self, list: usize) -> Option<NodeHandle> {
        self.roots.get(list).copied().flatten()
    }

    pub fn root_list(&self, list: usize) -> Vec<NodeHandle> {
        self.sibling_chain(self.root(list))
    }

    pub fn children(&self, parent: NodeHandle) -> Vec<NodeHandle> {
        self.sibling_chain(self.node(parent).and_then(ObjectNode::child))
    }

    pub fn current(&self) -> Option<NodeHandle> {
        self.current
    }

    pub fn set_current(&mut self, current: Option<NodeHandle>) {
        self.current = current;
    }

    pub fn set_records(&self) -> &SetRecords {
        &self.set_records
    }

    pub fn set_records_mut(&mut self) -> &mut SetRecords {
        &mut self.set_records
    }

    pub fn bind_set_record(&mut self, node: NodeHandle, record: SetRecordId) -> bool {
        if !self.contains(node) || !self.set_records.bind(record, node) {
            return false;
        }
        if let Some(node) = self.node_mut(node) {
            node.set_record = Some(record);
        }
        true
    }

    pub fn drain_events(&mut self) -> Vec<LifecycleEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn allocate(
        &mut self,
        flags: AllocFlags,
        index_hint: usize,
        init: impl FnOnce(&mut ObjectNode),
    ) -> Result<NodeHandle, AllocError> {
        let (handle, recycled) = self.acquire_node()?;
        let mut node = ObjectNode::new(index_hint, self.current);
        init(&mut node);
        self.slots[handle.index() as usize].node = Some(node);

        for kind in AttachmentKind::ALL {
            if !flags.contains(kind.flag()) {
                continue;
            }
            if !self
                .allocator
                .acquire(BlockKind::Attachment(kind), kind.size_bytes())
            {
                warn!(node = %handle, attachment = ?kind, "attachment_alloc_failed");
                self.unwind_allocation(handle, recycled);
                return Err(AllocError::AttachmentExhausted { kind });
            }
            if let Some(node) = self.node_mut(handle) {
                node.attachments.install_zeroed(kind);
            }
        }

        if flags.contains(AllocFlags::PRIMARY) {
            self.events.push(LifecycleEvent::Created(handle));
        }
        trace!(node = %handle, flags = flags.bits(), recycled, "node_allocated");
        Ok(handle)
    }

    /// Returns `false` when the handle is stale or the release guard refuses.
    pub fn release(&mut self, handle: NodeHandle) -> bool {
        let Some(node) = self.node(handle) else {
            trace!(node = %handle, "release_skipped_stale");
            return false;
        };
        if let Some(guard) = self.release_guard.as_ref() {
            if !guard(handle, node) {
                debug!(node = %handle, "release_refused");
                return false;
            }
        }
        self.release_subtree(handle);
        true
    }

    /// Appends an unlinked node to the tail of a root list.
    pub fn attach_root(&mut self, list: usize, handle: NodeHandle) -> bool {
        if list >= ROOT_LIST_COUNT || !self.is_detached(handle) {
            return false;
        }
        match self.roots[list] {
            None => self.roots[list] = Some(handle),
            Some(head) => {
                let tail = self.last_sibling(head);
                self.set_next(tail, Some(handle));
                self.set_previous(handle, Some(tail));
            }
        }
        true
    }

    /// Links into the root list the node was allocated with.
    pub fn attach_root_hinted(&mut self, handle: NodeHandle) -> bool {
        match self.node(handle) {
            Some(node) => self.attach_root(node.index_hint % ROOT_LIST_COUNT, handle),
            None => false,
        }
    }

    /// Appends an unlinked node as the last child of `parent`.
    pub fn attach_child(&mut self, parent: NodeHandle, child: NodeHandle) -> bool {
        if !self.contains(parent) || !self.is_detached(child) || self.is_ancestor(child, parent) {
            return false;
        }
        match self.node(parent).and_then(ObjectNode::child) {
            None => {
                if let Some(parent_node) = self.node_mut(parent) {
                    parent_node.child = Some(child);
                }
            }
            Some(first) => {
                let tail = self.last_sibling(first);
                self.set_next(tail, Some(child));
                self.set_previous(child, Some(tail));
            }
        }
        if let Some(child_node) = self.node_mut(child) {
            child_node.parent = Some(parent);
        }
        true
    }

    /// Visits every node reachable from the root lists, depth first, each
    /// node before its children and children before later siblings.
    pub fn for_each_reachable(&self, mut visit: impl FnMut(NodeHandle, &ObjectNode)) {
        let mut stack: Vec<NodeHandle> = self.roots.iter().rev().flatten().copied().collect();
        let mut visited = 0usize;
        while let Some(handle) = stack.pop() {
            let Some(node) = self.node(handle) else {
                debug_assert!(false, "released node {handle} is still linked");
                continue;
            };
            visited += 1;
            if visited > self.slots.len() {
                debug_assert!(false, "object graph links form a cycle");
                break;
            }
            visit(handle, node);
            if let Some(next) = node.next {
                stack.push(next);
            }
            if let Some(child) = node.child {
                stack.push(child);
            }
        }
    }

    pub fn walk(&self) -> Vec<NodeHandle> {
        let mut order = Vec::with_capacity(self.live_count());
        self.for_each_reachable(|handle, _| order.push(handle));
        order
    }

    /// Runs every reachable node's `main` callback with that node marked as
    /// current. Callbacks may allocate and release freely; nodes released
    /// before their turn are skipped.
    pub fn run_logic(&mut self) -> usize {
        let mut ran = 0;
        for handle in self.walk() {
            let Some(main) = self.node(handle).and_then(|node| node.main) else {
                continue;
            };
            let previous = self.current.replace(handle);
            main(self, handle);
            self.current = previous;
            ran += 1;
        }
        ran
    }

    pub fn run_display(&mut self) -> usize {
        let mut ran = 0;
        for handle in self.walk() {
            let Some(display) = self.node(handle).and_then(|node| node.display) else {
                continue;
            };
            display(self, handle);
            ran += 1;
        }
        ran
    }

    fn acquire_node(&mut self) -> Result<(NodeHandle, bool), AllocError> {
        if let Some(index) = self.free.pop() {
            let slot = &self.slots[index as usize];
            debug_assert!(slot.node.is_none(), "free list holds a live slot");
            return Ok((NodeHandle::new(index, slot.generation), true));
        }

        let index = u32::try_from(self.slots.len()).map_err(|_| AllocError::NodeStorageExhausted)?;
        if !self.allocator.acquire(BlockKind::Node, NODE_STORAGE_BYTES) {
            warn!("node_alloc_failed");
            return Err(AllocError::NodeStorageExhausted);
        }
        self.slots.push(Slot::default());
        Ok((NodeHandle::new(index, 0), false))
    }

    fn unwind_allocation(&mut self, handle: NodeHandle, recycled: bool) {
        let index = handle.index() as usize;
        if let Some(mut node) = self.slots[index].node.take() {
            self.release_blocks(&mut node.attachments);
        }
        if recycled {
            self.free.push(handle.index());
        } else {
            debug_assert_eq!(index + 1, self.slots.len());
            self.slots.pop();
            self.allocator.release(BlockKind::Node, NODE_STORAGE_BYTES);
        }
    }

    fn release_subtree(&mut self, handle: NodeHandle) {
        let teardown = match self.node_mut(handle) {
            Some(node) => {
                node.main = None;
                node.display = None;
                node.teardown.take()
            }
            None => return,
        };
        if let Some(teardown) = teardown {
            teardown(self, handle);
            if !self.contains(handle) {
                return;
            }
        }

        while let Some(child) = self.node(handle).and_then(ObjectNode::child) {
            if !self.contains(child) {
                debug_assert!(false, "child link {child} of {handle} is stale");
                if let Some(node) = self.node_mut(handle) {
                    node.child = None;
                }
                break;
            }
            self.release_subtree(child);
        }

        if !self.contains(handle) {
            return;
        }
        self.unlink(handle);
        self.reclaim(handle);
    }

    fn unlink(&mut self, handle: NodeHandle) {
        let Some(node) = self.node(handle) else {
            return;
        };
        let (previous, next, parent) = (node.previous, node.next, node.parent);

        match (previous, next) {
            (Some(previous), Some(next)) => {
                self.set_next(previous, Some(next));
                self.set_previous(next, Some(previous));
            }
            (Some(previous), None) => self.set_next(previous, None),
            (None, Some(next)) => {
                self.set_previous(next, None);
                self.replace_head(handle, parent, Some(next));
            }
            (None, None) => self.replace_head(handle, parent, None),
        }

        if let Some(node) = self.node_mut(handle) {
            node.next = None;
            node.previous = None;
            node.parent = None;
        }
    }

    fn replace_head(
        &mut self,
        handle: NodeHandle,
        parent: Option<NodeHandle>,
        replacement: Option<NodeHandle>,
    ) {
        match parent {
            Some(parent) => {
                if let Some(parent_node) = self.node_mut(parent) {
                    debug_assert_eq!(parent_node.child, Some(handle));
                    parent_node.child = replacement;
                }
            }
            None => {
                debug_assert!(
                    self.roots.iter().filter(|root| **root == Some(handle)).count() <= 1,
                    "node {handle} heads more than one root list"
                );
                // A parentless node heading no list was never linked.
                if let Some(root) = self.roots.iter_mut().find(|root| **root == Some(handle)) {
                    *root = replacement;
                }
            }
        }
    }

    fn reclaim(&mut self, handle: NodeHandle) {
        let index = handle.index() as usize;
        let Some(slot) = self.slots.get_mut(index) else {
            return;
        };
        if slot.generation != handle.generation() {
            return;
        }
        let Some(mut node) = slot.node.take() else {
            return;
        };
        slot.generation = slot.generation.wrapping_add(1);

        if node.attachments.primary.is_some() {
            self.events.push(LifecycleEvent::Destroyed(handle));
        }
        self.release_blocks(&mut node.attachments);
        if let Some(record) = node.set_record.take() {
            self.set_records.clear_instance(record);
        }
        self.free.push(handle.index());
        debug!(node = %handle, "node_released");
    }

    fn release_blocks(&mut self, attachments: &mut Attachments) {
        for kind in AttachmentKind::ALL {
            if attachments.remove(kind) {
                self.allocator
                    .release(BlockKind::Attachment(kind), kind.size_bytes());
            }
        }
    }

    fn is_detached(&self, handle: NodeHandle) -> bool {
        match self.node(handle) {
            Some(node) => node.is_unlinked() && !self.roots.contains(&Some(handle)),
            None => false,
        }
    }

    fn is_ancestor(&self, candidate: NodeHandle, of: NodeHandle) -> bool {
        let mut cursor = Some(of);
        while let Some(handle) = cursor {
            if handle == candidate {
                return true;
            }
            cursor = self.node(handle).and_then(ObjectNode::parent);
        }
        false
    }

    fn last_sibling(&self, first: NodeHandle) -> NodeHandle {
        let mut tail = first;
        while let Some(next) = self.node(tail).and_then(ObjectNode::next) {
            tail = next;
        }
        tail
    }

    fn sibling_chain(&self, first: Option<NodeHandle>) -> Vec<NodeHandle> {
        let mut chain = Vec::new();
        let mut cursor = first;
        while let Some(handle) = cursor {
            if chain.len() >= self.slots.len() {
                debug_assert!(false, "sibling list forms a cycle");
                break;
            }
            chain.push(handle);
            cursor = self.node(handle).and_then(ObjectNode::next);
        }
        chain
    }

    fn set_next(&mut self, handle: NodeHandle, next: Option<NodeHandle>) {
        if let Some(node) = self.node_mut(handle) {
            node.next = next;
        }
    }

    fn set_previous(&mut self, handle: NodeHandle, previous: Option<NodeHandle>) {
        if let Some(node) = self.node_mut(handle) {
            node.previous = previous;
        }
    }
}
