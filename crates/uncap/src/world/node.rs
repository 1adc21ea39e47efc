use std::fmt;
use std::ops::BitOr;

use super::attachments::Attachments;
use super::graph::ObjectGraph;

/// Arena slot index plus the generation it was issued under. A handle whose
/// generation no longer matches its slot refers to a released node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle {
    index: u32,
    generation: u32,
}

impl NodeHandle {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub const fn index(self) -> u32 {
        self.index
    }

    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

pub type NodeFn = fn(&mut ObjectGraph, NodeHandle);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AllocFlags(u8);

impl AllocFlags {
    pub const NONE: Self = Self(0);
    pub const PRIMARY: Self = Self(1 << 0);
    pub const AUX_A: Self = Self(1 << 1);
    pub const SECONDARY: Self = Self(1 << 2);
    pub const AUX_B: Self = Self(1 << 3);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for AllocFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SetRecordId(pub u32);

/// Bit set on a placement record while a live node instantiates it.
pub const SET_FLAG_SPAWNED: u16 = 1 << 0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetRecord {
    pub flags: u16,
    pub instance: Option<NodeHandle>,
}

#[derive(Debug, Clone, Default)]
pub struct SetRecords {
    records: Vec<SetRecord>,
}

impl SetRecords {
    pub fn add(&mut self, record: SetRecord) -> SetRecordId {
        let id = SetRecordId(self.records.len() as u32);
        self.records.push(record);
        id
    }

    pub fn get(&self, id: SetRecordId) -> Option<&SetRecord> {
        self.records.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn bind(&mut self, id: SetRecordId, node: NodeHandle) -> bool {
        match self.records.get_mut(id.0 as usize) {
            Some(record) => {
                record.instance = Some(node);
                record.flags |= SET_FLAG_SPAWNED;
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear_instance(&mut self, id: SetRecordId) {
        if let Some(record) = self.records.get_mut(id.0 as usize) {
            record.instance = None;
            record.flags &= !SET_FLAG_SPAWNED;
        }
    }
}

#[derive(Default)]
pub struct ObjectNode {
    pub(crate) next: Option<NodeHandle>,
    pub(crate) previous: Option<NodeHandle>,
    pub(crate) parent: Option<NodeHandle>,
    pub(crate) child: Option<NodeHandle>,
    pub(crate) attachments: Attachments,
    pub(crate) set_record: Option<SetRecordId>,
    pub(crate) origin: Option<NodeHandle>,
    pub(crate) index_hint: usize,
    pub main: Option<NodeFn>,
    pub display: Option<NodeFn>,
    pub teardown: Option<NodeFn>,
    pub tag: u32,
}

impl ObjectNode {
    pub(crate) fn new(index_hint: usize, origin: Option<NodeHandle>) -> Self {
        Self {
            index_hint,
            origin,
            ..Self::default()
        }
    }

    pub fn next(&self) -> Option<NodeHandle> {
        self.next
    }

    pub fn previous(&self) -> Option<NodeHandle> {
        self.previous
    }

    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    pub fn child(&self) -> Option<NodeHandle> {
        self.child
    }

    pub fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    pub fn attachments_mut(&mut self) -> &mut Attachments {
        &mut self.attachments
    }

    pub fn set_record(&self) -> Option<SetRecordId> {
        self.set_record
    }

    /// Node whose logic was running when this node was allocated.
    pub fn origin(&self) -> Option<NodeHandle> {
        self.origin
    }

    pub fn index_hint(&self) -> usize {
        self.index_hint
    }

    pub(crate) fn is_unlinked(&self) -> bool {
        self.next.is_none() && self.previous.is_none() && self.parent.is_none()
    }
}

impl fmt::Debug for ObjectNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectNode")
            .field("next", &self.next)
            .field("previous", &self.previous)
            .field("parent", &self.parent)
            .field("child", &self.child)
            .field("attachments", &self.attachments.present())
            .field("set_record", &self.set_record)
            .field("origin", &self.origin)
            .field("index_hint", &self.index_hint)
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}
