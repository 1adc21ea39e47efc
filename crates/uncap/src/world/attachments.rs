use super::entity::{Entity, Rotation3, Vec3};
use super::node::AllocFlags;

/// Bytes of storage a fresh node occupies when acquired from the allocator.
pub const NODE_STORAGE_BYTES: usize = 72;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    Primary,
    AuxA,
    Secondary,
    AuxB,
}

impl AttachmentKind {
    /// Allocation order. Unwinding releases in the same order.
    pub const ALL: [AttachmentKind; 4] = [
        AttachmentKind::Primary,
        AttachmentKind::AuxA,
        AttachmentKind::Secondary,
        AttachmentKind::AuxB,
    ];

    pub const fn size_bytes(self) -> usize {
        match self {
            AttachmentKind::Primary => 64,
            AttachmentKind::AuxA => 56,
            AttachmentKind::Secondary => 64,
            AttachmentKind::AuxB => 16,
        }
    }

    pub const fn flag(self) -> AllocFlags {
        match self {
            AttachmentKind::Primary => AllocFlags::PRIMARY,
            AttachmentKind::AuxA => AllocFlags::AUX_A,
            AttachmentKind::Secondary => AllocFlags::SECONDARY,
            AttachmentKind::AuxB => AllocFlags::AUX_B,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Node,
    Attachment(AttachmentKind),
}

/// Fixed-size memory boundary. `acquire` returning `false` is the only
/// recoverable failure in the object lifecycle.
pub trait BlockAllocator {
    fn acquire(&mut self, kind: BlockKind, bytes: usize) -> bool;
    fn release(&mut self, kind: BlockKind, bytes: usize);
}

#[derive(Debug, Default)]
pub struct HeapAllocator {
    live_bytes: usize,
    live_blocks: usize,
}

impl HeapAllocator {
    pub fn live_bytes(&self) -> usize {
        self.live_bytes
    }

    pub fn live_blocks(&self) -> usize {
        self.live_blocks
    }
}

impl BlockAllocator for HeapAllocator {
    fn acquire(&mut self, _kind: BlockKind, bytes: usize) -> bool {
        self.live_bytes = self.live_bytes.saturating_add(bytes);
        self.live_blocks = self.live_blocks.saturating_add(1);
        true
    }

    fn release(&mut self, _kind: BlockKind, bytes: usize) {
        self.live_bytes = self.live_bytes.saturating_sub(bytes);
        self.live_blocks = self.live_blocks.saturating_sub(1);
    }
}

/// Secondary attachment: per-node motion scratch owned by node logic.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Motion {
    pub velocity: Vec3,
    pub angular_velocity: Rotation3,
    pub timer: i32,
}

/// Untyped zero-filled block for the auxiliary attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock(Box<[u8]>);

impl RawBlock {
    pub fn zeroed(len: usize) -> Self {
        Self(vec![0; len].into_boxed_slice())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attachments {
    pub primary: Option<Entity>,
    pub aux_a: Option<RawBlock>,
    pub secondary: Option<Motion>,
    pub aux_b: Option<RawBlock>,
}

impl Attachments {
    pub fn present(&self) -> AllocFlags {
        AttachmentKind::ALL
            .into_iter()
            .filter(|kind| self.has(*kind))
            .fold(AllocFlags::NONE, |flags, kind| flags | kind.flag())
    }

    pub fn has(&self, kind: AttachmentKind) -> bool {
        match kind {
            AttachmentKind::Primary => self.primary.is_some(),
            AttachmentKind::AuxA => self.aux_a.is_some(),
            AttachmentKind::Secondary => self.secondary.is_some(),
            AttachmentKind::AuxB => self.aux_b.is_some(),
        }
    }

    pub(crate) fn install_zeroed(&mut self, kind: AttachmentKind) {
        match kind {
            AttachmentKind::Primary => self.primary = Some(Entity::default()),
            AttachmentKind::AuxA => self.aux_a = Some(RawBlock::zeroed(kind.size_bytes())),
            AttachmentKind::Secondary => self.secondary = Some(Motion::default()),
            AttachmentKind::AuxB => self.aux_b = Some(RawBlock::zeroed(kind.size_bytes())),
        }
    }

    /// Drops the block; returns whether one was present.
    pub(crate) fn remove(&mut self, kind: AttachmentKind) -> bool {
        match kind {
            AttachmentKind::Primary => self.primary.take().is_some(),
            AttachmentKind::AuxA => self.aux_a.take().is_some(),
            AttachmentKind::Secondary => self.secondary.take().is_some(),
            AttachmentKind::AuxB => self.aux_b.take().is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installed_blocks_are_zero_initialized() {
        let mut attachments = Attachments::default();
        for kind in AttachmentKind::ALL {
            attachments.install_zeroed(kind);
        }

        assert_eq!(attachments.primary, Some(Entity::default()));
        assert_eq!(attachments.secondary, Some(Motion::default()));
        let aux_a = attachments.aux_a.as_ref().expect("aux a");
        assert_eq!(aux_a.bytes().len(), 56);
        assert!(aux_a.bytes().iter().all(|byte| *byte == 0));
        assert_eq!(attachments.aux_b.as_ref().expect("aux b").bytes().len(), 16);
    }

    #[test]
    fn present_flags_follow_installed_blocks() {
        let mut attachments = Attachments::default();
        assert_eq!(attachments.present(), AllocFlags::NONE);

        attachments.install_zeroed(AttachmentKind::Primary);
        attachments.install_zeroed(AttachmentKind::AuxB);
        assert_eq!(attachments.present(), AllocFlags::PRIMARY | AllocFlags::AUX_B);

        assert!(attachments.remove(AttachmentKind::AuxB));
        assert!(!attachments.remove(AttachmentKind::AuxB));
        assert_eq!(attachments.present(), AllocFlags::PRIMARY);
    }

    #[test]
    fn heap_allocator_tracks_live_bytes() {
        let mut allocator = HeapAllocator::default();
        assert!(allocator.acquire(BlockKind::Node, NODE_STORAGE_BYTES));
        assert!(allocator.acquire(
            BlockKind::Attachment(AttachmentKind::AuxA),
            AttachmentKind::AuxA.size_bytes()
        ));
        assert_eq!(allocator.live_bytes(), 72 + 56);
        assert_eq!(allocator.live_blocks(), 2);

        allocator.release(BlockKind::Node, NODE_STORAGE_BYTES);
        assert_eq!(allocator.live_bytes(), 56);
        assert_eq!(allocator.live_blocks(), 1);
    }
}
