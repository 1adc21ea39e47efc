mod attachments;
mod entity;
mod graph;
mod node;

pub use attachments::{
    AttachmentKind, Attachments, BlockAllocator, BlockKind, HeapAllocator, Motion, RawBlock,
    NODE_STORAGE_BYTES,
};
pub use entity::{wrap_angle, Collision, Entity, Rotation3, Vec3, ANGLE_UNITS_PER_TURN};
pub use graph::{AllocError, LifecycleEvent, ObjectGraph, ReleaseGuard, ROOT_LIST_COUNT};
pub use node::{
    AllocFlags, NodeFn, NodeHandle, ObjectNode, SetRecord, SetRecordId, SetRecords,
    SET_FLAG_SPAWNED,
};
