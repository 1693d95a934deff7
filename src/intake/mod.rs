pub mod frame_source;
pub mod snapshot_source;

pub use frame_source::FrameSource;
pub use snapshot_source::SnapshotSource;
