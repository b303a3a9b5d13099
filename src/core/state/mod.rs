// Durable checkpoint state for pipeline runs

pub mod checkpoint;
pub mod manager;
pub mod storage;

pub use checkpoint::{Checkpoint, CheckpointBuilder, CheckpointStatus};
pub use manager::CheckpointManager;
pub use storage::{CheckpointStorage, FileCheckpointStorage, MemoryCheckpointStorage};
