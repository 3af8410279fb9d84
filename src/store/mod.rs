mod adapter;
mod fs;
mod memory;
mod snapshot;

pub use adapter::{normalize_path, ContentStore, StoreError};
pub use fs::DirStore;
pub use memory::MemoryStore;
pub use snapshot::{SnapshotError, SnapshotStore, StatePersister};
