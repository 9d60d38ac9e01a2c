pub mod planner;
pub mod resolver;
pub mod storage;

pub use planner::{MediaCategory, plan_directory};
pub use resolver::{BestEffort, MediaUrlResolver, ResolveError};
pub use storage::{FileInfo, MediaStorage, StorageError, StoredFile};
