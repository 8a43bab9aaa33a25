// TodoStore - todo list engine with filtering, statistics and key-value persistence

pub mod backend;
pub mod config;
pub mod filter;
pub mod models;
pub mod snapshot;
pub mod sqlite;
pub mod stats;
pub mod store;

// Re-export main types for convenience
pub use backend::{FileStorage, MemoryStorage, Storage};
pub use config::{BackendKind, Config};
pub use filter::{Filter, StatusFilter};
pub use models::{Language, Priority, Settings, Subtask, Task, now_ms};
pub use sqlite::SqliteStorage;
pub use stats::{Counts, PriorityDistribution, Stats};
pub use store::{NewTask, Store, SubtaskDraft, TaskEdit};
