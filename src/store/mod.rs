pub mod cache;
pub mod lessons;
pub mod persist;
pub mod remote;
pub mod schema;
pub mod words;

pub use cache::{FileCache, LocalCache, MemoryCache};
pub use lessons::LessonStore;
pub use persist::{PersistError, PersistOptions, PersistedStore};
pub use remote::{DirRemote, MemoryRemote, RemoteStore};
pub use words::{RemoteWordStats, WordStatSource};
