pub mod file;
pub mod memory;
pub mod provider;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use provider::StoreProvider;
