pub mod embedding;
pub mod error;
pub mod sqlite;
pub mod store;

pub use embedding::{embedder_from_config, CachedEmbedder, Embedder, OpenAiEmbedder, ZeroEmbedder};
pub use error::MemoryError;
pub use sqlite::{MemoryRecord, MemoryTable};
pub use store::{MemoryMatch, MemoryRegistry, MemoryStore};
