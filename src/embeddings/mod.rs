pub mod similarity;
pub mod store;

pub use store::EmbeddingStore;
pub use store::StoreLoadError;
