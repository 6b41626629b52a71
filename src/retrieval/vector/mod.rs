pub mod chroma;
pub mod factory;
pub mod local;
pub mod types;

pub use factory::VectorDBFactory;
pub use local::LocalVectorStore;
pub use types::{SearchHit, VectorDB, VectorError, VectorItem};
