//! Object store gateway and relational repository.

pub mod blob;
pub mod filter;
pub mod memory;
pub mod postgres;
pub mod repository;

mod tests;

pub use blob::{BlobEntry, BlobStorage, MemoryBlobStorage, S3BlobStorage};
pub use filter::{FilterField, ListFilter};
pub use memory::MemoryRepository;
pub use postgres::PgRepository;
pub use repository::{DocumentRepository, MAX_LIST_LIMIT};
