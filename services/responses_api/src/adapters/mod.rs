pub mod memory;
pub mod s3;

pub use memory::MemoryStore;
pub use s3::S3Store;
