pub mod envelope;
pub mod rest;
pub mod router;

// Re-export the entry points both binaries build on.
pub use envelope::{ApiRequest, ApiResponse};
pub use router::dispatch;
