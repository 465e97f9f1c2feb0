// src/services/mod.rs

pub mod audit;
pub mod ingest;   // upload validation + text extraction
pub mod limiter;  // per-client request windows

// Public API
pub use audit::AuditLog;
pub use ingest::{DocumentIngestor, PdftotextExtractor, TextExtractor, UploadedFile};
pub use limiter::RateLimiter;
