//! Service layer for business logic
//!
//! The HTTP handlers only talk to [`ShortenService`]; deletions go through
//! the [`DeletionDebouncer`] owned by the service.

mod deletion;
mod models;
mod shorten;

pub use deletion::{DebounceSettings, DebouncerStats, DeletionDebouncer};
pub use models::{BatchOutputItem, CorrelationItem, DeletionRequest, ShortenOutcome};
pub use shorten::ShortenService;
