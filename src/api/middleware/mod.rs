pub mod identity;
pub mod request_id;

pub use identity::{IdentityMiddleware, IdentitySigner, Owner};
pub use request_id::RequestIdMiddleware;
